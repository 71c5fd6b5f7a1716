//! Search request types

use serde::{Deserialize, Serialize};

/// Search scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Only the base entry
    Base,
    /// Direct children of the base entry
    OneLevel,
    /// The base entry and everything below it
    #[default]
    Subtree,
}

/// A directory search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub base: String,
    pub scope: Scope,
    pub filter: String,
    /// Attributes to return; empty means all user attributes
    pub attributes: Vec<String>,
}

impl SearchRequest {
    pub fn subtree(base: impl Into<String>, filter: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            scope: Scope::Subtree,
            filter: filter.into(),
            attributes: Vec::new(),
        }
    }

    /// Read a single entry by DN
    pub fn entry(dn: impl Into<String>) -> Self {
        Self {
            base: dn.into(),
            scope: Scope::Base,
            filter: "(objectClass=*)".to_string(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }
}
