//! Directory entries as the API sees them

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pseudo-attribute carrying the groups a user belongs to.
///
/// Derived from group `member` values on read, treated as the desired
/// group set on write. Never stored on the user entry.
pub const MEMBER_OF: &str = "memberOf";

/// Option key carrying a plaintext password for a follow-up password modify.
pub const PASSWORD_OPTION: &str = "password";

/// A raw record returned by a directory search
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirectoryRecord {
    pub dn: String,
    pub attributes: Vec<(String, Vec<String>)>,
}

impl DirectoryRecord {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes
            .push((name.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    /// Values of an attribute, matched case-insensitively like the directory does
    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.attributes
            .iter()
            .find(|(attr, _)| attr.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
    }
}

/// A user or group entry
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub dn: String,

    #[serde(default)]
    pub attributes: BTreeMap<String, Vec<String>>,

    /// Transient values (e.g. a new password), never written as attributes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

impl Entry {
    /// Normalize a directory record.
    ///
    /// `id` and `dn` both take the record's DN. Value order is kept; a name
    /// appearing twice in the record has its lists concatenated.
    pub fn from_record(record: DirectoryRecord) -> Self {
        let mut attributes: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, values) in record.attributes {
            attributes.entry(name).or_default().extend(values);
        }

        Self {
            id: record.dn.clone(),
            dn: record.dn,
            attributes,
            options: BTreeMap::new(),
        }
    }

    /// First value of an attribute
    pub fn first(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .and_then(|v| v.first())
            .map(|s| s.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Desired group set carried by a write request, if any
    pub fn member_of(&self) -> Option<&[String]> {
        self.attributes.get(MEMBER_OF).map(|v| v.as_slice())
    }

    pub fn password(&self) -> Option<&str> {
        self.options.get(PASSWORD_OPTION).map(|s| s.as_str())
    }
}

impl From<DirectoryRecord> for Entry {
    fn from(record: DirectoryRecord) -> Self {
        Entry::from_record(record)
    }
}

/// Normalize a search result, keeping search order
pub fn prepare_entries(records: Vec<DirectoryRecord>) -> Vec<Entry> {
    records.into_iter().map(Entry::from_record).collect()
}
