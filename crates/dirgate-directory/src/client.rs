//! Directory client capability
//!
//! A `Directory` is one open, request-scoped session against the directory
//! server. Calls are sequential; a session is never shared between requests.

use async_trait::async_trait;
use dirgate_core::types::{DirectoryRecord, SearchRequest};
use dirgate_core::Result;

/// Attribute name with its full value list
pub type AttributeValues = (String, Vec<String>);

#[async_trait]
pub trait Directory: Send {
    /// Simple bind. Fails with `Authentication` on bad credentials.
    async fn bind(&mut self, dn: &str, password: &str) -> Result<()>;

    /// Search. A base DN that does not exist yields no records.
    async fn search(&mut self, request: &SearchRequest) -> Result<Vec<DirectoryRecord>>;

    async fn add(&mut self, dn: &str, attributes: Vec<AttributeValues>) -> Result<()>;

    /// Replace each listed attribute's whole value list
    async fn modify(&mut self, dn: &str, replacements: Vec<AttributeValues>) -> Result<()>;

    async fn delete(&mut self, dn: &str) -> Result<()>;

    /// RFC 3062 password modify
    async fn password_modify(&mut self, dn: &str, new_password: &str) -> Result<()>;

    /// Atomically delete every `expected` value of `attribute` and add every
    /// value in `values`. Values not named on either side are kept.
    ///
    /// Returns `Ok(false)` and writes nothing when an expected value is gone
    /// or an added value already exists. Values compare case-insensitively.
    async fn compare_and_replace(
        &mut self,
        dn: &str,
        attribute: &str,
        expected: &[String],
        values: &[String],
    ) -> Result<bool>;

    /// Unbind and release the connection
    async fn close(&mut self) -> Result<()>;
}

/// Opens directory sessions
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Directory>>;

    /// Short name for logs and health output
    fn name(&self) -> &str;
}
