//! Group operations

use dirgate_core::query::{ListQuery, Page};
use dirgate_core::schema::{add_attributes, replacements, validate_create};
use dirgate_core::types::Entry;
use dirgate_core::Result;
use tracing::info;

use crate::session::Session;
use crate::users::target_dn;

impl Session {
    pub async fn list_groups(&mut self, query: &ListQuery) -> Result<Page> {
        let class = self.config().ldap.groups_object_class_search.clone();
        self.list_entries(&class, query).await
    }

    pub async fn get_group(&mut self, dn: &str, attributes: &[String]) -> Result<Entry> {
        self.read_entry(dn, attributes).await
    }

    pub async fn create_group(&mut self, entry: &Entry) -> Result<Entry> {
        let dn = target_dn(&entry.dn, entry)?.to_string();
        let schema = self.config().ldap.group_attributes.clone();

        validate_create(&schema, entry)?;
        self.directory()
            .add(&dn, add_attributes(&schema, entry))
            .await?;
        info!(dn = %dn, by = %self.profile().username, "Group created");

        self.read_entry(&dn, &[]).await
    }

    /// Replace the given schema attributes, the member list included
    pub async fn update_group(&mut self, dn: &str, entry: &Entry) -> Result<Entry> {
        let dn = target_dn(dn, entry)?.to_string();
        let schema = self.config().ldap.group_attributes.clone();

        let mods = replacements(&schema, entry);
        if !mods.is_empty() {
            self.directory().modify(&dn, mods).await?;
            info!(dn = %dn, by = %self.profile().username, "Group updated");
        }

        self.read_entry(&dn, &[]).await
    }

    pub async fn delete_group(&mut self, dn: &str) -> Result<()> {
        self.directory().delete(dn).await?;
        info!(dn = %dn, by = %self.profile().username, "Group deleted");
        Ok(())
    }
}
