//! User operations
//!
//! Users carry a `memberOf` pseudo-attribute: derived from group member lists
//! on read, reconciled into them on write.

use dirgate_core::query::{ListQuery, Page, Sort, SortKey, SortOrder};
use dirgate_core::schema::{add_attributes, replacements, validate_create};
use dirgate_core::types::{Entry, MEMBER_OF};
use dirgate_core::utils::dn_eq;
use dirgate_core::{Error, Result};
use tracing::info;

use crate::session::Session;

/// DN a write applies to: the path DN, which a body DN must agree with
pub(crate) fn target_dn<'a>(path_dn: &'a str, entry: &Entry) -> Result<&'a str> {
    if path_dn.trim().is_empty() {
        return Err(Error::InvalidRequest("dn is required".into()));
    }
    if !entry.dn.is_empty() && !dn_eq(&entry.dn, path_dn) {
        return Err(Error::InvalidRequest(format!(
            "body dn {} does not match {}",
            entry.dn, path_dn
        )));
    }
    Ok(path_dn)
}

impl Session {
    /// List users, each page entry carrying its `memberOf`. Without an
    /// explicit sort, users are ordered by the display attribute.
    pub async fn list_users(&mut self, query: &ListQuery) -> Result<Page> {
        let class = self.config().ldap.users_object_class_search.clone();
        let mut query = query.clone();
        if query.sort.is_none() {
            let display = self.config().ldap.display_attribute.clone();
            query.sort = Some(Sort::new(SortKey::Attribute(display), SortOrder::Asc));
        }
        let mut page = self.list_entries(&class, &query).await?;

        for entry in page.entries.iter_mut() {
            self.attach_groups(entry).await?;
        }
        Ok(page)
    }

    pub async fn get_user(&mut self, dn: &str, attributes: &[String]) -> Result<Entry> {
        let mut entry = self.read_entry(dn, attributes).await?;
        self.attach_groups(&mut entry).await?;
        Ok(entry)
    }

    /// Validate, add, join the requested groups, then set the password
    pub async fn create_user(&mut self, entry: &Entry) -> Result<Entry> {
        let dn = target_dn(&entry.dn, entry)?.to_string();
        let schema = self.config().ldap.user_attributes.clone();

        validate_create(&schema, entry)?;
        self.directory()
            .add(&dn, add_attributes(&schema, entry))
            .await?;
        info!(dn = %dn, by = %self.profile().username, "User created");

        self.apply_side_effects(&dn, entry).await?;
        self.get_user(&dn, &[]).await
    }

    /// Replace the given schema attributes, reconcile groups, set the password
    pub async fn update_user(&mut self, dn: &str, entry: &Entry) -> Result<Entry> {
        let dn = target_dn(dn, entry)?.to_string();
        let schema = self.config().ldap.user_attributes.clone();

        let mods = replacements(&schema, entry);
        if !mods.is_empty() {
            self.directory().modify(&dn, mods).await?;
            info!(dn = %dn, by = %self.profile().username, "User updated");
        }

        self.apply_side_effects(&dn, entry).await?;
        self.get_user(&dn, &[]).await
    }

    /// Delete the entry, then drop it from every group
    pub async fn delete_user(&mut self, dn: &str) -> Result<()> {
        self.directory().delete(dn).await?;
        info!(dn = %dn, by = %self.profile().username, "User deleted");

        self.reconcile_groups(dn, &[]).await?;
        Ok(())
    }

    /// Change the session user's own password
    pub async fn change_own_password(&mut self, entry: &Entry) -> Result<()> {
        let password = entry
            .password()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::InvalidRequest("options.password is required".into()))?
            .to_string();
        let dn = self.profile().dn.clone();
        self.set_password(&dn, &password).await
    }

    async fn apply_side_effects(&mut self, dn: &str, entry: &Entry) -> Result<()> {
        if let Some(groups) = entry.member_of() {
            let groups = groups.to_vec();
            self.reconcile_groups(dn, &groups).await?;
        }
        if let Some(password) = entry.password().filter(|p| !p.is_empty()) {
            let password = password.to_string();
            self.set_password(dn, &password).await?;
        }
        Ok(())
    }

    async fn attach_groups(&mut self, entry: &mut Entry) -> Result<()> {
        let groups = self.groups_of(&entry.dn).await?;
        entry.attributes.insert(MEMBER_OF.to_string(), groups);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use dirgate_core::query::Range;
    use dirgate_core::types::PASSWORD_OPTION;
    use std::collections::BTreeMap;

    fn new_user(cn: &str, attrs: &[(&str, &[&str])]) -> Entry {
        let mut attributes = BTreeMap::new();
        for (name, values) in attrs {
            attributes.insert(
                name.to_string(),
                values.iter().map(|v| v.to_string()).collect(),
            );
        }
        Entry {
            dn: format!("cn={},ou=people,dc=example,dc=com", cn),
            attributes,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_list_users_filters_sorts_and_attaches_groups() {
        let tree = tree();
        let mut session = admin_session(&tree).await;

        let query = ListQuery {
            q: Some("o".into()),
            sort: Some(Sort::new(SortKey::Dn, SortOrder::Asc)),
            ..Default::default()
        };
        let page = session.list_users(&query).await.unwrap();

        let dns: Vec<&str> = page.entries.iter().map(|e| e.dn.as_str()).collect();
        assert_eq!(dns, vec![BJONES, JDOE]);
        assert_eq!(page.range.total, 2);
        assert_eq!(page.entries[0].attributes[MEMBER_OF], Vec::<String>::new());
        assert_eq!(page.entries[1].attributes[MEMBER_OF], vec![DEVS.to_string()]);
    }

    #[tokio::test]
    async fn test_list_users_window_by_display_name() {
        let tree = tree();
        let mut session = admin_session(&tree).await;

        let query = ListQuery {
            sort: Some(Sort::new(
                SortKey::Attribute("displayName".into()),
                SortOrder::Desc,
            )),
            range: Some(Range::new(1, 3)),
            ..Default::default()
        };
        let page = session.list_users(&query).await.unwrap();

        // John Doe, Bob Jones, Alice Smith, Admin
        let names: Vec<&str> = page
            .entries
            .iter()
            .filter_map(|e| e.first("displayName"))
            .collect();
        assert_eq!(names, vec!["Bob Jones", "Alice Smith"]);
        assert_eq!(page.range.content_range("posts"), "posts 1-3/4");
    }

    #[tokio::test]
    async fn test_list_users_defaults_to_display_attribute_order() {
        let tree = tree();
        let mut session = admin_session(&tree).await;

        let page = session.list_users(&ListQuery::default()).await.unwrap();
        let dns: Vec<&str> = page.entries.iter().map(|e| e.dn.as_str()).collect();
        // Admin, Alice Smith, Bob Jones, John Doe
        assert_eq!(dns, vec![ADMIN, ASMITH, BJONES, JDOE]);
    }

    #[tokio::test]
    async fn test_list_users_default_order_follows_configured_attribute() {
        let tree = tree();
        let mut config = (*config()).clone();
        config.ldap.display_attribute = "sn".into();
        let connector = crate::memory::MemoryConnector::new(tree.clone());
        let mut session = Session::open(&connector, std::sync::Arc::new(config), "admin", "admin-pw")
            .await
            .unwrap();

        let page = session.list_users(&ListQuery::default()).await.unwrap();
        let sns: Vec<&str> = page.entries.iter().filter_map(|e| e.first("sn")).collect();
        assert_eq!(sns, vec!["Admin", "Doe", "Jones", "Smith"]);
    }

    #[tokio::test]
    async fn test_get_user_with_groups() {
        let tree = tree();
        let mut session = admin_session(&tree).await;

        let user = session.get_user(ADMIN, &[]).await.unwrap();
        assert_eq!(user.id, ADMIN);
        assert_eq!(user.attributes[MEMBER_OF], vec![DEVS.to_string()]);
        assert_eq!(user.first("mail"), Some("admin@example.com"));
    }

    #[tokio::test]
    async fn test_create_user_requires_schema_attributes() {
        let tree = tree();
        let mut session = admin_session(&tree).await;

        let entry = new_user("newbie", &[("objectClass", &["inetOrgPerson"]), ("cn", &["newbie"])]);
        let err = session.create_user(&entry).await.unwrap_err();

        assert_eq!(err.to_string(), "missing attribute: sn");
        assert!(!tree.contains("cn=newbie,ou=people,dc=example,dc=com"));
    }

    #[tokio::test]
    async fn test_create_user_joins_groups_and_sets_password() {
        let tree = tree();
        let mut session = admin_session(&tree).await;
        let dn = "cn=newbie,ou=people,dc=example,dc=com";

        let mut entry = new_user(
            "newbie",
            &[
                ("objectClass", &["top", "inetOrgPerson"]),
                ("cn", &["newbie"]),
                ("sn", &["Bie"]),
                ("memberOf", &[DEVS, OPS]),
                ("favouriteColour", &["green"]),
            ],
        );
        entry
            .options
            .insert(PASSWORD_OPTION.to_string(), "first-pw".to_string());

        let created = session.create_user(&entry).await.unwrap();

        assert_eq!(created.attributes[MEMBER_OF], vec![DEVS.to_string(), OPS.to_string()]);
        assert!(!created.has_attribute("favouriteColour"));
        assert!(tree.values(dn, "memberOf").is_empty());
        assert!(tree.values(DEVS, "member").contains(&dn.to_string()));
        assert_eq!(tree.password(dn).as_deref(), Some("first-pw"));
    }

    #[tokio::test]
    async fn test_update_user_replaces_attributes_and_moves_groups() {
        let tree = tree();
        let mut session = admin_session(&tree).await;

        let entry = new_user(
            "jdoe",
            &[("mail", &["john@example.org"]), ("memberOf", &[OPS])],
        );
        let updated = session.update_user(JDOE, &entry).await.unwrap();

        assert_eq!(updated.first("mail"), Some("john@example.org"));
        assert_eq!(updated.first("displayName"), Some("John Doe"));
        assert_eq!(updated.attributes[MEMBER_OF], vec![OPS.to_string()]);
        assert!(!tree.values(DEVS, "member").contains(&JDOE.to_string()));
    }

    #[tokio::test]
    async fn test_update_without_member_of_keeps_groups() {
        let tree = tree();
        let mut session = admin_session(&tree).await;

        let entry = new_user("jdoe", &[("mail", &["john@example.org"])]);
        let updated = session.update_user(JDOE, &entry).await.unwrap();
        assert_eq!(updated.attributes[MEMBER_OF], vec![DEVS.to_string()]);
    }

    #[tokio::test]
    async fn test_update_rejects_mismatched_dn() {
        let tree = tree();
        let mut session = admin_session(&tree).await;

        let entry = new_user("asmith", &[("mail", &["x@example.com"])]);
        let err = session.update_user(JDOE, &entry).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_delete_user_leaves_groups() {
        let tree = tree();
        let mut session = admin_session(&tree).await;

        session.delete_user(JDOE).await.unwrap();

        assert!(!tree.contains(JDOE));
        assert_eq!(tree.values(DEVS, "member"), vec![ADMIN.to_string()]);
        assert_eq!(tree.values(OPS, "member"), vec![ASMITH.to_string()]);
    }

    #[tokio::test]
    async fn test_delete_missing_user() {
        let tree = tree();
        let mut session = admin_session(&tree).await;
        let err = session
            .delete_user("cn=ghost,ou=people,dc=example,dc=com")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_change_own_password() {
        let tree = tree();
        let mut session = admin_session(&tree).await;

        let mut entry = Entry::default();
        assert!(matches!(
            session.change_own_password(&entry).await.unwrap_err(),
            Error::InvalidRequest(_)
        ));

        entry
            .options
            .insert(PASSWORD_OPTION.to_string(), "rotated".to_string());
        session.change_own_password(&entry).await.unwrap();
        assert_eq!(tree.password(ADMIN).as_deref(), Some("rotated"));
    }
}
