//! Shared fixtures for directory tests

use dirgate_core::schema::Necessity;
use dirgate_core::types::DirectoryRecord;
use dirgate_core::DirgateConfig;
use std::sync::Arc;

use crate::memory::{MemoryConnector, MemoryTree};
use crate::session::Session;

pub const BASE: &str = "dc=example,dc=com";
pub const ADMIN: &str = "cn=admin,ou=people,dc=example,dc=com";
pub const JDOE: &str = "cn=jdoe,ou=people,dc=example,dc=com";
pub const ASMITH: &str = "cn=asmith,ou=people,dc=example,dc=com";
pub const BJONES: &str = "cn=bjones,ou=people,dc=example,dc=com";
pub const DEVS: &str = "cn=devs,ou=groups,dc=example,dc=com";
pub const OPS: &str = "cn=ops,ou=groups,dc=example,dc=com";

pub fn config() -> Arc<DirgateConfig> {
    let mut config = DirgateConfig::default();
    config.ldap.base_dn = BASE.into();
    config.ldap.ro.username = "cn=readonly,dc=example,dc=com".into();
    config.ldap.ro.password = "ro-secret".into();

    for (name, necessity) in [
        ("objectClass", Necessity::Required),
        ("cn", Necessity::Required),
        ("sn", Necessity::Required),
        ("displayName", Necessity::Optional),
        ("mail", Necessity::Optional),
        ("memberOf", Necessity::Optional),
    ] {
        config.ldap.user_attributes.insert(name.into(), necessity);
    }
    for (name, necessity) in [
        ("objectClass", Necessity::Required),
        ("cn", Necessity::Required),
        ("member", Necessity::Required),
        ("description", Necessity::Optional),
    ] {
        config.ldap.group_attributes.insert(name.into(), necessity);
    }

    Arc::new(config)
}

pub fn person(cn: &str, display_name: &str) -> DirectoryRecord {
    DirectoryRecord::new(format!("cn={},ou=people,dc=example,dc=com", cn))
        .with_attribute("objectClass", ["top", "inetOrgPerson"])
        .with_attribute("cn", [cn])
        .with_attribute("sn", [display_name.rsplit(' ').next().unwrap_or(cn)])
        .with_attribute("displayName", [display_name])
        .with_attribute("mail", [format!("{}@example.com", cn)])
}

pub fn group(cn: &str, members: &[&str]) -> DirectoryRecord {
    DirectoryRecord::new(format!("cn={},ou=groups,dc=example,dc=com", cn))
        .with_attribute("objectClass", ["top", "groupOfNames"])
        .with_attribute("cn", [cn])
        .with_attribute("member", members.iter().copied())
}

/// Four people, two groups; `admin` logs in with `admin-pw`
pub fn tree() -> MemoryTree {
    let tree = MemoryTree::new()
        .with_entry(DirectoryRecord::new(BASE))
        .with_entry(DirectoryRecord::new("ou=people,dc=example,dc=com"))
        .with_entry(DirectoryRecord::new("ou=groups,dc=example,dc=com"))
        .with_entry(person("admin", "Admin"))
        .with_entry(person("jdoe", "John Doe"))
        .with_entry(person("asmith", "Alice Smith"))
        .with_entry(person("bjones", "Bob Jones"))
        .with_entry(group("devs", &[JDOE, ADMIN]))
        .with_entry(group("ops", &[ASMITH]));

    tree.set_password("cn=readonly,dc=example,dc=com", "ro-secret");
    tree.set_password(ADMIN, "admin-pw");
    tree.set_password(JDOE, "jdoe-pw");
    tree
}

pub async fn admin_session(tree: &MemoryTree) -> Session {
    let connector = MemoryConnector::new(tree.clone());
    match Session::open(&connector, config(), "admin", "admin-pw").await {
        Ok(session) => session,
        Err(e) => panic!("admin login failed: {}", e),
    }
}
