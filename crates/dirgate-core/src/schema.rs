//! Attribute schemas for user and group writes
//!
//! A schema maps an attribute name to its necessity. Schemas are ordered maps,
//! so validation and request construction always walk attributes in
//! lexicographic order: the same request always reports the same missing
//! attribute and produces the same add/modify payload.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Entry, MEMBER_OF};
use crate::{Error, Result};

/// Whether an attribute must be present on create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Necessity {
    Required,
    #[default]
    Optional,
}

/// Attribute name → necessity
pub type AttributeSchema = BTreeMap<String, Necessity>;

/// Check a create request against a schema.
///
/// Fails on the first required attribute (in name order) that the entry does
/// not carry. Attributes unknown to the schema are ignored.
pub fn validate_create(schema: &AttributeSchema, entry: &Entry) -> Result<()> {
    for (name, necessity) in schema {
        if *necessity == Necessity::Required && !entry.has_attribute(name) {
            return Err(Error::missing_attribute(name));
        }
    }
    Ok(())
}

/// Attributes to send in an add request, in schema order
pub fn add_attributes(schema: &AttributeSchema, entry: &Entry) -> Vec<(String, Vec<String>)> {
    select(schema, entry)
}

/// Whole-value replacements for a modify request, in schema order.
///
/// Updates are not validated: any subset of the schema may be replaced.
pub fn replacements(schema: &AttributeSchema, entry: &Entry) -> Vec<(String, Vec<String>)> {
    select(schema, entry)
}

fn select(schema: &AttributeSchema, entry: &Entry) -> Vec<(String, Vec<String>)> {
    schema
        .keys()
        .filter(|name| name.as_str() != MEMBER_OF)
        .filter_map(|name| {
            entry
                .attributes
                .get(name)
                .map(|values| (name.clone(), values.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_schema() -> AttributeSchema {
        let mut schema = AttributeSchema::new();
        schema.insert("objectClass".into(), Necessity::Required);
        schema.insert("sn".into(), Necessity::Required);
        schema.insert("cn".into(), Necessity::Required);
        schema.insert("mail".into(), Necessity::Optional);
        schema.insert("memberOf".into(), Necessity::Optional);
        schema
    }

    fn entry(attrs: &[(&str, &[&str])]) -> Entry {
        let mut entry = Entry {
            dn: "cn=jdoe,ou=people,dc=example,dc=com".into(),
            ..Default::default()
        };
        for (name, values) in attrs {
            entry.attributes.insert(
                name.to_string(),
                values.iter().map(|v| v.to_string()).collect(),
            );
        }
        entry
    }

    #[test]
    fn test_missing_required_attribute_is_named() {
        let e = entry(&[("objectClass", &["inetOrgPerson"]), ("cn", &["jdoe"])]);
        let err = validate_create(&user_schema(), &e).unwrap_err();
        assert!(matches!(err, Error::Validation { ref attribute } if attribute == "sn"));
    }

    #[test]
    fn test_first_missing_attribute_in_name_order() {
        // cn and sn are both missing; cn sorts first
        let e = entry(&[("objectClass", &["inetOrgPerson"])]);
        for _ in 0..10 {
            let err = validate_create(&user_schema(), &e).unwrap_err();
            assert_eq!(err.to_string(), "missing attribute: cn");
        }
    }

    #[test]
    fn test_unknown_attributes_are_accepted() {
        let e = entry(&[
            ("objectClass", &["inetOrgPerson"]),
            ("cn", &["jdoe"]),
            ("sn", &["Doe"]),
            ("favouriteColour", &["green"]),
        ]);
        assert!(validate_create(&user_schema(), &e).is_ok());
    }

    #[test]
    fn test_optional_attributes_may_be_absent() {
        let e = entry(&[
            ("objectClass", &["inetOrgPerson"]),
            ("cn", &["jdoe"]),
            ("sn", &["Doe"]),
        ]);
        assert!(validate_create(&user_schema(), &e).is_ok());
    }

    #[test]
    fn test_add_attributes_follow_schema_order_and_skip_unknown() {
        let e = entry(&[
            ("sn", &["Doe"]),
            ("cn", &["jdoe"]),
            ("objectClass", &["top", "inetOrgPerson"]),
            ("favouriteColour", &["green"]),
            ("memberOf", &["cn=devs,dc=example,dc=com"]),
        ]);

        let attrs = add_attributes(&user_schema(), &e);
        let names: Vec<&str> = attrs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["cn", "objectClass", "sn"]);
        assert_eq!(attrs[1].1, vec!["top", "inetOrgPerson"]);
    }

    #[test]
    fn test_replacements_take_any_subset() {
        let e = entry(&[("mail", &["new@example.com"])]);
        let mods = replacements(&user_schema(), &e);
        assert_eq!(
            mods,
            vec![("mail".to_string(), vec!["new@example.com".to_string()])]
        );
    }

    #[test]
    fn test_necessity_deserializes_lowercase() {
        let schema: AttributeSchema =
            serde_yaml::from_str("cn: required\ndescription: optional\n").unwrap();
        assert_eq!(schema["cn"], Necessity::Required);
        assert_eq!(schema["description"], Necessity::Optional);
    }
}
