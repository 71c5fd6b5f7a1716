//! Utility functions

/// Compare two DNs the way the reconciler does: ASCII case-insensitive,
/// ignoring surrounding whitespace
pub fn dn_eq(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Key used to order and deduplicate DNs
pub fn normalize_dn(dn: &str) -> String {
    dn.trim().to_ascii_lowercase()
}

/// Build `<attr>=<value>,<base>`
pub fn child_dn(attr: &str, value: &str, base: &str) -> String {
    if base.is_empty() {
        format!("{}={}", attr, escape_dn_value(value))
    } else {
        format!("{}={},{}", attr, escape_dn_value(value), base)
    }
}

/// Escape an RDN value (RFC 4514)
pub fn escape_dn_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);

    for (i, c) in value.chars().enumerate() {
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                out.push('\\');
                out.push(c);
            }
            '#' if i == 0 => out.push_str("\\#"),
            ' ' if i == 0 || i == last => out.push_str("\\ "),
            '\0' => out.push_str("\\00"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dn_eq_ignores_case() {
        assert!(dn_eq("cn=Admins,dc=Example,dc=com", "CN=admins,DC=example,DC=COM"));
        assert!(dn_eq(" cn=a,dc=x ", "cn=a,dc=x"));
        assert!(!dn_eq("cn=a,dc=x", "cn=b,dc=x"));
    }

    #[test]
    fn test_normalize_dn() {
        assert_eq!(normalize_dn(" CN=Admins,DC=com"), "cn=admins,dc=com");
    }

    #[test]
    fn test_child_dn() {
        assert_eq!(
            child_dn("cn", "jdoe", "dc=example,dc=com"),
            "cn=jdoe,dc=example,dc=com"
        );
        assert_eq!(child_dn("cn", "Doe, John", ""), "cn=Doe\\, John");
    }

    #[test]
    fn test_escape_dn_value() {
        assert_eq!(escape_dn_value("#admin"), "\\#admin");
        assert_eq!(escape_dn_value(" x "), "\\ x\\ ");
        assert_eq!(escape_dn_value("a+b=c"), "a\\+b\\=c");
        assert_eq!(escape_dn_value("plain"), "plain");
    }
}
