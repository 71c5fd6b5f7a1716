//! LDAP search filters
//!
//! Every filter the service sends is built here, so user input (usernames,
//! free-text queries, DNs) is always escaped per RFC 4515. The parser and
//! evaluator cover the same subset and back the in-memory directory.

use dirgate_core::types::DirectoryRecord;
use dirgate_core::{Error, Result};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Equals {
        attribute: String,
        value: String,
    },
    /// `(attr=initial*any*...*last)`
    Substring {
        attribute: String,
        initial: Option<String>,
        any: Vec<String>,
        last: Option<String>,
    },
    Present {
        attribute: String,
    },
}

impl Filter {
    pub fn equals(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Equals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// `(attr=*value*)`
    pub fn contains(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Substring {
            attribute: attribute.into(),
            initial: None,
            any: vec![value.into()],
            last: None,
        }
    }

    pub fn present(attribute: impl Into<String>) -> Self {
        Filter::Present {
            attribute: attribute.into(),
        }
    }

    /// Entries of an object class, optionally narrowed by more filters
    pub fn object_class(class: &str, rest: impl IntoIterator<Item = Filter>) -> Self {
        let mut parts = vec![Filter::equals("objectClass", class)];
        parts.extend(rest);
        Filter::And(parts)
    }

    pub fn parse(input: &str) -> Result<Self> {
        let mut parser = Parser {
            input: input.trim().as_bytes(),
            pos: 0,
        };
        let filter = parser.filter()?;
        if parser.pos != parser.input.len() {
            return Err(parser.error("trailing input"));
        }
        Ok(filter)
    }

    /// Evaluate against a record. Attribute names and values compare
    /// ASCII case-insensitively.
    pub fn matches(&self, record: &DirectoryRecord) -> bool {
        match self {
            Filter::And(filters) => filters.iter().all(|f| f.matches(record)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(record)),
            Filter::Not(filter) => !filter.matches(record),
            Filter::Equals { attribute, value } => values(record, attribute)
                .iter()
                .any(|v| v.eq_ignore_ascii_case(value)),
            Filter::Substring {
                attribute,
                initial,
                any,
                last,
            } => values(record, attribute)
                .iter()
                .any(|v| substring_match(v, initial.as_deref(), any, last.as_deref())),
            Filter::Present { attribute } => {
                attribute.eq_ignore_ascii_case("objectClass")
                    || !values(record, attribute).is_empty()
            }
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::And(filters) => {
                write!(f, "(&")?;
                for filter in filters {
                    write!(f, "{}", filter)?;
                }
                write!(f, ")")
            }
            Filter::Or(filters) => {
                write!(f, "(|")?;
                for filter in filters {
                    write!(f, "{}", filter)?;
                }
                write!(f, ")")
            }
            Filter::Not(filter) => write!(f, "(!{})", filter),
            Filter::Equals { attribute, value } => {
                write!(f, "({}={})", attribute, escape_value(value))
            }
            Filter::Substring {
                attribute,
                initial,
                any,
                last,
            } => {
                write!(f, "({}=", attribute)?;
                if let Some(initial) = initial {
                    write!(f, "{}", escape_value(initial))?;
                }
                write!(f, "*")?;
                for part in any {
                    write!(f, "{}*", escape_value(part))?;
                }
                if let Some(last) = last {
                    write!(f, "{}", escape_value(last))?;
                }
                write!(f, ")")
            }
            Filter::Present { attribute } => write!(f, "({}=*)", attribute),
        }
    }
}

/// Escape special characters in a filter value (RFC 4515)
pub fn escape_value(value: &str) -> String {
    value
        .replace('\\', "\\5c")
        .replace('*', "\\2a")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}

fn values<'a>(record: &'a DirectoryRecord, attribute: &str) -> &'a [String] {
    if attribute.eq_ignore_ascii_case("dn") {
        return std::slice::from_ref(&record.dn);
    }
    record.values(attribute).unwrap_or(&[])
}

fn substring_match(value: &str, initial: Option<&str>, any: &[String], last: Option<&str>) -> bool {
    let value = value.to_ascii_lowercase();
    let mut rest = value.as_str();

    if let Some(initial) = initial {
        let initial = initial.to_ascii_lowercase();
        match rest.strip_prefix(initial.as_str()) {
            Some(r) => rest = r,
            None => return false,
        }
    }

    for part in any {
        let part = part.to_ascii_lowercase();
        match rest.find(part.as_str()) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }

    match last {
        Some(last) => rest.ends_with(last.to_ascii_lowercase().as_str()),
        None => true,
    }
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, msg: &str) -> Error {
        Error::InvalidRequest(format!(
            "bad filter at {}: {} in {}",
            self.pos,
            msg,
            String::from_utf8_lossy(self.input)
        ))
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    fn filter(&mut self) -> Result<Filter> {
        self.expect(b'(')?;
        let filter = match self.peek() {
            Some(b'&') => {
                self.pos += 1;
                Filter::And(self.list()?)
            }
            Some(b'|') => {
                self.pos += 1;
                Filter::Or(self.list()?)
            }
            Some(b'!') => {
                self.pos += 1;
                Filter::Not(Box::new(self.filter()?))
            }
            Some(_) => self.item()?,
            None => return Err(self.error("unexpected end")),
        };
        self.expect(b')')?;
        Ok(filter)
    }

    fn list(&mut self) -> Result<Vec<Filter>> {
        let mut filters = Vec::new();
        while self.peek() == Some(b'(') {
            filters.push(self.filter()?);
        }
        Ok(filters)
    }

    fn item(&mut self) -> Result<Filter> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == b'=' || c == b')' || c == b'(' {
                break;
            }
            self.pos += 1;
        }
        let attribute = String::from_utf8_lossy(&self.input[start..self.pos]).to_string();
        if attribute.is_empty() {
            return Err(self.error("missing attribute"));
        }
        self.expect(b'=')?;

        // Split the raw value on unescaped '*', unescaping each part
        let mut parts: Vec<String> = Vec::new();
        let mut current: Vec<u8> = Vec::new();
        while let Some(c) = self.peek() {
            match c {
                b')' => break,
                b'(' => return Err(self.error("unescaped '('")),
                b'*' => {
                    parts.push(String::from_utf8_lossy(&current).to_string());
                    current.clear();
                    self.pos += 1;
                }
                b'\\' => {
                    let hex = self
                        .input
                        .get(self.pos + 1..self.pos + 3)
                        .ok_or_else(|| self.error("truncated escape"))?;
                    let hex = std::str::from_utf8(hex).map_err(|_| self.error("bad escape"))?;
                    let byte = u8::from_str_radix(hex, 16).map_err(|_| self.error("bad escape"))?;
                    current.push(byte);
                    self.pos += 3;
                }
                _ => {
                    current.push(c);
                    self.pos += 1;
                }
            }
        }
        parts.push(String::from_utf8_lossy(&current).to_string());

        if parts.len() == 1 {
            let value = parts.remove(0);
            return Ok(Filter::Equals { attribute, value });
        }
        if parts.len() == 2 && parts.iter().all(|p| p.is_empty()) {
            return Ok(Filter::Present { attribute });
        }

        let last = parts.pop().filter(|p| !p.is_empty());
        let initial = Some(parts.remove(0)).filter(|p| !p.is_empty());
        let any = parts.into_iter().filter(|p| !p.is_empty()).collect();

        Ok(Filter::Substring {
            attribute,
            initial,
            any,
            last,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> DirectoryRecord {
        DirectoryRecord::new("cn=jdoe,ou=people,dc=example,dc=com")
            .with_attribute("objectClass", ["top", "inetOrgPerson"])
            .with_attribute("cn", ["jdoe"])
            .with_attribute("mail", ["John.Doe@example.com"])
    }

    #[test]
    fn test_render_escapes_user_input() {
        let filter = Filter::object_class("inetOrgPerson", [Filter::equals("cn", "a*)(uid=*")]);
        assert_eq!(
            filter.to_string(),
            "(&(objectClass=inetOrgPerson)(cn=a\\2a\\29\\28uid=\\2a))"
        );
    }

    #[test]
    fn test_render_contains() {
        assert_eq!(Filter::contains("cn", "do").to_string(), "(cn=*do*)");
        assert_eq!(Filter::present("member").to_string(), "(member=*)");
    }

    #[test]
    fn test_escape_backslash_first() {
        assert_eq!(escape_value("a\\b"), "a\\5cb");
        assert_eq!(escape_value("nul\0"), "nul\\00");
    }

    #[test]
    fn test_parse_round_trips_rendered_filters() {
        let filters = vec![
            Filter::object_class("groupOfNames", [Filter::equals("member", "cn=a,dc=x")]),
            Filter::Or(vec![Filter::present("mail"), Filter::contains("cn", "(x)")]),
            Filter::Not(Box::new(Filter::equals("cn", "*"))),
        ];
        for filter in filters {
            assert_eq!(Filter::parse(&filter.to_string()).unwrap(), filter);
        }
    }

    #[test]
    fn test_parse_substring_parts() {
        let filter = Filter::parse("(cn=j*o*e)").unwrap();
        assert_eq!(
            filter,
            Filter::Substring {
                attribute: "cn".into(),
                initial: Some("j".into()),
                any: vec!["o".into()],
                last: Some("e".into()),
            }
        );
        assert!(filter.matches(&user()));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Filter::parse("cn=x").is_err());
        assert!(Filter::parse("(cn=x").is_err());
        assert!(Filter::parse("(cn=x))").is_err());
        assert!(Filter::parse("(=x)").is_err());
    }

    #[test]
    fn test_matches() {
        let record = user();
        assert!(Filter::parse("(objectClass=*)").unwrap().matches(&record));
        assert!(Filter::parse("(&(objectClass=inetorgperson)(cn=*DO*))")
            .unwrap()
            .matches(&record));
        assert!(Filter::parse("(mail=john.doe@example.com)").unwrap().matches(&record));
        assert!(!Filter::parse("(cn=*smith*)").unwrap().matches(&record));
        assert!(!Filter::parse("(!(cn=jdoe))").unwrap().matches(&record));
        assert!(Filter::parse("(|(cn=x)(cn=jdoe))").unwrap().matches(&record));
        assert!(!Filter::parse("(description=*)").unwrap().matches(&record));
    }

    #[test]
    fn test_escaped_value_matches_literally() {
        let record = DirectoryRecord::new("cn=x").with_attribute("cn", ["a*b"]);
        let filter = Filter::equals("cn", "a*b");
        assert!(Filter::parse(&filter.to_string()).unwrap().matches(&record));
        assert!(!Filter::equals("cn", "a*b").matches(&DirectoryRecord::new("cn=y").with_attribute("cn", ["axxb"])));
    }
}
