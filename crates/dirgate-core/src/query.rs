//! List query processing: sort and range window over search results
//!
//! The directory returns entries in no particular order, so every list
//! endpoint sorts and windows the normalized search result here.
//!
//! Sorting is stable. `Desc` uses the reversed comparator with the same stable
//! sort, so entries with equal keys keep their search-result order in both
//! directions (a `Desc` result is not the reversed `Asc` result when there are
//! ties).
//!
//! Windows are half-open `[start, end)`. `end` is clamped to the number of
//! entries; a negative `start` or a `start` past the clamped `end` gives an
//! empty page.

use serde::Deserialize;
use std::cmp::Ordering;

use crate::types::Entry;
use crate::{Error, Result};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ASC" => Some(Self::Asc),
            "DESC" => Some(Self::Desc),
            _ => None,
        }
    }
}

/// What entries are compared on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    /// Byte-wise comparison of the DN
    Dn,
    /// First value of an attribute, missing values compare as ""
    Attribute(String),
}

impl SortKey {
    /// Parse a front-end field name: `dn`, `id`, `attributes.<name>[0]` or
    /// `attributes.<name>`
    pub fn parse(field: &str) -> Option<Self> {
        match field {
            "dn" | "id" => Some(Self::Dn),
            _ => {
                let name = field.strip_prefix("attributes.")?;
                let name = name.strip_suffix("[0]").unwrap_or(name);
                if name.is_empty() {
                    None
                } else {
                    Some(Self::Attribute(name.to_string()))
                }
            }
        }
    }

    fn compare(&self, a: &Entry, b: &Entry) -> Ordering {
        match self {
            SortKey::Dn => a.dn.as_bytes().cmp(b.dn.as_bytes()),
            SortKey::Attribute(name) => {
                let a = a.first(name).unwrap_or("");
                let b = b.first(name).unwrap_or("");
                a.as_bytes().cmp(b.as_bytes())
            }
        }
    }
}

/// Sort key and direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub key: SortKey,
    pub order: SortOrder,
}

impl Sort {
    pub fn new(key: SortKey, order: SortOrder) -> Self {
        Self { key, order }
    }

    /// Parse the `sort` list parameter, e.g. `["dn","ASC"]`.
    ///
    /// Returns `Ok(None)` for a well-formed pair naming an unsupported field
    /// or direction.
    pub fn parse(param: &str) -> Result<Option<Self>> {
        let (field, order): (String, String) = serde_json::from_str(param)
            .map_err(|e| Error::InvalidRequest(format!("invalid sort {}: {}", param, e)))?;

        Ok(match (SortKey::parse(&field), SortOrder::parse(&order)) {
            (Some(key), Some(order)) => Some(Self { key, order }),
            _ => None,
        })
    }

    /// Comparator for this sort, `Desc` being the exact reverse of `Asc`
    pub fn compare(&self, a: &Entry, b: &Entry) -> Ordering {
        match self.order {
            SortOrder::Asc => self.key.compare(a, b),
            SortOrder::Desc => self.key.compare(b, a),
        }
    }
}

/// Requested half-open window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: i64,
    pub end: i64,
}

impl Range {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Parse the `range` list parameter, e.g. `[0,24]`
    pub fn parse(param: &str) -> Result<Self> {
        let (start, end): (i64, i64) = serde_json::from_str(param)
            .map_err(|e| Error::InvalidRequest(format!("invalid range {}: {}", param, e)))?;
        Ok(Self { start, end })
    }
}

/// The window actually served, surfaced as a pagination header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
    /// Entries matching the search, before windowing
    pub total: usize,
}

impl PageRange {
    /// `Content-Range` header value
    pub fn content_range(&self, unit: &str) -> String {
        format!("{} {}-{}/{}", unit, self.start, self.end, self.total)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// A sorted, windowed list result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub entries: Vec<Entry>,
    pub range: PageRange,
}

/// Resolve a requested window against a result of `total` entries
pub fn window(total: usize, range: Option<Range>) -> PageRange {
    let Some(range) = range else {
        return PageRange {
            start: 0,
            end: total,
            total,
        };
    };

    let end = usize::try_from(range.end.max(0)).unwrap_or(usize::MAX).min(total);

    if range.start < 0 {
        return PageRange {
            start: 0,
            end: 0,
            total,
        };
    }

    let start = usize::try_from(range.start).unwrap_or(usize::MAX);
    if start > end {
        let at = start.min(total);
        return PageRange {
            start: at,
            end: at,
            total,
        };
    }

    PageRange { start, end, total }
}

/// Stable in-place sort
pub fn sort_entries(entries: &mut [Entry], sort: &Sort) {
    entries.sort_by(|a, b| sort.compare(a, b));
}

/// Sort then window a search result
pub fn apply(mut entries: Vec<Entry>, sort: Option<&Sort>, range: Option<Range>) -> Page {
    if let Some(sort) = sort {
        sort_entries(&mut entries, sort);
    }

    let range = window(entries.len(), range);
    let entries = if range.is_empty() {
        Vec::new()
    } else {
        entries
            .into_iter()
            .skip(range.start)
            .take(range.end - range.start)
            .collect()
    };

    Page { entries, range }
}

/// Free-text filter sent by the front end as `{"q": "..."}`
#[derive(Debug, Clone, Default, Deserialize)]
struct TextFilter {
    #[serde(default)]
    q: String,
}

/// Parameters of a list request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Substring matched against `cn`
    pub q: Option<String>,
    /// Attributes to return; empty means all
    pub attributes: Vec<String>,
    pub sort: Option<Sort>,
    pub range: Option<Range>,
}

impl ListQuery {
    /// Build from decoded query-string pairs. `attr` may repeat; for `range`,
    /// `sort` and `filter` the first occurrence wins.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query = ListQuery::default();
        let mut seen_range = false;
        let mut seen_sort = false;
        let mut seen_filter = false;

        for (key, value) in pairs {
            let value = value.as_ref();
            match key.as_ref() {
                "attr" => query.attributes.push(value.to_string()),
                "range" if !seen_range => {
                    seen_range = true;
                    query.range = Some(Range::parse(value)?);
                }
                "sort" if !seen_sort => {
                    seen_sort = true;
                    query.sort = Sort::parse(value)?;
                }
                "filter" if !seen_filter => {
                    seen_filter = true;
                    let filter: TextFilter = serde_json::from_str(value).map_err(|e| {
                        Error::InvalidRequest(format!("invalid filter {}: {}", value, e))
                    })?;
                    if !filter.q.is_empty() {
                        query.q = Some(filter.q);
                    }
                }
                _ => {}
            }
        }

        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DirectoryRecord;

    fn entry(dn: &str, display_name: Option<&str>) -> Entry {
        let mut record = DirectoryRecord::new(dn);
        if let Some(name) = display_name {
            record = record.with_attribute("displayName", [name]);
        }
        Entry::from_record(record)
    }

    fn dns(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.dn.as_str()).collect()
    }

    fn ten() -> Vec<Entry> {
        (0..10).map(|i| entry(&format!("cn=u{}", i), None)).collect()
    }

    #[test]
    fn test_sort_by_dn_both_directions() {
        let entries = vec![
            entry("cn=b", None),
            entry("cn=c", None),
            entry("cn=a", None),
        ];

        let asc = apply(entries.clone(), Some(&Sort::new(SortKey::Dn, SortOrder::Asc)), None);
        assert_eq!(dns(&asc.entries), vec!["cn=a", "cn=b", "cn=c"]);

        let desc = apply(entries, Some(&Sort::new(SortKey::Dn, SortOrder::Desc)), None);
        assert_eq!(dns(&desc.entries), vec!["cn=c", "cn=b", "cn=a"]);
    }

    #[test]
    fn test_dn_sort_is_bytewise() {
        let entries = vec![entry("cn=b", None), entry("cn=B", None), entry("cn=a", None)];
        let page = apply(entries, Some(&Sort::new(SortKey::Dn, SortOrder::Asc)), None);
        assert_eq!(dns(&page.entries), vec!["cn=B", "cn=a", "cn=b"]);
    }

    #[test]
    fn test_ties_keep_search_order_in_both_directions() {
        let entries = vec![
            entry("cn=1", Some("Smith")),
            entry("cn=2", Some("Adams")),
            entry("cn=3", Some("Smith")),
            entry("cn=4", Some("Adams")),
        ];
        let key = SortKey::Attribute("displayName".into());

        let asc = apply(entries.clone(), Some(&Sort::new(key.clone(), SortOrder::Asc)), None);
        assert_eq!(dns(&asc.entries), vec!["cn=2", "cn=4", "cn=1", "cn=3"]);

        // Reverse comparator: ties are not flipped
        let desc = apply(entries, Some(&Sort::new(key, SortOrder::Desc)), None);
        assert_eq!(dns(&desc.entries), vec!["cn=1", "cn=3", "cn=2", "cn=4"]);
    }

    #[test]
    fn test_missing_display_attribute_sorts_as_empty() {
        let entries = vec![
            entry("cn=1", Some("Zed")),
            entry("cn=2", None),
            entry("cn=3", Some("Amy")),
        ];
        let sort = Sort::new(SortKey::Attribute("displayName".into()), SortOrder::Asc);
        let page = apply(entries, Some(&sort), None);
        assert_eq!(dns(&page.entries), vec!["cn=2", "cn=3", "cn=1"]);
    }

    #[test]
    fn test_repeated_queries_are_deterministic() {
        let entries = vec![
            entry("cn=1", Some("x")),
            entry("cn=2", Some("x")),
            entry("cn=3", Some("x")),
        ];
        let sort = Sort::new(SortKey::Attribute("displayName".into()), SortOrder::Desc);
        let first = apply(entries.clone(), Some(&sort), None);
        for _ in 0..5 {
            assert_eq!(apply(entries.clone(), Some(&sort), None), first);
        }
    }

    #[test]
    fn test_window_inside_bounds() {
        let page = apply(ten(), None, Some(Range::new(2, 5)));
        assert_eq!(dns(&page.entries), vec!["cn=u2", "cn=u3", "cn=u4"]);
        assert_eq!(page.range, PageRange { start: 2, end: 5, total: 10 });
    }

    #[test]
    fn test_window_end_is_clamped() {
        let page = apply(ten(), None, Some(Range::new(8, 15)));
        assert_eq!(dns(&page.entries), vec!["cn=u8", "cn=u9"]);
        assert_eq!(page.range, PageRange { start: 8, end: 10, total: 10 });
    }

    #[test]
    fn test_negative_start_is_empty() {
        let page = apply(ten(), None, Some(Range::new(-1, 3)));
        assert!(page.entries.is_empty());
        assert_eq!(page.range.total, 10);
        assert!(page.range.is_empty());
    }

    #[test]
    fn test_inverted_window_is_empty() {
        let page = apply(ten(), None, Some(Range::new(7, 5)));
        assert!(page.entries.is_empty());
        assert_eq!(page.range, PageRange { start: 7, end: 7, total: 10 });
    }

    #[test]
    fn test_window_past_the_end_is_empty() {
        let page = apply(ten(), None, Some(Range::new(12, 20)));
        assert!(page.entries.is_empty());
        assert_eq!(page.range, PageRange { start: 10, end: 10, total: 10 });
    }

    #[test]
    fn test_no_range_returns_everything() {
        let page = apply(ten(), None, None);
        assert_eq!(page.entries.len(), 10);
        assert_eq!(page.range.content_range("posts"), "posts 0-10/10");
    }

    #[test]
    fn test_empty_result() {
        let page = apply(Vec::new(), None, Some(Range::new(0, 9)));
        assert!(page.entries.is_empty());
        assert_eq!(page.range.content_range("posts"), "posts 0-0/0");
    }

    #[test]
    fn test_sort_then_window() {
        let mut entries = ten();
        entries.reverse();
        let sort = Sort::new(SortKey::Dn, SortOrder::Asc);
        let page = apply(entries, Some(&sort), Some(Range::new(0, 2)));
        assert_eq!(dns(&page.entries), vec!["cn=u0", "cn=u1"]);
    }

    #[test]
    fn test_sort_key_parsing() {
        assert_eq!(SortKey::parse("dn"), Some(SortKey::Dn));
        assert_eq!(
            SortKey::parse("attributes.displayName[0]"),
            Some(SortKey::Attribute("displayName".into()))
        );
        assert_eq!(
            SortKey::parse("attributes.cn"),
            Some(SortKey::Attribute("cn".into()))
        );
        assert_eq!(SortKey::parse("attributes."), None);
        assert_eq!(SortKey::parse("whatever"), None);
    }

    #[test]
    fn test_list_query_from_pairs() {
        let query = ListQuery::from_pairs([
            ("attr", "cn"),
            ("attr", "displayName"),
            ("range", "[0,24]"),
            ("sort", r#"["attributes.displayName[0]","DESC"]"#),
            ("filter", r#"{"q":"doe"}"#),
        ])
        .unwrap();

        assert_eq!(query.attributes, vec!["cn", "displayName"]);
        assert_eq!(query.range, Some(Range::new(0, 24)));
        assert_eq!(
            query.sort,
            Some(Sort::new(
                SortKey::Attribute("displayName".into()),
                SortOrder::Desc
            ))
        );
        assert_eq!(query.q.as_deref(), Some("doe"));
    }

    #[test]
    fn test_list_query_empty_filter_and_unknown_sort() {
        let query = ListQuery::from_pairs([
            ("filter", "{}"),
            ("sort", r#"["createdAt","ASC"]"#),
        ])
        .unwrap();
        assert_eq!(query.q, None);
        assert_eq!(query.sort, None);
    }

    #[test]
    fn test_list_query_rejects_malformed_range() {
        let err = ListQuery::from_pairs([("range", "0-9")]).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }
}
