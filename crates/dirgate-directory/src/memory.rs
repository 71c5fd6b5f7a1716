//! In-process directory
//!
//! A `MemoryTree` holds entries in insertion order (searches return them in
//! that order) and can be shared between sessions, inspected, and told to fail
//! or to run a hook after an entry is read. Sessions opened through the
//! `MemoryConnector` behave like LDAP connections for the subset of the
//! protocol the service uses.

use async_trait::async_trait;
use dirgate_core::types::{DirectoryRecord, Scope, SearchRequest};
use dirgate_core::utils::normalize_dn;
use dirgate_core::{Error, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::client::{AttributeValues, Directory, DirectoryConnector};
use crate::filter::Filter;

type ReadHook = Box<dyn FnOnce(&MemoryTree) + Send>;

/// A write the tree accepted (or, for compare-and-replace, evaluated)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Add(String),
    Modify(String),
    CompareAndReplace { dn: String, applied: bool },
    Delete(String),
    PasswordModify(String),
}

impl WriteOp {
    pub fn dn(&self) -> &str {
        match self {
            WriteOp::Add(dn)
            | WriteOp::Modify(dn)
            | WriteOp::Delete(dn)
            | WriteOp::PasswordModify(dn) => dn,
            WriteOp::CompareAndReplace { dn, .. } => dn,
        }
    }

    /// False only for a compare-and-replace whose precondition failed
    pub fn applied(&self) -> bool {
        !matches!(self, WriteOp::CompareAndReplace { applied: false, .. })
    }
}

#[derive(Default)]
struct TreeState {
    entries: Vec<DirectoryRecord>,
    passwords: HashMap<String, String>,
    failing_writes: HashSet<String>,
    unreachable: bool,
    hooks: Vec<(String, ReadHook)>,
    reads: Vec<String>,
    writes: Vec<WriteOp>,
}

impl TreeState {
    fn position(&self, dn: &str) -> Option<usize> {
        let key = normalize_dn(dn);
        self.entries.iter().position(|e| normalize_dn(&e.dn) == key)
    }

    fn check_writable(&self, dn: &str) -> Result<()> {
        if self.unreachable {
            return Err(Error::Connection("directory unreachable".into()));
        }
        if self.failing_writes.contains(&normalize_dn(dn)) {
            return Err(Error::Write(format!("modify {} failed with code 80: injected", dn)));
        }
        Ok(())
    }
}

/// Shared in-memory directory tree
#[derive(Clone, Default)]
pub struct MemoryTree {
    state: Arc<Mutex<TreeState>>,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(self, record: DirectoryRecord) -> Self {
        self.insert(record);
        self
    }

    pub fn insert(&self, record: DirectoryRecord) {
        let mut state = self.state.lock();
        match state.position(&record.dn) {
            Some(idx) => state.entries[idx] = record,
            None => state.entries.push(record),
        }
    }

    pub fn set_password(&self, dn: &str, password: &str) {
        self.state
            .lock()
            .passwords
            .insert(normalize_dn(dn), password.to_string());
    }

    pub fn password(&self, dn: &str) -> Option<String> {
        self.state.lock().passwords.get(&normalize_dn(dn)).cloned()
    }

    pub fn get(&self, dn: &str) -> Option<DirectoryRecord> {
        let state = self.state.lock();
        state.position(dn).map(|idx| state.entries[idx].clone())
    }

    pub fn contains(&self, dn: &str) -> bool {
        self.state.lock().position(dn).is_some()
    }

    /// Values of an attribute, empty when the entry or attribute is missing
    pub fn values(&self, dn: &str, attribute: &str) -> Vec<String> {
        self.get(dn)
            .and_then(|record| record.values(attribute).map(|v| v.to_vec()))
            .unwrap_or_default()
    }

    /// Append a value directly, bypassing sessions (a concurrent writer)
    pub fn add_value(&self, dn: &str, attribute: &str, value: &str) {
        let mut state = self.state.lock();
        let Some(idx) = state.position(dn) else {
            return;
        };
        let record = &mut state.entries[idx];
        match record
            .attributes
            .iter_mut()
            .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
        {
            Some((_, values)) => values.push(value.to_string()),
            None => record
                .attributes
                .push((attribute.to_string(), vec![value.to_string()])),
        }
    }

    /// Drop a value directly, bypassing sessions (a concurrent writer)
    pub fn remove_value(&self, dn: &str, attribute: &str, value: &str) {
        let mut state = self.state.lock();
        let Some(idx) = state.position(dn) else {
            return;
        };
        let record = &mut state.entries[idx];
        for (name, values) in record.attributes.iter_mut() {
            if name.eq_ignore_ascii_case(attribute) {
                values.retain(|v| !v.eq_ignore_ascii_case(value));
            }
        }
        record.attributes.retain(|(_, values)| !values.is_empty());
    }

    /// Make every write to `dn` fail
    pub fn fail_writes_to(&self, dn: &str) {
        self.state.lock().failing_writes.insert(normalize_dn(dn));
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.failing_writes.clear();
        state.unreachable = false;
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    /// Run `hook` once, right after the next base-scope read of `dn`
    pub fn after_read<F>(&self, dn: &str, hook: F)
    where
        F: FnOnce(&MemoryTree) + Send + 'static,
    {
        self.state
            .lock()
            .hooks
            .push((normalize_dn(dn), Box::new(hook)));
    }

    /// DNs read with base scope, in order
    pub fn reads(&self) -> Vec<String> {
        self.state.lock().reads.clone()
    }

    pub fn writes(&self) -> Vec<WriteOp> {
        self.state.lock().writes.clone()
    }

    pub fn clear_logs(&self) {
        let mut state = self.state.lock();
        state.reads.clear();
        state.writes.clear();
    }

    fn take_hooks(&self, dn: &str) -> Vec<ReadHook> {
        let key = normalize_dn(dn);
        let mut state = self.state.lock();
        let (matching, rest): (Vec<_>, Vec<_>) =
            state.hooks.drain(..).partition(|(hook_dn, _)| *hook_dn == key);
        state.hooks = rest;
        matching.into_iter().map(|(_, hook)| hook).collect()
    }
}

fn in_scope(dn: &str, base: &str, scope: Scope) -> bool {
    let dn = normalize_dn(dn);
    let base = normalize_dn(base);

    match scope {
        Scope::Base => dn == base,
        Scope::OneLevel => {
            if base.is_empty() {
                return !dn.contains(',');
            }
            dn.strip_suffix(&base)
                .and_then(|prefix| prefix.strip_suffix(','))
                .map(|rdn| !rdn.is_empty() && !rdn.contains(','))
                .unwrap_or(false)
        }
        Scope::Subtree => {
            base.is_empty() || dn == base || dn.ends_with(&format!(",{}", base))
        }
    }
}

fn project(record: &DirectoryRecord, attributes: &[String]) -> DirectoryRecord {
    if attributes.is_empty() || attributes.iter().any(|a| a == "*") {
        return record.clone();
    }
    DirectoryRecord {
        dn: record.dn.clone(),
        attributes: record
            .attributes
            .iter()
            .filter(|(name, _)| attributes.iter().any(|a| a.eq_ignore_ascii_case(name)))
            .cloned()
            .collect(),
    }
}

/// One session on a `MemoryTree`
pub struct MemoryDirectory {
    tree: MemoryTree,
    bound: Option<String>,
}

impl MemoryDirectory {
    pub fn new(tree: MemoryTree) -> Self {
        Self { tree, bound: None }
    }

    /// DN of the last successful bind
    pub fn bound_dn(&self) -> Option<&str> {
        self.bound.as_deref()
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn bind(&mut self, dn: &str, password: &str) -> Result<()> {
        let state = self.tree.state.lock();
        if state.unreachable {
            return Err(Error::Connection("directory unreachable".into()));
        }
        // Unauthenticated simple bind, accepted like LDAP does
        if password.is_empty() {
            self.bound = None;
            return Ok(());
        }
        match state.passwords.get(&normalize_dn(dn)) {
            Some(stored) if stored == password => {
                self.bound = Some(dn.to_string());
                Ok(())
            }
            _ => Err(Error::Authentication("invalid credentials".into())),
        }
    }

    async fn search(&mut self, request: &SearchRequest) -> Result<Vec<DirectoryRecord>> {
        let filter = Filter::parse(&request.filter).map_err(|e| Error::Search(e.to_string()))?;

        let records = {
            let mut state = self.tree.state.lock();
            if state.unreachable {
                return Err(Error::Connection("directory unreachable".into()));
            }
            if request.scope == Scope::Base {
                state.reads.push(request.base.clone());
            }
            state
                .entries
                .iter()
                .filter(|e| in_scope(&e.dn, &request.base, request.scope))
                .filter(|e| filter.matches(e))
                .map(|e| project(e, &request.attributes))
                .collect::<Vec<_>>()
        };

        debug!(base = %request.base, filter = %request.filter, count = records.len(), "Memory search");

        if request.scope == Scope::Base {
            for hook in self.tree.take_hooks(&request.base) {
                hook(&self.tree);
            }
        }

        Ok(records)
    }

    async fn add(&mut self, dn: &str, attributes: Vec<AttributeValues>) -> Result<()> {
        let mut state = self.tree.state.lock();
        state.check_writable(dn)?;
        if state.position(dn).is_some() {
            return Err(Error::Write(format!("add {}: entry already exists", dn)));
        }

        let password = attributes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("userPassword"))
            .and_then(|(_, values)| values.first().cloned());
        if let Some(password) = password {
            state.passwords.insert(normalize_dn(dn), password);
        }

        state.entries.push(DirectoryRecord {
            dn: dn.to_string(),
            attributes,
        });
        state.writes.push(WriteOp::Add(dn.to_string()));
        Ok(())
    }

    async fn modify(&mut self, dn: &str, replacements: Vec<AttributeValues>) -> Result<()> {
        let mut state = self.tree.state.lock();
        state.check_writable(dn)?;
        let idx = state
            .position(dn)
            .ok_or_else(|| Error::NotFound(dn.to_string()))?;

        let record = &mut state.entries[idx];
        for (name, values) in replacements {
            record
                .attributes
                .retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
            if !values.is_empty() {
                record.attributes.push((name, values));
            }
        }
        state.writes.push(WriteOp::Modify(dn.to_string()));
        Ok(())
    }

    async fn delete(&mut self, dn: &str) -> Result<()> {
        let mut state = self.tree.state.lock();
        state.check_writable(dn)?;
        let idx = state
            .position(dn)
            .ok_or_else(|| Error::NotFound(dn.to_string()))?;

        state.entries.remove(idx);
        state.passwords.remove(&normalize_dn(dn));
        state.writes.push(WriteOp::Delete(dn.to_string()));
        Ok(())
    }

    async fn password_modify(&mut self, dn: &str, new_password: &str) -> Result<()> {
        let mut state = self.tree.state.lock();
        state.check_writable(dn)?;
        if state.position(dn).is_none() {
            return Err(Error::NotFound(dn.to_string()));
        }

        state
            .passwords
            .insert(normalize_dn(dn), new_password.to_string());
        state.writes.push(WriteOp::PasswordModify(dn.to_string()));
        Ok(())
    }

    async fn compare_and_replace(
        &mut self,
        dn: &str,
        attribute: &str,
        expected: &[String],
        values: &[String],
    ) -> Result<bool> {
        let mut state = self.tree.state.lock();
        state.check_writable(dn)?;
        let idx = state
            .position(dn)
            .ok_or_else(|| Error::NotFound(dn.to_string()))?;

        let record = &mut state.entries[idx];
        let current = record.values(attribute).unwrap_or(&[]);
        let contains =
            |list: &[String], value: &String| list.iter().any(|v| v.eq_ignore_ascii_case(value));

        let remaining: Vec<String> = current
            .iter()
            .filter(|v| !contains(expected, v))
            .cloned()
            .collect();
        let applied = expected.iter().all(|v| contains(current, v))
            && values.iter().all(|v| !contains(&remaining, v));

        if applied {
            let mut next = remaining;
            next.extend(values.iter().cloned());
            record
                .attributes
                .retain(|(existing, _)| !existing.eq_ignore_ascii_case(attribute));
            if !next.is_empty() {
                record.attributes.push((attribute.to_string(), next));
            }
        }

        state.writes.push(WriteOp::CompareAndReplace {
            dn: dn.to_string(),
            applied,
        });
        Ok(applied)
    }

    async fn close(&mut self) -> Result<()> {
        self.bound = None;
        Ok(())
    }
}

/// Opens sessions on a shared `MemoryTree`
#[derive(Clone, Default)]
pub struct MemoryConnector {
    tree: MemoryTree,
}

impl MemoryConnector {
    pub fn new(tree: MemoryTree) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &MemoryTree {
        &self.tree
    }
}

#[async_trait]
impl DirectoryConnector for MemoryConnector {
    async fn connect(&self) -> Result<Box<dyn Directory>> {
        if self.tree.state.lock().unreachable {
            return Err(Error::Connection("directory unreachable".into()));
        }
        Ok(Box::new(MemoryDirectory::new(self.tree.clone())))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
