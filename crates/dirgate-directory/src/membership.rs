//! Group membership reconciliation
//!
//! Membership lives only in the member attribute of group entries. Moving a
//! user to a desired group set reads the groups that currently list the user,
//! then touches exactly the groups that differ: joins first, then leaves, each
//! in DN order. Every touched group is one fetch-then-write unit.
//!
//! A failure stops the run. Groups already written stay written; calling again
//! with the same desired set finishes the remaining work.

use dirgate_core::config::WriteMode;
use dirgate_core::types::SearchRequest;
use dirgate_core::utils::{dn_eq, normalize_dn};
use dirgate_core::{DirgateConfig, Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::client::Directory;
use crate::filter::Filter;
use crate::metrics::{record_membership_conflict, record_membership_write};

/// Outcome of one reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Groups the user was joined to
    pub added: Vec<String>,
    /// Groups the user was removed from
    pub removed: Vec<String>,
    /// Compare-and-swap writes rejected because the group changed underneath
    pub conflicts: u32,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Join,
    Leave,
}

impl Change {
    fn as_str(&self) -> &'static str {
        match self {
            Change::Join => "add",
            Change::Leave => "remove",
        }
    }
}

pub struct MembershipReconciler<'a> {
    base_dn: &'a str,
    groups_class: &'a str,
    member_attribute: &'a str,
    write_mode: WriteMode,
    max_attempts: u32,
}

impl<'a> MembershipReconciler<'a> {
    pub fn new(config: &'a DirgateConfig) -> Self {
        Self {
            base_dn: &config.ldap.base_dn,
            groups_class: &config.ldap.groups_object_class_search,
            member_attribute: &config.membership.member_attribute,
            write_mode: config.membership.write_mode,
            max_attempts: config.membership.max_attempts.max(1),
        }
    }

    /// DNs of the groups whose member list contains `user_dn`, in search order
    pub async fn current_groups(
        &self,
        directory: &mut dyn Directory,
        user_dn: &str,
    ) -> Result<Vec<String>> {
        let filter = Filter::object_class(
            self.groups_class,
            [Filter::equals(self.member_attribute, user_dn)],
        );
        let request = SearchRequest::subtree(self.base_dn, filter.to_string()).with_attributes(["1.1"]);

        let records = directory.search(&request).await?;
        Ok(records.into_iter().map(|r| r.dn).collect())
    }

    /// Make `desired` the exact set of groups listing `user_dn`
    pub async fn reconcile(
        &self,
        directory: &mut dyn Directory,
        user_dn: &str,
        desired: &[String],
    ) -> Result<ReconcileReport> {
        let old: BTreeMap<String, String> = self
            .current_groups(directory, user_dn)
            .await?
            .into_iter()
            .map(|dn| (normalize_dn(&dn), dn))
            .collect();
        let desired: BTreeMap<String, String> = desired
            .iter()
            .filter(|dn| !dn.trim().is_empty())
            .map(|dn| (normalize_dn(dn), dn.trim().to_string()))
            .collect();

        let to_join: Vec<&String> = desired
            .iter()
            .filter(|(key, _)| !old.contains_key(*key))
            .map(|(_, dn)| dn)
            .collect();
        let to_leave: Vec<&String> = old
            .iter()
            .filter(|(key, _)| !desired.contains_key(*key))
            .map(|(_, dn)| dn)
            .collect();

        debug!(
            user = %user_dn,
            join = to_join.len(),
            leave = to_leave.len(),
            unchanged = desired.len() - to_join.len(),
            "Reconciling group membership"
        );

        let mut report = ReconcileReport::default();

        for group in to_join {
            if self
                .apply(directory, group, user_dn, Change::Join, &mut report)
                .await?
            {
                report.added.push(group.clone());
            }
        }

        for group in to_leave {
            if self
                .apply(directory, group, user_dn, Change::Leave, &mut report)
                .await?
            {
                report.removed.push(group.clone());
            }
        }

        if !report.is_noop() {
            info!(
                user = %user_dn,
                added = report.added.len(),
                removed = report.removed.len(),
                conflicts = report.conflicts,
                mode = self.write_mode.as_str(),
                "Group membership updated"
            );
        }

        Ok(report)
    }

    async fn fetch_members(&self, directory: &mut dyn Directory, group: &str) -> Result<Vec<String>> {
        let request = SearchRequest::entry(group).with_attributes([self.member_attribute]);
        let record = directory
            .search(&request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(group.to_string()))?;

        Ok(record
            .values(self.member_attribute)
            .map(|v| v.to_vec())
            .unwrap_or_default())
    }

    /// One fetch-then-write unit. `Ok(true)` only when a write landed; a
    /// group that already has the wanted state is left alone.
    async fn apply(
        &self,
        directory: &mut dyn Directory,
        group: &str,
        user_dn: &str,
        change: Change,
        report: &mut ReconcileReport,
    ) -> Result<bool> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let current = self.fetch_members(directory, group).await?;
            let next: Vec<String> = match change {
                Change::Join => {
                    if current.iter().any(|m| dn_eq(m, user_dn)) {
                        debug!(group = %group, user = %user_dn, "Already a member");
                        return Ok(false);
                    }
                    let mut next = current.clone();
                    next.push(user_dn.to_string());
                    next
                }
                Change::Leave => {
                    let next: Vec<String> = current
                        .iter()
                        .filter(|m| !dn_eq(m, user_dn))
                        .cloned()
                        .collect();
                    if next.len() == current.len() {
                        warn!(
                            group = %group,
                            user = %user_dn,
                            "Group matched the member search but no member value equals the user DN"
                        );
                        return Ok(false);
                    }
                    next
                }
            };

            match self.write_mode {
                WriteMode::Replace => {
                    directory
                        .modify(group, vec![(self.member_attribute.to_string(), next)])
                        .await?;
                    record_membership_write(change.as_str());
                    return Ok(true);
                }
                WriteMode::CompareAndSwap => {
                    if directory
                        .compare_and_replace(group, self.member_attribute, &current, &next)
                        .await?
                    {
                        record_membership_write(change.as_str());
                        return Ok(true);
                    }

                    report.conflicts += 1;
                    record_membership_conflict();
                    warn!(group = %group, user = %user_dn, attempt, "Member list changed concurrently");

                    if attempt >= self.max_attempts {
                        return Err(Error::Conflict(format!(
                            "{} changed during {} attempts",
                            group, attempt
                        )));
                    }
                }
            }
        }
    }
}
