//! LDAP backend
//!
//! Handles connections, binds, searches and writes against a real directory
//! server. Supports LDAP, LDAPS and STARTTLS connections.

use async_trait::async_trait;
use dirgate_core::config::LdapConfig;
use dirgate_core::types::{DirectoryRecord, Scope, SearchRequest};
use dirgate_core::{Error, Result};
use ldap3::exop::PasswordModify;
use ldap3::result::ExopResult;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, LdapResult, Mod, SearchEntry};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::client::{AttributeValues, Directory, DirectoryConnector};
use crate::metrics::record_directory_op;

// LDAP result codes
const RC_SUCCESS: u32 = 0;
const RC_NO_SUCH_ATTRIBUTE: u32 = 16;
const RC_ATTRIBUTE_OR_VALUE_EXISTS: u32 = 20;
const RC_NO_SUCH_OBJECT: u32 = 32;
const RC_INVALID_CREDENTIALS: u32 = 49;
const RC_ALREADY_EXISTS: u32 = 68;

/// Dials the configured directory server
pub struct LdapConnector {
    url: String,
    start_tls: bool,
    skip_tls_verify: bool,
    timeout: Duration,
}

impl LdapConnector {
    pub fn new(config: &LdapConfig) -> Self {
        Self {
            url: config.url.clone(),
            start_tls: config.start_tls,
            skip_tls_verify: config.skip_tls_verify,
            timeout: Duration::from_secs(config.connect_timeout_seconds),
        }
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    async fn connect(&self) -> Result<Box<dyn Directory>> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.timeout)
            .set_starttls(self.start_tls)
            .set_no_tls_verify(self.skip_tls_verify);

        debug!(url = %self.url, "Connecting to LDAP server");

        let started = Instant::now();
        let result = LdapConnAsync::with_settings(settings, &self.url).await;
        record_directory_op("connect", started, result.is_ok());

        let (conn, ldap) = result.map_err(|e| {
            Error::Connection(format!("Failed to connect to {}: {}", self.url, e))
        })?;

        ldap3::drive!(conn);

        Ok(Box::new(LdapDirectory { ldap }))
    }

    fn name(&self) -> &str {
        "ldap"
    }
}

/// One connection to the directory server
pub struct LdapDirectory {
    ldap: Ldap,
}

impl LdapDirectory {
    fn to_scope(scope: Scope) -> ldap3::Scope {
        match scope {
            Scope::Base => ldap3::Scope::Base,
            Scope::OneLevel => ldap3::Scope::OneLevel,
            Scope::Subtree => ldap3::Scope::Subtree,
        }
    }

    fn to_record(entry: SearchEntry) -> DirectoryRecord {
        if !entry.bin_attrs.is_empty() {
            let mut dropped: Vec<&str> = entry.bin_attrs.keys().map(String::as_str).collect();
            dropped.sort_unstable();
            debug!(dn = %entry.dn, attributes = ?dropped, "Dropping binary attributes");
        }
        let mut attributes: Vec<AttributeValues> = entry.attrs.into_iter().collect();
        attributes.sort_by(|a, b| a.0.cmp(&b.0));
        DirectoryRecord {
            dn: entry.dn,
            attributes,
        }
    }
}

fn value_set(values: &[String]) -> HashSet<String> {
    values.iter().cloned().collect()
}

/// Map a write result code onto the error taxonomy
fn check_write(result: LdapResult, op: &str, dn: &str) -> Result<()> {
    match result.rc {
        RC_SUCCESS => Ok(()),
        RC_NO_SUCH_OBJECT => Err(Error::NotFound(dn.to_string())),
        RC_ALREADY_EXISTS => Err(Error::Write(format!("{} {}: entry already exists", op, dn))),
        rc => Err(Error::Write(format!(
            "{} {} failed with code {}: {}",
            op, dn, rc, result.text
        ))),
    }
}

fn write_error(op: &str, dn: &str, e: LdapError) -> Error {
    Error::Write(format!("{} {}: {}", op, dn, e))
}

#[async_trait]
impl Directory for LdapDirectory {
    async fn bind(&mut self, dn: &str, password: &str) -> Result<()> {
        let started = Instant::now();
        let result = self
            .ldap
            .simple_bind(dn, password)
            .await
            .map_err(|e| Error::Connection(format!("Bind failed: {}", e)));
        record_directory_op("bind", started, matches!(&result, Ok(r) if r.rc == RC_SUCCESS));

        let result = result?;
        match result.rc {
            RC_SUCCESS => Ok(()),
            RC_INVALID_CREDENTIALS => Err(Error::Authentication("invalid credentials".into())),
            rc => Err(Error::Authentication(format!(
                "bind failed with code {}: {}",
                rc, result.text
            ))),
        }
    }

    async fn search(&mut self, request: &SearchRequest) -> Result<Vec<DirectoryRecord>> {
        let attrs: Vec<&str> = if request.attributes.is_empty() {
            vec!["*"]
        } else {
            request.attributes.iter().map(|a| a.as_str()).collect()
        };

        debug!(base = %request.base, filter = %request.filter, "LDAP search");

        let started = Instant::now();
        let result = self
            .ldap
            .search(
                &request.base,
                Self::to_scope(request.scope),
                &request.filter,
                attrs,
            )
            .await;
        record_directory_op("search", started, result.is_ok());

        let ldap3::SearchResult(entries, result) =
            result.map_err(|e| Error::Search(format!("{}: {}", request.base, e)))?;

        match result.rc {
            RC_SUCCESS => Ok(entries
                .into_iter()
                .map(|e| Self::to_record(SearchEntry::construct(e)))
                .collect()),
            RC_NO_SUCH_OBJECT => Ok(Vec::new()),
            rc => Err(Error::Search(format!(
                "{} failed with code {}: {}",
                request.base, rc, result.text
            ))),
        }
    }

    async fn add(&mut self, dn: &str, attributes: Vec<AttributeValues>) -> Result<()> {
        let attrs: Vec<(String, HashSet<String>)> = attributes
            .into_iter()
            .map(|(name, values)| (name, values.into_iter().collect()))
            .collect();

        let started = Instant::now();
        let result = self.ldap.add(dn, attrs).await;
        record_directory_op("add", started, result.is_ok());

        check_write(result.map_err(|e| write_error("add", dn, e))?, "add", dn)
    }

    async fn modify(&mut self, dn: &str, replacements: Vec<AttributeValues>) -> Result<()> {
        let mods: Vec<Mod<String>> = replacements
            .into_iter()
            .map(|(name, values)| Mod::Replace(name, values.into_iter().collect()))
            .collect();

        let started = Instant::now();
        let result = self.ldap.modify(dn, mods).await;
        record_directory_op("modify", started, result.is_ok());

        check_write(result.map_err(|e| write_error("modify", dn, e))?, "modify", dn)
    }

    async fn delete(&mut self, dn: &str) -> Result<()> {
        let started = Instant::now();
        let result = self.ldap.delete(dn).await;
        record_directory_op("delete", started, result.is_ok());

        check_write(result.map_err(|e| write_error("delete", dn, e))?, "delete", dn)
    }

    async fn password_modify(&mut self, dn: &str, new_password: &str) -> Result<()> {
        let started = Instant::now();
        let result = self
            .ldap
            .extended(PasswordModify {
                user_id: Some(dn),
                old_pass: None,
                new_pass: Some(new_password),
            })
            .await;
        record_directory_op("password_modify", started, result.is_ok());

        let ExopResult(_, result) =
            result.map_err(|e| write_error("password modify", dn, e))?;
        check_write(result, "password modify", dn)
    }

    async fn compare_and_replace(
        &mut self,
        dn: &str,
        attribute: &str,
        expected: &[String],
        values: &[String],
    ) -> Result<bool> {
        // One modify: the server applies all changes or none. Deleting a value
        // that is gone or adding one that exists fails the whole request.
        let mut mods: Vec<Mod<String>> = Vec::with_capacity(2);
        if !expected.is_empty() {
            mods.push(Mod::Delete(attribute.to_string(), value_set(expected)));
        }
        if !values.is_empty() {
            mods.push(Mod::Add(attribute.to_string(), value_set(values)));
        }
        if mods.is_empty() {
            return Ok(true);
        }

        let started = Instant::now();
        let result = self.ldap.modify(dn, mods).await;
        record_directory_op("compare_and_replace", started, result.is_ok());

        let result = result.map_err(|e| write_error("modify", dn, e))?;
        match result.rc {
            RC_NO_SUCH_ATTRIBUTE | RC_ATTRIBUTE_OR_VALUE_EXISTS => {
                debug!(dn = %dn, attribute = %attribute, rc = result.rc, "Compare-and-replace precondition failed");
                Ok(false)
            }
            _ => check_write(result, "modify", dn).map(|_| true),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Err(e) = self.ldap.unbind().await {
            warn!(error = %e, "LDAP unbind failed");
        }
        Ok(())
    }
}
