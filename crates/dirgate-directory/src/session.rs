//! Authenticated directory sessions
//!
//! Every API request opens its own session: connect, resolve the caller's DN
//! with the read-only service account, then bind as the caller. All further
//! operations of the request run with the caller's rights.

use dirgate_core::query::{self, ListQuery, Page};
use dirgate_core::types::{prepare_entries, Entry, SearchRequest};
use dirgate_core::utils::child_dn;
use dirgate_core::{DirgateConfig, Error, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::client::{Directory, DirectoryConnector};
use crate::filter::Filter;
use crate::membership::{MembershipReconciler, ReconcileReport};

/// Who the session is bound as
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub username: String,
    /// First `mail` value, empty when unknown
    pub email: String,
    #[serde(skip)]
    pub dn: String,
}

pub struct Session {
    directory: Box<dyn Directory>,
    config: Arc<DirgateConfig>,
    profile: Profile,
}

impl Session {
    /// Run the authenticate-then-bind handshake
    pub async fn open(
        connector: &dyn DirectoryConnector,
        config: Arc<DirgateConfig>,
        username: &str,
        password: &str,
    ) -> Result<Self> {
        // An empty password would be an unauthenticated bind
        if username.is_empty() || password.is_empty() {
            return Err(Error::Authentication("missing credentials".into()));
        }

        let mut directory = connector.connect().await?;
        let (dn, email) = resolve_user(directory.as_mut(), &config, username).await?;

        if let Err(e) = directory.bind(&dn, password).await {
            warn!(username = %username, dn = %dn, error = %e, "User bind failed");
            return Err(e);
        }

        debug!(username = %username, dn = %dn, "Session opened");

        Ok(Self {
            directory,
            config,
            profile: Profile {
                username: username.to_string(),
                email,
                dn,
            },
        })
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn config(&self) -> &DirgateConfig {
        &self.config
    }

    pub fn directory(&mut self) -> &mut dyn Directory {
        self.directory.as_mut()
    }

    /// Unbind. Dropping a session without closing it also releases the
    /// connection.
    pub async fn close(mut self) -> Result<()> {
        self.directory.close().await
    }

    /// Set a password with the password modify extended operation
    pub async fn set_password(&mut self, dn: &str, password: &str) -> Result<()> {
        self.directory.password_modify(dn, password).await?;
        info!(dn = %dn, by = %self.profile.username, "Password changed");
        Ok(())
    }

    /// Read one entry; a missing DN is `NotFound`
    pub async fn read_entry(&mut self, dn: &str, attributes: &[String]) -> Result<Entry> {
        let request = SearchRequest::entry(dn).with_attributes(attributes.iter().cloned());
        let records = self.directory.search(&request).await?;
        prepare_entries(records)
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(dn.to_string()))
    }

    /// Search entries of an object class, then sort and window them
    pub(crate) async fn list_entries(&mut self, object_class: &str, query: &ListQuery) -> Result<Page> {
        let filter = Filter::object_class(
            object_class,
            query.q.as_deref().map(|q| Filter::contains("cn", q)),
        );
        let request = SearchRequest::subtree(self.config.ldap.base_dn.clone(), filter.to_string())
            .with_attributes(query.attributes.iter().cloned());

        let records = self.directory.search(&request).await?;
        let entries = prepare_entries(records);

        Ok(query::apply(entries, query.sort.as_ref(), query.range))
    }

    /// Groups listing `user_dn`
    pub async fn groups_of(&mut self, user_dn: &str) -> Result<Vec<String>> {
        MembershipReconciler::new(&self.config)
            .current_groups(self.directory.as_mut(), user_dn)
            .await
    }

    /// Make `desired` the user's exact group set
    pub async fn reconcile_groups(&mut self, user_dn: &str, desired: &[String]) -> Result<ReconcileReport> {
        MembershipReconciler::new(&self.config)
            .reconcile(self.directory.as_mut(), user_dn, desired)
            .await
    }
}

/// Resolve a username to `(dn, email)` as the read-only service account.
///
/// More than one match is a `Uniqueness` failure; no match falls back to
/// `cn=<username>,<baseDN>`.
pub async fn resolve_user(
    directory: &mut dyn Directory,
    config: &DirgateConfig,
    username: &str,
) -> Result<(String, String)> {
    bind_service_account(directory, config).await?;

    let filter = Filter::object_class(
        &config.ldap.users_object_class_search,
        [Filter::equals("cn", username)],
    );
    let request =
        SearchRequest::subtree(config.ldap.base_dn.clone(), filter.to_string()).with_attributes(["mail"]);

    let mut records = directory.search(&request).await?;

    match records.len() {
        0 => {
            let dn = child_dn("cn", username, &config.ldap.base_dn);
            debug!(username = %username, dn = %dn, "User not found, using fallback DN");
            Ok((dn, String::new()))
        }
        1 => {
            let record = records.remove(0);
            let email = record
                .values("mail")
                .and_then(|v| v.first().cloned())
                .unwrap_or_default();
            Ok((record.dn, email))
        }
        n => {
            warn!(username = %username, matches = n, "Username matches several entries");
            Err(Error::Uniqueness("username".into()))
        }
    }
}

async fn bind_service_account(directory: &mut dyn Directory, config: &DirgateConfig) -> Result<()> {
    directory
        .bind(&config.ldap.ro.username, &config.ldap.ro.password)
        .await
        .map_err(|e| match e {
            Error::Authentication(msg) => {
                Error::Connection(format!("service account bind rejected: {}", msg))
            }
            other => other,
        })
}

/// Check that the directory is reachable and accepts the service account
pub async fn check_directory(connector: &dyn DirectoryConnector, config: &DirgateConfig) -> Result<()> {
    let mut directory = connector.connect().await?;
    bind_service_account(directory.as_mut(), config).await?;
    directory.close().await
}
