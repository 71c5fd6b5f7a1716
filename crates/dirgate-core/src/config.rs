//! Configuration for dirgate
//!
//! Loaded from a YAML file whose keys follow the historical `config.yaml`
//! layout (`ldap.baseDN`, `ldap.ro.username`, `ldap.userAttributes`, ...),
//! then overridden from `DIRGATE_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::schema::AttributeSchema;
use crate::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirgateConfig {
    #[serde(default)]
    pub server: ServerConfig,

    pub ldap: LdapConfig,

    #[serde(default)]
    pub membership: MembershipConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DirgateConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Read the file, apply environment overrides and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `DIRGATE_*` overrides from an arbitrary lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("DIRGATE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("DIRGATE_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| Error::Config(format!("DIRGATE_PORT is not a port: {}", port)))?;
        }
        if let Some(dir) = lookup("DIRGATE_STATIC_DIR") {
            self.server.static_dir = Some(PathBuf::from(dir));
        }

        if let Some(url) = lookup("DIRGATE_LDAP_URL") {
            self.ldap.url = url;
        }
        if let Some(base_dn) = lookup("DIRGATE_LDAP_BASE_DN") {
            self.ldap.base_dn = base_dn;
        }
        if let Some(username) = lookup("DIRGATE_LDAP_RO_USERNAME") {
            self.ldap.ro.username = username;
        }
        if let Some(password) = lookup("DIRGATE_LDAP_RO_PASSWORD") {
            self.ldap.ro.password = password;
        }

        if let Some(mode) = lookup("DIRGATE_WRITE_MODE") {
            self.membership.write_mode = match mode.as_str() {
                "compare_and_swap" => WriteMode::CompareAndSwap,
                "replace" => WriteMode::Replace,
                other => {
                    return Err(Error::Config(format!("unknown write mode: {}", other)));
                }
            };
        }

        if let Some(level) = lookup("DIRGATE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("DIRGATE_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.ldap.url)
            .map_err(|e| Error::Config(format!("invalid ldap.url {}: {}", self.ldap.url, e)))?;
        if url.scheme() != "ldap" && url.scheme() != "ldaps" {
            return Err(Error::Config(format!(
                "ldap.url must use ldap:// or ldaps://, got {}",
                self.ldap.url
            )));
        }

        if self.ldap.base_dn.trim().is_empty() {
            return Err(Error::Config("ldap.baseDN is empty".into()));
        }
        if self.ldap.users_object_class_search.is_empty()
            || self.ldap.groups_object_class_search.is_empty()
        {
            return Err(Error::Config("object class searches must be set".into()));
        }
        if self.membership.max_attempts == 0 {
            return Err(Error::Config("membership.maxAttempts must be at least 1".into()));
        }
        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            other => return Err(Error::Config(format!("unknown log format: {}", other))),
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Front-end assets; nothing is served when unset
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read-only service account used to resolve user DNs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceAccount {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LdapConfig {
    /// ldap:// or ldaps:// URL of the directory
    pub url: String,

    #[serde(rename = "baseDN")]
    pub base_dn: String,

    #[serde(default)]
    pub ro: ServiceAccount,

    #[serde(default)]
    pub user_attributes: AttributeSchema,

    #[serde(default = "default_users_class")]
    pub users_object_class_search: String,

    #[serde(default)]
    pub group_attributes: AttributeSchema,

    #[serde(default = "default_groups_class")]
    pub groups_object_class_search: String,

    /// Attribute the front end sorts and labels users by
    #[serde(default = "default_display_attribute")]
    pub display_attribute: String,

    #[serde(default)]
    pub start_tls: bool,

    /// Skip TLS certificate verification (not recommended for production)
    #[serde(default)]
    pub skip_tls_verify: bool,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl Default for LdapConfig {
    fn default() -> Self {
        Self {
            url: "ldap://localhost:389".to_string(),
            base_dn: String::new(),
            ro: ServiceAccount::default(),
            user_attributes: AttributeSchema::new(),
            users_object_class_search: default_users_class(),
            group_attributes: AttributeSchema::new(),
            groups_object_class_search: default_groups_class(),
            display_attribute: default_display_attribute(),
            start_tls: false,
            skip_tls_verify: false,
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

/// How the membership reconciler writes a group's member list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Write only if the member list is unchanged since it was read
    #[default]
    CompareAndSwap,
    /// Overwrite the whole member list
    Replace,
}

impl WriteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::CompareAndSwap => "compare_and_swap",
            WriteMode::Replace => "replace",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipConfig {
    #[serde(default = "default_member_attribute")]
    pub member_attribute: String,

    #[serde(default)]
    pub write_mode: WriteMode,

    /// Fetch/write attempts per group before giving up with a conflict
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            member_attribute: default_member_attribute(),
            write_mode: WriteMode::default(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_users_class() -> String {
    "inetOrgPerson".to_string()
}

fn default_groups_class() -> String {
    "groupOfNames".to_string()
}

fn default_display_attribute() -> String {
    "displayName".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_member_attribute() -> String {
    "member".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}
