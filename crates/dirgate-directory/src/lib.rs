//! Directory access for dirgate
//!
//! The `Directory` capability with its LDAP and in-memory backends, filter
//! construction, per-request sessions, user and group operations, and group
//! membership reconciliation.

pub mod client;
pub mod filter;
mod groups;
pub mod ldap;
pub mod membership;
#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod metrics;
pub mod session;
mod users;

#[cfg(test)]
mod testing;

pub use client::{AttributeValues, Directory, DirectoryConnector};
pub use filter::Filter;
pub use ldap::{LdapConnector, LdapDirectory};
pub use membership::{MembershipReconciler, ReconcileReport};
#[cfg(any(test, feature = "memory"))]
pub use memory::{MemoryConnector, MemoryDirectory, MemoryTree, WriteOp};
pub use session::{check_directory, Profile, Session};
