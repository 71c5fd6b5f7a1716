//! Request middleware

pub mod auth;

pub use auth::{parse_basic, AuthenticatedSession};
