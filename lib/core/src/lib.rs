//! Core domain types and utilities for keygate.
//!
//! This crate provides the foundational types, error handling, and the
//! tenant-naming scheme shared by the keygate passwordless authentication
//! broker and tenant data gateway.

pub mod error;
pub mod identity;
pub mod tenant;

pub use error::Result;
pub use identity::{Identity, Origin};
pub use tenant::TenantId;
