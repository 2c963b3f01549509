//! Revision-aware document storage for keygate.
//!
//! This crate provides:
//! - The [`DocumentStore`] trait: get / conditional put / conditional
//!   delete over keyed JSON documents
//! - [`MemoryStore`]: an in-process implementation for tests and
//!   database-less runs
//! - [`PgStore`]: a Postgres implementation with optimistic revision
//!   checks
//!
//! # Concurrency Model
//!
//! The broker never locks. Two requests racing on the same document both
//! read it, and at most one conditional write on the read revision can
//! succeed; the loser observes [`StoreError::Conflict`] and maps it to
//! whatever its pipeline calls an ordinary failure. Single-use login
//! tokens are single-use precisely because their deletion is conditioned
//! this way.

pub mod document;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use document::{Document, Revision};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::DocumentStore;
