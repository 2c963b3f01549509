//! Error handling foundation.
//!
//! Only the shared `Result` alias lives here. The broker, store, notify,
//! and gateway crates each define their own error enums in their own
//! error modules; rootcause's `.context()` attaches layer-appropriate
//! detail as a failure crosses crate boundaries.

use rootcause::Report;

/// Result alias over rootcause's `Report`.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
