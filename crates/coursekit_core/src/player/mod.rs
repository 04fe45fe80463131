//! Player-facing helpers layered on top of stored lesson content.
//!
//! # Invariants
//! - Stored lesson payloads are read-only here; nothing in this module
//!   rewrites or rejects a URL.

pub mod embed;
