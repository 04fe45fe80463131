//! Access decisions for course content.
//!
//! # Responsibility
//! - Combine viewer role, authorship, enrollment and course state into one
//!   `AccessDecision`.
//!
//! # Invariants
//! - The resolver is pure; callers gather fresh inputs on every request and
//!   never cache a decision across requests.

pub mod resolver;
