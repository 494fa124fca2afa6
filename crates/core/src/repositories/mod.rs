//! Backend-side storage.
//!
//! The device keeps cases in the pending queue; once delivered they live here, managed by the
//! review backend.

pub mod review;

pub use review::{CaseStatusFilter, CreatedCase, ReviewRepository};
