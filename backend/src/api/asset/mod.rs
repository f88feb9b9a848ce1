//! Module for the asset (storage) API.
//!
//! Upload hand-off, sharing, share links, folders, and the cross-area
//! dashboards. This is where the scheduler pool gets exercised.

pub mod handlers;
pub mod routes;
