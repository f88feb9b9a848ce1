//! Module for the device (storage node) API.
//!
//! Binding a node to an account, managing the binding, and the per-device
//! dashboard lists served by the node's area scheduler.

pub mod handlers;
pub mod routes;

pub use routes::{authed_routes, public_routes};
