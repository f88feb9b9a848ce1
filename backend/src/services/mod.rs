//! Module for core business logic services.
//!
//! This module encapsulates services that perform specific business operations
//! and orchestrate interactions between different parts of the application,
//! such as resolving area schedulers or delivering upload callbacks.

pub mod notify;
pub mod scheduler_pool;
