//! Data models for the application
//!
//! This module contains the billing-subscription data structures shared
//! across the client, service, and CLI crates.

mod subscription;

// Re-export all models for convenient imports
pub use subscription::*;
