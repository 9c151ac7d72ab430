//! Shared types and models for the inventory administration platform
//!
//! This crate contains types shared between the backend and any client of
//! its API.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
