//! Core types for Stride Rewards.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod identity;
pub mod points;
pub mod status;

pub use id::*;
pub use identity::{Identity, Role};
pub use points::{Points, PointsError};
pub use status::*;
