//! NavKit Core Library
//!
//! This crate provides shared types, errors, and configuration for the
//! NavKit navigation-interception engine.

pub mod config;
pub mod error;
pub mod types;

pub use config::InterceptConfig;
pub use error::{NavKitError, NavKitResult};
pub use types::{PageTransition, ResolverIdentity, SurfaceId, TransitionKind};
