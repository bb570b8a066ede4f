//! Core domain types and utilities for the oauth-sidecar.
//!
//! This crate provides the foundational types shared by the provider layer
//! and the proxy server: the `Result` alias used for error propagation, the
//! verified [`Identity`] returned by a provider, and the [`ProviderName`]
//! used to look providers up.

pub mod error;
pub mod id;
pub mod identity;

pub use error::Result;
pub use id::{ParseProviderNameError, ProviderName};
pub use identity::{Identity, IdentityError};
