//! Microsoft Graph backend for GraphXfer.
//!
//! This module provides:
//! - Client-credentials authentication against Azure AD
//! - A thin REST client for the user, drive and content endpoints
//! - `IdentityLookup` and `ObjectStore` implementations over that client

pub mod auth;
pub mod client;
pub mod provider;

#[cfg(test)]
pub(crate) mod test_server;

pub use auth::{AccessToken, ClientSecretCredential, StaticToken, TokenCredential, DEFAULT_AUTHORITY};
pub use client::{GraphClient, DEFAULT_TIMEOUT, GRAPH_API_BASE};
