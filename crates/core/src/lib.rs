//! Stockwatch Core - Shared domain types.
//!
//! This crate provides the types used across all Stockwatch components:
//! - `client` - Session lifecycle, credential refresh and inventory API access
//! - `cli` - Terminal front-end for logging in and browsing stock
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no HTTP
//! clients, no storage. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Credentials, emails, typed IDs, sessions, products and stock status

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
