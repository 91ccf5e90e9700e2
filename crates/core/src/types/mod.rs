//! Core types for Stockwatch.
//!
//! This module provides type-safe wrappers for the concepts shared between the
//! session machinery and the inventory views.

pub mod credential;
pub mod email;
pub mod id;
pub mod product;
pub mod status;
pub mod user;

pub use credential::Credential;
pub use email::{Email, EmailError};
pub use id::*;
pub use product::{InventorySummary, Product};
pub use status::StockStatus;
pub use user::{Registration, RegistrationError, RegistrationForm, Session, UserRole};
