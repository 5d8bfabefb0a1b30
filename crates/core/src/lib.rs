//! Craftmart Core - Shared types library.
//!
//! This crate provides common types used across all Craftmart components:
//! - `storefront` - Client SDK for the storefront backend API
//! - `cli` - Terminal front end for browsing, cart and checkout
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no HTTP
//! clients, no persistence. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, emails, pincodes and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
