//! Craftmart storefront client.
//!
//! Talks to the Craftmart backend on behalf of one shopper: catalog browsing,
//! cart and saved-for-later reconciliation, address book, checkout and
//! account flows. [`state::AppState`] wires everything together over one
//! persisted [`session::Session`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod account;
pub mod address;
pub mod api;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod contact;
pub mod error;
pub mod events;
pub mod models;
pub mod optimistic;
pub mod orders;
pub mod session;
pub mod state;
