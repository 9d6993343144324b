//! Core catalog model for stave.
//!
//! This crate defines the three-level catalog tree (Artist, Album, Track),
//! the identity hashing that gives entities stable keys across rescans,
//! and the SQLite store that mirrors an external media catalog.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod identity;
pub mod model;
pub mod schema;

pub use error::{Error, Result};
