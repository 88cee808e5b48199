//! # MRR Common Library
//!
//! Shared code for the music royalty report tools:
//! - Error taxonomy
//! - Bootstrap configuration and root folder resolution
//! - Database schema and persisted models
//! - Money rounding and currency formatting
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod money;
pub mod time;

pub use error::{Error, Result};
pub use money::{round_money, CurrencyFormat};
