//! Health merge library.
//!
//! Merges the health reported by several child sensors of a device into a
//! single severity with an explanatory status text, and keeps that merged
//! value up to date as the children change.

pub mod config;
pub mod error;
pub mod health;
pub mod input;
pub mod instance_lock;
pub mod output;
