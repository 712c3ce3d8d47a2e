//! Grid-ballast water heater controller core.
//!
//! Everything here is hardware-independent and runs on the host under
//! `cargo test`. The firmware binary binds it to STM32F405 peripherals.

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to every module below.
#[macro_use]
mod fmt;

pub mod config;
pub mod controller;
pub mod current;
pub mod error;
pub mod freq;
pub mod protocol;
pub mod rs485;
pub mod state;
pub mod store;
pub mod sync;

pub use store::{SharedStore, StateStore};
