//! Core logic for a three-probe thermocouple monitor.
//!
//! Everything in this library is hardware-independent: the sampling gate,
//! per-channel smoothing and calibration, the serial terminal, and the
//! bit-bang drivers (which only see `embedded-hal` traits). The RTIC
//! application shell lives in `main.rs` behind the `firmware` feature.

#![cfg_attr(not(test), no_std)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

pub mod button;
pub mod calibration;
pub mod display;
pub mod filter;
pub mod monitor;
pub mod storage;
pub mod terminal;
pub mod thermometer;
