//! # Wattmeter Monitor Library
//!
//! Live voltage/current telemetry from an ESP32 wattmeter.
//!
//! This library provides the core functionality for decoding the wattmeter's
//! binary frames, scaling them to physical units, keeping a rolling window of
//! recent samples and managing the WebSocket connection that delivers them.

pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod samples;
pub mod telemetry;
pub mod transport;
