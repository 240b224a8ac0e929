//! # Wattmeter Wire Protocol
//!
//! Binary frame format spoken by the ESP32 wattmeter over its WebSocket.
//!
//! This module handles:
//! - Package and frame layout constants
//! - Decoding of scaled frames (3 packages of 64 i16 sample pairs)
//! - Decoding of legacy frames (flat f32 sample pairs)
//! - Encoding of both, for reference frames in tests and tooling

pub mod wire;
pub mod encoder;
pub mod decoder;
