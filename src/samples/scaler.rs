//! # Sample Scaler
//!
//! Converts raw package samples to physical units using the package's own
//! scale factors. This is the only place scale factors are applied.

use super::PhysicalSample;
use crate::protocol::wire::{SamplesPackage, SAMPLES_PER_PACKAGE};

/// Scale every raw sample of a package
///
/// Each field is widened to `f64` and multiplied by its factor. NaN, zero and
/// negative factors are applied as-is.
///
/// # Examples
///
/// ```
/// use wattmeter_monitor::protocol::wire::{RawSample, SamplesPackage};
/// use wattmeter_monitor::samples::scale;
///
/// let package = SamplesPackage::filled(0, 0.5, 2.0, RawSample { voltage: 10, current: -3 });
/// let scaled = scale(&package);
/// assert_eq!(scaled[0].voltage, 5.0);
/// assert_eq!(scaled[0].current, -6.0);
/// ```
pub fn scale(package: &SamplesPackage) -> [PhysicalSample; SAMPLES_PER_PACKAGE] {
    let voltage_factor = f64::from(package.voltage_scale_factor);
    let current_factor = f64::from(package.current_scale_factor);

    package.samples.map(|raw| PhysicalSample {
        voltage: f64::from(raw.voltage) * voltage_factor,
        current: f64::from(raw.current) * current_factor,
    })
}
