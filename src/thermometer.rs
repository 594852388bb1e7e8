//! Temperature probe interface

pub mod max6675;

/// Temperature in degrees Celsius.
///
/// The MAX6675 resolves 0.25 degree steps over 0..=1023.75, which f32 carries
/// exactly. Reduced-precision history records use fixed point instead
/// (see [`crate::storage`]).
pub type Celsius = f32;
