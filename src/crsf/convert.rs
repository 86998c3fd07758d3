//! # Channel Value Conversions
//!
//! Integer conversions between 11-bit CRSF channel values and the narrow
//! fields carried over the air. All of these run in the radio interrupt
//! path, so they are constant-time and free of data-dependent branches
//! (`min` lowers to a conditional move).

use super::protocol::CRSF_CHANNEL_VALUE_MAX;

/// Number of distinct CRSF channel values (2^11)
const CRSF_CHANNEL_SPAN: u32 = CRSF_CHANNEL_VALUE_MAX as u32 + 1;

/// Reduce a channel to a single bit: 1 at or above center, 0 below
#[inline(always)]
pub fn crsf_to_bit(value: u16) -> u8 {
    (value.min(CRSF_CHANNEL_VALUE_MAX) >> 10) as u8
}

/// Expand a single bit to the channel extremes (0 or 2047)
#[inline(always)]
pub fn bit_to_crsf(bit: u8) -> u16 {
    (bit & 1) as u16 * CRSF_CHANNEL_VALUE_MAX
}

/// Quantize a channel into `count` evenly sized bins, returning `0..count`
#[inline(always)]
pub fn crsf_to_n(value: u16, count: u16) -> u8 {
    (value.min(CRSF_CHANNEL_VALUE_MAX) as u32 * count as u32 / CRSF_CHANNEL_SPAN) as u8
}

/// Spread `value` in `0..=max` evenly across the channel range
///
/// `max` must be non-zero. Values above `max` saturate at the top of the range.
#[inline(always)]
pub fn n_to_crsf(value: u16, max: u16) -> u16 {
    (value.min(max) as u32 * CRSF_CHANNEL_VALUE_MAX as u32 / max as u32) as u16
}

/// Three-position switch (0, 1, 2) to low/center/high
#[inline(always)]
pub fn switch2b_to_crsf(value: u8) -> u16 {
    n_to_crsf(value as u16, 2)
}
