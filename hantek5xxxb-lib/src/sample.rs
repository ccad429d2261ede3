//! Raw sample positions to volts and back.
//!
//! The screen spans 10.2 divisions vertically, raw positions -127..=127,
//! which gives 25 raw steps per division.

use crate::constants::{NUM_VDIV, STEPS_PER_DIV};

pub fn decode(raw: i16, vdiv: f32, offset: i16) -> f32 {
    let steps = raw as i32 - offset as i32;
    steps as f32 * (vdiv / STEPS_PER_DIV)
}

/// Raw position for `value`, clamped to the signed 8 bit sample range before the offset is added.
pub fn encode(value: f32, vdiv: f32, offset: i16) -> i16 {
    let steps = (value / (vdiv / STEPS_PER_DIV)).round();
    let steps = steps.clamp(i8::MIN as f32, i8::MAX as f32) as i16;
    steps.saturating_add(offset)
}

/// Decimal places worth displaying for a channel at `vdiv` volts per division.
///
/// One raw step is `vdiv * 10.2 / 255` volts; the integer part of its
/// decimal logarithm is negated and one more digit is added for steps below 1 V.
pub fn digits(vdiv: f32) -> i32 {
    let step_log = (vdiv * NUM_VDIV / 255.0).log10();
    -(step_log.trunc() as i32) + i32::from(step_log < 0.0)
}

pub fn decode_chunk(bytes: &[u8], vdiv: f32, offset: i16) -> Vec<f32> {
    bytes
        .iter()
        .map(|b| decode(*b as i8 as i16, vdiv, offset))
        .collect()
}
