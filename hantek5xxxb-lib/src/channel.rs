use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::sample;
use crate::sysdata::VerticalChannel;
use crate::tables::{Coupling, ProbeFactor, Rational, VoltsBase, decode_code, volts_per_div};

/// Typed view of one vertical channel block.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Channel {
    pub index: usize,
    pub enabled: bool,
    pub base: VoltsBase,
    pub coupling: Coupling,
    pub filter_20mhz: bool,
    pub fine: bool,
    pub probe: ProbeFactor,
    pub phase_reverse: bool,
    pub fine_count: u8,
    /// Vertical offset in raw sample steps
    pub offset: i16,
}

impl Channel {
    pub fn from_raw(index: usize, raw: &VerticalChannel) -> Result<Self> {
        Ok(Self {
            index,
            enabled: raw.disp != 0,
            base: decode_code("vert.vb", raw.vb)?,
            coupling: decode_code("vert.coup", raw.coup)?,
            filter_20mhz: raw.f20mhz != 0,
            fine: raw.fine != 0,
            probe: decode_code("vert.probe", raw.probe)?,
            phase_reverse: raw.rphase != 0,
            fine_count: raw.cnt_fine,
            offset: raw.pos,
        })
    }

    pub fn name(&self) -> String {
        format!("CH{}", self.index + 1)
    }

    /// Nominal range, without fine adjustment.
    pub fn nominal_volts_per_div(&self) -> Rational {
        volts_per_div(self.probe, self.base)
    }

    /// Effective volts per division including the fine step adjustment.
    pub fn volts_per_div(&self) -> f32 {
        let vdiv = self.nominal_volts_per_div().as_f32();
        if !self.fine {
            return vdiv;
        }
        let count = self.fine_count as f32;
        if self.base.is_two_and_a_half_step() {
            // 75 steps down to the next lower range
            vdiv - count * ((vdiv - vdiv / 2.5) / 75.0)
        } else {
            // 50 steps down to the next lower range
            vdiv - count * ((vdiv / 2.0) / 50.0)
        }
    }

    pub fn probe_factor(&self) -> u64 {
        self.probe.factor()
    }

    pub fn digits(&self) -> i32 {
        sample::digits(self.volts_per_div())
    }

    /// Volts for a chunk of raw sample bytes read from this channel.
    pub fn decode_chunk(&self, bytes: &[u8]) -> Vec<f32> {
        sample::decode_chunk(bytes, self.volts_per_div(), self.offset)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {} V/div, {}, probe {}{}",
            self.name(),
            if self.enabled { "on" } else { "off" },
            self.volts_per_div(),
            self.coupling,
            self.probe,
            if self.filter_20mhz { ", 20 MHz BW" } else { "" }
        )
    }
}
