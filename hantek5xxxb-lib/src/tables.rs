//! Register code tables and their physical meaning.
//!
//! Every table is indexed by a closed enum so an out-of-range register code
//! is rejected once, when it is read from the wire, instead of at each lookup.

use std::fmt;
use std::hash::{Hash, Hasher};

use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};
use strum_macros::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::constants::{NUM_HDIV_MENU_OFF, NUM_HDIV_MENU_ON};
use crate::error::{Error, Result};

/// Decodes a register code into its table enum.
pub(crate) fn decode_code<E>(field: &'static str, value: u8) -> Result<E>
where
    E: TryFromPrimitive<Primitive = u8>,
{
    E::try_from_primitive(value).map_err(|_| Error::UnknownRegisterCode { field, value })
}

/// Exact fraction, used for volts/div and timebase values.
///
/// Equality is by value, so `1/500` equals `2/1000`. The tables keep their
/// unreduced form for display.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rational {
    pub num: u64,
    pub den: u64,
}

impl Rational {
    pub const fn new(num: u64, den: u64) -> Self {
        Self { num, den }
    }

    pub fn as_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }

    pub fn as_f32(self) -> f32 {
        self.num as f32 / self.den as f32
    }

    /// Lowest terms; a zero denominator is left alone.
    pub fn reduced(self) -> Self {
        match gcd(self.num, self.den) {
            0 => self,
            d => Self::new(self.num / d, self.den / d),
        }
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

impl PartialEq for Rational {
    fn eq(&self, other: &Self) -> bool {
        u128::from(self.num) * u128::from(other.den) == u128::from(other.num) * u128::from(self.den)
    }
}

impl Eq for Rational {}

impl Hash for Rational {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let Rational { num, den } = self.reduced();
        num.hash(state);
        den.hash(state);
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Coarse vertical range, `vb` in the channel block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum VoltsBase {
    #[strum(to_string = "2 mV")]
    Mv2 = 0x00,
    #[strum(to_string = "5 mV")]
    Mv5 = 0x01,
    #[strum(to_string = "10 mV")]
    Mv10 = 0x02,
    #[strum(to_string = "20 mV")]
    Mv20 = 0x03,
    #[strum(to_string = "50 mV")]
    Mv50 = 0x04,
    #[strum(to_string = "100 mV")]
    Mv100 = 0x05,
    #[strum(to_string = "200 mV")]
    Mv200 = 0x06,
    #[strum(to_string = "500 mV")]
    Mv500 = 0x07,
    #[strum(to_string = "1 V")]
    V1 = 0x08,
    #[strum(to_string = "2 V")]
    V2 = 0x09,
    #[strum(to_string = "5 V")]
    V5 = 0x0A,
}

impl VoltsBase {
    pub const ALL: [VoltsBase; 11] = [
        VoltsBase::Mv2,
        VoltsBase::Mv5,
        VoltsBase::Mv10,
        VoltsBase::Mv20,
        VoltsBase::Mv50,
        VoltsBase::Mv100,
        VoltsBase::Mv200,
        VoltsBase::Mv500,
        VoltsBase::V1,
        VoltsBase::V2,
        VoltsBase::V5,
    ];

    /// Ranges sitting 2.5x above the next lower one (5 mV, 50 mV, 500 mV, 5 V).
    pub fn is_two_and_a_half_step(self) -> bool {
        matches!(self, VoltsBase::Mv5 | VoltsBase::Mv50 | VoltsBase::Mv500 | VoltsBase::V5)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum ProbeFactor {
    #[strum(to_string = "x1")]
    X1 = 0x00,
    #[strum(to_string = "x10")]
    X10 = 0x01,
    #[strum(to_string = "x100")]
    X100 = 0x02,
    #[strum(to_string = "x1000")]
    X1000 = 0x03,
}

impl ProbeFactor {
    pub const ALL: [ProbeFactor; 4] = [ProbeFactor::X1, ProbeFactor::X10, ProbeFactor::X100, ProbeFactor::X1000];

    pub fn factor(self) -> u64 {
        match self {
            ProbeFactor::X1 => 1,
            ProbeFactor::X10 => 10,
            ProbeFactor::X100 => 100,
            ProbeFactor::X1000 => 1000,
        }
    }

    pub fn from_factor(factor: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.factor() == factor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum Coupling {
    #[strum(to_string = "AC")]
    Ac = 0x00,
    #[strum(to_string = "DC")]
    Dc = 0x01,
    #[strum(to_string = "GND")]
    Gnd = 0x02,
}

impl Coupling {
    pub const ALL: [Coupling; 3] = [Coupling::Ac, Coupling::Dc, Coupling::Gnd];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.to_string() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum TriggerSource {
    #[strum(to_string = "CH1")]
    Ch1 = 0x00,
    #[strum(to_string = "CH2")]
    Ch2 = 0x01,
    #[strum(to_string = "Ext")]
    Ext = 0x02,
    #[strum(to_string = "Ext/5")]
    ExtDiv5 = 0x03,
    #[strum(to_string = "AC Line")]
    AcLine = 0x04,
}

impl TriggerSource {
    pub const ALL: [TriggerSource; 5] = [
        TriggerSource::Ch1,
        TriggerSource::Ch2,
        TriggerSource::Ext,
        TriggerSource::ExtDiv5,
        TriggerSource::AcLine,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.to_string() == name)
    }

    /// Analog channel index when triggering on CH1 or CH2.
    pub fn channel(self) -> Option<usize> {
        match self {
            TriggerSource::Ch1 => Some(0),
            TriggerSource::Ch2 => Some(1),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum TriggerSlope {
    #[strum(to_string = "r")]
    Rising = 0x00,
    #[strum(to_string = "f")]
    Falling = 0x01,
    #[strum(to_string = "r+f")]
    Both = 0x02,
}

impl TriggerSlope {
    pub const ALL: [TriggerSlope; 3] = [TriggerSlope::Rising, TriggerSlope::Falling, TriggerSlope::Both];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.to_string() == name)
    }
}

/// Horizontal timebase code, shared by `horiz_tb` and `horiz_win_tb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum Timebase {
    Ns2 = 0x00,
    Ns4,
    Ns8,
    Ns20,
    Ns40,
    Ns80,
    Ns200,
    Ns400,
    Ns800,
    Us2,
    Us4,
    Us8,
    Us20,
    Us40,
    Us80,
    Us200,
    Us400,
    Us800,
    Ms2,
    Ms4,
    Ms8,
    Ms20,
    Ms40,
    Ms80,
    Ms200,
    Ms400,
    Ms800,
    S2,
    S4,
    S8,
    S20,
    S40 = 0x1F,
}

const fn per_decade(den: u64) -> [Rational; 9] {
    [
        Rational::new(2, den),
        Rational::new(4, den),
        Rational::new(8, den),
        Rational::new(20, den),
        Rational::new(40, den),
        Rational::new(80, den),
        Rational::new(200, den),
        Rational::new(400, den),
        Rational::new(800, den),
    ]
}

const NS: [Rational; 9] = per_decade(1_000_000_000);
const US: [Rational; 9] = per_decade(1_000_000);
const MS: [Rational; 9] = per_decade(1_000);

#[rustfmt::skip]
static WINDOW_TIMEBASE: [Rational; 32] = [
    NS[0], NS[1], NS[2], NS[3], NS[4], NS[5], NS[6], NS[7], NS[8],
    US[0], US[1], US[2], US[3], US[4], US[5], US[6], US[7], US[8],
    MS[0], MS[1], MS[2], MS[3], MS[4], MS[5], MS[6], MS[7], MS[8],
    Rational::new(2, 1),
    Rational::new(4, 1),
    Rational::new(8, 1),
    Rational::new(20, 1),
    Rational::new(40, 1),
];

// The main timebase never goes below 200 ns.
#[rustfmt::skip]
static MAIN_TIMEBASE: [Rational; 32] = [
    NS[6], NS[6], NS[6], NS[6], NS[6], NS[6], NS[6], NS[7], NS[8],
    US[0], US[1], US[2], US[3], US[4], US[5], US[6], US[7], US[8],
    MS[0], MS[1], MS[2], MS[3], MS[4], MS[5], MS[6], MS[7], MS[8],
    Rational::new(2, 1),
    Rational::new(4, 1),
    Rational::new(8, 1),
    Rational::new(20, 1),
    Rational::new(40, 1),
];

impl Timebase {
    pub fn all() -> impl Iterator<Item = Timebase> {
        (0u8..32).filter_map(|code| Timebase::try_from_primitive(code).ok())
    }

    pub fn index(self) -> usize {
        u8::from(self) as usize
    }

    /// Seconds per division of the zoom window (and of the screen when no window is open).
    pub fn window_duration(self) -> Rational {
        WINDOW_TIMEBASE[self.index()]
    }

    /// Seconds per division of the main timebase.
    pub fn main_duration(self) -> Rational {
        MAIN_TIMEBASE[self.index()]
    }

    pub fn from_window_duration(duration: Rational) -> Option<Self> {
        Self::all().find(|tb| tb.window_duration() == duration)
    }
}

impl fmt::Display for Timebase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Rational { num, den } = self.window_duration();
        let unit = match den {
            1_000_000_000 => "ns",
            1_000_000 => "us",
            1_000 => "ms",
            _ => "s",
        };
        write!(f, "{num} {unit}")
    }
}

/// Acquisition memory depth. The discriminant is the `store_depth` register code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum MemoryDepth {
    #[strum(to_string = "4K")]
    K4 = 0x00,
    #[strum(to_string = "40K")]
    K40 = 0x04,
    #[strum(to_string = "512K")]
    K512 = 0x06,
    #[strum(to_string = "1M")]
    M1 = 0x07,
}

impl MemoryDepth {
    /// Ordered by size.
    pub const ALL: [MemoryDepth; 4] = [MemoryDepth::K4, MemoryDepth::K40, MemoryDepth::K512, MemoryDepth::M1];

    pub fn samples(self) -> u64 {
        match self {
            MemoryDepth::K4 => 4 * 1024,
            MemoryDepth::K40 => 40 * 1024,
            MemoryDepth::K512 => 512 * 1024,
            MemoryDepth::M1 => 1024 * 1024,
        }
    }

    /// Column in the sample count and sample rate tables.
    pub fn rate_index(self) -> usize {
        match self {
            MemoryDepth::K4 => 0,
            MemoryDepth::K40 => 1,
            MemoryDepth::K512 => 2,
            MemoryDepth::M1 => 3,
        }
    }

    pub fn store_code(self) -> u8 {
        self.into()
    }

    pub fn from_samples(samples: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.samples() == samples)
    }

    pub fn from_rate_index(index: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.rate_index() == index)
    }

    /// Next smaller depth.
    pub fn smaller(self) -> Option<Self> {
        self.rate_index().checked_sub(1).and_then(Self::from_rate_index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum AcquireMode {
    Normal = 0x00,
    #[strum(to_string = "Peak Detect")]
    PeakDetect = 0x01,
    Average = 0x02,
}

/// Averaged waveforms, indexed by the `avg_cnt` register code.
pub const AVERAGE_COUNTS: [u64; 6] = [4, 16, 32, 64, 128, 256];

pub fn average_count(code: u8) -> Result<u64> {
    AVERAGE_COUNTS
        .get(code as usize)
        .copied()
        .ok_or(Error::UnknownRegisterCode {
            field: "acquire.avg_cnt",
            value: code,
        })
}

pub fn average_code(count: u64) -> Option<u8> {
    AVERAGE_COUNTS.iter().position(|c| *c == count).map(|i| i as u8)
}

/// Scope model, from the `control.type` register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, FromPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum Model {
    Dst1202b = 0x00,
    Dst1100 = 0x01,
    Dst4060 = 0x02,
    Dst1150 = 0x03,
    Dst4042 = 0x04,
    Dst1102b = 0x05,
    Dst4062b = 0x06,
    Dst1152 = 0x07,
    Dst3022b = 0x08,
    Dst3042b = 0x09,
    Dst4062 = 0x0A,
    Dst4102b = 0x0B,
    Dst1062b = 0x0C,

    #[num_enum(catch_all)]
    Unknown(u8),
}

impl Model {
    /// Names the same hardware is sold under.
    pub fn names(self) -> &'static str {
        match self {
            Model::Dst1202b => "Tekway DST1202B, Hantek DSO5202B/BM/BMV, Protek 3210",
            Model::Dst1100 => "Tekway DST1100",
            Model::Dst4060 => "Tekway DST4060",
            Model::Dst1150 => "Tekway DST1150",
            Model::Dst4042 => "Tekway DST4042",
            Model::Dst1102b => "Tekway DST1102B, Hantek DSO5102B/BM/BMV, Protek 3110",
            Model::Dst4062b => "Tekway DST4062B, Hantek DSO5062C",
            Model::Dst1152 => "Tekway DST1152",
            Model::Dst3022b => "Tekway DST3022B",
            Model::Dst3042b => "Tekway DST3042B",
            Model::Dst4062 => "Tekway DST4062",
            Model::Dst4102b => "Tekway DST4102B, Hantek DSO5102C",
            Model::Dst1062b => "Tekway DST1062B, Hantek DSO5062B/BM/BMV, Voltcraft DSO-1062D/DSO-3062C",
            Model::Unknown(_) => "unknown model",
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Model::Unknown(code) => write!(f, "unknown model {code:#04x}"),
            model => f.write_str(model.names()),
        }
    }
}

/// `[probe][range]` volts per division.
static VDIV: [[Rational; 11]; 4] = [
    [
        Rational::new(2, 1000),
        Rational::new(5, 1000),
        Rational::new(10, 1000),
        Rational::new(20, 1000),
        Rational::new(50, 1000),
        Rational::new(100, 1000),
        Rational::new(200, 1000),
        Rational::new(500, 1000),
        Rational::new(1, 1),
        Rational::new(2, 1),
        Rational::new(5, 1),
    ],
    [
        Rational::new(20, 1000),
        Rational::new(50, 1000),
        Rational::new(100, 1000),
        Rational::new(200, 1000),
        Rational::new(500, 1000),
        Rational::new(1, 1),
        Rational::new(2, 1),
        Rational::new(5, 1),
        Rational::new(10, 1),
        Rational::new(20, 1),
        Rational::new(50, 1),
    ],
    [
        Rational::new(200, 1000),
        Rational::new(500, 1000),
        Rational::new(1, 1),
        Rational::new(2, 1),
        Rational::new(5, 1),
        Rational::new(10, 1),
        Rational::new(20, 1),
        Rational::new(50, 1),
        Rational::new(100, 1),
        Rational::new(200, 1),
        Rational::new(500, 1),
    ],
    [
        Rational::new(2, 1),
        Rational::new(5, 1),
        Rational::new(10, 1),
        Rational::new(20, 1),
        Rational::new(50, 1),
        Rational::new(100, 1),
        Rational::new(200, 1),
        Rational::new(500, 1),
        Rational::new(1000, 1),
        Rational::new(2000, 1),
        Rational::new(5000, 1),
    ],
];

pub fn volts_per_div(probe: ProbeFactor, base: VoltsBase) -> Rational {
    VDIV[u8::from(probe) as usize][u8::from(base) as usize]
}

/// All ranges selectable with `probe`.
pub fn volts_per_div_list(probe: ProbeFactor) -> &'static [Rational; 11] {
    &VDIV[u8::from(probe) as usize]
}

pub fn volts_base_from_vdiv(probe: ProbeFactor, vdiv: Rational) -> Option<VoltsBase> {
    VoltsBase::ALL.into_iter().find(|b| volts_per_div(probe, *b) == vdiv)
}

/// `[window timebase][both channels][menu visible][depth]` samples in one frame.
#[rustfmt::skip]
static SAMPLE_COUNT: [[[[u32; 4]; 2]; 2]; 32] = [
    [[[   768,    768,    768,    768], [   640,    640,    640,    640]], [[   768,    768,    768,      0], [   640,    640,    640,      0]]], // 2 ns
    [[[   768,    768,    768,    768], [   640,    640,    640,    640]], [[   768,    768,    768,      0], [   640,    640,    640,      0]]], // 4 ns
    [[[   768,    768,    768,    768], [   640,    640,    640,    640]], [[   768,    768,    768,      0], [   640,    640,    640,      0]]], // 8 ns
    [[[   768,    768,    768,    768], [   640,    640,    640,    640]], [[   768,    768,    768,      0], [   640,    640,    640,      0]]], // 20 ns
    [[[   768,    768,    768,    768], [   640,    640,    640,    640]], [[   768,    768,    768,      0], [   640,    640,    640,      0]]], // 40 ns
    [[[  1536,    768,    768,    768], [  1280,    640,    640,    640]], [[   768,    768,    768,      0], [   640,    640,    640,      0]]], // 80 ns
    [[[  3072,   1536,   1536,   1536], [  2560,   1280,   1280,   1280]], [[  1536,   1536,   1536,      0], [  1280,   1280,   1280,      0]]], // 200 ns
    [[[  3072,   3072,   3072,   3072], [  2560,   2560,   2560,   2560]], [[  3072,   3072,   3072,      0], [  2560,   2560,   2560,      0]]], // 400 ns
    [[[  3072,   6144,   6144,   6144], [  2560,   5120,   5120,   5120]], [[  3072,   3072,   3072,      0], [  2560,   2560,   2560,      0]]], // 800 ns
    [[[  3840,  15360,  15360,  15360], [  3200,  12800,  12800,  12800]], [[  3840,   7680,   7680,      0], [  3200,   6400,   6400,      0]]], // 2 us
    [[[  3840,  30720,  30720,  30720], [  3200,  25600,  25600,  25600]], [[  3840,  15360,  15360,      0], [  3200,  12800,  12800,      0]]], // 4 us
    [[[  3840,  30720,  61440,  61440], [  3200,  25600,  51200,  51200]], [[  3840,  30720,  30720,      0], [  3200,  25600,  25600,      0]]], // 8 us
    [[[  3840,  38400, 153600, 153600], [  3200,  32000, 128000, 128000]], [[  3840,  38400,  76800,      0], [  3200,  32000,  64000,      0]]], // 20 us
    [[[  3840,  38400, 307200, 307200], [  3200,  32000, 256000, 256000]], [[  3840,  38400, 153600,      0], [  3200,  32000, 128000,      0]]], // 40 us
    [[[  3840,  38400, 307200, 614400], [  3200,  32000, 256000, 512000]], [[  3840,  38400, 307200,      0], [  3200,  32000, 256000,      0]]], // 80 us
    [[[  3840,  38400, 384000,      0], [  3200,  32000, 320000,      0]], [[  3840,  38400, 384000,      0], [  3200,  32000, 320000,      0]]], // 200 us
    [[[  3840,  38400, 384000, 768000], [  3200,  32000, 320000, 640000]], [[  3840,  38400, 384000,      0], [  3200,  32000, 320000,      0]]], // 400 us
    [[[  3840,  38400, 384000, 768000], [  3200,  32000, 320000, 640000]], [[  3840,  38400, 384000,      0], [  3200,  32000, 320000,      0]]], // 800 us
    [[[  3840,  38400, 384000, 768000], [  3200,  32000, 320000, 640000]], [[  3840,  38400, 384000,      0], [  3200,  32000, 320000,      0]]], // 2 ms
    [[[  3840,  38400, 384000, 768000], [  3200,  32000, 320000, 640000]], [[  3840,  38400, 384000,      0], [  3200,  32000, 320000,      0]]], // 4 ms
    [[[  3840,  38400, 384000, 768000], [  3200,  32000, 320000, 640000]], [[  3840,  38400, 384000,      0], [  3200,  32000, 320000,      0]]], // 8 ms
    [[[  3840,  38400, 384000, 768000], [  3200,  32000, 320000, 640000]], [[  3840,  38400, 384000,      0], [  3200,  32000, 320000,      0]]], // 20 ms
    [[[  3840,  38400, 384000, 768000], [  3200,  32000, 320000, 640000]], [[  3840,  38400, 384000,      0], [  3200,  32000, 320000,      0]]], // 40 ms
    [[[  3840,  38400, 384000, 768000], [  3200,  32000, 320000, 640000]], [[  3840,  38400, 384000,      0], [  3200,  32000, 320000,      0]]], // 80 ms
    [[[  3840,  38400, 384000, 768000], [  3200,  32000, 320000, 640000]], [[  3840,  38400, 384000,      0], [  3200,  32000, 320000,      0]]], // 200 ms
    [[[  3840,  38400, 384000, 768000], [  3200,  32000, 320000, 640000]], [[  3840,  38400, 384000,      0], [  3200,  32000, 320000,      0]]], // 400 ms
    [[[  3840,  38400, 384000, 768000], [  3200,  32000, 320000, 640000]], [[  3840,  38400, 384000,      0], [  3200,  32000, 320000,      0]]], // 800 ms
    [[[  3840,  38400, 384000, 768000], [  3200,  32000, 320000, 640000]], [[  3840,  38400, 384000,      0], [  3200,  32000, 320000,      0]]], // 2 s
    [[[  3840,  38400, 384000, 768000], [  3200,  32000, 320000, 640000]], [[  3840,  38400, 384000,      0], [  3200,  32000, 320000,      0]]], // 4 s
    [[[  3840,  38400, 384000, 768000], [  3200,  32000, 320000, 640000]], [[  3840,  38400, 384000,      0], [  3200,  32000, 320000,      0]]], // 8 s
    [[[  3840,  38400, 384000, 768000], [  3200,  32000, 320000, 640000]], [[  3840,  38400, 384000,      0], [  3200,  32000, 320000,      0]]], // 20 s
    [[[  3840,  38400, 384000, 768000], [  3200,  32000, 320000, 640000]], [[  3840,  38400, 384000,      0], [  3200,  32000, 320000,      0]]], // 40 s
];

/// `[window timebase][both channels][depth]` sample rate in Sa/s, 0 where the depth is unusable.
#[rustfmt::skip]
static SAMPLE_RATE: [[[u32; 4]; 2]; 32] = [
    [[1000000000,  400000000,  400000000,  400000000], [ 500000000,  200000000,  200000000,          0]], // 2 ns
    [[1000000000,  400000000,  400000000,  400000000], [ 500000000,  200000000,  200000000,          0]], // 4 ns
    [[1000000000,  400000000,  400000000,  400000000], [ 500000000,  200000000,  200000000,          0]], // 8 ns
    [[ 800000000,  400000000,  400000000,  400000000], [ 400000000,  200000000,  200000000,          0]], // 20 ns
    [[ 800000000,  400000000,  400000000,  400000000], [ 400000000,  200000000,  200000000,          0]], // 40 ns
    [[ 800000000,  400000000,  400000000,  400000000], [ 400000000,  200000000,  200000000,          0]], // 80 ns
    [[ 800000000,  400000000,  400000000,  400000000], [ 400000000,  200000000,  200000000,          0]], // 200 ns
    [[ 400000000,  400000000,  400000000,  400000000], [ 400000000,  200000000,  200000000,          0]], // 400 ns
    [[ 200000000,  400000000,  400000000,  400000000], [ 200000000,  200000000,  200000000,          0]], // 800 ns
    [[ 100000000,  400000000,  400000000,  400000000], [ 100000000,  200000000,  200000000,          0]], // 2 us
    [[  50000000,  400000000,  400000000,  400000000], [  50000000,  200000000,  200000000,          0]], // 4 us
    [[  25000000,  200000000,  400000000,  400000000], [  25000000,  200000000,  200000000,          0]], // 8 us
    [[  10000000,  100000000,  400000000,  400000000], [  10000000,  100000000,  200000000,          0]], // 20 us
    [[   5000000,   50000000,  400000000,  400000000], [   5000000,   50000000,  200000000,          0]], // 40 us
    [[   2500000,   25000000,  200000000,  400000000], [   2500000,   25000000,  200000000,          0]], // 80 us
    [[   1000000,   10000000,  100000000,          0], [   1000000,   10000000,  100000000,          0]], // 200 us
    [[    500000,    5000000,   50000000,  100000000], [    500000,    5000000,   50000000,          0]], // 400 us
    [[    250000,    2500000,   25000000,   50000000], [    250000,    2500000,   25000000,          0]], // 800 us
    [[    100000,    1000000,   10000000,   20000000], [    100000,    1000000,   10000000,          0]], // 2 ms
    [[     50000,     500000,    5000000,   10000000], [     50000,     500000,    5000000,          0]], // 4 ms
    [[     25000,     250000,    2500000,    5000000], [     25000,     250000,    2500000,          0]], // 8 ms
    [[     10000,     100000,    1000000,    2000000], [     10000,     100000,    1000000,          0]], // 20 ms
    [[      5000,      50000,     500000,    1000000], [      5000,      50000,     500000,          0]], // 40 ms
    [[      2500,      25000,     250000,     500000], [      2500,      25000,     250000,          0]], // 80 ms
    [[      1000,      10000,     100000,     200000], [      1000,      10000,     100000,          0]], // 200 ms
    [[       500,       5000,      50000,     100000], [       500,       5000,      50000,          0]], // 400 ms
    [[       250,       2500,      25000,      50000], [       250,       2500,      25000,          0]], // 800 ms
    [[       100,       1000,      10000,      20000], [       100,       1000,      10000,          0]], // 2 s
    [[        50,        500,       5000,      10000], [        50,        500,       5000,          0]], // 4 s
    [[        25,        250,       2500,       5000], [        25,        250,       2500,          0]], // 8 s
    [[        10,        100,       1000,       2000], [        10,        100,       1000,          0]], // 20 s
    [[         5,         50,        500,       1000], [         5,         50,        500,          0]], // 40 s
];

pub fn sample_count(tb: Timebase, both_channels: bool, menu_visible: bool, depth: MemoryDepth) -> u32 {
    SAMPLE_COUNT[tb.index()][both_channels as usize][menu_visible as usize][depth.rate_index()]
}

pub fn max_sample_rate(tb: Timebase, both_channels: bool, depth: MemoryDepth) -> u32 {
    SAMPLE_RATE[tb.index()][both_channels as usize][depth.rate_index()]
}

/// Effective sample rate: samples on screen divided by the time span shown.
///
/// Computed in integers, the 19.2 divisions without menu being 96/5.
pub fn samplerate(tb: Timebase, both_channels: bool, menu_visible: bool, depth: MemoryDepth) -> u64 {
    let samples = sample_count(tb, both_channels, menu_visible, depth) as u64;
    let Rational { num, den } = tb.window_duration();
    let (hdiv_num, hdiv_den) = if menu_visible {
        (NUM_HDIV_MENU_ON as u64, 1)
    } else {
        NUM_HDIV_MENU_OFF
    };
    samples * den * hdiv_den / (num * hdiv_num)
}
