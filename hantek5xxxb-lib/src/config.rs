use std::fmt;
use std::time::Duration;

use strum_macros::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CHUNK_ERROR_LIMIT, DEFAULT_POLL_INTERVAL, DEFAULT_RECEIVE_TIMEOUT, DEFAULT_SEND_TIMEOUT, ENDPOINT_IN,
    ENDPOINT_OUT, USB_INTERFACE, USB_PRODUCT_ID, USB_VENDOR_ID,
};
use crate::frame::Marker;
use crate::tables::Rational;

/// Driver tunables. `Default` matches the stock firmware.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DriverConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface: u8,
    pub endpoint_in: u8,
    pub endpoint_out: u8,
    /// Restrict to the device at `bus.address`
    pub conn: Option<String>,
    pub send_timeout: Duration,
    pub receive_timeout: Duration,
    pub poll_interval: Duration,
    /// Error-tagged sample chunks accepted per frame before the retrieval fails
    pub chunk_error_limit: u32,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub marker: Marker,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            vendor_id: USB_VENDOR_ID,
            product_id: USB_PRODUCT_ID,
            interface: USB_INTERFACE,
            endpoint_in: ENDPOINT_IN,
            endpoint_out: ENDPOINT_OUT,
            conn: None,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            chunk_error_limit: DEFAULT_CHUNK_ERROR_LIMIT,
            marker: Marker::Normal,
        }
    }
}

/// Settings exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum ConfigKey {
    Conn,
    LimitSamples,
    LimitFrames,
    LimitMsec,
    NumVdiv,
    NumHdiv,
    Timebase,
    Samplerate,
    TriggerSource,
    TriggerSlope,
    TriggerLevel,
    HorizTriggerpos,
    Buffersize,
    Averaging,
    AvgSamples,
    // per channel
    Enabled,
    Vdiv,
    Coupling,
    Filter,
    ProbeFactor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub get: bool,
    pub set: bool,
    pub list: bool,
}

impl Capabilities {
    const GET: Self = Self {
        get: true,
        set: false,
        list: false,
    };
    const GET_SET: Self = Self {
        get: true,
        set: true,
        list: false,
    };
    const ALL: Self = Self {
        get: true,
        set: true,
        list: true,
    };
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [(self.get, "get"), (self.set, "set"), (self.list, "list")];
        let names: Vec<&str> = flags.iter().filter(|(on, _)| *on).map(|(_, n)| *n).collect();
        f.write_str(&names.join("/"))
    }
}

/// Device wide keys.
pub const DEVICE_OPTIONS: [ConfigKey; 15] = [
    ConfigKey::Conn,
    ConfigKey::LimitMsec,
    ConfigKey::LimitSamples,
    ConfigKey::LimitFrames,
    ConfigKey::NumVdiv,
    ConfigKey::NumHdiv,
    ConfigKey::Timebase,
    ConfigKey::Samplerate,
    ConfigKey::TriggerSource,
    ConfigKey::TriggerSlope,
    ConfigKey::TriggerLevel,
    ConfigKey::HorizTriggerpos,
    ConfigKey::Buffersize,
    ConfigKey::Averaging,
    ConfigKey::AvgSamples,
];

/// Keys addressed to one analog channel.
pub const CHANNEL_OPTIONS: [ConfigKey; 5] = [
    ConfigKey::Enabled,
    ConfigKey::Vdiv,
    ConfigKey::Coupling,
    ConfigKey::Filter,
    ConfigKey::ProbeFactor,
];

impl ConfigKey {
    pub fn from_name(name: &str) -> Option<Self> {
        DEVICE_OPTIONS
            .into_iter()
            .chain(CHANNEL_OPTIONS)
            .find(|key| key.to_string() == name)
    }

    pub fn is_channel_key(self) -> bool {
        CHANNEL_OPTIONS.contains(&self)
    }

    pub fn capabilities(self) -> Capabilities {
        match self {
            ConfigKey::Conn | ConfigKey::NumVdiv | ConfigKey::NumHdiv | ConfigKey::Samplerate => Capabilities::GET,
            ConfigKey::LimitSamples
            | ConfigKey::LimitFrames
            | ConfigKey::LimitMsec
            | ConfigKey::TriggerLevel
            | ConfigKey::Averaging
            | ConfigKey::Enabled
            | ConfigKey::Filter => Capabilities::GET_SET,
            ConfigKey::Timebase
            | ConfigKey::TriggerSource
            | ConfigKey::TriggerSlope
            | ConfigKey::HorizTriggerpos
            | ConfigKey::Buffersize
            | ConfigKey::AvgSamples
            | ConfigKey::Vdiv
            | ConfigKey::Coupling
            | ConfigKey::ProbeFactor => Capabilities::ALL,
        }
    }

    /// Shape of the value `set` expects for this key.
    pub fn value_kind(self) -> ValueKind {
        match self {
            ConfigKey::Conn | ConfigKey::TriggerSource | ConfigKey::TriggerSlope | ConfigKey::Coupling => {
                ValueKind::Str
            }
            ConfigKey::LimitSamples
            | ConfigKey::LimitFrames
            | ConfigKey::LimitMsec
            | ConfigKey::Samplerate
            | ConfigKey::Buffersize
            | ConfigKey::AvgSamples
            | ConfigKey::ProbeFactor => ValueKind::U64,
            ConfigKey::NumVdiv | ConfigKey::NumHdiv => ValueKind::I32,
            ConfigKey::TriggerLevel | ConfigKey::HorizTriggerpos => ValueKind::F64,
            ConfigKey::Averaging | ConfigKey::Enabled | ConfigKey::Filter => ValueKind::Bool,
            ConfigKey::Timebase | ConfigKey::Vdiv => ValueKind::Rational,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    U64,
    I32,
    F64,
    Str,
    Rational,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConfigValue {
    Bool(bool),
    U64(u64),
    I32(i32),
    F64(f64),
    Str(String),
    Rational(Rational),
    StrList(Vec<String>),
    U64List(Vec<u64>),
    RationalList(Vec<Rational>),
    MinMaxStep { min: f64, max: f64, step: f64 },
}

impl ConfigValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ConfigValue::U64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_rational(&self) -> Option<Rational> {
        match self {
            ConfigValue::Rational(v) => Some(*v),
            _ => None,
        }
    }

    /// Parses a command line argument into the shape `kind` expects.
    ///
    /// Rationals are written `num/den`, booleans `true`/`false`/`on`/`off`.
    pub fn parse(kind: ValueKind, text: &str) -> Option<Self> {
        let text = text.trim();
        match kind {
            ValueKind::Bool => match text {
                "true" | "on" | "1" => Some(ConfigValue::Bool(true)),
                "false" | "off" | "0" => Some(ConfigValue::Bool(false)),
                _ => None,
            },
            ValueKind::U64 => text.parse().ok().map(ConfigValue::U64),
            ValueKind::I32 => text.parse().ok().map(ConfigValue::I32),
            ValueKind::F64 => text.parse().ok().map(ConfigValue::F64),
            ValueKind::Str => Some(ConfigValue::Str(text.to_owned())),
            ValueKind::Rational => {
                let (num, den) = text.split_once('/').unwrap_or((text, "1"));
                let num = num.trim().parse().ok()?;
                let den = den.trim().parse().ok()?;
                (den != 0).then(|| ConfigValue::Rational(Rational::new(num, den)))
            }
        }
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(v) => write!(f, "{v}"),
            ConfigValue::U64(v) => write!(f, "{v}"),
            ConfigValue::I32(v) => write!(f, "{v}"),
            ConfigValue::F64(v) => write!(f, "{v}"),
            ConfigValue::Str(v) => f.write_str(v),
            ConfigValue::Rational(v) => write!(f, "{v}"),
            ConfigValue::StrList(v) => f.write_str(&join(v)),
            ConfigValue::U64List(v) => f.write_str(&join(v)),
            ConfigValue::RationalList(v) => f.write_str(&join(v)),
            ConfigValue::MinMaxStep { min, max, step } => write!(f, "{min}..{max} step {step}"),
        }
    }
}
