use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::config::{ConfigKey, ConfigValue, DriverConfig};
use crate::constants::{ECHO_RECEIVE_SIZE, NUM_CHANNELS, NUM_HDIV_MENU_OFF_INT, NUM_HDIV_MENU_ON, NUM_VDIV_INT};
use crate::engine::AcquisitionState;
use crate::error::{Error, Result};
use crate::frame::Command;
use crate::link::Link;
use crate::registry::SysDataRegistry;
use crate::sample;
use crate::session::{LimitKind, LimitTracker, SoftwareLimits};
use crate::sysdata::SysData;
use crate::tables::{
    self, AVERAGE_COUNTS, AcquireMode, Coupling, MemoryDepth, Model, ProbeFactor, Timebase, TriggerSlope,
    TriggerSource, average_code, decode_code, volts_base_from_vdiv, volts_per_div_list,
};
use crate::transport::Transport;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// An opened Hantek 5xxxB scope.
///
/// All methods take `&self`: the handle is meant to be shared between the
/// thread driving [`tick`](Self::tick) and foreground configuration calls.
/// Wire traffic is serialized by the register registry.
pub struct Dso<T, L = SoftwareLimits> {
    pub(crate) config: DriverConfig,
    pub(crate) registry: SysDataRegistry<T>,
    pub(crate) state: Mutex<AcquisitionState>,
    pub(crate) limits: Mutex<L>,
    /// Snapshot as far as it has been reported to the session, `None` until
    /// the acquisition has a baseline.
    pub(crate) reported: Mutex<Option<SysData>>,
    connection_id: Option<String>,
}

impl<T: Transport> Dso<T> {
    pub fn open(transport: T, config: DriverConfig) -> Result<Self> {
        Self::with_limits(transport, config, SoftwareLimits::default())
    }
}

impl<T: Transport, L: LimitTracker> Dso<T, L> {
    /// Opens and claims `transport` and wraps it with a custom limit tracker.
    pub fn with_limits(mut transport: T, config: DriverConfig, limits: L) -> Result<Self> {
        transport.open()?;
        if let Err(e) = transport.claim() {
            if let Err(close_err) = transport.close() {
                warn!("Closing after failed claim: {}", close_err);
            }
            return Err(e.into());
        }
        let connection_id = transport.connection_id();
        info!(conn = ?connection_id, "Device opened");

        Ok(Self {
            registry: SysDataRegistry::new(Link::new(transport, config.clone())),
            config,
            state: Mutex::new(AcquisitionState::Idle),
            limits: Mutex::new(limits),
            reported: Mutex::new(None),
            connection_id,
        })
    }

    pub fn close(self) -> Result<()> {
        let mut transport = self.registry.into_link().into_inner();
        transport.close()?;
        Ok(())
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    pub fn state(&self) -> AcquisitionState {
        *lock(&self.state)
    }

    /// Last snapshot read from the device, without wire traffic.
    pub fn shadow(&self) -> SysData {
        self.registry.shadow()
    }

    /// Reads and publishes a fresh snapshot.
    pub fn refresh(&self) -> Result<SysData> {
        self.registry.lock().refresh()
    }

    pub fn limits(&self) -> MutexGuard<'_, L> {
        lock(&self.limits)
    }

    pub fn model(&self) -> Result<Model> {
        Ok(self.snapshot()?.model())
    }

    pub fn channel(&self, index: usize) -> Result<Channel> {
        self.snapshot()?.channel(index)
    }

    /// Sends `data` with the echo command and returns what came back.
    pub fn echo(&self, data: &[u8]) -> Result<Bytes> {
        let mut registry = self.registry.lock();
        let frame = registry.link_mut().request(Command::Echo, data, ECHO_RECEIVE_SIZE)?;
        if frame.payload.as_ref() != data {
            warn!(sent = hex::encode(data), received = hex::encode(&frame.payload), "Echo differs");
        }
        Ok(frame.payload)
    }

    /// Fresh snapshot, or the published one while an acquisition keeps it current.
    fn snapshot(&self) -> Result<SysData> {
        if self.state() == AcquisitionState::Capturing {
            Ok(self.registry.shadow())
        } else {
            self.refresh()
        }
    }

    pub fn config_get(&self, key: ConfigKey, channel: Option<usize>) -> Result<ConfigValue> {
        let channel = check_channel(key, channel)?;
        if let Some(kind) = LimitKind::from_key(key) {
            return Ok(ConfigValue::U64(self.limits().limit(kind)));
        }
        match key {
            ConfigKey::Conn => self
                .connection_id
                .clone()
                .map(ConfigValue::Str)
                .ok_or(Error::NotApplicable(key)),
            ConfigKey::NumVdiv => Ok(ConfigValue::I32(NUM_VDIV_INT)),
            _ => describe(&self.snapshot()?, key, channel),
        }
    }

    /// Changes one setting with a read-modify-write of the whole snapshot.
    ///
    /// The snapshot is always read fresh, even during an acquisition.
    pub fn config_set(&self, key: ConfigKey, channel: Option<usize>, value: ConfigValue) -> Result<()> {
        let channel = check_channel(key, channel)?;
        if !key.capabilities().set {
            return Err(Error::NotApplicable(key));
        }
        if let Some(kind) = LimitKind::from_key(key) {
            let limit = value
                .as_u64()
                .ok_or_else(|| Error::invalid(format!("{key} expects an unsigned integer")))?;
            self.limits().set_limit(kind, limit);
            return Ok(());
        }

        debug!(%key, ?channel, %value, "Config set");
        self.registry
            .lock()
            .modify(|current, pending| apply(current, pending, key, channel, &value))?;
        Ok(())
    }

    pub fn config_list(&self, key: ConfigKey, channel: Option<usize>) -> Result<ConfigValue> {
        let channel = check_channel(key, channel)?;
        if !key.capabilities().list {
            return Err(Error::NotApplicable(key));
        }
        let value = match key {
            ConfigKey::Timebase => {
                ConfigValue::RationalList(Timebase::all().map(Timebase::window_duration).collect())
            }
            ConfigKey::TriggerSource => names(TriggerSource::ALL),
            ConfigKey::TriggerSlope => names(TriggerSlope::ALL),
            // estimated bounds
            ConfigKey::HorizTriggerpos => ConfigValue::MinMaxStep {
                min: -1.0,
                max: 1.0,
                step: 1e-9,
            },
            ConfigKey::Buffersize => ConfigValue::U64List(MemoryDepth::ALL.iter().map(|d| d.samples()).collect()),
            ConfigKey::AvgSamples => ConfigValue::U64List(AVERAGE_COUNTS.to_vec()),
            ConfigKey::Coupling => names(Coupling::ALL),
            ConfigKey::ProbeFactor => ConfigValue::U64List(ProbeFactor::ALL.iter().map(|p| p.factor()).collect()),
            ConfigKey::Vdiv => {
                let index = channel.ok_or(Error::NotApplicable(key))?;
                let probe: ProbeFactor = decode_code("vert.probe", self.snapshot()?.vert[index].probe)?;
                ConfigValue::RationalList(volts_per_div_list(probe).to_vec())
            }
            _ => return Err(Error::NotApplicable(key)),
        };
        Ok(value)
    }
}

fn names<V: ToString>(values: impl IntoIterator<Item = V>) -> ConfigValue {
    ConfigValue::StrList(values.into_iter().map(|v| v.to_string()).collect())
}

/// Channel keys need a valid channel index, device keys must not have one.
fn check_channel(key: ConfigKey, channel: Option<usize>) -> Result<Option<usize>> {
    match (key.is_channel_key(), channel) {
        (true, Some(index)) if index < NUM_CHANNELS => Ok(Some(index)),
        (true, Some(index)) => Err(Error::invalid(format!("no channel {index}"))),
        (true, None) => Err(Error::invalid(format!("{key} needs a channel"))),
        (false, Some(_)) => Err(Error::NotApplicable(key)),
        (false, None) => Ok(None),
    }
}

fn expect_channel(key: ConfigKey, channel: Option<usize>) -> Result<usize> {
    channel.ok_or_else(|| Error::invalid(format!("{key} needs a channel")))
}

/// Value of a device backed key in `sys`.
pub(crate) fn describe(sys: &SysData, key: ConfigKey, channel: Option<usize>) -> Result<ConfigValue> {
    let value = match key {
        ConfigKey::NumVdiv => ConfigValue::I32(NUM_VDIV_INT),
        ConfigKey::NumHdiv => ConfigValue::I32(if sys.menu_visible() {
            NUM_HDIV_MENU_ON
        } else {
            NUM_HDIV_MENU_OFF_INT
        }),
        ConfigKey::Timebase => ConfigValue::Rational(sys.window_timebase()?.window_duration()),
        ConfigKey::Samplerate => ConfigValue::U64(sys.samplerate()?),
        ConfigKey::TriggerSource => ConfigValue::Str(sys.trigger_source()?.to_string()),
        ConfigKey::TriggerSlope => ConfigValue::Str(sys.trigger_slope()?.to_string()),
        ConfigKey::TriggerLevel => {
            let index = sys.trigger_source()?.channel().ok_or(Error::NotApplicable(key))?;
            let ch = sys.channel(index)?;
            ConfigValue::F64(sample::decode(sys.trig.vpos, ch.volts_per_div(), ch.offset) as f64)
        }
        ConfigKey::HorizTriggerpos => ConfigValue::F64(sys.trigger_position()),
        ConfigKey::Buffersize => ConfigValue::U64(sys.memory_depth()?.samples()),
        ConfigKey::Averaging => ConfigValue::Bool(sys.averaging()),
        ConfigKey::AvgSamples => ConfigValue::U64(sys.average_count()?),
        ConfigKey::Enabled => ConfigValue::Bool(sys.channel_enabled(expect_channel(key, channel)?)),
        ConfigKey::Filter => ConfigValue::Bool(sys.vert[expect_channel(key, channel)?].f20mhz != 0),
        ConfigKey::Vdiv => ConfigValue::Rational(sys.channel(expect_channel(key, channel)?)?.nominal_volts_per_div()),
        ConfigKey::Coupling => ConfigValue::Str(sys.channel(expect_channel(key, channel)?)?.coupling.to_string()),
        ConfigKey::ProbeFactor => ConfigValue::U64(sys.channel(expect_channel(key, channel)?)?.probe_factor()),
        ConfigKey::Conn | ConfigKey::LimitSamples | ConfigKey::LimitFrames | ConfigKey::LimitMsec => {
            return Err(Error::NotApplicable(key));
        }
    };
    Ok(value)
}

fn wrong_type(key: ConfigKey, value: &ConfigValue) -> Error {
    Error::invalid(format!("{value} is not a valid {key}"))
}

/// Writes `value` for `key` into `pending`; `current` is the device's view.
fn apply(
    current: &SysData,
    pending: &mut SysData,
    key: ConfigKey,
    channel: Option<usize>,
    value: &ConfigValue,
) -> Result<()> {
    let bad = || wrong_type(key, value);
    match key {
        ConfigKey::Timebase => {
            let tb = value
                .as_rational()
                .and_then(Timebase::from_window_duration)
                .ok_or_else(bad)?;
            set_timebase(current, pending, tb)?;
        }
        ConfigKey::TriggerSource => {
            let src = value.as_str().and_then(TriggerSource::from_name).ok_or_else(bad)?;
            pending.trig.src = src.into();
        }
        ConfigKey::TriggerSlope => {
            let slope = value.as_str().and_then(TriggerSlope::from_name).ok_or_else(bad)?;
            pending.trig.detail.edge_slope = slope.into();
        }
        ConfigKey::TriggerLevel => {
            let level = value.as_f64().ok_or_else(bad)?;
            let src = current.trigger_source()?;
            let index = src
                .channel()
                .ok_or_else(|| Error::invalid(format!("no trigger level with source {src}")))?;
            let ch = current.channel(index)?;
            pending.trig.vpos = sample::encode(level as f32, ch.volts_per_div(), ch.offset);
        }
        ConfigKey::HorizTriggerpos => {
            let seconds = value.as_f64().filter(|v| v.is_finite()).ok_or_else(bad)?;
            pending.horiz.trigtime = (seconds * 1e12).round() as i64;
        }
        ConfigKey::Buffersize => {
            let depth = value.as_u64().and_then(MemoryDepth::from_samples).ok_or_else(bad)?;
            pending.acquire.store_depth = depth.store_code();
        }
        ConfigKey::Averaging => {
            let on = value.as_bool().ok_or_else(bad)?;
            let mode = if on { AcquireMode::Average } else { AcquireMode::Normal };
            pending.acquire.mode = mode.into();
        }
        ConfigKey::AvgSamples => {
            pending.acquire.avg_cnt = value.as_u64().and_then(average_code).ok_or_else(bad)?;
        }
        ConfigKey::Enabled => {
            let on = value.as_bool().ok_or_else(bad)?;
            pending.vert[expect_channel(key, channel)?].disp = u8::from(on);
        }
        ConfigKey::Filter => {
            let on = value.as_bool().ok_or_else(bad)?;
            pending.vert[expect_channel(key, channel)?].f20mhz = u8::from(on);
        }
        ConfigKey::Vdiv => {
            let index = expect_channel(key, channel)?;
            let probe: ProbeFactor = decode_code("vert.probe", current.vert[index].probe)?;
            let base = value
                .as_rational()
                .and_then(|vdiv| volts_base_from_vdiv(probe, vdiv))
                .ok_or_else(bad)?;
            pending.vert[index].vb = base.into();
        }
        ConfigKey::Coupling => {
            let coupling = value.as_str().and_then(Coupling::from_name).ok_or_else(bad)?;
            pending.vert[expect_channel(key, channel)?].coup = coupling.into();
        }
        ConfigKey::ProbeFactor => {
            let probe = value.as_u64().and_then(ProbeFactor::from_factor).ok_or_else(bad)?;
            pending.vert[expect_channel(key, channel)?].probe = probe.into();
        }
        ConfigKey::Conn
        | ConfigKey::NumVdiv
        | ConfigKey::NumHdiv
        | ConfigKey::Samplerate
        | ConfigKey::LimitSamples
        | ConfigKey::LimitFrames
        | ConfigKey::LimitMsec => return Err(Error::NotApplicable(key)),
    }
    Ok(())
}

/// Sets the window timebase, stepping the memory depth down until the
/// sample rate table has an entry for the new timebase.
fn set_timebase(current: &SysData, pending: &mut SysData, tb: Timebase) -> Result<()> {
    let both = current.both_channels_enabled();
    let mut depth = current.memory_depth()?;
    while tables::max_sample_rate(tb, both, depth) == 0 {
        depth = depth
            .smaller()
            .ok_or_else(|| Error::invalid(format!("no memory depth fits timebase {tb}")))?;
    }
    if depth.store_code() != current.acquire.store_depth {
        info!(%tb, %depth, "Memory depth reduced for new timebase");
        pending.acquire.store_depth = depth.store_code();
    }
    pending.horiz.win_tb = tb.into();
    Ok(())
}
