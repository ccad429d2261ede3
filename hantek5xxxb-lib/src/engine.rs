//! Periodic acquisition: change reporting and sample streaming.
//!
//! The engine owns no timer. [`Dso::start`] registers a tick source with a
//! [`TickScheduler`] and the caller invokes [`Dso::tick`] at that interval.

use strum_macros::Display;
use tracing::{debug, error, info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::config::ConfigKey;
use crate::constants::{
    CHUNK_RECEIVE_SIZE, NUM_CHANNELS, SAMPLE_CHUNK_LAST, SAMPLE_CHUNK_MORE, SAMPLE_CHUNK_PREFIX, SAMPLE_NOT_AVAILABLE,
    SAMPLE_STATUS_READY, STATUS_RECEIVE_SIZE, SUB_READ_SAMPLES,
};
use crate::device::{Dso, describe, lock};
use crate::error::{Error, FramingError, Result};
use crate::frame::Command;
use crate::link::Link;
use crate::session::{AnalogPacket, LimitTracker, SessionSink, TickScheduler};
use crate::sysdata::SysData;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AcquisitionState {
    #[default]
    Idle,
    Capturing,
    Stopping,
}

/// Register fields reported together, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldGroup {
    Enabled(usize),
    Vdiv(usize),
    Coupling(usize),
    Filter(usize),
    Probe(usize),
    TriggerSource,
    TriggerSlope,
    TriggerLevel,
    TriggerPosition,
    Timebase,
    Menu,
    StoreDepth,
    AcquireMode,
    AverageCount,
}

#[rustfmt::skip]
const FIELD_GROUPS: [FieldGroup; 19] = [
    FieldGroup::Enabled(0), FieldGroup::Vdiv(0), FieldGroup::Coupling(0), FieldGroup::Filter(0), FieldGroup::Probe(0),
    FieldGroup::Enabled(1), FieldGroup::Vdiv(1), FieldGroup::Coupling(1), FieldGroup::Filter(1), FieldGroup::Probe(1),
    FieldGroup::TriggerSource,
    FieldGroup::TriggerSlope,
    FieldGroup::TriggerLevel,
    FieldGroup::TriggerPosition,
    FieldGroup::Timebase,
    FieldGroup::Menu,
    FieldGroup::StoreDepth,
    FieldGroup::AcquireMode,
    FieldGroup::AverageCount,
];

impl FieldGroup {
    fn changed(self, old: &SysData, new: &SysData) -> bool {
        match self {
            FieldGroup::Enabled(ch) => old.vert[ch].disp != new.vert[ch].disp,
            FieldGroup::Vdiv(ch) => old.vert[ch].vb != new.vert[ch].vb,
            FieldGroup::Coupling(ch) => old.vert[ch].coup != new.vert[ch].coup,
            FieldGroup::Filter(ch) => old.vert[ch].f20mhz != new.vert[ch].f20mhz,
            FieldGroup::Probe(ch) => old.vert[ch].probe != new.vert[ch].probe,
            FieldGroup::TriggerSource => old.trig.src != new.trig.src,
            FieldGroup::TriggerSlope => old.trig.detail.edge_slope != new.trig.detail.edge_slope,
            FieldGroup::TriggerLevel => old.trig.vpos != new.trig.vpos,
            FieldGroup::TriggerPosition => old.horiz.trigtime != new.horiz.trigtime,
            FieldGroup::Timebase => old.horiz.tb != new.horiz.tb || old.horiz.win_tb != new.horiz.win_tb,
            FieldGroup::Menu => old.control.disp_menu != new.control.disp_menu,
            FieldGroup::StoreDepth => old.acquire.store_depth != new.acquire.store_depth,
            FieldGroup::AcquireMode => old.acquire.mode != new.acquire.mode,
            FieldGroup::AverageCount => old.acquire.avg_cnt != new.acquire.avg_cnt,
        }
    }

    fn adopt(self, from: &SysData, into: &mut SysData) {
        match self {
            FieldGroup::Enabled(ch) => into.vert[ch].disp = from.vert[ch].disp,
            FieldGroup::Vdiv(ch) => into.vert[ch].vb = from.vert[ch].vb,
            FieldGroup::Coupling(ch) => into.vert[ch].coup = from.vert[ch].coup,
            FieldGroup::Filter(ch) => into.vert[ch].f20mhz = from.vert[ch].f20mhz,
            FieldGroup::Probe(ch) => into.vert[ch].probe = from.vert[ch].probe,
            FieldGroup::TriggerSource => into.trig.src = from.trig.src,
            FieldGroup::TriggerSlope => into.trig.detail.edge_slope = from.trig.detail.edge_slope,
            FieldGroup::TriggerLevel => into.trig.vpos = from.trig.vpos,
            FieldGroup::TriggerPosition => into.horiz.trigtime = from.horiz.trigtime,
            FieldGroup::Timebase => {
                into.horiz.tb = from.horiz.tb;
                into.horiz.win_tb = from.horiz.win_tb;
            }
            FieldGroup::Menu => into.control.disp_menu = from.control.disp_menu,
            FieldGroup::StoreDepth => into.acquire.store_depth = from.acquire.store_depth,
            FieldGroup::AcquireMode => into.acquire.mode = from.acquire.mode,
            FieldGroup::AverageCount => into.acquire.avg_cnt = from.acquire.avg_cnt,
        }
    }

    fn key(self) -> (ConfigKey, Option<usize>) {
        match self {
            FieldGroup::Enabled(ch) => (ConfigKey::Enabled, Some(ch)),
            FieldGroup::Vdiv(ch) => (ConfigKey::Vdiv, Some(ch)),
            FieldGroup::Coupling(ch) => (ConfigKey::Coupling, Some(ch)),
            FieldGroup::Filter(ch) => (ConfigKey::Filter, Some(ch)),
            FieldGroup::Probe(ch) => (ConfigKey::ProbeFactor, Some(ch)),
            FieldGroup::TriggerSource => (ConfigKey::TriggerSource, None),
            FieldGroup::TriggerSlope => (ConfigKey::TriggerSlope, None),
            FieldGroup::TriggerLevel => (ConfigKey::TriggerLevel, None),
            FieldGroup::TriggerPosition => (ConfigKey::HorizTriggerpos, None),
            FieldGroup::Timebase => (ConfigKey::Timebase, None),
            FieldGroup::Menu => (ConfigKey::NumHdiv, None),
            FieldGroup::StoreDepth => (ConfigKey::Buffersize, None),
            FieldGroup::AcquireMode => (ConfigKey::Averaging, None),
            FieldGroup::AverageCount => (ConfigKey::AvgSamples, None),
        }
    }
}

/// Reports at most one changed field group of `fresh` and folds it into `reported`.
///
/// Further changes stay pending in `reported` and are reported by later ticks.
/// A trigger level without a channel source has no value and is folded in
/// silently. Once no group differs any more, the rest of the snapshot is
/// adopted as is.
fn report_change<S>(reported: &mut SysData, fresh: &SysData, sink: &mut S) -> Result<()>
where
    S: SessionSink + ?Sized,
{
    if reported == fresh {
        return Ok(());
    }
    for group in FIELD_GROUPS {
        if !group.changed(reported, fresh) {
            continue;
        }
        let (key, channel) = group.key();
        match describe(fresh, key, channel) {
            Ok(value) => {
                info!(%key, ?channel, %value, "SysDATA changed");
                group.adopt(fresh, reported);
                sink.send_metadata_changed(key, channel, value);
                return Ok(());
            }
            Err(Error::NotApplicable(_)) => {
                debug!(%key, "Changed without a reportable value");
                group.adopt(fresh, reported);
            }
            Err(e) => return Err(e),
        }
    }
    *reported = fresh.clone();
    Ok(())
}

/// Reads one frame of `index` if the channel is enabled and the scope has
/// new data, streaming every chunk to `sink` as it arrives.
fn retrieve_samples<T, S, L>(
    link: &mut Link<T>,
    sys: &SysData,
    index: usize,
    chunk_error_limit: u32,
    sink: &mut S,
    limits: &mut L,
) -> Result<()>
where
    T: Transport,
    S: SessionSink + ?Sized,
    L: LimitTracker + ?Sized,
{
    if !sys.channel_enabled(index) {
        return Ok(());
    }
    let channel = sys.channel(index)?;

    let status = link.request(
        Command::ReadSampleData,
        &[SUB_READ_SAMPLES, index as u8],
        STATUS_RECEIVE_SIZE,
    )?;
    match status.sub_command()? {
        SAMPLE_STATUS_READY => {}
        SAMPLE_NOT_AVAILABLE => {
            info!("New data is not available for {}", channel.name());
            return Ok(());
        }
        other => {
            error!("Sample status for {} is {:#04x}", channel.name(), other);
            return Err(FramingError::SubCommand {
                expected: SAMPLE_STATUS_READY,
                actual: other,
            }
            .into());
        }
    }
    let declared = match status.payload.get(1..4) {
        Some(&[lo, mid, hi]) => u64::from(u32::from_le_bytes([lo, mid, hi, 0])),
        _ => {
            return Err(FramingError::TooShort {
                actual: status.payload.len(),
            }
            .into());
        }
    };

    let vdiv = channel.volts_per_div();
    let digits = channel.digits();
    debug!(channel = index, declared, vdiv, digits, "Frame begin");
    sink.send_frame_begin();

    // Every begun frame is closed, whether or not the chunks arrive.
    let read = read_chunks(link, &channel, digits, chunk_error_limit, sink);
    sink.send_frame_end();
    let read = read?;

    if read != declared {
        warn!("{}: declared {} samples, read {}", channel.name(), declared, read);
    }
    limits.update_samples_read(read);
    limits.update_frames_read(1);
    Ok(())
}

/// Streams the chunks of one frame to `sink` and returns the sample count.
fn read_chunks<T, S>(
    link: &mut Link<T>,
    channel: &Channel,
    digits: i32,
    chunk_error_limit: u32,
    sink: &mut S,
) -> Result<u64>
where
    T: Transport,
    S: SessionSink + ?Sized,
{
    let mut read = 0u64;
    let mut errors = 0u32;
    loop {
        let chunk = link.receive(Command::ReadSampleData, CHUNK_RECEIVE_SIZE)?;
        match chunk.sub_command()? {
            SAMPLE_CHUNK_LAST => return Ok(read),
            SAMPLE_CHUNK_MORE => {}
            SAMPLE_NOT_AVAILABLE => {
                errors += 1;
                warn!("Error while reading data for {} ({} so far)", channel.name(), errors);
                if errors > chunk_error_limit {
                    return Err(Error::SampleChunk {
                        channel: channel.index,
                        errors,
                    });
                }
                continue;
            }
            other => {
                warn!("Unexpected chunk status {:#04x} for {}", other, channel.name());
                return Ok(read);
            }
        }

        let data = chunk.payload.get(SAMPLE_CHUNK_PREFIX..).unwrap_or_default();
        read += data.len() as u64;
        sink.send_data_frame(AnalogPacket {
            channel: channel.index,
            samples: channel.decode_chunk(data),
            digits,
        });
    }
}

impl<T: Transport, L: LimitTracker> Dso<T, L> {
    /// Starts an acquisition: one header event, then periodic ticks.
    pub fn start<S, K>(&self, sink: &mut S, scheduler: &mut K) -> Result<()>
    where
        S: SessionSink + ?Sized,
        K: TickScheduler + ?Sized,
    {
        {
            let mut state = lock(&self.state);
            if *state != AcquisitionState::Idle {
                return Err(Error::InvalidState { state: *state });
            }
            *state = AcquisitionState::Capturing;
        }
        // Without a published snapshot the first tick becomes the baseline.
        *lock(&self.reported) = self.registry.published();
        lock(&self.limits).acquisition_start();

        info!("Acquisition started");
        sink.send_header();
        scheduler.add_source(self.config.poll_interval);
        Ok(())
    }

    /// Asks a running acquisition to stop. The next tick ends it.
    pub fn request_stop(&self) {
        let mut state = lock(&self.state);
        if *state == AcquisitionState::Capturing {
            info!("Stopping acquisition");
            *state = AcquisitionState::Stopping;
        }
    }

    /// One poll of a running acquisition; returns the state afterwards.
    ///
    /// While capturing, the snapshot is read fresh, at most one change is
    /// reported and a frame is read from every enabled channel. A stopping
    /// acquisition ends here. On failure the acquisition ends as well and the
    /// error is returned.
    pub fn tick<S, K>(&self, sink: &mut S, scheduler: &mut K) -> Result<AcquisitionState>
    where
        S: SessionSink + ?Sized,
        K: TickScheduler + ?Sized,
    {
        match self.state() {
            AcquisitionState::Idle => Ok(AcquisitionState::Idle),
            AcquisitionState::Stopping => {
                self.finish(sink, scheduler);
                Ok(AcquisitionState::Idle)
            }
            AcquisitionState::Capturing => match self.capture(sink) {
                Ok(()) => Ok(self.state()),
                Err(e) => {
                    error!("Acquisition failed: {}", e);
                    self.finish(sink, scheduler);
                    Err(e)
                }
            },
        }
    }

    fn capture<S>(&self, sink: &mut S) -> Result<()>
    where
        S: SessionSink + ?Sized,
    {
        let mut registry = self.registry.lock();
        let fresh = registry.fetch()?;
        {
            let mut reported = lock(&self.reported);
            match reported.as_mut() {
                Some(reported) => report_change(reported, &fresh, sink)?,
                None => {
                    debug!("Baseline snapshot for change reporting");
                    *reported = Some(fresh.clone());
                }
            }
        }
        registry.publish(fresh.clone());

        let mut limits = lock(&self.limits);
        for index in 0..NUM_CHANNELS {
            retrieve_samples(
                registry.link_mut(),
                &fresh,
                index,
                self.config.chunk_error_limit,
                sink,
                &mut *limits,
            )?;
        }
        drop(registry);

        let exceeded = limits.check_exceeded();
        drop(limits);
        if exceeded {
            info!("Acquisition limits reached");
            self.request_stop();
        }
        Ok(())
    }

    fn finish<S, K>(&self, sink: &mut S, scheduler: &mut K)
    where
        S: SessionSink + ?Sized,
        K: TickScheduler + ?Sized,
    {
        debug!("Stopping acquisition.");
        scheduler.remove_source();
        sink.send_end();
        *lock(&self.state) = AcquisitionState::Idle;
    }
}
