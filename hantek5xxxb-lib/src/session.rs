//! Collaborators the acquisition talks to: where events go, when to stop and
//! who drives the periodic tick.

use std::time::{Duration, Instant};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::{ConfigKey, ConfigValue};

/// One decoded chunk of a channel's frame.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnalogPacket {
    pub channel: usize,
    /// Volts
    pub samples: Vec<f32>,
    /// Decimal places worth displaying
    pub digits: i32,
}

/// Receives the acquisition output.
pub trait SessionSink {
    /// Acquisition started.
    fn send_header(&mut self);
    fn send_frame_begin(&mut self);
    fn send_data_frame(&mut self, packet: AnalogPacket);
    fn send_frame_end(&mut self);
    /// A setting changed on the device. `channel` is set for per channel keys.
    fn send_metadata_changed(&mut self, key: ConfigKey, channel: Option<usize>, value: ConfigValue);
    /// Acquisition ended.
    fn send_end(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SessionEvent {
    Header,
    FrameBegin,
    Data(AnalogPacket),
    FrameEnd,
    MetadataChanged {
        key: ConfigKey,
        channel: Option<usize>,
        value: ConfigValue,
    },
    End,
}

/// Records every event, handy for tests and batch tools.
impl SessionSink for Vec<SessionEvent> {
    fn send_header(&mut self) {
        self.push(SessionEvent::Header);
    }

    fn send_frame_begin(&mut self) {
        self.push(SessionEvent::FrameBegin);
    }

    fn send_data_frame(&mut self, packet: AnalogPacket) {
        self.push(SessionEvent::Data(packet));
    }

    fn send_frame_end(&mut self) {
        self.push(SessionEvent::FrameEnd);
    }

    fn send_metadata_changed(&mut self, key: ConfigKey, channel: Option<usize>, value: ConfigValue) {
        self.push(SessionEvent::MetadataChanged { key, channel, value });
    }

    fn send_end(&mut self) {
        self.push(SessionEvent::End);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    Samples,
    Frames,
    Msec,
}

impl LimitKind {
    pub fn from_key(key: ConfigKey) -> Option<Self> {
        match key {
            ConfigKey::LimitSamples => Some(LimitKind::Samples),
            ConfigKey::LimitFrames => Some(LimitKind::Frames),
            ConfigKey::LimitMsec => Some(LimitKind::Msec),
            _ => None,
        }
    }
}

/// Decides when an acquisition has read enough.
pub trait LimitTracker {
    /// Resets the counters at acquisition start.
    fn acquisition_start(&mut self);
    fn update_samples_read(&mut self, samples: u64);
    fn update_frames_read(&mut self, frames: u64);
    fn check_exceeded(&self) -> bool;
    /// Configured limit, 0 when unlimited.
    fn limit(&self, kind: LimitKind) -> u64;
    fn set_limit(&mut self, kind: LimitKind, value: u64);
}

/// Sample, frame and wall clock limits counted in software.
#[derive(Debug, Clone, Default)]
pub struct SoftwareLimits {
    limit_samples: u64,
    limit_frames: u64,
    limit_msec: u64,
    samples_read: u64,
    frames_read: u64,
    start: Option<Instant>,
}

impl SoftwareLimits {
    pub fn samples_read(&self) -> u64 {
        self.samples_read
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

impl LimitTracker for SoftwareLimits {
    fn acquisition_start(&mut self) {
        self.samples_read = 0;
        self.frames_read = 0;
        self.start = Some(Instant::now());
    }

    fn update_samples_read(&mut self, samples: u64) {
        self.samples_read += samples;
    }

    fn update_frames_read(&mut self, frames: u64) {
        self.frames_read += frames;
    }

    fn check_exceeded(&self) -> bool {
        if self.limit_samples != 0 && self.samples_read >= self.limit_samples {
            return true;
        }
        if self.limit_frames != 0 && self.frames_read >= self.limit_frames {
            return true;
        }
        match self.start {
            Some(start) if self.limit_msec != 0 => {
                start.elapsed() >= Duration::from_millis(self.limit_msec)
            }
            _ => false,
        }
    }

    fn limit(&self, kind: LimitKind) -> u64 {
        match kind {
            LimitKind::Samples => self.limit_samples,
            LimitKind::Frames => self.limit_frames,
            LimitKind::Msec => self.limit_msec,
        }
    }

    fn set_limit(&mut self, kind: LimitKind, value: u64) {
        match kind {
            LimitKind::Samples => self.limit_samples = value,
            LimitKind::Frames => self.limit_frames = value,
            LimitKind::Msec => self.limit_msec = value,
        }
    }
}

/// Event loop hook registering the periodic acquisition tick.
pub trait TickScheduler {
    fn add_source(&mut self, interval: Duration);
    fn remove_source(&mut self);
}

/// Scheduler for callers that run their own loop: it only remembers whether
/// a tick source is registered and at which interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManualScheduler {
    interval: Option<Duration>,
}

impl ManualScheduler {
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn is_active(&self) -> bool {
        self.interval.is_some()
    }
}

impl TickScheduler for ManualScheduler {
    fn add_source(&mut self, interval: Duration) {
        self.interval = Some(interval);
    }

    fn remove_source(&mut self) {
        self.interval = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_by_default() {
        let mut limits = SoftwareLimits::default();
        limits.acquisition_start();
        limits.update_samples_read(1_000_000);
        limits.update_frames_read(100);
        assert!(!limits.check_exceeded());
    }

    #[test]
    fn test_frame_limit() {
        let mut limits = SoftwareLimits::default();
        limits.set_limit(LimitKind::Frames, 2);
        limits.acquisition_start();
        limits.update_frames_read(1);
        assert!(!limits.check_exceeded());
        limits.update_frames_read(1);
        assert!(limits.check_exceeded());

        limits.acquisition_start();
        assert!(!limits.check_exceeded());
        assert_eq!(limits.limit(LimitKind::Frames), 2);
    }

    #[test]
    fn test_sample_limit() {
        let mut limits = SoftwareLimits::default();
        limits.set_limit(LimitKind::Samples, 4000);
        limits.acquisition_start();
        limits.update_samples_read(3999);
        assert!(!limits.check_exceeded());
        limits.update_samples_read(1);
        assert!(limits.check_exceeded());
    }

    #[test]
    fn test_manual_scheduler() {
        let mut scheduler = ManualScheduler::default();
        scheduler.add_source(Duration::from_millis(1000));
        assert_eq!(scheduler.interval(), Some(Duration::from_millis(1000)));
        scheduler.remove_source();
        assert!(!scheduler.is_active());
    }
}
