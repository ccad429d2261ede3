//! SysDATA, the register snapshot exchanged with the scope.
//!
//! The wire layout is a packed little-endian structure of 240 bytes. Field
//! order and width are fixed by the firmware; every field is read and written
//! explicitly at its offset so the host layout never leaks onto the wire.
//!
//! | offset | size | block                                   |
//! |-------:|-----:|-----------------------------------------|
//! |      0 |   20 | vertical CH1, CH2                       |
//! |     20 |   70 | trigger                                 |
//! |     90 |   68 | swap trigger CH1, CH2                   |
//! |    158 |    9 | overtime trigger                        |
//! |    167 |   11 | horizontal                              |
//! |    178 |    6 | math                                    |
//! |    184 |    8 | display                                 |
//! |    192 |    4 | acquire                                 |
//! |    196 |   16 | measure                                 |
//! |    212 |    4 | control                                 |
//! |    216 |   22 | swap trigger extras CH1, CH2            |
//! |    238 |    2 | math FFT base / Vrms                    |

use bytes::{Buf, BufMut, Bytes, BytesMut};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::constants::{NUM_CHANNELS, SYS_DATA_SIZE};
use crate::error::{Error, FramingError, Result};
use crate::tables::{
    self, AcquireMode, MemoryDepth, Model, Timebase, TriggerSlope, TriggerSource, average_count, decode_code,
};

/// Vertical settings of one channel (10 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VerticalChannel {
    pub disp: u8,
    pub vb: u8,
    pub coup: u8,
    pub f20mhz: u8,
    pub fine: u8,
    pub probe: u8,
    pub rphase: u8,
    pub cnt_fine: u8,
    pub pos: i16,
}

/// Mode specific trigger parameters shared by the main and the swap trigger (31 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TriggerDetail {
    pub edge_slope: u8,
    pub video_neg: u8,
    pub video_pal: u8,
    pub video_syn: u8,
    pub video_line: u16,
    pub pulse_neg: u8,
    pub pulse_when: u8,
    pub pulse_time: u64,
    pub slope_set: u8,
    pub slope_win: u8,
    pub slope_when: u8,
    pub slope_v1: u16,
    pub slope_v2: u16,
    pub slope_time: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Trigger {
    pub state: u8,
    pub kind: u8,
    pub src: u8,
    pub mode: u8,
    pub coup: u8,
    pub vpos: i16,
    pub frequency: u64,
    pub holdtime_min: u64,
    pub holdtime_max: u64,
    pub holdtime: u64,
    pub detail: TriggerDetail,
}

/// Per channel trigger used in swap (alternating) mode (34 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SwapTrigger {
    pub kind: u8,
    pub mode: u8,
    pub coup: u8,
    pub detail: TriggerDetail,
}

/// Swap trigger fields appended after the control block (11 bytes each).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SwapTriggerExtra {
    pub vpos: i16,
    pub overtime_neg: u8,
    pub overtime_time: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Horizontal {
    pub tb: u8,
    pub win_tb: u8,
    pub win_state: u8,
    /// Trigger time offset in picoseconds
    pub trigtime: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Math {
    pub disp: u8,
    pub mode: u8,
    pub fft_src: u8,
    pub fft_win: u8,
    pub fft_factor: u8,
    pub fft_db: u8,
    pub fft_base: u8,
    pub fft_vrms: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisplaySettings {
    pub mode: u8,
    pub persist: u8,
    pub format: u8,
    pub contrast: u8,
    pub max_contrast: u8,
    pub grid_kind: u8,
    pub grid_bright: u8,
    pub max_grid_bright: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Acquire {
    pub mode: u8,
    pub avg_cnt: u8,
    pub kind: u8,
    pub store_depth: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeasureItem {
    pub src: u8,
    pub item: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Control {
    /// Model code, see [`Model`]
    pub kind: u8,
    pub menu_id: u8,
    pub disp_menu: u8,
    pub mul_win: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SysData {
    pub vert: [VerticalChannel; NUM_CHANNELS],
    pub trig: Trigger,
    pub swap: [SwapTrigger; NUM_CHANNELS],
    pub overtime_neg: u8,
    pub overtime_time: u64,
    pub horiz: Horizontal,
    pub math: Math,
    pub display: DisplaySettings,
    pub acquire: Acquire,
    pub measure: [MeasureItem; 8],
    pub control: Control,
    pub swap_extra: [SwapTriggerExtra; NUM_CHANNELS],
}

impl VerticalChannel {
    fn read(buf: &mut impl Buf) -> Self {
        Self {
            disp: buf.get_u8(),
            vb: buf.get_u8(),
            coup: buf.get_u8(),
            f20mhz: buf.get_u8(),
            fine: buf.get_u8(),
            probe: buf.get_u8(),
            rphase: buf.get_u8(),
            cnt_fine: buf.get_u8(),
            pos: buf.get_i16_le(),
        }
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.disp);
        buf.put_u8(self.vb);
        buf.put_u8(self.coup);
        buf.put_u8(self.f20mhz);
        buf.put_u8(self.fine);
        buf.put_u8(self.probe);
        buf.put_u8(self.rphase);
        buf.put_u8(self.cnt_fine);
        buf.put_i16_le(self.pos);
    }
}

impl TriggerDetail {
    fn read(buf: &mut impl Buf) -> Self {
        Self {
            edge_slope: buf.get_u8(),
            video_neg: buf.get_u8(),
            video_pal: buf.get_u8(),
            video_syn: buf.get_u8(),
            video_line: buf.get_u16_le(),
            pulse_neg: buf.get_u8(),
            pulse_when: buf.get_u8(),
            pulse_time: buf.get_u64_le(),
            slope_set: buf.get_u8(),
            slope_win: buf.get_u8(),
            slope_when: buf.get_u8(),
            slope_v1: buf.get_u16_le(),
            slope_v2: buf.get_u16_le(),
            slope_time: buf.get_u64_le(),
        }
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.edge_slope);
        buf.put_u8(self.video_neg);
        buf.put_u8(self.video_pal);
        buf.put_u8(self.video_syn);
        buf.put_u16_le(self.video_line);
        buf.put_u8(self.pulse_neg);
        buf.put_u8(self.pulse_when);
        buf.put_u64_le(self.pulse_time);
        buf.put_u8(self.slope_set);
        buf.put_u8(self.slope_win);
        buf.put_u8(self.slope_when);
        buf.put_u16_le(self.slope_v1);
        buf.put_u16_le(self.slope_v2);
        buf.put_u64_le(self.slope_time);
    }
}

impl Trigger {
    fn read(buf: &mut impl Buf) -> Self {
        Self {
            state: buf.get_u8(),
            kind: buf.get_u8(),
            src: buf.get_u8(),
            mode: buf.get_u8(),
            coup: buf.get_u8(),
            vpos: buf.get_i16_le(),
            frequency: buf.get_u64_le(),
            holdtime_min: buf.get_u64_le(),
            holdtime_max: buf.get_u64_le(),
            holdtime: buf.get_u64_le(),
            detail: TriggerDetail::read(buf),
        }
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.state);
        buf.put_u8(self.kind);
        buf.put_u8(self.src);
        buf.put_u8(self.mode);
        buf.put_u8(self.coup);
        buf.put_i16_le(self.vpos);
        buf.put_u64_le(self.frequency);
        buf.put_u64_le(self.holdtime_min);
        buf.put_u64_le(self.holdtime_max);
        buf.put_u64_le(self.holdtime);
        self.detail.write(buf);
    }
}

impl SwapTrigger {
    fn read(buf: &mut impl Buf) -> Self {
        Self {
            kind: buf.get_u8(),
            mode: buf.get_u8(),
            coup: buf.get_u8(),
            detail: TriggerDetail::read(buf),
        }
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.kind);
        buf.put_u8(self.mode);
        buf.put_u8(self.coup);
        self.detail.write(buf);
    }
}

impl SwapTriggerExtra {
    fn read(buf: &mut impl Buf) -> Self {
        Self {
            vpos: buf.get_i16_le(),
            overtime_neg: buf.get_u8(),
            overtime_time: buf.get_u64_le(),
        }
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_i16_le(self.vpos);
        buf.put_u8(self.overtime_neg);
        buf.put_u64_le(self.overtime_time);
    }
}

impl SysData {
    /// Parses the snapshot from a SysDATA response payload.
    ///
    /// Bytes past the 240 byte structure are ignored.
    pub fn decode(payload: &[u8]) -> Result<Self, FramingError> {
        if payload.len() < SYS_DATA_SIZE {
            return Err(FramingError::SysDataTooShort {
                expected: SYS_DATA_SIZE,
                actual: payload.len(),
            });
        }
        let mut buf = &payload[..SYS_DATA_SIZE];

        let vert = [VerticalChannel::read(&mut buf), VerticalChannel::read(&mut buf)];
        let trig = Trigger::read(&mut buf);
        let swap = [SwapTrigger::read(&mut buf), SwapTrigger::read(&mut buf)];
        let overtime_neg = buf.get_u8();
        let overtime_time = buf.get_u64_le();
        let horiz = Horizontal {
            tb: buf.get_u8(),
            win_tb: buf.get_u8(),
            win_state: buf.get_u8(),
            trigtime: buf.get_i64_le(),
        };
        let mut math = Math {
            disp: buf.get_u8(),
            mode: buf.get_u8(),
            fft_src: buf.get_u8(),
            fft_win: buf.get_u8(),
            fft_factor: buf.get_u8(),
            fft_db: buf.get_u8(),
            ..Math::default()
        };
        let display = DisplaySettings {
            mode: buf.get_u8(),
            persist: buf.get_u8(),
            format: buf.get_u8(),
            contrast: buf.get_u8(),
            max_contrast: buf.get_u8(),
            grid_kind: buf.get_u8(),
            grid_bright: buf.get_u8(),
            max_grid_bright: buf.get_u8(),
        };
        let acquire = Acquire {
            mode: buf.get_u8(),
            avg_cnt: buf.get_u8(),
            kind: buf.get_u8(),
            store_depth: buf.get_u8(),
        };
        let mut measure = [MeasureItem::default(); 8];
        for item in measure.iter_mut() {
            item.src = buf.get_u8();
            item.item = buf.get_u8();
        }
        let control = Control {
            kind: buf.get_u8(),
            menu_id: buf.get_u8(),
            disp_menu: buf.get_u8(),
            mul_win: buf.get_u8(),
        };
        let swap_extra = [SwapTriggerExtra::read(&mut buf), SwapTriggerExtra::read(&mut buf)];
        math.fft_base = buf.get_u8();
        math.fft_vrms = buf.get_u8();
        debug_assert!(!buf.has_remaining());

        Ok(Self {
            vert,
            trig,
            swap,
            overtime_neg,
            overtime_time,
            horiz,
            math,
            display,
            acquire,
            measure,
            control,
            swap_extra,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(SYS_DATA_SIZE);

        for ch in &self.vert {
            ch.write(&mut buf);
        }
        self.trig.write(&mut buf);
        for swap in &self.swap {
            swap.write(&mut buf);
        }
        buf.put_u8(self.overtime_neg);
        buf.put_u64_le(self.overtime_time);

        buf.put_u8(self.horiz.tb);
        buf.put_u8(self.horiz.win_tb);
        buf.put_u8(self.horiz.win_state);
        buf.put_i64_le(self.horiz.trigtime);

        buf.put_u8(self.math.disp);
        buf.put_u8(self.math.mode);
        buf.put_u8(self.math.fft_src);
        buf.put_u8(self.math.fft_win);
        buf.put_u8(self.math.fft_factor);
        buf.put_u8(self.math.fft_db);

        buf.put_u8(self.display.mode);
        buf.put_u8(self.display.persist);
        buf.put_u8(self.display.format);
        buf.put_u8(self.display.contrast);
        buf.put_u8(self.display.max_contrast);
        buf.put_u8(self.display.grid_kind);
        buf.put_u8(self.display.grid_bright);
        buf.put_u8(self.display.max_grid_bright);

        buf.put_u8(self.acquire.mode);
        buf.put_u8(self.acquire.avg_cnt);
        buf.put_u8(self.acquire.kind);
        buf.put_u8(self.acquire.store_depth);

        for item in &self.measure {
            buf.put_u8(item.src);
            buf.put_u8(item.item);
        }

        buf.put_u8(self.control.kind);
        buf.put_u8(self.control.menu_id);
        buf.put_u8(self.control.disp_menu);
        buf.put_u8(self.control.mul_win);

        for extra in &self.swap_extra {
            extra.write(&mut buf);
        }
        buf.put_u8(self.math.fft_base);
        buf.put_u8(self.math.fft_vrms);

        debug_assert_eq!(buf.len(), SYS_DATA_SIZE);
        buf.freeze()
    }

    pub fn channel(&self, index: usize) -> Result<Channel> {
        let raw = self
            .vert
            .get(index)
            .ok_or_else(|| Error::invalid(format!("no channel {index}")))?;
        Channel::from_raw(index, raw)
    }

    pub fn channel_enabled(&self, index: usize) -> bool {
        self.vert.get(index).is_some_and(|ch| ch.disp != 0)
    }

    pub fn both_channels_enabled(&self) -> bool {
        self.channel_enabled(0) && self.channel_enabled(1)
    }

    pub fn menu_visible(&self) -> bool {
        self.control.disp_menu != 0
    }

    pub fn trigger_source(&self) -> Result<TriggerSource> {
        decode_code("trig.src", self.trig.src)
    }

    pub fn trigger_slope(&self) -> Result<TriggerSlope> {
        decode_code("trig.edge_slope", self.trig.detail.edge_slope)
    }

    /// Horizontal trigger position in seconds.
    pub fn trigger_position(&self) -> f64 {
        self.horiz.trigtime as f64 / 1e12
    }

    /// Timebase of the main sweep when the zoom window is open.
    pub fn main_timebase(&self) -> Result<Timebase> {
        decode_code("horiz.tb", self.horiz.tb)
    }

    pub fn window_timebase(&self) -> Result<Timebase> {
        decode_code("horiz.win_tb", self.horiz.win_tb)
    }

    pub fn memory_depth(&self) -> Result<MemoryDepth> {
        decode_code("acquire.store_depth", self.acquire.store_depth)
    }

    pub fn acquire_mode(&self) -> Result<AcquireMode> {
        decode_code("acquire.mode", self.acquire.mode)
    }

    pub fn averaging(&self) -> bool {
        self.acquire.mode == u8::from(AcquireMode::Average)
    }

    pub fn average_count(&self) -> Result<u64> {
        average_count(self.acquire.avg_cnt)
    }

    pub fn samplerate(&self) -> Result<u64> {
        Ok(tables::samplerate(
            self.window_timebase()?,
            self.both_channels_enabled(),
            self.menu_visible(),
            self.memory_depth()?,
        ))
    }

    pub fn model(&self) -> Model {
        Model::from(self.control.kind)
    }
}
