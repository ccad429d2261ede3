//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use hantek5xxxb_lib::config::{ConfigKey, ConfigValue, DriverConfig};
#[allow(unused_imports)]
pub use hantek5xxxb_lib::engine::AcquisitionState;
#[allow(unused_imports)]
pub use hantek5xxxb_lib::error::{DeviceStatus, Error, FramingError, TransportError};
#[allow(unused_imports)]
pub use hantek5xxxb_lib::frame::{Command, Frame, Marker};
#[allow(unused_imports)]
pub use hantek5xxxb_lib::session::{ManualScheduler, SessionEvent};
#[allow(unused_imports)]
pub use hantek5xxxb_lib::sysdata::SysData;
#[allow(unused_imports)]
pub use hantek5xxxb_lib::tables::{MemoryDepth, Rational, Timebase, TriggerSource};
#[allow(unused_imports)]
pub use hantek5xxxb_lib::transport::Transport;
#[allow(unused_imports)]
pub use hantek5xxxb_lib::{Dso, Result};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

/// Routes driver logs through the test harness; `RUST_LOG` picks the level.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Default)]
pub struct MockState {
    pub responses: VecDeque<Vec<u8>>,
    pub writes: Vec<Vec<u8>>,
    pub opened: bool,
    pub claimed: bool,
    pub closed: bool,
    pub fail_claim: bool,
    /// Answer from this register state once the script runs out
    pub emulated: Option<SysData>,
}

/// Scripted device: replays queued response transfers and records host writes.
///
/// Clones share their state, so a test keeps one handle while the driver owns
/// the other. An empty queue behaves like a device that never answers, unless
/// it emulates a register state.
///
/// Every transfer marks the bus busy for a moment; a transfer that finds it
/// busy is counted in `overlaps`.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    pub state: Arc<Mutex<MockState>>,
    busy: Arc<AtomicBool>,
    overlaps: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Self {
        init_logging();
        Self::default()
    }

    /// Answers every request from `sys` after the queued responses.
    pub fn emulate(&self, sys: SysData) {
        self.state.lock().unwrap().emulated = Some(sys);
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    fn transfer<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        thread::sleep(Duration::from_micros(50));
        let result = f(&mut self.state.lock().unwrap());
        self.busy.store(false, Ordering::SeqCst);
        result
    }

    pub fn push(&self, response: Vec<u8>) {
        self.state.lock().unwrap().responses.push_back(response);
    }

    pub fn extend(&self, responses: impl IntoIterator<Item = Vec<u8>>) {
        self.state.lock().unwrap().responses.extend(responses);
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.lock().unwrap().writes.clear();
    }

    pub fn pending(&self) -> usize {
        self.state.lock().unwrap().responses.len()
    }
}

impl Transport for MockTransport {
    fn open(&mut self) -> std::result::Result<(), TransportError> {
        self.state.lock().unwrap().opened = true;
        Ok(())
    }

    fn claim(&mut self) -> std::result::Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_claim {
            return Err(TransportError::NotOpen);
        }
        state.claimed = true;
        Ok(())
    }

    fn close(&mut self) -> std::result::Result<(), TransportError> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }

    fn write(&mut self, data: &[u8], _timeout: Duration) -> std::result::Result<usize, TransportError> {
        self.transfer(|state| state.writes.push(data.to_vec()));
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> std::result::Result<usize, TransportError> {
        let response = self
            .transfer(|state| state.responses.pop_front().or_else(|| emulated_response(state)))
            .ok_or(TransportError::Timeout { op: "read", timeout })?;
        let len = response.len().min(buf.len());
        buf[..len].copy_from_slice(&response[..len]);
        Ok(len)
    }

    fn connection_id(&self) -> Option<String> {
        Some("1.4".to_string())
    }
}

/// Answer of an emulated scope to the last host write.
fn emulated_response(state: &mut MockState) -> Option<Vec<u8>> {
    let request = Frame::decode(state.writes.last()?).ok()?;
    let sys = state.emulated.as_mut()?;
    let reply = match Command::from(request.command) {
        Command::Echo | Command::Lock => response(Command::from(request.command), &request.payload),
        Command::ReadSysData => sysdata_response(sys),
        Command::WriteSysData => {
            *sys = SysData::decode(&request.payload).ok()?;
            write_ack(0)
        }
        Command::ReadSampleData => sample_not_available(),
        _ => return None,
    };
    Some(reply)
}

/// Bytes the host sends for `command` with `args`.
#[allow(dead_code)]
pub fn request(command: Command, args: &[u8]) -> Vec<u8> {
    Frame::request(command, Bytes::copy_from_slice(args))
        .encode()
        .unwrap()
        .to_vec()
}

/// Device answer to `command`.
#[allow(dead_code)]
pub fn response(command: Command, payload: &[u8]) -> Vec<u8> {
    Frame::new(Marker::Normal, command.response_code(), Bytes::copy_from_slice(payload))
        .encode()
        .unwrap()
        .to_vec()
}

#[allow(dead_code)]
pub fn lock_ack(held: bool) -> Vec<u8> {
    response(Command::Lock, &[0x01, u8::from(held)])
}

#[allow(dead_code)]
pub fn sysdata_response(sys: &SysData) -> Vec<u8> {
    response(Command::ReadSysData, &sys.encode())
}

/// lock, snapshot, unlock
#[allow(dead_code)]
pub fn fetch_responses(sys: &SysData) -> Vec<Vec<u8>> {
    vec![lock_ack(true), sysdata_response(sys), lock_ack(false)]
}

#[allow(dead_code)]
pub fn write_ack(status: u8) -> Vec<u8> {
    response(Command::WriteSysData, &[status])
}

#[allow(dead_code)]
pub fn sample_ready(length: u32) -> Vec<u8> {
    let [lo, mid, hi, _] = length.to_le_bytes();
    response(Command::ReadSampleData, &[0x00, lo, mid, hi])
}

#[allow(dead_code)]
pub fn sample_not_available() -> Vec<u8> {
    response(Command::ReadSampleData, &[0x03])
}

#[allow(dead_code)]
pub fn chunk(status: u8, seq: u8, samples: &[i8]) -> Vec<u8> {
    let mut payload = vec![status, seq];
    payload.extend(samples.iter().map(|s| *s as u8));
    response(Command::ReadSampleData, &payload)
}

/// CH1 on at 1 V/div DC, CH2 off, 2 ms timebase, 4K memory.
#[allow(dead_code)]
pub fn sample_sysdata() -> SysData {
    let mut sys = SysData::default();
    sys.vert[0].disp = 1;
    sys.vert[0].vb = 0x08;
    sys.vert[0].coup = 0x01;
    sys.vert[1].vb = 0x06;
    sys.vert[1].coup = 0x01;
    sys.horiz.tb = Timebase::Ms2.into();
    sys.horiz.win_tb = Timebase::Ms2.into();
    sys.acquire.store_depth = MemoryDepth::K4.store_code();
    sys.control.kind = 0x0C;
    sys
}

/// Snapshot carried by a host SysDATA write.
#[allow(dead_code)]
pub fn written_sysdata(write: &[u8]) -> SysData {
    let frame = Frame::decode(write).unwrap();
    assert_eq!(frame.command, u8::from(Command::WriteSysData));
    SysData::decode(&frame.payload).unwrap()
}

#[allow(dead_code)]
pub fn open(mock: &MockTransport) -> Dso<MockTransport> {
    init_logging();
    Dso::open(mock.clone(), DriverConfig::default()).unwrap()
}
