//! Acquisition state machine driven tick by tick

mod common;

use std::time::Duration;

use common::*;
use hantek5xxxb_lib::session::{AnalogPacket, LimitKind, LimitTracker};

fn assert_samples(packet: &AnalogPacket, expected: &[f32]) {
    assert_eq!(packet.samples.len(), expected.len());
    for (a, e) in packet.samples.iter().zip(expected) {
        assert!((a - e).abs() < 1e-5, "{a} != {e}");
    }
}

/// Opens the scope and seeds the published snapshot with `sys`.
fn seeded(mock: &MockTransport, sys: &SysData) -> Dso<MockTransport> {
    let dso = open(mock);
    mock.extend(fetch_responses(sys));
    dso.refresh().unwrap();
    mock.clear_writes();
    dso
}

#[test]
fn test_start_emits_one_header() {
    let mock = MockTransport::new();
    let dso = open(&mock);
    let mut events = Vec::new();
    let mut scheduler = ManualScheduler::default();

    dso.start(&mut events, &mut scheduler).unwrap();
    assert_eq!(events, vec![SessionEvent::Header]);
    assert_eq!(dso.state(), AcquisitionState::Capturing);
    assert_eq!(scheduler.interval(), Some(Duration::from_millis(1000)));
    assert!(mock.writes().is_empty());

    assert!(matches!(
        dso.start(&mut events, &mut scheduler),
        Err(Error::InvalidState {
            state: AcquisitionState::Capturing
        })
    ));
    assert_eq!(events.len(), 1);
}

#[test]
fn test_stop_takes_effect_on_next_tick() {
    let mock = MockTransport::new();
    let dso = open(&mock);
    let mut events = Vec::new();
    let mut scheduler = ManualScheduler::default();

    dso.start(&mut events, &mut scheduler).unwrap();
    dso.request_stop();
    assert_eq!(dso.state(), AcquisitionState::Stopping);
    assert_eq!(events, vec![SessionEvent::Header]);

    assert_eq!(dso.tick(&mut events, &mut scheduler).unwrap(), AcquisitionState::Idle);
    assert_eq!(events, vec![SessionEvent::Header, SessionEvent::End]);
    assert!(!scheduler.is_active());
    assert!(mock.writes().is_empty());

    // idle ticks and stops are no-ops
    dso.request_stop();
    assert_eq!(dso.tick(&mut events, &mut scheduler).unwrap(), AcquisitionState::Idle);
    assert_eq!(events.len(), 2);
}

#[test]
fn test_tick_streams_chunks() {
    let mock = MockTransport::new();
    let sys = sample_sysdata();
    let dso = seeded(&mock, &sys);
    let mut events = Vec::new();
    let mut scheduler = ManualScheduler::default();
    dso.start(&mut events, &mut scheduler).unwrap();

    mock.extend(fetch_responses(&sys));
    mock.extend([
        sample_ready(6),
        chunk(0x01, 0, &[10, -5, 127]),
        chunk(0x01, 1, &[0, 25, -25]),
        chunk(0x02, 2, &[]),
    ]);

    assert_eq!(dso.tick(&mut events, &mut scheduler).unwrap(), AcquisitionState::Capturing);
    assert_eq!(mock.pending(), 0);

    match events.as_slice() {
        [
            SessionEvent::Header,
            SessionEvent::FrameBegin,
            SessionEvent::Data(first),
            SessionEvent::Data(second),
            SessionEvent::FrameEnd,
        ] => {
            assert_eq!(first.channel, 0);
            assert_eq!(first.digits, 2);
            assert_samples(first, &[0.4, -0.2, 5.08]);
            assert_samples(second, &[0.0, 1.0, -1.0]);
        }
        other => panic!("unexpected events {other:?}"),
    }

    // CH2 is off, so only CH1 was asked for samples
    let writes = mock.writes();
    assert_eq!(writes.len(), 4);
    assert_eq!(writes[3], request(Command::ReadSampleData, &[0x01, 0x00]));

    let limits = dso.limits();
    assert_eq!(limits.samples_read(), 6);
    assert_eq!(limits.frames_read(), 1);
}

#[test]
fn test_no_new_data() {
    let mock = MockTransport::new();
    let mut sys = sample_sysdata();
    sys.vert[1].disp = 1;
    let dso = seeded(&mock, &sys);
    let mut events = Vec::new();
    let mut scheduler = ManualScheduler::default();
    dso.start(&mut events, &mut scheduler).unwrap();

    mock.extend(fetch_responses(&sys));
    mock.extend([sample_not_available(), sample_not_available()]);

    dso.tick(&mut events, &mut scheduler).unwrap();
    assert_eq!(events, vec![SessionEvent::Header]);
    let writes = mock.writes();
    assert_eq!(writes[3], request(Command::ReadSampleData, &[0x01, 0x00]));
    assert_eq!(writes[4], request(Command::ReadSampleData, &[0x01, 0x01]));
    assert_eq!(dso.limits().frames_read(), 0);
}

#[test]
fn test_one_metadata_event_per_tick() {
    let mock = MockTransport::new();
    let sys = sample_sysdata();
    let dso = seeded(&mock, &sys);
    let mut events = Vec::new();
    let mut scheduler = ManualScheduler::default();
    dso.start(&mut events, &mut scheduler).unwrap();

    let mut changed = sys.clone();
    changed.vert[0].vb = 0x07;
    changed.trig.src = TriggerSource::Ch2.into();

    mock.extend(fetch_responses(&changed));
    mock.push(sample_not_available());
    dso.tick(&mut events, &mut scheduler).unwrap();
    assert_eq!(
        events[1..],
        [SessionEvent::MetadataChanged {
            key: ConfigKey::Vdiv,
            channel: Some(0),
            value: ConfigValue::Rational(Rational::new(500, 1000)),
        }]
    );
    // foreground reads see the whole fresh snapshot at once
    assert_eq!(dso.shadow(), changed);

    mock.extend(fetch_responses(&changed));
    mock.push(sample_not_available());
    dso.tick(&mut events, &mut scheduler).unwrap();
    assert_eq!(
        events[2..],
        [SessionEvent::MetadataChanged {
            key: ConfigKey::TriggerSource,
            channel: None,
            value: ConfigValue::Str("CH2".into()),
        }]
    );

    mock.extend(fetch_responses(&changed));
    mock.push(sample_not_available());
    dso.tick(&mut events, &mut scheduler).unwrap();
    assert_eq!(events.len(), 3);
}

#[test]
fn test_start_without_refresh_takes_first_tick_as_baseline() {
    let mock = MockTransport::new();
    let dso = open(&mock);
    let sys = sample_sysdata();
    let mut events = Vec::new();
    let mut scheduler = ManualScheduler::default();
    dso.start(&mut events, &mut scheduler).unwrap();

    for _ in 0..3 {
        mock.extend(fetch_responses(&sys));
        mock.push(sample_not_available());
        dso.tick(&mut events, &mut scheduler).unwrap();
    }
    assert_eq!(events, vec![SessionEvent::Header]);
    assert_eq!(dso.shadow(), sys);

    let mut changed = sys.clone();
    changed.trig.src = TriggerSource::Ch2.into();
    mock.extend(fetch_responses(&changed));
    mock.push(sample_not_available());
    dso.tick(&mut events, &mut scheduler).unwrap();
    assert!(matches!(
        &events[1..],
        [SessionEvent::MetadataChanged {
            key: ConfigKey::TriggerSource,
            channel: None,
            ..
        }]
    ));
}

#[test]
fn test_chunk_errors_within_limit() {
    let mock = MockTransport::new();
    let sys = sample_sysdata();
    let dso = seeded(&mock, &sys);
    let mut events = Vec::new();
    let mut scheduler = ManualScheduler::default();
    dso.start(&mut events, &mut scheduler).unwrap();

    mock.extend(fetch_responses(&sys));
    mock.extend([
        sample_ready(2),
        chunk(0x03, 0, &[]),
        chunk(0x01, 0, &[1, 2]),
        chunk(0x03, 1, &[]),
        chunk(0x02, 1, &[]),
    ]);

    dso.tick(&mut events, &mut scheduler).unwrap();
    let data = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::Data(_)))
        .count();
    assert_eq!(data, 1);
    assert_eq!(events.last(), Some(&SessionEvent::FrameEnd));
}

#[test]
fn test_chunk_errors_are_bounded() {
    let mock = MockTransport::new();
    let config = DriverConfig {
        chunk_error_limit: 2,
        ..DriverConfig::default()
    };
    let dso = Dso::open(mock.clone(), config).unwrap();
    let sys = sample_sysdata();
    mock.extend(fetch_responses(&sys));
    dso.refresh().unwrap();

    let mut events = Vec::new();
    let mut scheduler = ManualScheduler::default();
    dso.start(&mut events, &mut scheduler).unwrap();

    mock.extend(fetch_responses(&sys));
    mock.push(sample_ready(3));
    mock.extend((0..3).map(|seq| chunk(0x03, seq, &[])));

    let result = dso.tick(&mut events, &mut scheduler);
    assert!(matches!(result, Err(Error::SampleChunk { channel: 0, errors: 3 })));
    assert_eq!(dso.state(), AcquisitionState::Idle);
    assert_eq!(
        events,
        vec![
            SessionEvent::Header,
            SessionEvent::FrameBegin,
            SessionEvent::FrameEnd,
            SessionEvent::End
        ]
    );
    assert!(!scheduler.is_active());
}

#[test]
fn test_receive_failure_closes_frame() {
    let mock = MockTransport::new();
    let sys = sample_sysdata();
    let dso = seeded(&mock, &sys);
    let mut events = Vec::new();
    let mut scheduler = ManualScheduler::default();
    dso.start(&mut events, &mut scheduler).unwrap();

    // the scope stops answering after the first chunk
    mock.extend(fetch_responses(&sys));
    mock.extend([sample_ready(6), chunk(0x01, 0, &[1, 2, 3])]);

    let result = dso.tick(&mut events, &mut scheduler);
    assert!(matches!(
        result,
        Err(Error::Transport(TransportError::Timeout { op: "read", .. }))
    ));
    assert!(matches!(
        events.as_slice(),
        [
            SessionEvent::Header,
            SessionEvent::FrameBegin,
            SessionEvent::Data(_),
            SessionEvent::FrameEnd,
            SessionEvent::End,
        ]
    ));
    assert_eq!(dso.state(), AcquisitionState::Idle);
    assert_eq!(dso.limits().frames_read(), 0);
}

#[test]
fn test_length_mismatch_is_not_fatal() {
    let mock = MockTransport::new();
    let sys = sample_sysdata();
    let dso = seeded(&mock, &sys);
    let mut events = Vec::new();
    let mut scheduler = ManualScheduler::default();
    dso.start(&mut events, &mut scheduler).unwrap();

    mock.extend(fetch_responses(&sys));
    mock.extend([sample_ready(4000), chunk(0x01, 0, &[1, 2, 3]), chunk(0x02, 1, &[])]);

    assert!(dso.tick(&mut events, &mut scheduler).is_ok());
    assert_eq!(dso.limits().samples_read(), 3);
}

#[test]
fn test_frame_limit_requests_stop() {
    let mock = MockTransport::new();
    let sys = sample_sysdata();
    let dso = seeded(&mock, &sys);
    dso.limits().set_limit(LimitKind::Frames, 1);
    let mut events = Vec::new();
    let mut scheduler = ManualScheduler::default();
    dso.start(&mut events, &mut scheduler).unwrap();

    mock.extend(fetch_responses(&sys));
    mock.extend([sample_ready(1), chunk(0x01, 0, &[5]), chunk(0x02, 1, &[])]);

    assert_eq!(dso.tick(&mut events, &mut scheduler).unwrap(), AcquisitionState::Stopping);
    assert!(scheduler.is_active());

    assert_eq!(dso.tick(&mut events, &mut scheduler).unwrap(), AcquisitionState::Idle);
    assert_eq!(events.last(), Some(&SessionEvent::End));
    assert_eq!(events.iter().filter(|e| **e == SessionEvent::End).count(), 1);
}

#[test]
fn test_fetch_failure_ends_acquisition() {
    let mock = MockTransport::new();
    let dso = open(&mock);
    let mut events = Vec::new();
    let mut scheduler = ManualScheduler::default();
    dso.start(&mut events, &mut scheduler).unwrap();

    // device never answers
    let result = dso.tick(&mut events, &mut scheduler);
    assert!(matches!(
        result,
        Err(Error::Transport(TransportError::Timeout { op: "read", .. }))
    ));
    assert_eq!(events, vec![SessionEvent::Header, SessionEvent::End]);
    assert_eq!(dso.state(), AcquisitionState::Idle);

    // a new acquisition can start afterwards
    dso.start(&mut events, &mut scheduler).unwrap();
}
