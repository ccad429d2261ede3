//! Configuration get/set/list against a scripted scope

mod common;

use common::*;
use hantek5xxxb_lib::tables::Model;

#[test]
fn test_claim_failure_closes_transport() {
    let mock = MockTransport::new();
    mock.state.lock().unwrap().fail_claim = true;
    assert!(Dso::open(mock.clone(), DriverConfig::default()).is_err());
    let state = mock.state.lock().unwrap();
    assert!(state.opened);
    assert!(state.closed);
}

#[test]
fn test_get_reads_fresh_snapshot_when_idle() {
    let mock = MockTransport::new();
    let dso = open(&mock);
    mock.extend(fetch_responses(&sample_sysdata()));

    let value = dso.config_get(ConfigKey::Timebase, None).unwrap();
    assert_eq!(value, ConfigValue::Rational(Rational::new(2, 1000)));
    assert_eq!(mock.writes().len(), 3);

    mock.extend(fetch_responses(&sample_sysdata()));
    assert_eq!(dso.config_get(ConfigKey::Samplerate, None).unwrap(), ConfigValue::U64(100_000));
    mock.extend(fetch_responses(&sample_sysdata()));
    assert_eq!(dso.config_get(ConfigKey::NumHdiv, None).unwrap(), ConfigValue::I32(20));
}

#[test]
fn test_get_uses_shadow_while_capturing() {
    let mock = MockTransport::new();
    let dso = open(&mock);
    mock.extend(fetch_responses(&sample_sysdata()));
    dso.refresh().unwrap();

    let mut events = Vec::new();
    let mut scheduler = ManualScheduler::default();
    dso.start(&mut events, &mut scheduler).unwrap();
    mock.clear_writes();

    assert_eq!(
        dso.config_get(ConfigKey::Coupling, Some(0)).unwrap(),
        ConfigValue::Str("DC".into())
    );
    assert_eq!(
        dso.config_get(ConfigKey::Buffersize, None).unwrap(),
        ConfigValue::U64(4096)
    );
    assert!(mock.writes().is_empty());
}

#[test]
fn test_limits_and_conn_skip_the_device() {
    let mock = MockTransport::new();
    let dso = open(&mock);

    dso.config_set(ConfigKey::LimitFrames, None, ConfigValue::U64(5)).unwrap();
    assert_eq!(dso.config_get(ConfigKey::LimitFrames, None).unwrap(), ConfigValue::U64(5));
    assert_eq!(dso.config_get(ConfigKey::LimitSamples, None).unwrap(), ConfigValue::U64(0));
    assert_eq!(dso.config_get(ConfigKey::Conn, None).unwrap(), ConfigValue::Str("1.4".into()));
    assert_eq!(dso.config_get(ConfigKey::NumVdiv, None).unwrap(), ConfigValue::I32(11));
    assert!(mock.writes().is_empty());
}

#[test]
fn test_set_vdiv_writes_snapshot() {
    let mock = MockTransport::new();
    let dso = open(&mock);
    let sys = sample_sysdata();
    mock.extend(fetch_responses(&sys));
    mock.push(write_ack(0));

    dso.config_set(ConfigKey::Vdiv, Some(0), ConfigValue::Rational(Rational::new(5, 1)))
        .unwrap();

    let writes = mock.writes();
    assert_eq!(writes.len(), 4);
    let written = written_sysdata(&writes[3]);
    assert_eq!(written.vert[0].vb, 0x0A);
    assert_eq!(written.vert[1], sys.vert[1]);
}

#[test]
fn test_set_always_fetches() {
    let mock = MockTransport::new();
    let dso = open(&mock);
    let mut events = Vec::new();
    let mut scheduler = ManualScheduler::default();
    dso.start(&mut events, &mut scheduler).unwrap();

    mock.extend(fetch_responses(&sample_sysdata()));
    mock.push(write_ack(0));
    dso.config_set(ConfigKey::TriggerSlope, None, ConfigValue::Str("f".into()))
        .unwrap();

    let writes = mock.writes();
    assert_eq!(writes[1], request(Command::ReadSysData, &[]));
    assert_eq!(written_sysdata(&writes[3]).trig.detail.edge_slope, 0x01);
}

#[test]
fn test_set_timebase_reduces_memory_depth() {
    let mock = MockTransport::new();
    let dso = open(&mock);
    let mut sys = sample_sysdata();
    sys.acquire.store_depth = MemoryDepth::M1.store_code();
    mock.extend(fetch_responses(&sys));
    mock.push(write_ack(0));

    dso.config_set(
        ConfigKey::Timebase,
        None,
        ConfigValue::Rational(Rational::new(200, 1_000_000)),
    )
    .unwrap();

    let written = written_sysdata(&mock.writes()[3]);
    assert_eq!(written.horiz.win_tb, u8::from(Timebase::Us200));
    assert_eq!(written.acquire.store_depth, MemoryDepth::K512.store_code());
}

#[test]
fn test_set_timebase_accepts_reduced_fraction() {
    let mock = MockTransport::new();
    let dso = open(&mock);
    mock.extend(fetch_responses(&sample_sysdata()));
    mock.push(write_ack(0));

    // the table lists 4 ms as 4/1000
    let value = ConfigValue::parse(ConfigKey::Timebase.value_kind(), "1/250").unwrap();
    dso.config_set(ConfigKey::Timebase, None, value).unwrap();

    let written = written_sysdata(&mock.writes()[3]);
    assert_eq!(written.horiz.win_tb, u8::from(Timebase::Ms4));
}

#[test]
fn test_trigger_level_round_trip() {
    let mock = MockTransport::new();
    let dso = open(&mock);
    let mut sys = sample_sysdata();
    sys.vert[0].pos = 10;
    mock.extend(fetch_responses(&sys));
    mock.push(write_ack(0));

    dso.config_set(ConfigKey::TriggerLevel, None, ConfigValue::F64(1.0)).unwrap();
    let written = written_sysdata(&mock.writes()[3]);
    // 25 steps per volt at 1 V/div, plus the channel offset
    assert_eq!(written.trig.vpos, 35);

    mock.extend(fetch_responses(&written));
    let level = dso
        .config_get(ConfigKey::TriggerLevel, None)
        .unwrap()
        .as_f64()
        .unwrap();
    assert!((level - 1.0).abs() < 1e-6);
}

#[test]
fn test_trigger_level_needs_channel_source() {
    let mock = MockTransport::new();
    let dso = open(&mock);
    let mut sys = sample_sysdata();
    sys.trig.src = TriggerSource::Ext.into();

    mock.extend(fetch_responses(&sys));
    assert!(matches!(
        dso.config_get(ConfigKey::TriggerLevel, None),
        Err(Error::NotApplicable(ConfigKey::TriggerLevel))
    ));

    mock.extend(fetch_responses(&sys));
    assert!(matches!(
        dso.config_set(ConfigKey::TriggerLevel, None, ConfigValue::F64(0.5)),
        Err(Error::InvalidArgument(_))
    ));
    // nothing was written back
    assert_eq!(mock.writes().len(), 6);
}

#[test]
fn test_set_rejects_read_only_and_bad_values() {
    let mock = MockTransport::new();
    let dso = open(&mock);

    assert!(matches!(
        dso.config_set(ConfigKey::Samplerate, None, ConfigValue::U64(1)),
        Err(Error::NotApplicable(ConfigKey::Samplerate))
    ));
    assert!(matches!(
        dso.config_set(ConfigKey::Coupling, None, ConfigValue::Str("AC".into())),
        Err(Error::InvalidArgument(_))
    ));
    assert!(mock.writes().is_empty());

    mock.extend(fetch_responses(&sample_sysdata()));
    assert!(matches!(
        dso.config_set(ConfigKey::Buffersize, None, ConfigValue::U64(4000)),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_list_values() {
    let mock = MockTransport::new();
    let dso = open(&mock);

    match dso.config_list(ConfigKey::Timebase, None).unwrap() {
        ConfigValue::RationalList(list) => {
            assert_eq!(list.len(), 32);
            assert_eq!(list[0], Rational::new(2, 1_000_000_000));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(
        dso.config_list(ConfigKey::Buffersize, None).unwrap(),
        ConfigValue::U64List(vec![4096, 40960, 524288, 1048576])
    );
    assert_eq!(
        dso.config_list(ConfigKey::TriggerSlope, None).unwrap(),
        ConfigValue::StrList(vec!["r".into(), "f".into(), "r+f".into()])
    );
    assert_eq!(
        dso.config_list(ConfigKey::ProbeFactor, Some(1)).unwrap(),
        ConfigValue::U64List(vec![1, 10, 100, 1000])
    );
    assert!(matches!(
        dso.config_list(ConfigKey::TriggerLevel, None),
        Err(Error::NotApplicable(ConfigKey::TriggerLevel))
    ));
    assert!(mock.writes().is_empty());
}

#[test]
fn test_list_vdiv_follows_probe() {
    let mock = MockTransport::new();
    let dso = open(&mock);
    let mut sys = sample_sysdata();
    sys.vert[1].probe = 0x02;
    mock.extend(fetch_responses(&sys));

    match dso.config_list(ConfigKey::Vdiv, Some(1)).unwrap() {
        ConfigValue::RationalList(list) => {
            assert_eq!(list.first(), Some(&Rational::new(200, 1000)));
            assert_eq!(list.last(), Some(&Rational::new(500, 1)));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_echo_and_model() {
    let mock = MockTransport::new();
    let dso = open(&mock);

    mock.push(response(Command::Echo, b"ping"));
    assert_eq!(dso.echo(b"ping").unwrap().as_ref(), b"ping");
    assert_eq!(mock.writes()[0], request(Command::Echo, b"ping"));

    mock.extend(fetch_responses(&sample_sysdata()));
    assert_eq!(dso.model().unwrap(), Model::Dst1062b);
}

#[test]
fn test_close_releases_transport() {
    let mock = MockTransport::new();
    let dso = open(&mock);
    assert_eq!(dso.connection_id(), Some("1.4"));
    dso.close().unwrap();
    assert!(mock.state.lock().unwrap().closed);
}
