use std::fs::File;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use hantek5xxxb_lib::Dso;
use hantek5xxxb_lib::config::{ConfigKey, ConfigValue, DEVICE_OPTIONS, CHANNEL_OPTIONS, DriverConfig};
use hantek5xxxb_lib::constants::NUM_CHANNELS;
use hantek5xxxb_lib::engine::AcquisitionState;
use hantek5xxxb_lib::session::{AnalogPacket, LimitKind, LimitTracker, ManualScheduler, SessionSink};
use hantek5xxxb_lib::transport::{self, NusbTransport};

/// Command line access to Hantek DSO5xxxB / Tekway DST1xxxB oscilloscopes.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Only use the scope at this USB address (`bus.address`).
    #[arg(long, global = true)]
    conn: Option<String>,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long, global = true)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List attached scopes.
    List,
    /// Check the link and print the current settings.
    Info,
    /// Read a setting, or the values it accepts with --list.
    Get {
        key: String,
        /// Channel number (1 or 2) for per channel settings.
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=2))]
        channel: Option<u8>,
        #[arg(long)]
        list: bool,
    },
    /// Change a setting.
    Set {
        key: String,
        /// New value; volts/div and timebase are written as `num/den`.
        value: String,
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=2))]
        channel: Option<u8>,
    },
    /// Stream waveforms until a limit is reached or Ctrl-C is pressed.
    Acquire {
        #[arg(long)]
        frames: Option<u64>,
        #[arg(long)]
        samples: Option<u64>,
        /// Stop after this many milliseconds.
        #[arg(long)]
        time: Option<u64>,
        /// Print every sample instead of a per chunk summary.
        #[arg(long)]
        dump: bool,
    },
}

fn setup_logging(log_file_path: Option<PathBuf>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .without_time();

    let (file_layer, guard) = if let Some(ref path) = log_file_path {
        let log_file = File::create(path).with_context(|| format!("Failed to create log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // INFO by default, DEBUG with -v, TRACE with -vv. RUST_LOG overrides.
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.clone(), &cli.verbose)?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, stopping...");
                stop.store(true, Ordering::SeqCst);
            }
        });
    }

    // The USB transport blocks on its own runtime, keep it off the async workers.
    let result = tokio::task::spawn_blocking(move || run(cli, stop))
        .await
        .context("Worker thread panicked")?;

    if let Err(e) = result {
        error!("{:?}", e);
        process::exit(1);
    }
    Ok(())
}

fn run(cli: Cli, stop: Arc<AtomicBool>) -> Result<()> {
    let config = DriverConfig {
        conn: cli.conn,
        ..DriverConfig::default()
    };

    match cli.command {
        Commands::List => list(&config),
        Commands::Info => info(config),
        Commands::Get { key, channel, list } => get(config, &key, channel, list),
        Commands::Set { key, value, channel } => set(config, &key, &value, channel),
        Commands::Acquire {
            frames,
            samples,
            time,
            dump,
        } => acquire(config, frames, samples, time, dump, &stop),
    }
}

fn open(config: DriverConfig) -> Result<Dso<NusbTransport>> {
    let transport = NusbTransport::new(config.clone())?;
    let dso = Dso::open(transport, config).context("Failed to open the oscilloscope")?;
    Ok(dso)
}

fn parse_key(name: &str) -> Result<ConfigKey> {
    ConfigKey::from_name(name).ok_or_else(|| {
        let known: Vec<String> = DEVICE_OPTIONS
            .iter()
            .chain(CHANNEL_OPTIONS.iter())
            .map(ToString::to_string)
            .collect();
        anyhow!("Unknown setting '{}', expected one of: {}", name, known.join(", "))
    })
}

/// CLI channels count from 1.
fn channel_index(channel: Option<u8>) -> Option<usize> {
    channel.map(|ch| ch as usize - 1)
}

fn list(config: &DriverConfig) -> Result<()> {
    let devices = transport::discover(config)?;
    if devices.is_empty() {
        println!("No oscilloscope found.");
    }
    for device in devices {
        println!(
            "{}  {}  serial {}",
            device.connection_id(),
            device.product.as_deref().unwrap_or("<unknown product>"),
            device.serial.as_deref().unwrap_or("<not available>")
        );
    }
    Ok(())
}

fn info(config: DriverConfig) -> Result<()> {
    let dso = open(config)?;

    let probe = b"hantek";
    let echoed = dso.echo(probe)?;
    if &echoed[..] == probe {
        info!("Echo check passed");
    } else {
        warn!("Echo check returned {}", hex::encode(&echoed));
    }

    let sys = dso.refresh()?;
    println!("Model:       {}", sys.model());
    println!("Connection:  {}", dso.connection_id().unwrap_or("-"));
    for index in 0..NUM_CHANNELS {
        println!("{}", sys.channel(index)?);
    }
    println!(
        "Timebase:    {} (main {} s/div)",
        sys.window_timebase()?,
        sys.main_timebase()?.main_duration()
    );
    println!("Memory:      {}", sys.memory_depth()?);
    println!("Sample rate: {} Sa/s", sys.samplerate()?);
    println!(
        "Trigger:     {} {}, position {} s",
        sys.trigger_source()?,
        sys.trigger_slope()?,
        sys.trigger_position()
    );
    println!("Acquire:     {}", sys.acquire_mode()?);
    if sys.averaging() {
        println!("Averaging:   {} waveforms", sys.average_count()?);
    }

    dso.close()?;
    Ok(())
}

fn get(config: DriverConfig, key: &str, channel: Option<u8>, list: bool) -> Result<()> {
    let key = parse_key(key)?;
    let dso = open(config)?;
    let value = if list {
        dso.config_list(key, channel_index(channel))
    } else {
        dso.config_get(key, channel_index(channel))
    }
    .with_context(|| format!("Reading {} ({})", key, key.capabilities()))?;
    println!("{key} = {value}");
    dso.close()?;
    Ok(())
}

fn set(config: DriverConfig, key: &str, value: &str, channel: Option<u8>) -> Result<()> {
    let key = parse_key(key)?;
    let value = ConfigValue::parse(key.value_kind(), value)
        .ok_or_else(|| anyhow!("'{}' is not a valid value for {}", value, key))?;
    let dso = open(config)?;
    dso.config_set(key, channel_index(channel), value)
        .with_context(|| format!("Writing {key}"))?;
    info!("{} updated", key);
    dso.close()?;
    Ok(())
}

/// Prints session events as they arrive.
struct ConsoleSink {
    dump: bool,
    frames: u64,
}

impl SessionSink for ConsoleSink {
    fn send_header(&mut self) {
        println!("--------------------------------------------------------------------------------");
    }

    fn send_frame_begin(&mut self) {
        self.frames += 1;
    }

    fn send_data_frame(&mut self, packet: AnalogPacket) {
        let precision = packet.digits.max(0) as usize;
        if self.dump {
            for sample in &packet.samples {
                println!("CH{} {:.*}", packet.channel + 1, precision, sample);
            }
            return;
        }
        let min = packet.samples.iter().copied().fold(f32::INFINITY, f32::min);
        let max = packet.samples.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        println!(
            "frame {:>4}  CH{}  {:>5} samples  min {:.*} V  max {:.*} V",
            self.frames,
            packet.channel + 1,
            packet.samples.len(),
            precision,
            min,
            precision,
            max
        );
    }

    fn send_frame_end(&mut self) {}

    fn send_metadata_changed(&mut self, key: ConfigKey, channel: Option<usize>, value: ConfigValue) {
        match channel {
            Some(ch) => println!("CH{} {} changed to {}", ch + 1, key, value),
            None => println!("{} changed to {}", key, value),
        }
    }

    fn send_end(&mut self) {
        println!("--------------------------------------------------------------------------------");
        println!("{} frames received", self.frames);
    }
}

fn acquire(
    config: DriverConfig,
    frames: Option<u64>,
    samples: Option<u64>,
    time: Option<u64>,
    dump: bool,
    stop: &AtomicBool,
) -> Result<()> {
    let dso = open(config)?;
    {
        let mut limits = dso.limits();
        limits.set_limit(LimitKind::Frames, frames.unwrap_or(0));
        limits.set_limit(LimitKind::Samples, samples.unwrap_or(0));
        limits.set_limit(LimitKind::Msec, time.unwrap_or(0));
    }
    // Seed the snapshot so only changes made during the run are reported.
    dso.refresh()?;

    let mut sink = ConsoleSink { dump, frames: 0 };
    let mut scheduler = ManualScheduler::default();
    dso.start(&mut sink, &mut scheduler)?;

    while let Some(interval) = scheduler.interval() {
        thread::sleep(interval);
        if stop.load(Ordering::SeqCst) {
            dso.request_stop();
        }
        if dso.tick(&mut sink, &mut scheduler)? == AcquisitionState::Idle {
            break;
        }
    }

    dso.close()?;
    Ok(())
}
