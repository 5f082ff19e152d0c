//! thermadc Application
//!
//! Command-line front end for MCP3008 acquisition and thermistor monitoring.
//!
//! # Usage
//!
//! ```bash
//! # Sample channels 0 and 1 (single-ended) every second into ./data.csv
//! thermadc sample -c 0,1
//!
//! # 10 sub-samples per record, 100 records, std-dev columns, buffer 5 records
//! thermadc sample -c 0,1,2 -m s,d -s 10 -n 100 -e -b 5 -o run.csv --overwrite
//!
//! # Real hardware on a Raspberry Pi (build with --features rpi)
//! thermadc --device gpio --transport hardware sample -c 0
//!
//! # Log thermistor temperature on channel 0
//! thermadc thermistor --channel 0 --interval 2
//! ```

mod device;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use thermadc_core::math::ThermistorCalibration;
use thermadc_core::types::InputMode;
use thermadc_embedded::{AdcReader, Thermistor};
use thermadc_native::{SamplerConfig, SamplingLoop, StopReason, TextFormat, TextSink};
use tokio::runtime::Runtime;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use device::{DeviceArgs, DeviceKind};

/// thermadc
#[derive(Parser, Debug)]
#[command(name = "thermadc")]
#[command(author, version, about = "MCP3008 data acquisition and thermistor monitoring", long_about = None)]
struct Cli {
    /// Logging verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Shorthand for --log-level debug
    #[arg(short, long)]
    verbose: bool,

    #[command(flatten)]
    device: DeviceArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record averaged multi-channel samples to a delimited text file
    Sample(SampleArgs),

    /// Periodically log a thermistor temperature
    Thermistor(ThermistorArgs),
}

#[derive(clap::Args, Debug)]
struct SampleArgs {
    /// Channels to sample, separated by ','
    #[arg(short, long, value_delimiter = ',')]
    channels: Vec<u8>,

    /// Mode per channel, 's' (single-ended) or 'd' (differential), separated by ','
    #[arg(short, long, value_delimiter = ',')]
    modes: Vec<InputMode>,

    /// Delay between samples in seconds
    #[arg(short, long)]
    delay: Option<f64>,

    /// Sub-samples averaged into each recorded sample
    #[arg(short = 's', long)]
    samp_size: Option<u32>,

    /// Number of samples to collect (unbounded if omitted)
    #[arg(short = 'n', long)]
    samp_num: Option<u64>,

    /// Samples held in memory before writing to disk
    #[arg(short = 'b', long)]
    buff_size: Option<usize>,

    /// Store the std-dev of the sub-samples
    #[arg(short = 'e', long)]
    store_error: bool,

    /// Stop after this many consecutive failed cycles
    #[arg(long)]
    max_failures: Option<u32>,

    /// File to store samples
    #[arg(short, long, default_value = "./data.csv")]
    output: PathBuf,

    /// Append if the output file exists
    #[arg(long, conflicts_with = "overwrite")]
    append: bool,

    /// Overwrite if the output file exists
    #[arg(long)]
    overwrite: bool,

    /// Field delimiter
    #[arg(long, default_value = ",")]
    delimiter: String,

    /// JSON settings file; explicit flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct ThermistorArgs {
    /// ADC channel the divider midpoint is wired to
    #[arg(long, default_value_t = 0)]
    channel: u8,

    /// Raw reads averaged per reading
    #[arg(long, default_value_t = 100)]
    samples: usize,

    /// Seconds between readings
    #[arg(long, default_value_t = 1.0)]
    interval: f64,

    /// Stop after this many readings
    #[arg(long)]
    count: Option<u64>,

    /// Steinhart–Hart constant coefficient
    #[arg(long, default_value_t = ThermistorCalibration::RSBR_302J_Z50.a)]
    coeff_a: f64,

    /// Steinhart–Hart linear coefficient
    #[arg(long, default_value_t = ThermistorCalibration::RSBR_302J_Z50.b)]
    coeff_b: f64,

    /// Steinhart–Hart quadratic coefficient
    #[arg(long, default_value_t = ThermistorCalibration::RSBR_302J_Z50.c)]
    coeff_c: f64,

    /// Thermistor resistance at 25 °C (Ω)
    #[arg(long, default_value_t = ThermistorCalibration::RSBR_302J_Z50.r_25c)]
    r_25c: f64,

    /// Divider resistor (Ω)
    #[arg(long, default_value_t = ThermistorCalibration::RSBR_302J_Z50.r_std)]
    r_std: f64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        match cli.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("thermadc v{}", env!("CARGO_PKG_VERSION"));

    if !(cli.device.vref.is_finite() && cli.device.vref > 0.0) {
        anyhow::bail!("--vref must be a positive voltage, got {}", cli.device.vref);
    }

    // Ctrl-C raises the flag; the loops notice it between cycles
    let runtime = Runtime::new()?;
    let interrupt = Arc::new(AtomicBool::new(false));
    {
        let interrupt = Arc::clone(&interrupt);
        runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing current cycle");
                interrupt.store(true, Ordering::SeqCst);
            }
        });
    }

    match cli.device.device {
        DeviceKind::Simulate => {
            let adc = device::open_simulated(&cli.device)?;
            run_command(adc, cli.command, &interrupt)
        }
        DeviceKind::Gpio => run_gpio(&cli.device, cli.command, &interrupt),
    }
}

#[cfg(feature = "rpi")]
fn run_gpio(args: &DeviceArgs, command: Commands, interrupt: &Arc<AtomicBool>) -> anyhow::Result<()> {
    let adc = device::open_gpio(args)?;
    run_command(adc, command, interrupt)
}

#[cfg(not(feature = "rpi"))]
fn run_gpio(_args: &DeviceArgs, _command: Commands, _interrupt: &Arc<AtomicBool>) -> anyhow::Result<()> {
    anyhow::bail!(
        "GPIO access not enabled. Rebuild with --features rpi:\n\
         cargo run -p thermadc-app --features rpi"
    );
}

fn run_command<A: AdcReader>(
    adc: A,
    command: Commands,
    interrupt: &Arc<AtomicBool>,
) -> anyhow::Result<()> {
    match command {
        Commands::Sample(args) => run_sample(adc, args, interrupt),
        Commands::Thermistor(args) => run_thermistor(adc, &args, interrupt),
    }
}

/// Merge the optional JSON file with explicit flags.
fn build_config(args: &SampleArgs) -> anyhow::Result<SamplerConfig> {
    let mut config = match &args.config {
        Some(path) => SamplerConfig::from_json_file(path)?,
        None => SamplerConfig::default(),
    };

    if !args.channels.is_empty() {
        config.channels = SamplerConfig::from_lists(&args.channels, &args.modes)?.channels;
    } else if !args.modes.is_empty() {
        anyhow::bail!("--modes requires --channels");
    }
    if let Some(delay) = args.delay {
        config.delay = delay;
    }
    if let Some(samp_size) = args.samp_size {
        config.samp_size = samp_size;
    }
    if args.samp_num.is_some() {
        config.samp_num = args.samp_num;
    }
    if let Some(buff_size) = args.buff_size {
        config.buff_size = buff_size;
    }
    if args.store_error {
        config.store_error = true;
    }
    if args.max_failures.is_some() {
        config.max_consecutive_failures = args.max_failures;
    }
    Ok(config)
}

/// Decide between create, append and overwrite for the output file.
fn output_mode(path: &Path, append: bool, overwrite: bool) -> anyhow::Result<(&'static str, bool)> {
    if !path.exists() {
        return Ok(("create", false));
    }
    if append {
        Ok(("append", true))
    } else if overwrite {
        Ok(("overwrite", false))
    } else {
        anyhow::bail!(
            "output file '{}' already exists; pass --append or --overwrite",
            path.display()
        )
    }
}

fn run_sample<A: AdcReader>(
    adc: A,
    args: SampleArgs,
    interrupt: &Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let config = build_config(&args)?;
    config.validate(adc.num_channels())?;

    let (mode, append) = output_mode(&args.output, args.append, args.overwrite)?;
    info!("Writing (mode=\"{}\") output file: {}", mode, args.output.display());

    let format = TextFormat {
        delimiter: args.delimiter,
        ..TextFormat::default()
    };
    let sink = TextSink::create(&args.output, append, format)
        .with_context(|| format!("cannot open {}", args.output.display()))?;

    let outcome = SamplingLoop::new(adc, sink, config)?
        .with_interrupt(Arc::clone(interrupt))
        .run();

    info!("{} samples collected", outcome.completed);
    match outcome.reason {
        StopReason::Completed | StopReason::Interrupted => Ok(()),
        StopReason::SinkFailed(e) => Err(e).context("writing samples failed"),
        StopReason::TooManyFailures => {
            anyhow::bail!("stopped after {} failed cycles", outcome.aborted_cycles)
        }
    }
}

fn run_thermistor<A: AdcReader>(
    adc: A,
    args: &ThermistorArgs,
    interrupt: &Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let calibration =
        ThermistorCalibration::new(args.coeff_a, args.coeff_b, args.coeff_c, args.r_25c, args.r_std);
    let mut thermistor = Thermistor::new(adc, args.channel, calibration)?
        .with_sample_count(args.samples);
    let interval = Duration::try_from_secs_f64(args.interval)
        .with_context(|| format!("invalid --interval {}", args.interval))?;

    info!(
        "Reading thermistor on channel {} ({} samples per reading)",
        thermistor.channel(),
        args.samples
    );

    let mut readings: u64 = 0;
    while !interrupt.load(Ordering::SeqCst) && args.count.map_or(true, |n| readings < n) {
        match thermistor.temperature() {
            Ok(celsius) => info!("T = {:.2} °C", celsius),
            Err(e) => error!("Reading failed: {}", e),
        }
        readings += 1;
        sleep_unless_interrupted(interval, interrupt);
    }

    info!("{} readings taken", readings);
    Ok(())
}

fn sleep_unless_interrupted(duration: Duration, interrupt: &AtomicBool) {
    const SLICE: Duration = Duration::from_millis(100);
    let mut remaining = duration;
    while !remaining.is_zero() && !interrupt.load(Ordering::SeqCst) {
        let slice = remaining.min(SLICE);
        std::thread::sleep(slice);
        remaining -= slice;
    }
}
