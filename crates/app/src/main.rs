use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use devox_core::{ChannelPolicy, SeparationConfig, SeparationEngine, SeparationMode};
use tracing_subscriber::EnvFilter;

mod wav;

use wav::{AppResult, Encoding};

fn main() -> AppResult<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Separate(args) => run_separate(args),
        Commands::Defaults => print_defaults(),
    }
}

fn run_separate(args: SeparateArgs) -> AppResult<()> {
    tracing::info!(input = ?args.input, out_dir = ?args.out_dir, "starting separation");

    let config = build_config(&args)?;
    let engine = SeparationEngine::new(config)?;
    let policy = if args.upmix_mono {
        ChannelPolicy::UpmixMono
    } else {
        ChannelPolicy::Strict
    };

    let frame = wav::read_stereo(&args.input, policy)?;
    let (result, report) = engine.separate_with_report(&frame)?;

    let out_dir = args
        .out_dir
        .clone()
        .or_else(|| args.input.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    let base_name = args
        .input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("output");
    let encoding = if args.float {
        Encoding::Float32
    } else {
        Encoding::Pcm16
    };

    let mode = engine.mode();
    let paths = wav::write_stems(
        &out_dir,
        base_name,
        &result,
        (mode.wants_instrumental(), mode.wants_vocal()),
        encoding,
    )?;

    let report = serde_json::to_string(&report)?;
    tracing::info!(
        instrumental = ?paths.instrumental,
        vocal = ?paths.vocal,
        %report,
        "stems written"
    );
    Ok(())
}

/// Loads the optional config file and lets explicit flags override it.
fn build_config(args: &SeparateArgs) -> AppResult<SeparationConfig> {
    let mut config = match &args.config {
        Some(path) => SeparationConfig::load(path)?,
        None => SeparationConfig::default(),
    };

    if let Some(mode) = args.mode {
        config.mode = mode.into();
    }
    if let Some(low) = args.band_low {
        config.spectral.vocal_band_low_hz = low;
    }
    if let Some(high) = args.band_high {
        config.spectral.vocal_band_high_hz = high;
    }
    if let Some(ceiling) = args.ceiling {
        config.dynamics.limiter_ceiling = ceiling;
    }
    if let Some(target) = args.target_rms {
        config.dynamics.target_rms = Some(target);
    }
    if args.sequential {
        config.parallel = false;
    }

    config.validate()?;
    Ok(config)
}

fn print_defaults() -> AppResult<()> {
    println!("{}", SeparationConfig::default().to_json_pretty()?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Vocal / instrumental stem separation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Split a stereo WAV file into instrumental and vocal stems.
    Separate(SeparateArgs),
    /// Print the built-in configuration as JSON.
    Defaults,
}

#[derive(clap::Args, Debug)]
struct SeparateArgs {
    /// Stereo WAV file to separate.
    input: PathBuf,
    /// Directory for the generated stems. Defaults to the input's directory.
    #[arg(short, long)]
    out_dir: Option<PathBuf>,
    /// JSON configuration file; missing fields use the defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Which stems to produce.
    #[arg(short, long, value_enum)]
    mode: Option<ModeArg>,
    /// Duplicate mono input into both channels instead of rejecting it.
    #[arg(long)]
    upmix_mono: bool,
    /// Write 32-bit float WAV instead of 16-bit PCM.
    #[arg(long)]
    float: bool,
    /// Lower edge of the vocal band in Hz.
    #[arg(long)]
    band_low: Option<f32>,
    /// Upper edge of the vocal band in Hz.
    #[arg(long)]
    band_high: Option<f32>,
    /// Peak ceiling for both stems.
    #[arg(long)]
    ceiling: Option<f32>,
    /// RMS level each stem is pulled towards before makeup gain.
    #[arg(long)]
    target_rms: Option<f32>,
    /// Process the two streams one after the other.
    #[arg(long)]
    sequential: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Both,
    Vocals,
    Instrumental,
}

impl From<ModeArg> for SeparationMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Both => SeparationMode::Both,
            ModeArg::Vocals => SeparationMode::VocalsOnly,
            ModeArg::Instrumental => SeparationMode::InstrumentalOnly,
        }
    }
}
