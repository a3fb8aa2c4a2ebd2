//! playhead - command line player
//!
//! Plays a single audio file to an output device through the playback
//! engine, and exposes small inspection utilities (device listing, source
//! metadata) for troubleshooting.

use anyhow::{Context, Result};
use clap::Parser;
use playhead::{
    AudioBackend, CpalBackend, EngineEvent, PlaybackSession, PlayerConfig, ResampleQuality,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for playhead
#[derive(Parser, Debug)]
#[command(name = "playhead")]
#[command(about = "Cross-format streaming audio player")]
#[command(version)]
struct Args {
    /// Audio file to play (WAV, FLAC, MP3, Ogg/Vorbis)
    file: Option<PathBuf>,

    /// Output device name (default: system default device)
    #[arg(short, long, env = "PLAYHEAD_DEVICE")]
    device: Option<String>,

    /// Configuration file (TOML)
    #[arg(short, long, env = "PLAYHEAD_CONFIG")]
    config: Option<PathBuf>,

    /// Use high-quality (windowed-sinc) resampling
    #[arg(long)]
    high_quality: bool,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Print source format information and exit
    #[arg(long)]
    inspect: bool,

    /// Emit --inspect output as JSON
    #[arg(long, requires = "inspect")]
    json: bool,

    /// Seek to this many seconds before starting playback
    #[arg(long)]
    seek: Option<f64>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "playhead=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let backend = CpalBackend::new();

    if args.list_devices {
        for device in backend.devices().context("failed to enumerate devices")? {
            let marker = if device.is_default { " (default)" } else { "" };
            println!("{}{}", device.name, marker);
        }
        return Ok(());
    }

    let file = args
        .file
        .as_deref()
        .context("no input file given (see --help)")?;

    if args.inspect {
        let info = playhead::inspect_file(file)
            .with_context(|| format!("failed to inspect {}", file.display()))?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&info)?);
            return Ok(());
        }
        println!("container:    {}", info.container);
        println!("format:       {}", info.spec);
        match (info.total_frames, info.duration_seconds()) {
            (Some(frames), Some(secs)) => {
                println!("frames:       {}", frames);
                println!("duration:     {:.2} s", secs);
            }
            _ => println!("duration:     unknown (streaming source)"),
        }
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => PlayerConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PlayerConfig::default(),
    };
    if args.device.is_some() {
        config.device_id = args.device.clone();
    }
    if args.high_quality {
        config.resample_quality = ResampleQuality::HighQuality;
    }

    playhead::init().context("engine initialization failed")?;

    let mut session = PlaybackSession::open_path(file, &config, &backend)
        .with_context(|| format!("failed to open {}", file.display()))?;
    let events = session.events();

    if let Some(seconds) = args.seek {
        let frame = (seconds * session.info().spec.sample_rate as f64) as u64;
        match session.seek(frame) {
            Ok(landed) => info!("Starting from frame {}", landed),
            Err(playhead::Error::SeekUnsupported) => {
                warn!("Source does not support seeking, starting from the top")
            }
            Err(e) => return Err(e).context("seek failed"),
        }
    }

    info!("Playing {}", file.display());
    session.start().context("failed to start playback")?;

    // Wait for the decoder to finish, then give the ring time to drain
    // before tearing the device down.
    let mut failed = None;
    loop {
        match events.recv() {
            Ok(EngineEvent::EndOfStream { .. }) => break,
            Ok(EngineEvent::Fault { message, .. }) => {
                failed = Some(message);
                break;
            }
            Ok(EngineEvent::DecodeWarning {
                corrupt_packets, ..
            }) => {
                warn!("Corrupt frames skipped (total {})", corrupt_packets);
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }

    if failed.is_none() {
        let drained_at = session.stats().underruns;
        let deadline = Instant::now() + Duration::from_secs(5);
        while session.stats().underruns == drained_at && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    session.close().context("close failed")?;
    playhead::shutdown().context("engine shutdown failed")?;

    match failed {
        Some(message) => anyhow::bail!("playback failed: {}", message),
        None => {
            info!("Done");
            Ok(())
        }
    }
}
