mod decode;

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
};

use clap::{Parser, Subcommand};
use lyric_sync_core::{
    export, export_all, AppConfig, AudioOutput, ExportFormat, PlaybackEngine, PlaybackEvent,
    ProjectStore, WaveformAnalyzer,
};
use tracing_subscriber::EnvFilter;

fn main() -> lyric_sync_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Analyze {
            input,
            window,
            threshold,
            min_silence,
        } => {
            let mut analysis = config.analysis;
            analysis.window_size = window.unwrap_or(analysis.window_size);
            analysis.silence_threshold = threshold.unwrap_or(analysis.silence_threshold);
            analysis.min_silence_duration = min_silence.unwrap_or(analysis.min_silence_duration);
            run_analyze(&input, &analysis)
        }
        Commands::Play {
            input,
            from,
            speed,
            volume,
        } => run_play(&input, &config, from, speed, volume),
        Commands::Normalize { project } => run_normalize(&project, &config),
        Commands::Export {
            project,
            format,
            output,
            all,
        } => run_export(&project, &config, format, output, all),
    }
}

fn run_analyze(
    input: &Path,
    analysis: &lyric_sync_core::AnalysisConfig,
) -> lyric_sync_core::Result<()> {
    tracing::info!(?input, window = analysis.window_size, "analysing audio");
    let buffer = decode::read_wav(input)?;
    let analyzer = WaveformAnalyzer::new(&buffer);
    let features = analyzer.features(analysis)?;

    let report = serde_json::json!({
        "stats": analyzer.stats(),
        "silence": features.silence,
        "peaks": features.peaks.len(),
        "windows": features.rms.len(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_play(
    input: &Path,
    config: &AppConfig,
    from: f64,
    speed: f32,
    volume: f32,
) -> lyric_sync_core::Result<()> {
    let buffer = decode::read_wav(input)?;
    let (tx, rx) = mpsc::channel::<PlaybackEvent>();
    let mut engine = PlaybackEngine::with_config(config.audio.clone(), open_output()?, Arc::new(tx));
    engine.load(&buffer)?;
    engine.set_speed(speed)?;
    engine.set_volume(volume)?;
    engine.seek(from)?;

    tracing::info!(?input, duration = engine.duration(), "starting playback");
    engine.play()?;
    for event in rx.iter() {
        match event {
            PlaybackEvent::Position(seconds) => tracing::info!(position = seconds, "playing"),
            PlaybackEvent::Finished(reason) => {
                tracing::info!(?reason, "playback finished");
                break;
            }
        }
    }
    engine.stop()
}

#[cfg(feature = "device")]
fn open_output() -> lyric_sync_core::Result<Arc<dyn AudioOutput>> {
    Ok(Arc::new(lyric_sync_core::CpalOutput::open()?))
}

#[cfg(not(feature = "device"))]
fn open_output() -> lyric_sync_core::Result<Arc<dyn AudioOutput>> {
    tracing::warn!("built without the `device` feature, playback is silent");
    Ok(Arc::new(lyric_sync_core::PacedOutput::new()))
}

fn run_normalize(project_path: &Path, config: &AppConfig) -> lyric_sync_core::Result<()> {
    let mut store = ProjectStore::new(&config.project);
    let mut project = store.load(project_path)?;

    project.timeline.normalize();
    let violations = project.timeline.validate();
    for violation in &violations {
        tracing::warn!(%violation, "timeline problem");
    }

    let written = store.save(&project, project_path)?;
    tracing::info!(
        path = %written.display(),
        lines = project.timeline.len(),
        problems = violations.len(),
        "normalized project"
    );
    Ok(())
}

fn run_export(
    project_path: &Path,
    config: &AppConfig,
    format: Option<ExportFormat>,
    output: Option<PathBuf>,
    all: bool,
) -> lyric_sync_core::Result<()> {
    let project = ProjectStore::new(&config.project).load(project_path)?;
    let base = output.unwrap_or_else(|| project_path.with_extension(""));

    if all {
        let written = export_all(&project.timeline, &base);
        println!("{}", serde_json::to_string_pretty(&written)?);
        return Ok(());
    }

    let format = format.ok_or("either --format or --all is required")?;
    let written = export(&project.timeline, &base, format)?;
    tracing::info!(%format, path = %written.display(), "exported");
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
#[command(author, version, about = "Align lyrics and subtitles to audio", long_about = None)]
struct Cli {
    /// Optional JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print waveform statistics, silences and peaks of a WAV file as JSON.
    Analyze {
        /// Path to the WAV file that should be analysed.
        input: PathBuf,
        /// Analysis window in samples.
        #[arg(short, long)]
        window: Option<usize>,
        /// RMS level below which a window counts as silent.
        #[arg(short, long)]
        threshold: Option<f32>,
        /// Shortest silence to report, in seconds.
        #[arg(long)]
        min_silence: Option<f64>,
    },
    /// Play a WAV file and log the playback position.
    Play {
        input: PathBuf,
        /// Start position in seconds.
        #[arg(long, default_value_t = 0.0)]
        from: f64,
        #[arg(long, default_value_t = 1.0)]
        speed: f32,
        #[arg(long, default_value_t = 1.0)]
        volume: f32,
    },
    /// Sort lines, resolve overlaps and report remaining problems.
    Normalize {
        /// Project file to rewrite in place.
        project: PathBuf,
    },
    /// Write the project's lines as subtitles or lyrics.
    Export {
        project: PathBuf,
        /// One of txt, srt, lrc, vtt, json.
        #[arg(short, long)]
        format: Option<ExportFormat>,
        /// Output path; defaults to the project path without its extension.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Export every format.
        #[arg(long, conflicts_with = "format")]
        all: bool,
    },
}
