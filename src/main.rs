use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tapescribe::audio::{write_wav_pcm, AudioSource, AudioStreamSource, RecordedAudio};
use tapescribe::session::{RecordingSession, SessionConfig};
use tapescribe::setup::{self, SetupOptions};
use tapescribe::{create_router, AppState, Settings};
use tracing::info;

#[derive(Parser)]
#[command(name = "tapescribe", version, about = "Audio recorder with local transcription")]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP control surface
    Serve,

    /// Record a single session from the configured sources
    Record {
        /// Replay a WAV file instead of live capture
        #[arg(long)]
        input: Option<PathBuf>,

        /// Stop automatically after this many seconds
        #[arg(long)]
        duration: Option<u64>,
    },

    /// Decode a compressed recording and re-encode it as canonical WAV
    Convert {
        input: PathBuf,

        /// Output path (defaults to the input with a .wav extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Download the recognizer and model, then update settings
    Setup {
        #[arg(long)]
        install_dir: Option<PathBuf>,

        #[arg(long)]
        model_url: Option<String>,

        #[arg(long)]
        archive_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let settings_path = cli.config.clone().unwrap_or_else(Settings::default_path);
    let settings = Settings::load(&settings_path)?;

    match cli.command {
        Commands::Serve => serve(settings).await,
        Commands::Record { input, duration } => record(settings, input, duration).await,
        Commands::Convert { input, output } => convert(input, output),
        Commands::Setup {
            install_dir,
            model_url,
            archive_url,
        } => run_setup(settings, settings_path, install_dir, model_url, archive_url).await,
    }
}

async fn serve(settings: Settings) -> Result<()> {
    let addr = format!("{}:{}", settings.http.bind, settings.http.port);

    let state = AppState::new(settings);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("tapescribe listening on {}", addr);

    axum::serve(listener, router).await?;

    Ok(())
}

async fn record(settings: Settings, input: Option<PathBuf>, duration: Option<u64>) -> Result<()> {
    let sources = match input {
        Some(path) => vec![AudioSource::File(path, AudioStreamSource::System)],
        None => vec![
            AudioSource::System,
            AudioSource::Microphone(settings.microphone.clone()),
        ],
    };

    let config = SessionConfig::from_settings(&settings, sources);
    let session = RecordingSession::new(config)?;

    session.start().await?;

    match duration {
        Some(secs) => {
            info!("Recording for {}s", secs);
            tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
        }
        None => {
            info!("Recording; press Ctrl+C to stop");
            tokio::signal::ctrl_c().await?;
        }
    }

    let stats = session.stop().await?;

    info!(
        "Done: {:.1}s recorded, {} chunks transcribed ({} failed)",
        stats.duration_secs, stats.chunks_transcribed, stats.chunks_failed
    );
    info!("Output: {}", session.output_path().display());

    Ok(())
}

fn convert(input: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let output = output.unwrap_or_else(|| input.with_extension("wav"));

    let audio = RecordedAudio::decode(&input)?;
    write_wav_pcm(&output, &audio.samples, audio.sample_rate, audio.channels)?;

    info!(
        "Converted {} -> {} ({:.1}s, {}Hz, {}ch)",
        input.display(),
        output.display(),
        audio.duration_seconds,
        audio.sample_rate,
        audio.channels
    );

    Ok(())
}

async fn run_setup(
    mut settings: Settings,
    settings_path: PathBuf,
    install_dir: Option<PathBuf>,
    model_url: Option<String>,
    archive_url: Option<String>,
) -> Result<()> {
    let defaults = SetupOptions::default();
    let options = SetupOptions {
        install_dir: install_dir.unwrap_or(defaults.install_dir),
        model_url: model_url.unwrap_or(defaults.model_url),
        archive_url: archive_url.or(defaults.archive_url),
    };

    let report = setup::install(options).await?;

    settings.transcription.model_path = report.model.display().to_string();
    if let Some(executable) = &report.executable {
        settings.transcription.executable_path = executable.display().to_string();
        settings.transcription.enabled = true;
    }
    settings.save(&settings_path)?;

    info!("Setup complete; settings updated at {}", settings_path.display());

    Ok(())
}
