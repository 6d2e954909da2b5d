//! Hookscore command line
//!
//! Runs the hook scoring pipeline on a local or staged video and manages the
//! staging area.

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hookscore::audio::{AudioExtractor, FfmpegTranscoder};
use hookscore::cli::{Args, Commands, StagingAction, VideoInput};
use hookscore::config::Config;
use hookscore::error::HookError;
use hookscore::frames::FrameSampler;
use hookscore::media::{MediaFactory, VideoSource};
use hookscore::progress::ProgressEvent;
use hookscore::storage::{BlobStore, FileBlobStore};
use hookscore::types::FinalResult;
use hookscore::workflow::AnalysisOrchestrator;

const DEFAULT_CONFIG_FILE: &str = "hookscore.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;

    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    }
    .with_env_overrides();

    let store = FileBlobStore::from_config(&config.storage);

    match args.command {
        Commands::Analyze { source, json, events } => {
            let swept = store.sweep_expired(Utc::now()).await?;
            if swept > 0 {
                info!("Removed {} expired staged videos", swept);
            }

            let video = load_source(&store, &source).await?;
            let orchestrator = Arc::new(AnalysisOrchestrator::from_config(&config));
            let result = run_analysis(orchestrator, video, events).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }
        }
        Commands::Frames { input, output } => {
            info!("Sampling frames from: {}", input.display());
            let video = VideoSource::from_path(&input).await?;
            let sampler = FrameSampler::new(
                MediaFactory::create_decoder(config.media.clone()),
                (&config.sampling).into(),
            );

            let frames = sampler
                .sample(&video, &tokio_util::sync::CancellationToken::new(), &mut ())
                .await?;

            tokio::fs::create_dir_all(&output).await?;
            for (i, frame) in frames.iter().enumerate() {
                let path = output.join(format!("frame_{:02}_{:.3}s.jpg", i, frame.timestamp));
                tokio::fs::write(&path, &frame.encoded_image).await?;
            }
            println!("Wrote {} frames to {}", frames.len(), output.display());
        }
        Commands::ExtractAudio { input, output } => {
            info!("Extracting audio from: {}", input.display());
            let video = VideoSource::from_path(&input).await?;
            let extractor = AudioExtractor::from_config(&config, FfmpegTranscoder::shared(config.media.clone()));

            let extraction = extractor.extract(&video).await;
            tokio::fs::write(&output, &extraction.clip.bytes).await?;
            println!(
                "Wrote {:.2}s of audio ({} bytes, {}Hz, {:?}) to {}",
                extraction.clip.duration_seconds,
                extraction.clip.bytes.len(),
                extraction.clip.sample_rate,
                extraction.origin,
                output.display()
            );
            if let Some(failure) = extraction.failure {
                warn!("Audio extraction failed: {}", failure);
            }
        }
        Commands::Stage { input } => {
            let video = VideoSource::from_path(&input).await?;
            let id = store.put(video.name(), video.media_type(), video.bytes()).await?;
            println!("{}", id);
        }
        Commands::Staging { action } => match action {
            StagingAction::List => {
                let entries = store.list().await?;
                if entries.is_empty() {
                    println!("No staged videos found.");
                } else {
                    println!("{:<40} {:<12} {:<12} {:<30}", "Id", "Size (MB)", "Age", "Name");
                    println!("{}", "-".repeat(96));
                    let now = Utc::now();
                    for entry in entries {
                        let age = (now - entry.stored_at).num_seconds().max(0) as u64;
                        println!(
                            "{:<40} {:<12.2} {:<12} {:<30}",
                            entry.id,
                            entry.size as f64 / 1024.0 / 1024.0,
                            format_duration(age),
                            entry.name
                        );
                    }
                }
            }
            StagingAction::Sweep => {
                let removed = store.sweep_expired(Utc::now()).await?;
                println!("Removed {} expired staged videos", removed);
            }
            StagingAction::Delete { id } => {
                if store.delete(&id).await? {
                    println!("Deleted {}", id);
                } else {
                    println!("No staged video with id {}", id);
                }
            }
        },
        Commands::InitConfig { output } => {
            Config::default().save_to_file(&output)?;
            println!("Wrote default configuration to {}", output.display());
        }
    }

    Ok(())
}

async fn load_source(store: &FileBlobStore, input: &VideoInput) -> Result<VideoSource> {
    if let Some(path) = &input.input {
        let video = VideoSource::from_path(path).await?;
        let id = store.put(video.name(), video.media_type(), video.bytes()).await?;
        info!("Staged {} as {}", path.display(), id);
        return Ok(video);
    }

    let id = input
        .id
        .as_deref()
        .ok_or_else(|| HookError::Config("Either --input or --id is required".to_string()))?;
    let blob = store
        .get(id)
        .await?
        .ok_or_else(|| HookError::Storage(format!("No staged video with id {}", id)))?;

    Ok(VideoSource::new(blob.entry.name, blob.entry.media_type, blob.bytes)?)
}

/// Run one analysis, rendering its events; Ctrl-C cancels the run
async fn run_analysis(orchestrator: Arc<AnalysisOrchestrator>, video: VideoSource, json_events: bool) -> Result<FinalResult> {
    let mut run = orchestrator.spawn(video);

    let cancel = run.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling analysis...");
            cancel.cancel();
        }
    });

    let pb = if json_events {
        None
    } else {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")?
                .progress_chars("#>-"),
        );
        Some(pb)
    };

    while let Some(event) = run.events.recv().await {
        match &pb {
            Some(pb) => {
                pb.set_position(event.percent() as u64);
                pb.set_message(event.message().to_string());
                match &event {
                    ProgressEvent::Completed { .. } => pb.finish_with_message("Analysis completed!"),
                    ProgressEvent::Error { message, .. } | ProgressEvent::Cancelled { message, .. } => {
                        pb.abandon_with_message(message.clone())
                    }
                    _ => {}
                }
            }
            None => println!("{}", serde_json::to_string(&event)?),
        }
    }

    Ok(run.handle.await??)
}

fn print_result(result: &FinalResult) {
    println!("\nOverall hook score: {}/100 (confidence {}%)", result.overall_score, result.confidence);
    println!("Visual: {:.0}  Audio: {:.0}", result.visual_score, result.audio_score);
    println!("\nBreakdown:");
    let b = &result.breakdown;
    for (name, value) in [
        ("Sharpness", b.sharpness),
        ("Exposure", b.exposure),
        ("Stability", b.stability),
        ("Composition", b.composition),
        ("Audio clarity", b.audio_clarity),
        ("Engagement", b.engagement),
    ] {
        println!("  {:<15} {:>5.0}", name, value);
    }

    if let Some(transcript) = &result.transcript {
        println!("\nTranscript: \"{}\"", transcript.text);
    }

    if !result.comments.is_empty() {
        println!("\nComments:");
        for comment in &result.comments {
            println!("  - {}", comment);
        }
    }
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".hookscore").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Daily rotation; the guard must outlive the program
    let file_appender = rolling::daily(&log_dir, "hookscore.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("hookscore.log").display()
    );

    Ok(())
}

/// Format duration in seconds to human readable string
fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}
