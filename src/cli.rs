use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the video to analyze comes from
#[derive(ClapArgs, Debug)]
#[group(required = true, multiple = false)]
pub struct VideoInput {
    /// Input video file
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Id of a previously staged video
    #[arg(long)]
    pub id: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Score the hook of a video
    Analyze {
        #[command(flatten)]
        source: VideoInput,

        /// Print the final result as JSON
        #[arg(long)]
        json: bool,

        /// Print progress events as JSON lines instead of a progress bar
        #[arg(long)]
        events: bool,
    },

    /// Sample frames from the analysis window and write them as JPEGs
    Frames {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Extract the analysis window's audio as a mono WAV file
    ExtractAudio {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Stage a video for later analysis and print its id
    Stage {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Manage staged videos
    Staging {
        #[command(subcommand)]
        action: StagingAction,
    },

    /// Write the default configuration file
    InitConfig {
        /// Output path
        #[arg(short, long, default_value = "hookscore.toml")]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum StagingAction {
    /// List staged videos
    List,

    /// Remove staged videos older than the configured TTL
    Sweep,

    /// Remove one staged video
    Delete {
        /// Staged video id
        id: String,
    },
}
