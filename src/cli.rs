use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "stepchart", about = "Generate four-lane rhythm charts from audio and play them back")]
pub struct Cli {
    /// Config file (defaults to ./stepchart.toml, then the user config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze audio files and write one chart per file
    Generate(GenerateArgs),
    /// Validate a chart file and print a summary
    Inspect(InspectArgs),
    /// Play a chart with a scripted player and report the score
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Input audio files (WAV, MP3, FLAC, OGG, AAC)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Directory for `<name>.chart.json` files (defaults to next to each input)
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    /// Seed for lane choice
    #[arg(long)]
    pub seed: Option<u64>,

    /// Samples per analysis window (power of two)
    #[arg(long, default_value_t = 512)]
    pub window: usize,

    /// Minimum spacing between notes in seconds (at least 0.4)
    #[arg(long, default_value_t = 0.4)]
    pub min_gap: f64,

    /// Keep raw onset times instead of snapping to quarter beats
    #[arg(long)]
    pub no_snap: bool,

    /// Hide progress bars
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Chart JSON file
    pub chart: PathBuf,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Chart JSON file
    pub chart: PathBuf,

    /// Seed for the player's timing and misses
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Maximum timing error of each press, in milliseconds
    #[arg(long, default_value_t = 0.0)]
    pub jitter_ms: f64,

    /// Chance of skipping a note (0.0-1.0)
    #[arg(long, default_value_t = 0.0)]
    pub miss_rate: f64,

    /// Scheduler ticks per second
    #[arg(long, default_value_t = 60)]
    pub fps: u32,

    /// Points lost per note that scrolls past unhit
    #[arg(long, default_value_t = 0)]
    pub scroll_miss_penalty: u32,

    /// Countdown before the song starts, in seconds
    #[arg(long, default_value_t = 3)]
    pub countdown: u32,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}
