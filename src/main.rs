mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cli::{Cli, Command, GenerateArgs, InspectArgs, SimulateArgs};
use stepchart::audio::decode::decode_audio;
use stepchart::chart::{Chart, ChartGenerator};
use stepchart::config::{self, AnalysisConfig, Config, SessionConfig};
use stepchart::engine::{Autoplay, Skin};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let config = discovered_config(cli.config);

    match cli.command {
        Command::Generate(args) => generate(args, config.analysis),
        Command::Inspect(args) => inspect(args),
        Command::Simulate(args) => simulate(args, config.session, config.skin),
    }
}

/// Places a config file is looked for when `--config` is not given, first match wins.
fn config_candidates() -> Vec<PathBuf> {
    let user_dirs = [dirs::home_dir().map(|home| home.join(".config")), dirs::config_dir()];
    std::iter::once(PathBuf::from("stepchart.toml"))
        .chain(
            user_dirs
                .into_iter()
                .flatten()
                .map(|dir| dir.join("stepchart").join("config.toml")),
        )
        .collect()
}

fn discovered_config(explicit: Option<PathBuf>) -> Config {
    let found = explicit.or_else(|| config_candidates().into_iter().find(|p| p.is_file()));
    let Some(path) = found else {
        log::debug!("No config file found; using defaults");
        return Config::default();
    };
    match config::load_config(&path) {
        Ok(cfg) => {
            log::info!("Config: {}", path.display());
            cfg
        }
        Err(err) => {
            log::warn!("{:#}; using defaults", err);
            Config::default()
        }
    }
}

fn generate(args: GenerateArgs, mut analysis: AnalysisConfig) -> Result<()> {
    // Merge: CLI values apply only when moved off their defaults
    if args.window != 512 { analysis.window_size = args.window; }
    if args.min_gap != 0.4 { analysis.min_gap = args.min_gap; }
    if args.no_snap { analysis.snap_to_grid = false; }
    if args.seed.is_some() { analysis.seed = args.seed; }

    let generator = ChartGenerator::new(analysis)?;
    if let Some(ref dir) = args.out_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    }

    let progress = MultiProgress::new();
    if args.quiet {
        progress.set_draw_target(ProgressDrawTarget::hidden());
    }
    let style = ProgressStyle::default_bar()
        .template("{msg:24!} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta})")
        .context("Invalid progress bar template")?
        .progress_chars("=>-");

    log::info!("Generating charts for {} file(s)", args.inputs.len());
    let results: Vec<(&PathBuf, Result<PathBuf>)> = args
        .inputs
        .par_iter()
        .map(|input| {
            let pb = progress.add(ProgressBar::new(0));
            pb.set_style(style.clone());
            pb.set_message(display_name(input));
            let result = generate_one(&generator, input, args.out_dir.as_deref(), &pb);
            pb.finish();
            (input, result)
        })
        .collect();

    let mut failed = 0;
    for (input, result) in &results {
        match result {
            Ok(out) => log::info!("{} -> {}", input.display(), out.display()),
            Err(err) => {
                failed += 1;
                log::error!("{}: {:#}", input.display(), err);
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{} of {} inputs failed", failed, results.len());
    }
    Ok(())
}

fn generate_one(
    generator: &ChartGenerator,
    input: &Path,
    out_dir: Option<&Path>,
    pb: &ProgressBar,
) -> Result<PathBuf> {
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    let buffer = decode_audio(input)?;

    let analysis = generator.analyze(&buffer, &mut generator.rng(), |p| {
        if p.frame == 1 {
            pb.set_length(p.total as u64);
        }
        pb.set_position(p.frame as u64);
        Ok(())
    })?;
    log::info!(
        "{}: {} BPM{}, {} notes from {} candidates",
        input.display(),
        analysis.tempo.bpm,
        if analysis.tempo.fell_back() { " (fallback)" } else { "" },
        analysis.chart.len(),
        analysis.candidates
    );

    let out = chart_path(input, out_dir);
    let file = File::create(&out).with_context(|| format!("Failed to create {}", out.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &analysis.chart)
        .with_context(|| format!("Failed to write {}", out.display()))?;
    Ok(out)
}

fn chart_path(input: &Path, out_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("chart");
    let dir = out_dir.or_else(|| input.parent()).unwrap_or(Path::new("."));
    dir.join(format!("{stem}.chart.json"))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn read_chart(path: &Path) -> Result<Chart> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read chart: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid chart: {}", path.display()))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChartSummary {
    tempo_bpm: u32,
    notes: usize,
    duration: f64,
    lanes: [usize; 4],
    notes_per_second: f64,
    mean_velocity: f64,
}

impl ChartSummary {
    fn of(chart: &Chart) -> Self {
        let duration = chart.duration();
        let velocity_sum: u64 = chart.notes().iter().map(|n| n.velocity as u64).sum();
        Self {
            tempo_bpm: chart.tempo_bpm(),
            notes: chart.len(),
            duration,
            lanes: chart.lane_counts(),
            notes_per_second: if duration > 0.0 { chart.len() as f64 / duration } else { 0.0 },
            mean_velocity: if chart.is_empty() { 0.0 } else { velocity_sum as f64 / chart.len() as f64 },
        }
    }
}

fn inspect(args: InspectArgs) -> Result<()> {
    let chart = read_chart(&args.chart)?;
    let summary = ChartSummary::of(&chart);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    println!("{}", args.chart.display());
    println!("  tempo:     {} BPM", summary.tempo_bpm);
    println!("  notes:     {}", summary.notes);
    println!("  duration:  {:.2}s", summary.duration);
    println!("  density:   {:.2} notes/s", summary.notes_per_second);
    println!("  velocity:  {:.1} mean", summary.mean_velocity);
    let [left, up, down, right] = summary.lanes;
    println!("  lanes:     left {left}, up {up}, down {down}, right {right}");
    if chart.is_empty() {
        log::warn!("Chart has no notes and cannot be played");
    }
    Ok(())
}

fn simulate(args: SimulateArgs, mut session: SessionConfig, skin: Skin) -> Result<()> {
    if args.countdown != 3 { session.countdown_secs = args.countdown; }
    if args.scroll_miss_penalty != 0 { session.scroll_miss_penalty = args.scroll_miss_penalty; }

    let chart = Arc::new(read_chart(&args.chart)?);
    let bot = Autoplay {
        seed: args.seed,
        jitter_ms: args.jitter_ms,
        miss_rate: args.miss_rate,
        fps: args.fps,
    };
    let report = bot
        .run(chart, session, skin)
        .with_context(|| format!("Failed to play {}", args.chart.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    let board = &report.scoreboard;
    println!("{}", args.chart.display());
    println!("  score:     {}", board.score);
    println!("  max combo: {}", board.max_combo);
    println!(
        "  judged:    {} perfect, {} good, {} miss",
        board.perfect, board.good, board.miss
    );
    println!("  unhit:     {}", board.scrolled_past);
    println!("  accuracy:  {:.1}%", report.accuracy() * 100.0);
    println!("  ended:     {:?} at {:.2}s", report.state, report.song_time);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_config_is_tried_first() {
        let candidates = config_candidates();
        assert_eq!(candidates[0], PathBuf::from("stepchart.toml"));
        assert!(candidates[1..]
            .iter()
            .all(|p| p.ends_with(Path::new("stepchart").join("config.toml"))));
    }

    #[test]
    fn chart_lands_next_to_input_by_default() {
        let out = chart_path(Path::new("songs/intro.flac"), None);
        assert_eq!(out, PathBuf::from("songs/intro.chart.json"));
        let out = chart_path(Path::new("songs/intro.flac"), Some(Path::new("charts")));
        assert_eq!(out, PathBuf::from("charts/intro.chart.json"));
    }
}
