// Chordsmith CLI entry point.
//
// Reads a melody MIDI file, generates a chord accompaniment, and writes the
// melody plus a new accompaniment track to a new MIDI file.
// The pipeline: melody analysis → key detection → genetic search → MIDI output.
//
// Usage:
//   cargo run -p chordsmith_music -- <input.mid> [output.mid] [--seed N]
//     [--key KEY] [--config config.json]
//
// KEY is a short key name such as C, F#, Bb, Am or Ebm; an unknown name
// exits with status 2. Without --key the key is detected from the melody.
// Without an output path the result is written next to the input as
// <input>-<KEY>.mid. Set RUST_LOG=debug for per-generation progress.

use chordsmith_music::config::HarmonizerConfig;
use chordsmith_music::error::HarmonizeError;
use chordsmith_music::ga::SearchState;
use chordsmith_music::key::Key;
use chordsmith_music::midi::{append_track, parse_smf, write_smf};
use chordsmith_music::pipeline::harmonize;
use chordsmith_prng::GameRng;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let positional: Vec<&str> = positional_args(&args);
    let Some(input_path) = positional.first().map(Path::new) else {
        eprintln!(
            "Usage: accompany <input.mid> [output.mid] [--seed N] [--key KEY] [--config FILE]"
        );
        std::process::exit(2);
    };
    let key_override = match key_flag(&args) {
        Ok(key) => key,
        Err(name) => {
            eprintln!("Unknown key '{}'. Expected a name such as C, F#, Bb, Am or Ebm.", name);
            std::process::exit(2);
        }
    };

    let output_path = positional.get(1).map(PathBuf::from);
    if let Err(e) = run(&args, input_path, output_path, key_override) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(
    args: &[String],
    input_path: &Path,
    output_path: Option<PathBuf>,
    key_override: Option<Key>,
) -> Result<(), HarmonizeError> {
    let seed: u64 = parse_flag(args, "--seed").unwrap_or_else(clock_seed);

    println!("=== Chordsmith Accompaniment Generator ===");
    println!("Input: {}", input_path.display());
    println!("Seed: {}", seed);

    println!("[1/4] Loading configuration...");
    let config = match parse_flag::<String>(args, "--config") {
        Some(path) => {
            let config = HarmonizerConfig::load(Path::new(&path))?;
            println!("  Loaded {}.", path);
            config
        }
        None => {
            println!("  Using defaults.");
            HarmonizerConfig::default()
        }
    };
    println!(
        "  Population {}, survivors {}, up to {} generations, {}-beat slots",
        config.ga.population_size,
        config.ga.survivor_count,
        config.ga.max_iterations,
        config.slot_beats
    );

    println!("[2/4] Reading melody...");
    let bytes = std::fs::read(input_path)?;
    let mut smf = parse_smf(&bytes)?;

    println!("[3/4] Searching for a progression...");
    let mut rng = GameRng::new(seed);
    let result = harmonize(&smf, &config, key_override, &mut rng)?;
    println!(
        "  Key: {} ({})",
        result.key,
        if result.key_detected { "detected" } else { "given" }
    );
    println!(
        "  Melody track {}: {} slots, tempo {:.0} BPM",
        result.melody.track_index,
        result.melody.slots.len(),
        60_000_000.0 / result.melody.tempo.max(1) as f64
    );
    println!(
        "  Generations: {} ({})",
        result.search.iterations,
        match result.search.state {
            SearchState::Converged => "converged",
            _ => "iteration cap reached",
        }
    );
    println!(
        "  Cost: {} -> {}",
        result.search.initial_fitness, result.search.final_fitness
    );
    let progression: Vec<String> =
        result.search.best.genes.iter().map(|c| c.to_string()).collect();
    println!("  Progression: {}", progression.join(" "));

    let output_path = output_path.unwrap_or_else(|| default_output_path(input_path, &result.key));
    println!("[4/4] Writing MIDI to {}...", output_path.display());
    append_track(&mut smf, result.track);
    write_smf(&smf, &output_path)?;
    println!("  Done!");
    Ok(())
}

/// `<dir>/<stem>-<key>.mid` next to the input.
fn default_output_path(input: &Path, key: &Key) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "accompaniment".to_string());
    input.with_file_name(format!("{}-{}.mid", stem, key.name()))
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Arguments that are neither flags nor flag values.
fn positional_args(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut skip_next = false;
    for arg in args.iter().skip(1) {
        if skip_next {
            skip_next = false;
        } else if arg.starts_with("--") {
            skip_next = true;
        } else {
            out.push(arg.as_str());
        }
    }
    out
}

/// The `--key` override; `Err` carries a name that is not a key.
fn key_flag(args: &[String]) -> Result<Option<Key>, String> {
    match parse_flag::<String>(args, "--key") {
        Some(name) => Key::parse(&name).map(Some).ok_or(name),
        None => Ok(None),
    }
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}
