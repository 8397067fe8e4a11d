use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use log::info;
use serde::Serialize;

use bumphunt_core::{BinModelKind, BinnedSpectrum, BumpHunter, HuntConfig, SearchRegion, TestStatisticKind};

/// Parse an optional flag value, naming the flag in the error.
fn parse_flag<T>(matches: &ArgMatches, flag: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    matches
        .get_one::<String>(flag)
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("--{flag} got an invalid value: {raw}"))
        })
        .transpose()
}

///
/// Build the hunt configuration: the config file (if any) first, then command line
/// overrides for the search region and window sizes.
///
pub fn load_config(matches: &ArgMatches) -> Result<HuntConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => HuntConfig::try_from(Path::new(path))
            .with_context(|| format!("Failed to load hunt configuration from {path}"))?,
        None => HuntConfig::default(),
    };

    let low = parse_flag::<f64>(matches, "search-low")?;
    let high = parse_flag::<f64>(matches, "search-high")?;
    if let (Some(low), Some(high)) = (low, high) {
        config.search_region = SearchRegion::from((low, high));
    }

    if let Some(min) = parse_flag(matches, "min-window")? {
        config.min_window_size = Some(min);
    }
    if let Some(max) = parse_flag(matches, "max-window")? {
        config.max_window_size = Some(max);
    }
    if let Some(step) = parse_flag(matches, "window-step")? {
        config.window_step_size = Some(step);
    }

    Ok(config)
}

fn apply_hunt_overrides(config: &mut HuntConfig, matches: &ArgMatches) -> Result<()> {
    if let Some(name) = matches.get_one::<String>("name") {
        config.name = name.clone();
    }
    if let Some(raw) = matches.get_one::<String>("bin-model") {
        config.bin_model = BinModelKind::from_str(raw).context("--bin-model")?;
    }
    if let Some(raw) = matches.get_one::<String>("test-statistic") {
        config.test_statistic = TestStatisticKind::from_str(raw).context("--test-statistic")?;
    }
    if let Some(n) = parse_flag(matches, "pseudo-experiments")? {
        config.n_pseudo_experiments = n;
    }
    if let Some(overlap_factor) = parse_flag(matches, "overlap-factor")? {
        config.overlap_factor = overlap_factor;
    }
    if let Some(seed) = parse_flag(matches, "seed")? {
        config.seed = seed;
    }
    if let Some(threads) = parse_flag(matches, "threads")? {
        config.threads = Some(threads);
    }
    if matches.get_flag("progress") {
        config.progress = true;
    }
    Ok(())
}

pub fn read_spectrum(path: &str) -> Result<BinnedSpectrum> {
    BinnedSpectrum::try_from(Path::new(path))
        .with_context(|| format!("Failed to read spectrum from {path}"))
}

///
/// Serialize `output` as pretty JSON to `output_path`, or stdout when no path is given.
/// A directory path receives `<name>.json`.
///
pub fn write_json<T: Serialize>(output: &T, output_path: Option<&String>, name: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(output).context("Failed to serialize output to JSON")?;

    match output_path {
        Some(p) => {
            let mut path = PathBuf::from(p);
            if path.is_dir() {
                path.push(format!("{name}.json"));
            }
            let mut file = File::create(&path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            file.write_all(json.as_bytes())?;
            info!("Output written to {}", path.display());
        }
        None => {
            io::stdout().write_all(json.as_bytes())?;
            println!();
        }
    }

    Ok(())
}

pub fn run_hunt(matches: &ArgMatches) -> Result<()> {
    let backgrounds: Vec<&String> = matches
        .get_many::<String>("background")
        .map(|values| values.collect())
        .unwrap_or_default();
    let observed: Vec<&String> = matches
        .get_many::<String>("observed")
        .map(|values| values.collect())
        .unwrap_or_default();
    if backgrounds.len() != observed.len() {
        bail!(
            "Got {} --background and {} --observed spectra; pass one of each per channel",
            backgrounds.len(),
            observed.len()
        );
    }

    let mut config = load_config(matches)?;
    apply_hunt_overrides(&mut config, matches)?;
    let name = config.name.clone();

    let mut hunter = BumpHunter::new(config).context("Invalid hunt configuration")?;
    for (background, observed) in backgrounds.iter().zip(observed.iter()) {
        let index = hunter
            .add_channel(read_spectrum(background)?, read_spectrum(observed)?)
            .with_context(|| format!("Failed to set up channel for {observed}"))?;
        info!("channel {index}: {observed} over {background}");
    }

    let result = hunter.run().context("Bump hunt failed")?;
    write_json(&result, matches.get_one::<String>("output"), &name)
}
