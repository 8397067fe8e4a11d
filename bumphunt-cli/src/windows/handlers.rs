use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::Serialize;

use bumphunt_core::models::BinRange;
use bumphunt_core::{Channel, PatternEntry};

use crate::hunt::handlers::{load_config, read_spectrum, write_json};

#[derive(Serialize)]
struct SearchPatternOutput {
    search_region: BinRange,
    n_windows: usize,
    windows: Vec<PatternEntry>,
}

pub fn run_windows(matches: &ArgMatches) -> Result<()> {
    let background_path = matches
        .get_one::<String>("background")
        .context("--background is required")?;

    let config = load_config(matches)?;
    config.validate().context("Invalid hunt configuration")?;

    let background = read_spectrum(background_path)?;
    // the pattern only depends on the background, so it doubles as the observed data
    let channel = Channel::new(
        background.clone(),
        background,
        config.search_region,
        &config.window_sizes(),
    )
    .context("Failed to build the search pattern")?;

    let windows = channel.search_pattern();
    let output = SearchPatternOutput {
        search_region: channel.region(),
        n_windows: windows.len(),
        windows,
    };

    write_json(&output, matches.get_one::<String>("output"), &format!("{}_windows", config.name))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::Path;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use crate::windows::cli::create_windows_cli;

    #[rstest]
    fn test_run_windows_writes_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let background = Path::new(env!("CARGO_MANIFEST_DIR")).join("../bumphunt-core/tests/data/background.json");
        let output = dir.path().join("pattern.json");

        let matches = create_windows_cli().get_matches_from([
            "windows",
            "--background",
            background.to_str().unwrap(),
            "--max-window",
            "2",
            "--output",
            output.to_str().unwrap(),
        ]);
        run_windows(&matches).unwrap();

        let pattern: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        // five single bins, then four pairs
        assert_eq!(pattern["n_windows"], 9);
        assert_eq!(pattern["search_region"]["start_bin"], 1);
        assert_eq!(pattern["windows"][5]["low_edge"], 0.0);
        assert_eq!(pattern["windows"][5]["high_edge"], 2.0);
    }
}
