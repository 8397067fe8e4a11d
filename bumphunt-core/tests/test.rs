use std::io::Write;
use std::path::Path;

use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};
use tempfile::NamedTempFile;

use bumphunt_core::models::{BinRange, WindowSizePolicy};
use bumphunt_core::{
    BinModelKind, BinnedSpectrum, BumpHuntError, BumpHunter, ErrorCategory, HuntConfig,
    SearchRegion, TestStatisticKind, Window, WindowPatternGenerator,
};

#[fixture]
fn path_to_data() -> &'static str {
    "tests/data"
}

#[fixture]
fn background(path_to_data: &str) -> BinnedSpectrum {
    BinnedSpectrum::try_from(Path::new(&format!("{path_to_data}/background.json"))).unwrap()
}

#[fixture]
fn observed_bump(path_to_data: &str) -> BinnedSpectrum {
    BinnedSpectrum::try_from(Path::new(&format!("{path_to_data}/observed_bump.json"))).unwrap()
}

fn single_bin_config(bin_model: BinModelKind) -> HuntConfig {
    HuntConfig {
        bin_model,
        min_window_size: Some(1),
        max_window_size: Some(1),
        n_pseudo_experiments: 200,
        ..Default::default()
    }
}

mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[rstest]
    fn test_read_spectrum_fixtures(background: BinnedSpectrum, observed_bump: BinnedSpectrum) {
        assert_eq!(background.n_bins(), 5);
        assert_eq!(background.error(2), 10.0);
        // missing errors default to sqrt(content)
        assert!((observed_bump.error(3) - 180.0_f64.sqrt()).abs() < 1e-12);
        assert!(background.same_binning(&observed_bump));
    }

    #[rstest]
    fn test_central_excess(background: BinnedSpectrum, observed_bump: BinnedSpectrum) {
        let mut hunter = BumpHunter::new(single_bin_config(BinModelKind::Poisson)).unwrap();
        hunter.add_channel(background, observed_bump).unwrap();

        let result = hunter.run().unwrap();
        let bump = &result.bumps[0];

        assert_eq!(bump.window, Window::new(3, 3));
        assert_eq!((bump.low_edge, bump.high_edge), (2.0, 3.0));
        assert!(bump.local_p_value < 1e-5);
        assert!(bump.local_significance.z > 4.0);
        assert!(result.global_p_value >= result.local_p_value);
    }

    #[rstest]
    fn test_identical_spectra(background: BinnedSpectrum) {
        for model in BinModelKind::ALL {
            let mut hunter = BumpHunter::new(single_bin_config(model)).unwrap();
            hunter.add_channel(background.clone(), background.clone()).unwrap();

            let outcome = hunter.scan().unwrap();
            assert_eq!(outcome.best_p_value, 1.0);
            assert_eq!(outcome.statistic, 0.0);
        }
    }

    #[rstest]
    fn test_scan_is_deterministic(background: BinnedSpectrum, observed_bump: BinnedSpectrum) {
        let config = HuntConfig {
            max_window_size: Some(3),
            ..Default::default()
        };
        let mut hunter = BumpHunter::new(config).unwrap();
        hunter.add_channel(background, observed_bump).unwrap();

        let first = hunter.scan().unwrap();
        let second = hunter.scan().unwrap();
        assert_eq!(first, second);
    }

    #[rstest]
    fn test_seeded_runs_repeat(background: BinnedSpectrum) {
        let observed = BinnedSpectrum::with_poisson_errors(
            background.edges().to_vec(),
            vec![100.0, 115.0, 120.0, 100.0, 100.0],
        )
        .unwrap();
        let config = HuntConfig {
            max_window_size: Some(2),
            n_pseudo_experiments: 500,
            seed: 42,
            ..Default::default()
        };

        let mut first = BumpHunter::new(config.clone()).unwrap();
        first.add_channel(background.clone(), observed.clone()).unwrap();
        let mut second = BumpHunter::new(config).unwrap();
        second.add_channel(background, observed).unwrap();

        assert_eq!(first.run().unwrap(), second.run().unwrap());
    }

    #[rstest]
    #[case(BinRange::new(1, 20), 1, 10, 1)]
    #[case(BinRange::new(4, 13), 2, 5, 1)]
    #[case(BinRange::new(1, 7), 1, 3, 2)]
    fn test_window_coverage(
        #[case] region: BinRange,
        #[case] min_size: usize,
        #[case] max_size: usize,
        #[case] step_size: usize,
    ) {
        let policy = WindowSizePolicy {
            min_size,
            max_size,
            step_size,
        };
        let windows = WindowPatternGenerator::new(region, policy).generate();

        for window in &windows {
            assert!(window.first >= region.start_bin && window.last <= region.stop_bin);
            assert!(window.width() >= min_size && window.width() <= max_size);
        }
        // the smallest windows shift by at most half their width, so every bin is reached
        for bin in region.bins() {
            assert!(windows.iter().any(|w| w.contains(bin)), "bin {bin} not covered");
        }
    }

    #[rstest]
    fn test_combined_channels_agree(background: BinnedSpectrum, observed_bump: BinnedSpectrum) {
        let mut hunter = BumpHunter::new(single_bin_config(BinModelKind::Poisson)).unwrap();
        hunter.add_channel(background.clone(), observed_bump.clone()).unwrap();
        hunter.add_channel(background, observed_bump).unwrap();

        let result = hunter.run().unwrap();
        assert!(result.channels_agree);
        assert_eq!(result.bumps.len(), 2);

        let single = -result.bumps[0].local_p_value.ln();
        assert!((result.observed_statistic - 2.0 * single).abs() < 1e-9 * single);
    }

    #[rstest]
    fn test_combined_channels_disagree(background: BinnedSpectrum, observed_bump: BinnedSpectrum) {
        let shifted = BinnedSpectrum::with_poisson_errors(
            background.edges().to_vec(),
            vec![100.0, 100.0, 100.0, 100.0, 180.0],
        )
        .unwrap();

        let mut hunter = BumpHunter::new(single_bin_config(BinModelKind::Poisson)).unwrap();
        hunter.add_channel(background.clone(), observed_bump).unwrap();
        hunter.add_channel(background, shifted).unwrap();

        let result = hunter.run().unwrap();
        assert!(!result.channels_agree);
        assert_eq!(result.observed_statistic, 0.0);
        assert_eq!(result.local_p_value, 1.0);
        assert_eq!(result.bumps[1].window, Window::new(5, 5));
    }

    #[rstest]
    fn test_deficit_hunt(background: BinnedSpectrum) {
        let observed = BinnedSpectrum::with_poisson_errors(
            background.edges().to_vec(),
            vec![100.0, 45.0, 100.0, 100.0, 100.0],
        )
        .unwrap();
        let config = HuntConfig {
            test_statistic: TestStatisticKind::DeficitOnly,
            ..single_bin_config(BinModelKind::Gaussian)
        };
        let mut hunter = BumpHunter::new(config).unwrap();
        hunter.add_channel(background, observed).unwrap();

        let outcome = hunter.scan().unwrap();
        assert_eq!(outcome.best_window, Window::new(2, 2));
        assert!(outcome.best_p_value < 1e-6);
    }

    #[rstest]
    fn test_dijet_hunt_from_config(path_to_data: &str) {
        let config = HuntConfig::try_from(Path::new(&format!("{path_to_data}/hunt.toml"))).unwrap();
        let background =
            BinnedSpectrum::try_from(Path::new(&format!("{path_to_data}/dijet_background.json"))).unwrap();
        let observed =
            BinnedSpectrum::try_from(Path::new(&format!("{path_to_data}/dijet_observed.json"))).unwrap();

        let mut hunter = BumpHunter::new(config).unwrap();
        hunter.add_channel(background, observed).unwrap();
        assert_eq!(hunter.current_channel().unwrap().region(), BinRange::new(3, 18));

        let result = hunter.run().unwrap();
        assert_eq!(result.name, "dijet");
        assert_eq!(result.n_pseudo_experiments, 400);
        assert_eq!(result.bumps[0].window, Window::new(9, 10));
        assert_eq!((result.bumps[0].low_edge, result.bumps[0].high_edge), (900.0, 1000.0));
        assert!(result.global_p_value >= result.local_p_value);
        assert_eq!(result.trials_history.last().unwrap().trials, 400);
    }

    #[rstest]
    fn test_yaml_config(path_to_data: &str) {
        let config = HuntConfig::try_from(Path::new(&format!("{path_to_data}/hunt.yaml"))).unwrap();
        assert_eq!(config.bin_model, BinModelKind::PoissonConvolvedGamma);
        assert_eq!(config.threads, Some(2));
        assert_eq!(config.search_region, SearchRegion::Auto);
    }

    #[rstest]
    fn test_malformed_spectrum_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"edges": [0.0, 1.0], "contents": [1.0, 2.0]}}"#).unwrap();

        let result = BinnedSpectrum::try_from(file.path());
        assert!(result.is_err());
    }

    #[rstest]
    fn test_error_categories(background: BinnedSpectrum) {
        let empty = BinnedSpectrum::uniform(0.0, 5.0, vec![0.0; 5], vec![0.0; 5]).unwrap();
        let mut hunter = BumpHunter::new(HuntConfig::default()).unwrap();

        let degenerate = hunter.add_channel(empty.clone(), empty).unwrap_err();
        assert!(matches!(degenerate, BumpHuntError::AllBinsEmpty));
        assert_eq!(degenerate.category(), ErrorCategory::DegenerateData);

        let config = HuntConfig {
            search_region: SearchRegion::from((4.0, 1.0)),
            ..Default::default()
        };
        let mut hunter = BumpHunter::new(config).unwrap();
        let inverted = hunter
            .add_channel(background.clone(), background)
            .unwrap_err();
        assert_eq!(inverted.category(), ErrorCategory::Configuration);

        let missing = BinnedSpectrum::try_from(Path::new("tests/data/missing.json")).unwrap_err();
        assert_eq!(missing.category(), ErrorCategory::Io);
    }
}
