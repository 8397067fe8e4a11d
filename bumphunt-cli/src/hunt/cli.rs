use clap::{Arg, ArgAction, Command, arg};

pub const HUNT_CMD: &str = "hunt";

/// Arguments that shape the scan windows, shared with the `windows` subcommand.
pub fn search_args() -> Vec<Arg> {
    vec![
        arg!(--config <CONFIG>)
            .required(false)
            .help("Hunt configuration file (.toml, .yaml or .yml); flags override its values"),
        Arg::new("search-low")
            .long("search-low")
            .required(false)
            .requires("search-high")
            .help("Lower bound of the search region (default: widest run of non-empty background bins)"),
        Arg::new("search-high")
            .long("search-high")
            .required(false)
            .requires("search-low")
            .help("Upper bound of the search region"),
        Arg::new("min-window")
            .long("min-window")
            .required(false)
            .help("Minimum window width in bins (default: 1)"),
        Arg::new("max-window")
            .long("max-window")
            .required(false)
            .help("Maximum window width in bins (default: half the search region)"),
        Arg::new("window-step")
            .long("window-step")
            .required(false)
            .help("Increment of the window width between scales (default: 1)"),
        arg!(--output <OUTPUT>)
            .required(false)
            .help("Output JSON path, or a directory to write <name>.json into (default: stdout)"),
    ]
}

pub fn create_hunt_cli() -> Command {
    Command::new(HUNT_CMD)
        .about("Scan observed spectra against their background and calibrate the bump significance.")
        .arg(
            arg!(--background <BACKGROUND>)
                .required(true)
                .action(ArgAction::Append)
                .help("Background spectrum JSON; repeat once per channel"),
        )
        .arg(
            arg!(--observed <OBSERVED>)
                .required(true)
                .action(ArgAction::Append)
                .help("Observed spectrum JSON; repeat once per channel, in the order of --background"),
        )
        .args(search_args())
        .arg(arg!(--name <NAME>).required(false).help("Name of the hunt, used in logs and output file names"))
        .arg(
            Arg::new("bin-model")
                .long("bin-model")
                .required(false)
                .help("poisson, gaussian, poisson_gamma or poisson_gamma_correlated (default: poisson_gamma)"),
        )
        .arg(
            Arg::new("test-statistic")
                .long("test-statistic")
                .required(false)
                .help("excess_only or deficit_only (default: excess_only)"),
        )
        .arg(
            Arg::new("pseudo-experiments")
                .long("pseudo-experiments")
                .short('n')
                .required(false)
                .help("Number of pseudo-experiments, 0 picks it from the local p-value"),
        )
        .arg(
            Arg::new("overlap-factor")
                .long("overlap-factor")
                .required(false)
                .help("Fraction of each channel's bump that must overlap the common window"),
        )
        .arg(arg!(--seed <SEED>).required(false).help("Seed of the pseudo-experiments"))
        .arg(
            arg!(--threads <THREADS>)
                .short('p')
                .required(false)
                .help("Worker threads for the pseudo-experiments (default: all cores)"),
        )
        .arg(
            Arg::new("progress")
                .long("progress")
                .action(ArgAction::SetTrue)
                .help("Show a progress bar while running pseudo-experiments"),
        )
}
