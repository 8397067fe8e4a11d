mod hunt;
mod windows;

use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use tracing_subscriber::EnvFilter;

pub mod consts {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const PKG_NAME: &str = "bumphunt";
    pub const BIN_NAME: &str = "bumphunt";
}

fn build_parser() -> Command {
    Command::new(consts::BIN_NAME)
        .bin_name(consts::BIN_NAME)
        .version(consts::VERSION)
        .about("Search binned spectra for localized excesses or deficits and calibrate their global significance with pseudo-experiments.")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log every scanned window (debug level) unless RUST_LOG says otherwise"),
        )
        .subcommand(hunt::cli::create_hunt_cli())
        .subcommand(windows::cli::create_windows_cli())
}

/// Log to stderr; `RUST_LOG` takes precedence over `--verbose`.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let app = build_parser();
    let matches = app.get_matches();

    init_tracing(matches.get_flag("verbose"));
    tracing::debug!(command = matches.subcommand_name(), "{} {}", consts::PKG_NAME, consts::VERSION);

    match matches.subcommand() {
        //
        // HUNT
        //
        Some((hunt::cli::HUNT_CMD, matches)) => {
            hunt::handlers::run_hunt(matches)?;
        }

        //
        // SEARCH PATTERN
        //
        Some((windows::cli::WINDOWS_CMD, matches)) => {
            windows::handlers::run_windows(matches)?;
        }

        _ => unreachable!("Subcommand not found"),
    };

    Ok(())
}
