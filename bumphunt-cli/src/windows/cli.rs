use clap::{Command, arg};

use crate::hunt::cli::search_args;

pub const WINDOWS_CMD: &str = "windows";

pub fn create_windows_cli() -> Command {
    Command::new(WINDOWS_CMD)
        .about("List the scan windows of a background spectrum with their bin ranges and physical bounds.")
        .arg(
            arg!(--background <BACKGROUND>)
                .required(true)
                .help("Background spectrum JSON"),
        )
        .args(search_args())
}
