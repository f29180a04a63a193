//! Shell completion generation for esdump

use std::io::Write;

use clap::CommandFactory;
use clap_complete::{Shell, generate};

use crate::cli::CliArgs;

/// Binary name used in generated scripts.
const BIN_NAME: &str = "esdump";

/// Render the completion script for `shell` into `out`.
pub fn write_completion(shell: Shell, out: &mut dyn Write) {
    generate(shell, &mut CliArgs::command(), BIN_NAME, out);
}
