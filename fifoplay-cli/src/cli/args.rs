//! CLI argument definitions for `fifoplay`.

use clap::{Arg, Command};

/// Positional argument holding the pipe path.
pub const FIFO_ARG: &str = "FIFO";

/// Build the CLI argument parser.
pub fn build_cli() -> Command {
    Command::new("fifoplay")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Play raw 44.1 kHz 16-bit mono PCM written to a named pipe")
        .after_help(
            "Environment: RUST_LOG, FIFOPLAY_CHUNK_BYTES, FIFOPLAY_BUFFERS, \
             FIFOPLAY_IDLE_MS, FIFOPLAY_VOLUME (a .env file is honored)",
        )
        .arg_required_else_help(true)
        .arg(
            Arg::new(FIFO_ARG)
                .help("Path to an existing named pipe")
                .value_name("FIFO_PATH")
                .required(true)
                .index(1),
        )
}

/// Exit status for a failed parse: 0 for help/version output, 1 otherwise.
pub fn exit_code_for(err: &clap::Error) -> i32 {
    if err.use_stderr() {
        1
    } else {
        0
    }
}
