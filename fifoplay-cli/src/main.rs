//! # fifoplay
//!
//! Plays raw PCM written to a named pipe through the default audio output.

use log::error;

mod cli;
mod logging;
mod runner;
mod shutdown;

fn main() {
    dotenv::dotenv().ok();
    logging::init();

    let args = match cli::args::build_cli().try_get_matches() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            std::process::exit(cli::args::exit_code_for(&err));
        }
    };

    // Any error is fatal and exits with status 1.
    let code = match runner::run(&args) {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err);
            1
        }
    };

    std::process::exit(code)
}
