use std::{thread::sleep, time::Duration};

use clap::ArgMatches;
use fifoplay_lib::playback::StatsSnapshot;
use fifoplay_lib::{PcmFormat, PipeReader, PlaybackSettings, Player, Result};
use log::{debug, error, info, warn};

use crate::{cli, shutdown};

const TICK: Duration = Duration::from_millis(100);
const TICKS_PER_REPORT: u32 = 10;

pub fn run(args: &ArgMatches) -> Result<i32> {
    let fifo_path = match args.get_one::<String>(cli::args::FIFO_ARG) {
        Some(path) => path.clone(),
        None => {
            error!("no fifo path given");
            return Ok(1);
        }
    };

    let format = PcmFormat::s16_mono();
    let settings = PlaybackSettings::from_env()?;
    settings.validate(&format)?;
    debug!("settings: {}", settings.to_json());
    debug!(
        "format: {}",
        serde_json::to_string(&format).unwrap_or_else(|_| format.describe())
    );

    // Blocks until a writer opens the other end.
    debug!("opening {}", fifo_path);
    let reader = PipeReader::open(&fifo_path)?;

    let mut player = Player::new(reader, format, settings)?;
    player.prime();
    player.start()?;

    println!("Listening to FIFO: {}", fifo_path);
    println!("Playing RAW PCM {}", format.describe());

    if !shutdown::install() {
        warn!("could not install signal handlers, stop with SIGKILL");
    }

    run_loop(&player);

    player.stop();
    let stats = player.stats();
    info!(
        "played {} sample(s) from {} byte(s), {} silent sample(s), {} read error(s)",
        stats.samples_played, stats.bytes_read, stats.silent_samples, stats.read_errors
    );

    Ok(0)
}

/// Sleep until a shutdown signal arrives or the stream ends.
fn run_loop(player: &Player) {
    let mut last = player.stats();
    let mut ticks = 0_u32;

    while !shutdown::requested() {
        if player.is_finished() {
            info!("stream ended");
            break;
        }

        sleep(TICK);
        ticks += 1;
        if ticks % TICKS_PER_REPORT == 0 {
            let now = player.stats();
            report(&last, &now);
            last = now;
        }
    }

    if shutdown::requested() {
        info!("shutdown requested");
    }
}

fn report(last: &StatsSnapshot, now: &StatsSnapshot) {
    let silent = now.silent_samples - last.silent_samples;
    debug!(
        "{} byte(s) read, {} buffer(s) played, {} silent sample(s), {} idle read(s)",
        now.bytes_read - last.bytes_read,
        now.buffers_played - last.buffers_played,
        silent,
        now.idle_reads - last.idle_reads
    );
    if now.read_errors > last.read_errors {
        warn!(
            "{} read error(s) on the pipe in the last interval",
            now.read_errors - last.read_errors
        );
    }
}
