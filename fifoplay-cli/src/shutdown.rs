//! SIGINT/SIGTERM handling for the run loop.

use std::sync::atomic::{AtomicBool, Ordering};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_signal: libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

/// Route SIGINT and SIGTERM to the shutdown flag.
///
/// Installed only once playback runs, so a blocking FIFO open or priming
/// read can still be interrupted the default way.
pub fn install() -> bool {
    let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
    unsafe {
        libc::signal(libc::SIGINT, handler) != libc::SIG_ERR
            && libc::signal(libc::SIGTERM, handler) != libc::SIG_ERR
    }
}

pub fn requested() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}
