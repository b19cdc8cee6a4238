#![allow(dead_code)]
//! Shared integration test utilities.

use std::fs::File;
use std::io::Write;
use std::sync::Once;

use ringside::{Reactor, ScriptMode, ScriptedControl, ScriptedRing, SetupFlags};
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Install a test-writer subscriber once. Filter from `RINGSIDE_LOG`,
/// `warn` when unset.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_env("RINGSIDE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .try_init();
    });
}

/// Reactor over a scripted ring, plus the ring's controller.
pub fn scripted(capacity: usize, mode: ScriptMode) -> (Reactor, ScriptedControl) {
    init_test_logging();
    let ring = ScriptedRing::with_mode(capacity, mode);
    let control = ring.controller();
    (Reactor::with_ring(Box::new(ring)), control)
}

/// Kernel reactor, or `None` (with a note) where io_uring is unavailable.
pub fn kernel_or_skip(capacity: u32) -> Option<Reactor> {
    init_test_logging();
    match Reactor::new(capacity, SetupFlags::NONE) {
        Ok(reactor) => Some(reactor),
        Err(e) => {
            eprintln!("skipping: io_uring unavailable ({})", e);
            None
        }
    }
}

/// Anonymous scratch file holding `contents`.
pub fn scratch_file(contents: &[u8]) -> File {
    let mut file = tempfile::tempfile().expect("tempfile");
    file.write_all(contents).expect("write scratch file");
    file
}
