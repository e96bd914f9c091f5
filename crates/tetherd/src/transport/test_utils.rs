//! Test helpers for the transport module.

use std::io::{BufRead, BufReader};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use super::{ConnectionHandler, ConnectionStream};

/// Records the first line read from every accepted connection.
#[derive(Default)]
pub(crate) struct LineRecorder {
    lines: Mutex<Vec<String>>,
}

impl LineRecorder {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Waits until `expected` lines arrived and returns them sorted.
    pub(crate) fn wait_for(&self, expected: usize) -> Vec<String> {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner).clone();
            if lines.len() >= expected || Instant::now() >= deadline {
                let mut lines = lines;
                lines.sort();
                return lines;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl ConnectionHandler for LineRecorder {
    fn handle(&self, stream: ConnectionStream) {
        let mut line = String::new();
        if BufReader::new(stream).read_line(&mut line).is_ok() {
            self.lines
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(line.trim_end().to_owned());
        }
    }
}
