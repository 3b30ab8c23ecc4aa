//! # Chord Buffer
//!
//! Groups presses that land close together into one sheet token.
//!
//! Every press adds its label to the pending set and restarts a single timer.
//! When the timer runs out without another press, the set is written out:
//! one label as a bare character, more as `[sorted labels]`. Releases do not
//! matter; a chord is whatever started inside one window.
//!
//! ```text
//! press t ──┐ 20ms press u ──┐ 10ms press o ──┐ 50ms quiet ──> "[otu]"
//!           └─ timer         └─ timer reset   └─ timer reset
//! ```

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::sheet::encode_chord;

/// Receives each finished token, e.g. to append it to the sheet.
pub type ChordSink = Arc<dyn Fn(String) + Send + Sync>;

pub const DEFAULT_CHORD_WINDOW: Duration = Duration::from_millis(50);

#[derive(Default)]
struct Pending {
    labels: BTreeSet<char>,
    // Bumped on every press; a timer only flushes if it is still current
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

pub struct ChordBuffer {
    window: Duration,
    pending: Arc<Mutex<Pending>>,
    sink: ChordSink,
    runtime: Handle,
}

impl ChordBuffer {
    pub fn new(window: Duration, sink: ChordSink, runtime: Handle) -> Self {
        Self {
            window,
            pending: Arc::new(Mutex::new(Pending::default())),
            sink,
            runtime,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Add a label and restart the window.
    pub fn press(&self, label: char) {
        let mut pending = self.pending.lock();
        pending.labels.insert(label);
        pending.generation = pending.generation.wrapping_add(1);
        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }

        let generation = pending.generation;
        let shared = Arc::clone(&self.pending);
        let sink = Arc::clone(&self.sink);
        let window = self.window;
        pending.timer = Some(self.runtime.spawn(async move {
            tokio::time::sleep(window).await;
            let token = {
                let mut pending = shared.lock();
                if pending.generation != generation {
                    return;
                }
                pending.timer = None;
                encode_chord(&std::mem::take(&mut pending.labels))
            };
            if !token.is_empty() {
                log::debug!("chord closed: {}", token);
                sink(token);
            }
        }));
    }

    /// Releases do not affect grouping.
    pub fn release(&self, _label: char) {}

    /// Labels waiting for the window to close, in chord order.
    pub fn pending(&self) -> Vec<char> {
        self.pending.lock().labels.iter().copied().collect()
    }

    /// Close the current chord immediately instead of waiting for the timer.
    pub fn flush_now(&self) {
        let token = {
            let mut pending = self.pending.lock();
            pending.generation = pending.generation.wrapping_add(1);
            if let Some(timer) = pending.timer.take() {
                timer.abort();
            }
            encode_chord(&std::mem::take(&mut pending.labels))
        };
        if !token.is_empty() {
            log::debug!("chord flushed: {}", token);
            (self.sink)(token);
        }
    }
}

impl Drop for ChordBuffer {
    fn drop(&mut self) {
        if let Some(timer) = self.pending.lock().timer.take() {
            timer.abort();
        }
    }
}
