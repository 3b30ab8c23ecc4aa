//! Timed sheet playback
//!
//! Walks the sheet one token at a time on a spawned task. Every wait is cut
//! into slices no longer than the pause poll interval, and after each slice
//! the task re-reads the shared state, so pauses and restarts take effect
//! within one poll interval.
//!
//! Each call to `play()` from Idle starts a new run with a fresh run id.
//! `restart()` bumps the id; a task whose id is stale returns at its next
//! check without touching the cursor, the highlight or the audio engine.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};

use crate::audio::{play_note, AudioEngine};
use crate::keymap::KeyMap;
use crate::sheet::Sheet;
use crate::tempo::MIN_BPM;

use super::types::{token_delay, Highlight, PlaybackState, PlaybackStatus};

pub const DEFAULT_PAUSE_POLL: Duration = Duration::from_millis(50);

struct Shared {
    sheet: Sheet,
    state: PlaybackState,
    cursor: usize,
    highlight: Option<Highlight>,
    // end of the token whose wait is running; the cursor moves here once the
    // wait ends or playback stops mid-wait
    in_flight: Option<usize>,
    bpm: u16,
    run: u64,
    task: Option<JoinHandle<()>>,
    state_tx: watch::Sender<PlaybackState>,
}

impl Shared {
    fn set_state(&mut self, state: PlaybackState) {
        self.state = state;
        self.state_tx.send_replace(state);
    }

    fn reset(&mut self) {
        self.run = self.run.wrapping_add(1);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.cursor = 0;
        self.highlight = None;
        self.in_flight = None;
        self.set_state(PlaybackState::Idle);
    }

    /// Stop mid-wait. The token that was sounding counts as played.
    fn interrupt(&mut self) {
        if let Some(next) = self.in_flight.take() {
            self.cursor = next;
        }
        self.cursor = self.cursor.min(self.sheet.len());
        self.highlight = None;
        self.set_state(PlaybackState::Paused);
    }
}

pub struct PlaybackEngine {
    shared: Arc<Mutex<Shared>>,
    keymap: Arc<KeyMap>,
    audio: Arc<dyn AudioEngine>,
    poll: Duration,
    runtime: Handle,
}

impl PlaybackEngine {
    pub fn new(
        keymap: Arc<KeyMap>,
        audio: Arc<dyn AudioEngine>,
        poll: Duration,
        runtime: Handle,
    ) -> Self {
        let (state_tx, _) = watch::channel(PlaybackState::Idle);
        Self {
            shared: Arc::new(Mutex::new(Shared {
                sheet: Sheet::new(),
                state: PlaybackState::Idle,
                cursor: 0,
                highlight: None,
                in_flight: None,
                bpm: MIN_BPM,
                run: 0,
                task: None,
                state_tx,
            })),
            keymap,
            audio,
            poll,
            runtime,
        }
    }

    /// Replace the whole sheet (paste, clear). Playback goes back to the start.
    pub fn load(&self, text: &str) {
        let mut shared = self.shared.lock();
        shared.sheet = Sheet::from(text);
        shared.reset();
    }

    /// The sheet was edited or appended to. Active playback pauses and the
    /// cursor is pulled back inside the new text if it got shorter.
    pub fn sheet_changed(&self, text: &str) {
        let mut shared = self.shared.lock();
        shared.sheet = Sheet::from(text);
        if shared.state == PlaybackState::Playing {
            log::debug!("sheet changed during playback, pausing");
            shared.interrupt();
        } else {
            shared.cursor = shared.cursor.min(shared.sheet.len());
        }
    }

    /// Start from Idle or continue from Paused. Does nothing on an empty sheet.
    pub fn play(&self) {
        let mut shared = self.shared.lock();
        match shared.state {
            PlaybackState::Playing => {}
            PlaybackState::Paused => {
                let alive = shared.task.as_ref().is_some_and(|t| !t.is_finished());
                shared.set_state(PlaybackState::Playing);
                if alive {
                    log::debug!("playback resumed at {}", shared.cursor);
                } else {
                    self.spawn_run(&mut shared);
                }
            }
            PlaybackState::Idle => {
                if shared.sheet.is_empty() {
                    return;
                }
                if shared.cursor >= shared.sheet.len() {
                    shared.cursor = 0;
                }
                shared.set_state(PlaybackState::Playing);
                log::info!(
                    "playback started at {} ({} bpm)",
                    shared.cursor,
                    shared.bpm
                );
                self.spawn_run(&mut shared);
            }
        }
    }

    /// Freeze at the current position. Returns whether anything was playing.
    pub fn pause(&self) -> bool {
        let mut shared = self.shared.lock();
        if shared.state != PlaybackState::Playing {
            return false;
        }
        shared.interrupt();
        log::debug!("playback paused at {}", shared.cursor);
        true
    }

    pub fn resume(&self) {
        if self.state() == PlaybackState::Paused {
            self.play();
        }
    }

    /// Stop everything and rewind. Safe to call in any state, any number of times.
    pub fn restart(&self) {
        self.shared.lock().reset();
    }

    /// Tempo for the next token onwards.
    pub fn set_bpm(&self, bpm: u16) {
        self.shared.lock().bpm = bpm.max(1);
    }

    pub fn status(&self) -> PlaybackStatus {
        let shared = self.shared.lock();
        PlaybackStatus {
            state: shared.state,
            cursor: shared.cursor,
            highlight: shared.highlight,
            bpm: shared.bpm,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.lock().state
    }

    pub fn cursor(&self) -> usize {
        self.shared.lock().cursor
    }

    pub fn highlight(&self) -> Option<Highlight> {
        self.shared.lock().highlight
    }

    pub fn sheet_text(&self) -> String {
        self.shared.lock().sheet.to_string()
    }

    /// Watch state transitions, e.g. to wait until playback finishes.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.shared.lock().state_tx.subscribe()
    }

    fn spawn_run(&self, shared: &mut Shared) {
        shared.run = shared.run.wrapping_add(1);
        if let Some(task) = shared.task.take() {
            task.abort();
        }
        let run = Run {
            id: shared.run,
            shared: Arc::clone(&self.shared),
            keymap: Arc::clone(&self.keymap),
            audio: Arc::clone(&self.audio),
            poll: self.poll,
        };
        shared.task = Some(self.runtime.spawn(run.drive()));
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.shared.lock().reset();
    }
}

enum Step {
    Wait,
    Sounded { next: usize, delay: Duration },
    Done,
}

enum Slice {
    Elapsed,
    Interrupted,
    Cancelled,
}

/// One playback run, owned by its task.
struct Run {
    id: u64,
    shared: Arc<Mutex<Shared>>,
    keymap: Arc<KeyMap>,
    audio: Arc<dyn AudioEngine>,
    poll: Duration,
}

impl Run {
    async fn drive(self) {
        loop {
            match self.step() {
                Step::Done => return,
                Step::Wait => sleep(self.poll).await,
                Step::Sounded { next, delay } => match self.wait(delay).await {
                    Slice::Cancelled => return,
                    // pause() or sheet_changed() already moved the cursor
                    Slice::Interrupted => {}
                    Slice::Elapsed => {
                        let mut shared = self.shared.lock();
                        if shared.run != self.id {
                            return;
                        }
                        // A pause that landed after the last slice has
                        // already moved the cursor to the same place
                        if shared.in_flight.take().is_some() {
                            shared.cursor = next.min(shared.sheet.len());
                        }
                        shared.highlight = None;
                    }
                },
            }
        }
    }

    /// Sound the token under the cursor, if playing.
    ///
    /// Notes are triggered with the lock held so a concurrent restart cannot
    /// slip in between the check and the sound.
    fn step(&self) -> Step {
        let mut shared = self.shared.lock();
        if shared.run != self.id {
            return Step::Done;
        }
        match shared.state {
            PlaybackState::Idle => Step::Done,
            PlaybackState::Paused => Step::Wait,
            PlaybackState::Playing => {
                let Some(token) = shared.sheet.token_at(shared.cursor) else {
                    shared.cursor = 0;
                    shared.highlight = None;
                    shared.set_state(PlaybackState::Idle);
                    shared.task = None;
                    log::info!("playback finished");
                    return Step::Done;
                };
                log::trace!("token {:?} at {:?}", token.kind, token.span);
                shared.highlight = Some(Highlight {
                    start: token.span.start,
                    end: token.span.end,
                });
                shared.in_flight = Some(token.span.end);
                for &label in token.labels() {
                    if let Some(note) = self.keymap.note_for_label(label) {
                        play_note(self.audio.as_ref(), &note);
                    }
                }
                Step::Sounded {
                    next: token.span.end,
                    delay: token_delay(&token.kind, shared.bpm),
                }
            }
        }
    }

    /// Sleep for `delay`, checking in every poll interval.
    async fn wait(&self, delay: Duration) -> Slice {
        let deadline = Instant::now() + delay;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Slice::Elapsed;
            }
            sleep_until(deadline.min(now + self.poll)).await;

            let shared = self.shared.lock();
            if shared.run != self.id {
                return Slice::Cancelled;
            }
            if shared.state != PlaybackState::Playing {
                return Slice::Interrupted;
            }
        }
    }
}
