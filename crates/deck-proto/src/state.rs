use crate::protocol::{EngineEvent, Inbound, Property, PropertyValue};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

/// Playback fields shared between the session reader and the main loop.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub current_index: usize,
    pub is_paused: bool,
    pub position_secs: f64,
    pub duration_secs: f64,
    /// Engine volume, 0..=100.
    pub volume: f64,
    pub shuffle_enabled: bool,
    pub repeat_enabled: bool,
    pub shuffle_order: Vec<usize>,
    pub shuffle_cursor: usize,
    pub status: Option<StatusMessage>,
}

impl PlaybackState {
    pub fn with_volume(volume: f64) -> Self {
        Self {
            current_index: 0,
            is_paused: false,
            position_secs: 0.0,
            duration_secs: 0.0,
            volume: volume.clamp(0.0, 100.0),
            shuffle_enabled: false,
            repeat_enabled: false,
            shuffle_order: Vec::new(),
            shuffle_cursor: 0,
            status: None,
        }
    }

    /// Fraction of the track played, 0.0 when the duration is unknown.
    pub fn progress(&self) -> f64 {
        if self.duration_secs > 0.0 {
            (self.position_secs / self.duration_secs).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::with_volume(50.0)
    }
}

/// Transient one-line message shown in the footer.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub text: String,
    pub created_at: Instant,
}

impl StatusMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            created_at: Instant::now(),
        }
    }

    pub fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.created_at) > window
    }
}

/// Owner of the single `PlaybackState` aggregate plus the redraw flag.
///
/// The lock is only held for field copies and never across an await, so the
/// reader task and the frame loop never wait on each other for long.  A
/// one-frame-stale read is fine: everything in here is advisory display data.
pub struct StateManager {
    state: Mutex<PlaybackState>,
    redraw: AtomicBool,
}

impl StateManager {
    pub fn new(initial: PlaybackState) -> Self {
        Self {
            state: Mutex::new(initial),
            redraw: AtomicBool::new(true),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PlaybackState> {
        // A panic while holding the lock leaves plain scalars behind; keep going.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> PlaybackState {
        self.lock().clone()
    }

    /// Read a projection without cloning the whole state.
    pub fn read<R>(&self, f: impl FnOnce(&PlaybackState) -> R) -> R {
        f(&self.lock())
    }

    /// Mutate the state and mark a redraw pending.
    pub fn update<R>(&self, f: impl FnOnce(&mut PlaybackState) -> R) -> R {
        let out = f(&mut self.lock());
        self.request_redraw();
        out
    }

    pub fn set_status(&self, text: impl Into<String>) {
        let msg = StatusMessage::new(text);
        self.update(|s| s.status = Some(msg));
    }

    /// Clear the status message once it is older than `window`.
    /// Returns `true` if a message was cleared.
    pub fn expire_status(&self, now: Instant, window: Duration) -> bool {
        let expired = {
            let mut s = self.lock();
            match &s.status {
                Some(msg) if msg.is_expired(now, window) => {
                    s.status = None;
                    true
                }
                _ => false,
            }
        };
        if expired {
            self.request_redraw();
        }
        expired
    }

    /// Fold one inbound engine message into the state.  Returns `true` when
    /// the message reports the end of the current file.
    pub fn apply_inbound(&self, msg: &Inbound) -> bool {
        match msg {
            Inbound::Event(EngineEvent::PropertyChange { name, value }) => {
                self.apply_property(name, *value);
                false
            }
            Inbound::Event(EngineEvent::EndOfFile { .. }) => true,
            Inbound::Event(EngineEvent::Other(_)) => false,
            Inbound::Reply { error, data } => {
                self.apply_reply(msg.is_success_reply(), error, *data);
                false
            }
        }
    }

    fn apply_property(&self, name: &str, value: Option<PropertyValue>) {
        match (Property::from_name(name), value) {
            (Some(Property::Pause), Some(PropertyValue::Bool(paused))) => {
                self.update(|s| s.is_paused = paused);
            }
            (Some(Property::TimePos), Some(PropertyValue::Number(secs))) => {
                self.update(|s| s.position_secs = secs.max(0.0));
            }
            (Some(Property::TimePos), Some(PropertyValue::Null)) => {
                self.update(|s| s.position_secs = 0.0);
            }
            (Some(Property::Duration), Some(PropertyValue::Number(secs))) => {
                self.update(|s| s.duration_secs = secs.max(0.0));
            }
            (Some(Property::Volume), Some(PropertyValue::Number(v))) => {
                self.update(|s| s.volume = v.clamp(0.0, 100.0));
            }
            _ => debug!("ignoring property {} = {:?}", name, value),
        }
    }

    /// Replies carry no request id; a successful numeric answer in volume
    /// range is taken as the pending volume query.
    fn apply_reply(&self, success: bool, error: &str, data: Option<PropertyValue>) {
        match data.and_then(PropertyValue::as_f64) {
            Some(v) if success && (0.0..=100.0).contains(&v) => {
                debug!("volume reply {}", v);
                self.update(|s| s.volume = v);
            }
            _ => debug!("reply error={} data={:?}", error, data),
        }
    }

    pub fn request_redraw(&self) {
        self.redraw.store(true, Ordering::Relaxed);
    }

    /// Consume the redraw flag.
    pub fn take_redraw(&self) -> bool {
        self.redraw.swap(false, Ordering::Relaxed)
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new(PlaybackState::default())
    }
}
