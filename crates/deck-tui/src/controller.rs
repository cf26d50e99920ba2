use crate::engine::{EngineLauncher, Playback};
use crate::session::{SessionEvent, SessionWiring};
use deck_proto::protocol::Command;
use deck_proto::state::{PlaybackState, StateManager};
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    Stopped,
    Playing,
    Paused,
}

/// Owns the queue and the live playback, and turns user intent into
/// engine commands.  Pause state is never flipped locally: it follows the
/// engine's `pause` property.
pub struct PlaybackController<L: EngineLauncher> {
    launcher: L,
    state: Arc<StateManager>,
    events: mpsc::Sender<SessionEvent>,
    queue: Vec<PathBuf>,
    playback: Option<Playback>,
    last_session_id: u64,
    volume_dirty: bool,
}

impl<L: EngineLauncher> PlaybackController<L> {
    pub fn new(launcher: L, state: Arc<StateManager>, events: mpsc::Sender<SessionEvent>) -> Self {
        Self {
            launcher,
            state,
            events,
            queue: Vec::new(),
            playback: None,
            last_session_id: 0,
            volume_dirty: false,
        }
    }

    // ── queries ──────────────────────────────────────────────────────────────

    pub fn queue(&self) -> &[PathBuf] {
        &self.queue
    }

    pub fn current_track(&self) -> Option<&Path> {
        let index = self.state.read(|s| s.current_index);
        self.queue.get(index).map(PathBuf::as_path)
    }

    pub fn status(&self) -> PlayerStatus {
        match &self.playback {
            None => PlayerStatus::Stopped,
            Some(_) if self.state.read(|s| s.is_paused) => PlayerStatus::Paused,
            Some(_) => PlayerStatus::Playing,
        }
    }

    /// `true` while a playback exists and its session still has a connection.
    pub fn engine_connected(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| p.session.is_connected())
    }

    // ── playback ─────────────────────────────────────────────────────────────

    /// Replace whatever is playing with the track at `index`.
    pub async fn play_at(&mut self, index: usize) {
        let Some(track) = self.queue.get(index).cloned() else {
            warn!("play_at: index {} out of range ({} queued)", index, self.queue.len());
            return;
        };

        self.stop_current().await;

        let volume = self.state.update(|s| {
            s.current_index = index;
            s.is_paused = false;
            s.position_secs = 0.0;
            s.duration_secs = 0.0;
            if s.shuffle_enabled {
                if let Some(pos) = s.shuffle_order.iter().position(|&i| i == index) {
                    s.shuffle_cursor = pos;
                }
            }
            s.volume
        });

        self.last_session_id += 1;
        let wiring = SessionWiring {
            id: self.last_session_id,
            state: self.state.clone(),
            events: self.events.clone(),
        };

        match self.launcher.launch(&track, volume, wiring).await {
            Ok(playback) => {
                info!(
                    "play_at: {:?} (session {}, pid {:?}, {} properties observed)",
                    track,
                    playback.session.id(),
                    playback.process.as_ref().and_then(|p| p.id()),
                    playback.session.observed().len()
                );
                if playback.session.is_connected() {
                    self.state
                        .set_status(format!("Now playing: {}", track_title(&track)));
                } else {
                    self.state.set_status("Engine is not answering; controls unavailable");
                }
                // The engine was started at the current volume.
                self.volume_dirty = false;
                self.playback = Some(playback);
            }
            Err(e) => {
                error!("play_at: launch failed for {:?}: {:#}", track, e);
                self.state
                    .set_status(format!("Cannot play {}: {}", display_name(&track), e));
            }
        }
    }

    pub async fn next(&mut self) {
        if let Some(index) = self.step(true) {
            self.play_at(index).await;
        }
    }

    pub async fn previous(&mut self) {
        if let Some(index) = self.step(false) {
            self.play_at(index).await;
        }
    }

    /// Index of the neighbouring track, through the shuffle order when enabled.
    fn step(&self, forward: bool) -> Option<usize> {
        let len = self.queue.len();
        if len == 0 {
            return None;
        }
        let index = self.state.update(|s| {
            if s.shuffle_enabled && s.shuffle_order.len() == len {
                s.shuffle_cursor = wrap(s.shuffle_cursor, forward, len);
                s.shuffle_order[s.shuffle_cursor]
            } else {
                wrap(s.current_index, forward, len)
            }
        });
        Some(index)
    }

    pub fn toggle_pause(&mut self) {
        let Some(playback) = &self.playback else {
            self.state.set_status("Nothing is playing");
            return;
        };
        match playback.session.send(&Command::CyclePause) {
            // The engine flips the flag; announce what it is about to become.
            Ok(()) => {
                let paused = self.state.read(|s| s.is_paused);
                self.state.set_status(if paused { "Resumed" } else { "Paused" });
            }
            Err(e) => debug!("toggle_pause: {}", e),
        }
    }

    /// Adjust the local volume target; the engine hears about it on the next
    /// `apply_pending_volume`.
    pub fn set_volume(&mut self, delta: f64) {
        let (before, after) = self.state.update(|s| {
            let before = s.volume;
            s.volume = (s.volume + delta).clamp(0.0, 100.0);
            (before, s.volume)
        });
        if after != before {
            self.volume_dirty = true;
            self.state.set_status(format!("Volume: {}%", after.round()));
        }
    }

    pub fn apply_pending_volume(&mut self) {
        if !self.volume_dirty {
            return;
        }
        let Some(playback) = &self.playback else {
            return;
        };
        if !playback.session.is_connected() {
            return;
        }
        let volume = self.state.read(|s| s.volume);
        match playback.session.send(&Command::SetVolume(volume)) {
            Ok(()) => self.volume_dirty = false,
            Err(e) => debug!("apply_pending_volume: {}", e),
        }
    }

    pub fn toggle_shuffle(&mut self) {
        let len = self.queue.len();
        let enabled = self.state.update(|s| {
            s.shuffle_enabled = !s.shuffle_enabled;
            if s.shuffle_enabled {
                reshuffle(s, len);
            } else {
                s.shuffle_order.clear();
                s.shuffle_cursor = 0;
            }
            s.shuffle_enabled
        });
        self.state
            .set_status(format!("Shuffle: {}", if enabled { "ON" } else { "OFF" }));
    }

    pub fn toggle_repeat(&mut self) {
        let enabled = self.state.update(|s| {
            s.repeat_enabled = !s.repeat_enabled;
            s.repeat_enabled
        });
        self.state
            .set_status(format!("Repeat: {}", if enabled { "ON" } else { "OFF" }));
    }

    pub async fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::EndOfFile { session } => {
                let live = self.playback.as_ref().map(|p| p.session.id());
                if live != Some(session) {
                    debug!("end-of-file from stale session {} (live {:?})", session, live);
                    return;
                }
                let (paused, repeat, index) =
                    self.state
                        .read(|s| (s.is_paused, s.repeat_enabled, s.current_index));
                if paused {
                    debug!("end-of-file while paused, ignored");
                    return;
                }
                if self.queue.is_empty() {
                    return;
                }
                if repeat {
                    self.play_at(index).await;
                } else {
                    self.next().await;
                }
            }
        }
    }

    // ── queue ────────────────────────────────────────────────────────────────

    /// Append a track unless it is already queued.
    pub fn enqueue(&mut self, path: PathBuf) -> bool {
        if self.queue.contains(&path) {
            return false;
        }
        self.queue.push(path);
        self.queue_changed();
        true
    }

    /// Append several tracks, skipping duplicates.  Returns how many were added.
    pub fn enqueue_many(&mut self, paths: impl IntoIterator<Item = PathBuf>) -> usize {
        let before = self.queue.len();
        for path in paths {
            if !self.queue.contains(&path) {
                self.queue.push(path);
            }
        }
        let added = self.queue.len() - before;
        if added > 0 {
            self.queue_changed();
        }
        added
    }

    /// Drop a queue entry.  The current index keeps pointing at the same
    /// track when an earlier entry goes, and is clamped when the tail goes.
    /// A track that is playing keeps playing.
    pub fn remove(&mut self, index: usize) -> Option<PathBuf> {
        if index >= self.queue.len() {
            return None;
        }
        let removed = self.queue.remove(index);
        let len = self.queue.len();
        self.state.update(|s| {
            if index < s.current_index {
                s.current_index -= 1;
            }
            if s.current_index >= len {
                s.current_index = len.saturating_sub(1);
            }
        });
        self.queue_changed();
        self.state
            .set_status(format!("Removed: {}", display_name(&removed)));
        Some(removed)
    }

    fn queue_changed(&mut self) {
        let len = self.queue.len();
        self.state.update(|s| {
            if s.shuffle_enabled {
                reshuffle(s, len);
            }
        });
    }

    // ── teardown ─────────────────────────────────────────────────────────────

    async fn stop_current(&mut self) {
        if let Some(playback) = self.playback.take() {
            playback.teardown().await;
        }
    }

    pub async fn shutdown(&mut self) {
        info!("controller: shutting down");
        self.stop_current().await;
    }
}

fn wrap(index: usize, forward: bool, len: usize) -> usize {
    if forward {
        (index + 1) % len
    } else {
        (index + len - 1) % len
    }
}

/// Fresh permutation of `0..len`, cursor on the current track.
fn reshuffle(s: &mut PlaybackState, len: usize) {
    let mut order: Vec<usize> = (0..len).collect();
    order.shuffle(&mut rand::thread_rng());
    s.shuffle_cursor = order
        .iter()
        .position(|&i| i == s.current_index)
        .unwrap_or(0);
    s.shuffle_order = order;
}

/// File name without its extension, for "now playing" lines.
fn track_title(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| display_name(path))
}

pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
