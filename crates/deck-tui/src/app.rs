//! The frame loop: input, update, render, sleep.

use crate::action::{map_key, Action, Screen};
use crate::controller::{display_name, PlaybackController, PlayerStatus};
use crate::engine::EngineLauncher;
use crate::library::{Browser, EntryKind};
use crate::render::{DiffRenderer, Surface};
use crate::session::SessionEvent;
use crate::terminal::InputSource;
use crate::theme::Theme;
use crate::view::{self, Chrome, PlayerView};
use crate::visualizer::Visualizer;
use deck_proto::config::PlayerConfig;
use deck_proto::state::StateManager;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const INTENSITY_STEP: f32 = 0.1;
const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Counts loop iterations and reports the achieved rate once per window.
pub struct FrameClock {
    window_start: Instant,
    frames: u32,
    fps: f32,
}

impl FrameClock {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
            fps: 0.0,
        }
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Record one frame.  Returns the new rate when a window closes.
    pub fn tick(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < FPS_WINDOW {
            return None;
        }
        self.fps = self.frames as f32 / elapsed.as_secs_f32();
        self.frames = 0;
        self.window_start = now;
        Some(self.fps)
    }
}

pub struct App<L: EngineLauncher, S: Surface, I: InputSource> {
    controller: PlaybackController<L>,
    renderer: DiffRenderer<S>,
    input: I,
    state: Arc<StateManager>,
    events: mpsc::Receiver<SessionEvent>,
    visualizer: Visualizer,
    browser: Browser,
    screen: Screen,
    theme: Theme,
    track_selected: usize,
    theme_selected: usize,
    clock: FrameClock,
    frame_interval: Duration,
    status_ttl: Duration,
    volume_step: f64,
    page_size: usize,
    running: bool,
}

impl<L: EngineLauncher, S: Surface, I: InputSource> App<L, S, I> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        controller: PlaybackController<L>,
        renderer: DiffRenderer<S>,
        input: I,
        state: Arc<StateManager>,
        events: mpsc::Receiver<SessionEvent>,
        browser: Browser,
        config: &PlayerConfig,
        page_size: usize,
    ) -> Self {
        let theme = Theme::from_name(&config.theme).unwrap_or_else(|| {
            warn!("app: unknown theme {:?}, using {}", config.theme, Theme::default().name());
            Theme::default()
        });
        Self {
            controller,
            renderer,
            input,
            state,
            events,
            visualizer: Visualizer::new(),
            browser,
            screen: Screen::Player,
            theme,
            track_selected: 0,
            theme_selected: theme.index(),
            clock: FrameClock::new(Instant::now()),
            frame_interval: config.frame_interval(),
            status_ttl: config.status_ttl(),
            volume_step: config.volume_step,
            page_size: page_size.max(1),
            running: true,
        }
    }

    pub fn controller_mut(&mut self) -> &mut PlaybackController<L> {
        &mut self.controller
    }

    pub fn show(&mut self, screen: Screen) {
        match screen {
            Screen::Tracks => {
                let current = self.state.read(|s| s.current_index);
                self.track_selected = current.min(self.controller.queue().len().saturating_sub(1));
            }
            Screen::Themes => self.theme_selected = self.theme.index(),
            Screen::Player | Screen::Browser => {}
        }
        debug!("app: screen {:?} -> {:?}", self.screen, screen);
        self.screen = screen;
        self.state.request_redraw();
    }

    /// Run until quit.  The controller is shut down however the loop ends.
    pub async fn run(mut self) -> anyhow::Result<()> {
        info!("app: entering main loop ({:?} per frame)", self.frame_interval);
        let result = self.frame_loop().await;
        self.controller.shutdown().await;
        info!("app: main loop finished");
        result
    }

    async fn frame_loop(&mut self) -> anyhow::Result<()> {
        let mut last = Instant::now();
        while self.running {
            let start = Instant::now();
            self.frame(start.saturating_duration_since(last)).await?;
            last = start;
            if let Some(rest) = self.frame_interval.checked_sub(start.elapsed()) {
                tokio::time::sleep(rest).await;
            }
        }
        Ok(())
    }

    /// One pass of input, update and render.
    async fn frame(&mut self, dt: Duration) -> anyhow::Result<()> {
        while let Some(key) = self.input.poll_key()? {
            if let Some(action) = map_key(self.screen, key) {
                self.dispatch(action).await;
            }
            if !self.running {
                return Ok(());
            }
        }
        self.update(dt).await?;
        self.render_if_needed()?;
        if self.clock.tick(Instant::now()).is_some() {
            self.state.request_redraw();
        }
        Ok(())
    }

    async fn update(&mut self, dt: Duration) -> io::Result<()> {
        let size = self.renderer.surface().size()?;
        if size != self.renderer.size() {
            debug!("app: resize to {}x{}", size.0, size.1);
            self.renderer.resize(size.0, size.1)?;
            self.state.request_redraw();
        }

        while let Ok(event) = self.events.try_recv() {
            self.controller.handle_session_event(event).await;
        }

        let paused = self.controller.status() != PlayerStatus::Playing;
        self.visualizer.tick(dt, paused);
        self.state.expire_status(Instant::now(), self.status_ttl);
        self.controller.apply_pending_volume();
        Ok(())
    }

    fn render_if_needed(&mut self) -> io::Result<()> {
        let requested = self.state.take_redraw();
        let paused = self.controller.status() != PlayerStatus::Playing;
        let animating = self.screen == Screen::Player && self.visualizer.is_animating(paused);
        if requested || animating {
            self.draw()?;
        }
        Ok(())
    }

    fn draw(&mut self) -> io::Result<usize> {
        let snapshot = self.state.snapshot();
        let chrome = Chrome {
            theme: self.theme,
            fps: self.clock.fps(),
            viz: &self.visualizer,
            status: snapshot.status.as_ref().map(|s| s.text.as_str()),
        };
        let blank = chrome.blank();
        let status = self.controller.status();
        let queue = self.controller.queue();

        match self.screen {
            Screen::Player => {
                let view = PlayerView {
                    state: &snapshot,
                    track: self.controller.current_track().map(display_name),
                    status,
                    connected: self.controller.engine_connected(),
                    queue_len: queue.len(),
                };
                self.renderer.render(blank, |c| view::draw_player(c, &chrome, &view))
            }
            Screen::Browser => {
                let browser = &self.browser;
                self.renderer
                    .render(blank, |c| view::draw_browser(c, &chrome, browser, queue))
            }
            Screen::Tracks => {
                let current = (status != PlayerStatus::Stopped).then_some(snapshot.current_index);
                let selected = self.track_selected;
                self.renderer
                    .render(blank, |c| view::draw_tracks(c, &chrome, queue, current, selected))
            }
            Screen::Themes => {
                let selected = self.theme_selected;
                self.renderer
                    .render(blank, |c| view::draw_themes(c, &chrome, selected))
            }
        }
    }

    // ── actions ──────────────────────────────────────────────────────────────

    pub async fn dispatch(&mut self, action: Action) {
        debug!("app: {:?} on {:?}", action, self.screen);
        match action {
            Action::Quit => self.running = false,
            Action::TogglePause => self.controller.toggle_pause(),
            Action::Next => self.controller.next().await,
            Action::Prev => self.controller.previous().await,
            Action::VolumeUp => self.controller.set_volume(self.volume_step),
            Action::VolumeDown => self.controller.set_volume(-self.volume_step),
            Action::ToggleShuffle => self.controller.toggle_shuffle(),
            Action::ToggleRepeat => self.controller.toggle_repeat(),
            Action::ToggleVisualizer => {
                let on = self.visualizer.toggle();
                self.state
                    .set_status(format!("Visualizer: {}", if on { "ON" } else { "OFF" }));
            }
            Action::CycleVisualizerMode => {
                let mode = self.visualizer.cycle_mode();
                self.state
                    .set_status(format!("Visualizer mode: {}", mode.name()));
            }
            Action::IntensityUp | Action::IntensityDown => {
                let delta = if action == Action::IntensityUp {
                    INTENSITY_STEP
                } else {
                    -INTENSITY_STEP
                };
                let value = self.visualizer.adjust_intensity(delta);
                self.state.set_status(format!("Intensity: {:.1}x", value));
            }
            Action::SelectUp | Action::SelectDown | Action::PageUp | Action::PageDown => {
                self.move_selection(action)
            }
            Action::Activate => self.activate().await,
            Action::PlaySelected => self.play_selected().await,
            Action::AddSelected => self.add_selected(),
            Action::AddFolder => {
                let dir = self.browser.cwd().to_path_buf();
                self.add_folder(&dir);
            }
            Action::Back => self.browser_back(),
            Action::RemoveSelected => self.remove_selected(),
            Action::Show(screen) => self.show(screen),
        }
        self.state.request_redraw();
    }

    fn move_selection(&mut self, action: Action) {
        match self.screen {
            Screen::Browser => match action {
                Action::SelectUp => self.browser.move_up(),
                Action::SelectDown => self.browser.move_down(),
                Action::PageUp => self.browser.page_up(),
                _ => self.browser.page_down(),
            },
            Screen::Tracks => {
                let last = self.controller.queue().len().saturating_sub(1);
                self.track_selected = step_selection(self.track_selected, action, self.page_size, last);
            }
            Screen::Themes => {
                let last = Theme::ALL.len() - 1;
                self.theme_selected = step_selection(self.theme_selected, action, 1, last);
            }
            Screen::Player => {}
        }
    }

    async fn activate(&mut self) {
        match self.screen {
            Screen::Browser => {
                let Some(entry) = self.browser.selected_entry().cloned() else {
                    return;
                };
                if !entry.is_dir() {
                    self.add_selected();
                } else if let Err(e) = self.browser.enter(entry.path) {
                    warn!("app: {}", e);
                    self.state.set_status(e.to_string());
                }
            }
            Screen::Tracks => {
                if self.track_selected < self.controller.queue().len() {
                    self.controller.play_at(self.track_selected).await;
                    self.show(Screen::Player);
                }
            }
            Screen::Themes => {
                let theme = Theme::ALL[self.theme_selected];
                if theme != self.theme {
                    info!("app: theme {} -> {}", self.theme.name(), theme.name());
                    self.theme = theme;
                    self.renderer.invalidate_all();
                }
                self.state
                    .set_status(format!("Theme changed to: {}", theme.name()));
            }
            Screen::Player => {}
        }
    }

    async fn play_selected(&mut self) {
        let Some(entry) = self.browser.selected_entry().cloned() else {
            return;
        };
        if entry.kind != EntryKind::Track {
            return;
        }
        self.controller.enqueue(entry.path.clone());
        if let Some(index) = self.controller.queue().iter().position(|p| *p == entry.path) {
            self.controller.play_at(index).await;
            self.show(Screen::Player);
        }
    }

    fn add_selected(&mut self) {
        let Some(entry) = self.browser.selected_entry().cloned() else {
            return;
        };
        match entry.kind {
            EntryKind::Parent => {}
            EntryKind::Directory => self.add_folder(&entry.path),
            EntryKind::Track => {
                let name = display_name(&entry.path);
                if self.controller.enqueue(entry.path) {
                    self.state.set_status(format!("Added: {}", name));
                } else {
                    self.state.set_status(format!("Already queued: {}", name));
                }
            }
        }
    }

    fn add_folder(&mut self, dir: &Path) {
        match self.browser.library().collect_tracks(dir) {
            Ok(tracks) => {
                let found = tracks.len();
                let added = self.controller.enqueue_many(tracks);
                info!("app: {} of {} tracks added from {:?}", added, found, dir);
                self.state
                    .set_status(format!("Added {} tracks from {}", added, display_name(dir)));
            }
            Err(e) => {
                warn!("app: {}", e);
                self.state.set_status(e.to_string());
            }
        }
    }

    fn browser_back(&mut self) {
        let result = match self.browser.back() {
            Ok(true) => Ok(()),
            Ok(false) => match self.browser.cwd().parent().map(PathBuf::from) {
                Some(parent) => self.browser.enter(parent),
                None => Ok(()),
            },
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("app: {}", e);
            self.state.set_status(e.to_string());
        }
    }

    fn remove_selected(&mut self) {
        if self.screen != Screen::Tracks {
            return;
        }
        if self.controller.remove(self.track_selected).is_some() {
            let last = self.controller.queue().len().saturating_sub(1);
            self.track_selected = self.track_selected.min(last);
        }
    }
}

fn step_selection(current: usize, action: Action, page: usize, last: usize) -> usize {
    match action {
        Action::SelectUp => current.saturating_sub(1),
        Action::SelectDown => (current + 1).min(last),
        Action::PageUp => current.saturating_sub(page),
        Action::PageDown => (current + page).min(last),
        _ => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Playback;
    use crate::library::Library;
    use crate::render::testing::RecordingSurface;
    use crate::session::{Session, SessionWiring};
    use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::collections::VecDeque;

    /// Launches nothing; every playback gets a session with no engine behind it.
    struct SilentLauncher;

    impl EngineLauncher for SilentLauncher {
        async fn launch(
            &mut self,
            _track: &Path,
            _volume: f64,
            wiring: SessionWiring,
        ) -> anyhow::Result<Playback> {
            Ok(Playback {
                process: None,
                session: Session::degraded(wiring.id),
            })
        }
    }

    #[derive(Default)]
    struct ScriptedInput(VecDeque<KeyEvent>);

    impl InputSource for ScriptedInput {
        fn poll_key(&mut self) -> io::Result<Option<KeyEvent>> {
            Ok(self.0.pop_front())
        }
    }

    type TestApp = App<SilentLauncher, RecordingSurface, ScriptedInput>;

    fn app(dir: &Path, keys: &[KeyCode]) -> TestApp {
        let state = Arc::new(StateManager::default());
        let (tx, rx) = mpsc::channel(16);
        let controller = PlaybackController::new(SilentLauncher, state.clone(), tx);
        let renderer = DiffRenderer::new(RecordingSurface::new(80, 24)).unwrap();
        let input = ScriptedInput(
            keys.iter()
                .map(|&code| KeyEvent::new(code, KeyModifiers::NONE))
                .collect(),
        );
        let library = Library::new(&["mp3".to_string()]);
        let browser = Browser::open(library, dir.to_path_buf(), 20);
        App::new(
            controller,
            renderer,
            input,
            state,
            rx,
            browser,
            &PlayerConfig::default(),
            20,
        )
    }

    fn status_text(app: &TestApp) -> Option<String> {
        app.state.read(|s| s.status.as_ref().map(|m| m.text.clone()))
    }

    #[test]
    fn test_frame_clock_reports_once_per_window() {
        let start = Instant::now();
        let mut clock = FrameClock::new(start);
        for i in 1..30 {
            assert_eq!(clock.tick(start + Duration::from_millis(i * 33)), None);
        }
        let fps = clock.tick(start + Duration::from_millis(1000)).unwrap();
        assert!((fps - 30.0).abs() < 0.01);
        assert_eq!(clock.fps(), fps);
    }

    #[tokio::test]
    async fn test_idle_frames_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path(), &[]);
        app.dispatch(Action::ToggleVisualizer).await;
        app.frame(Duration::from_millis(33)).await.unwrap();
        let first = app.renderer.surface().glyphs();
        assert_eq!(first, 80 * 24);

        app.frame(Duration::from_millis(33)).await.unwrap();
        app.frame(Duration::from_millis(33)).await.unwrap();
        assert_eq!(app.renderer.surface().glyphs(), first);
    }

    #[tokio::test]
    async fn test_theme_change_repaints_everything() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path(), &[]);
        app.dispatch(Action::ToggleVisualizer).await;
        app.frame(Duration::ZERO).await.unwrap();
        let before = app.renderer.surface().glyphs();

        app.dispatch(Action::Show(Screen::Themes)).await;
        app.dispatch(Action::SelectDown).await;
        app.dispatch(Action::Activate).await;
        assert_eq!(app.theme, Theme::Cyberpunk);
        assert_eq!(status_text(&app).as_deref(), Some("Theme changed to: Cyberpunk"));

        app.frame(Duration::ZERO).await.unwrap();
        assert_eq!(app.renderer.surface().glyphs() - before, 80 * 24);
    }

    #[tokio::test]
    async fn test_quit_key_ends_run() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path(), &[KeyCode::Char('q')]);
        tokio::time::timeout(Duration::from_secs(1), app.run())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_browser_space_on_track_plays_it() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.mp3"), b"").unwrap();
        let mut app = app(dir.path(), &[KeyCode::Char('f'), KeyCode::Down, KeyCode::Char(' ')]);
        app.frame(Duration::ZERO).await.unwrap();

        assert_eq!(app.controller.queue(), &[dir.path().join("a.mp3")]);
        assert_eq!(app.controller.status(), PlayerStatus::Playing);
        assert_eq!(app.screen, Screen::Player);
    }

    #[tokio::test]
    async fn test_browser_enter_on_track_only_queues_it() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.mp3"), b"").unwrap();
        let mut app = app(dir.path(), &[KeyCode::Char('f'), KeyCode::Down, KeyCode::Enter]);
        app.frame(Duration::ZERO).await.unwrap();

        assert_eq!(app.controller.queue(), &[dir.path().join("a.mp3")]);
        assert_eq!(app.controller.status(), PlayerStatus::Stopped);
        assert_eq!(app.screen, Screen::Browser);
        assert_eq!(status_text(&app).as_deref(), Some("Added: a.mp3"));
    }

    #[tokio::test]
    async fn test_browser_add_folder_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/x.mp3"), b"").unwrap();
        std::fs::write(dir.path().join("y.mp3"), b"").unwrap();
        let mut app = app(dir.path(), &[]);
        app.show(Screen::Browser);

        app.dispatch(Action::AddFolder).await;
        assert_eq!(app.controller.queue().len(), 2);
        assert_eq!(
            status_text(&app),
            Some(format!("Added 2 tracks from {}", display_name(dir.path())))
        );

        // [..], [sub], y.mp3
        app.dispatch(Action::SelectDown).await;
        app.dispatch(Action::SelectDown).await;
        app.dispatch(Action::AddSelected).await;
        assert_eq!(status_text(&app).as_deref(), Some("Already queued: y.mp3"));
        assert_eq!(app.controller.queue().len(), 2);
    }

    #[tokio::test]
    async fn test_unreadable_directory_keeps_listing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let mut app = app(dir.path(), &[]);
        app.show(Screen::Browser);
        std::fs::remove_dir(dir.path().join("sub")).unwrap();

        app.dispatch(Action::SelectDown).await;
        app.dispatch(Action::Activate).await;
        assert_eq!(app.browser.cwd(), dir.path());
        assert!(status_text(&app).unwrap().starts_with("cannot read"));
    }

    #[tokio::test]
    async fn test_track_list_remove_clamps_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path(), &[]);
        app.controller_mut()
            .enqueue_many(["/m/a.mp3", "/m/b.mp3"].map(PathBuf::from));
        app.show(Screen::Tracks);
        app.dispatch(Action::PageDown).await;
        assert_eq!(app.track_selected, 1);

        app.dispatch(Action::RemoveSelected).await;
        assert_eq!(app.controller.queue(), &[PathBuf::from("/m/a.mp3")]);
        assert_eq!(app.track_selected, 0);
        assert_eq!(status_text(&app).as_deref(), Some("Removed: b.mp3"));
    }
}
