//! Monitoring loop.
//!
//! One cycle: capture (with bounded retry) → classify → read level and zen
//! when in game → decide milestones → act → sleep. Nothing here ends the
//! process: transient failures are escalated at most once per cycle and the
//! loop carries on until the stop signal is raised.

use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::error::CaptureError;
use crate::monitor::actions::{run_script, ScriptOutcome};
use crate::monitor::config::{MonitorConfig, RevealConfig};
use crate::monitor::milestone::{MilestoneTracker, NotificationDecision};
use crate::monitor::notify;
use crate::monitor::state::{MonitorState, StopSignal};
use crate::ocr::{self, NumericKind, NumericReading, OcrEngine};
use crate::platform::{
    AudioPlayer, InputInjector, Notification, NotificationSink, ScreenshotSource, WindowManager,
};
use crate::vision::{extract, GameState, Screenshot, StateClassifier, StateProbe, WindowRect};

/// The external collaborators the loop drives.
pub struct Collaborators {
    pub windows: Box<dyn WindowManager>,
    pub screen: Box<dyn ScreenshotSource>,
    pub input: Box<dyn InputInjector>,
    pub ocr: Box<dyn OcrEngine>,
    pub audio: Box<dyn AudioPlayer>,
    pub notifier: Box<dyn NotificationSink>,
}

/// A captured frame plus the game window bounds at capture time.
struct Frame {
    shot: Screenshot,
    window: Option<WindowRect>,
}

/// What one cycle did, for logs and tests.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CycleReport {
    /// `None` when no screenshot could be captured.
    pub classified: Option<GameState>,
    pub readings: Vec<NumericReading>,
    pub notifications: usize,
}

#[derive(Debug, Default)]
struct Counters {
    cycle: u64,
    unknown: Streak,
    unresolved_level: Streak,
    unresolved_zen: Streak,
    last_read: Option<Instant>,
    last_state: Option<GameState>,
    /// A transient error was already escalated this cycle.
    escalated: bool,
    sent: usize,
}

/// Consecutive failures of one kind. `escalated` is set once the
/// escalation for this streak was actually delivered.
#[derive(Debug, Default)]
struct Streak {
    count: u32,
    escalated: bool,
}

impl Streak {
    fn reset(&mut self) {
        *self = Streak::default();
    }

    /// Bumps the count and returns it if an escalation is owed.
    fn bump(&mut self, threshold: u32) -> Option<u32> {
        self.count = self.count.saturating_add(1);
        (self.count >= threshold && !self.escalated).then_some(self.count)
    }
}

impl Counters {
    fn unresolved(&mut self, kind: NumericKind) -> &mut Streak {
        match kind {
            NumericKind::Level => &mut self.unresolved_level,
            NumericKind::Zen => &mut self.unresolved_zen,
        }
    }
}

pub struct MonitorLoop<'a> {
    config: &'a MonitorConfig,
    classifier: StateClassifier,
    reward: Option<StateProbe>,
    io: Collaborators,
    stop: StopSignal,
    tracker: MilestoneTracker,
    state: MonitorState,
    counters: Counters,
}

impl<'a> MonitorLoop<'a> {
    pub fn new(
        config: &'a MonitorConfig,
        classifier: StateClassifier,
        reward: Option<StateProbe>,
        io: Collaborators,
        stop: StopSignal,
    ) -> Self {
        let tracker = MilestoneTracker::new(
            config.milestones.level.clone(),
            config.milestones.zen.clone(),
        );
        Self {
            config,
            classifier,
            reward,
            io,
            stop,
            tracker,
            state: MonitorState::Idle,
            counters: Counters::default(),
        }
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    pub fn tracker_mut(&mut self) -> &mut MilestoneTracker {
        &mut self.tracker
    }

    fn set_state(&mut self, state: MonitorState) {
        if self.state != state {
            debug!("State: {} -> {}", self.state, state);
            self.state = state;
        }
    }

    /// Runs until the stop signal is raised.
    pub fn run(&mut self) {
        info!("Monitor starting (window \"{}\")", self.config.window.title);
        self.startup();

        while !self.stop.is_stopped() {
            let report = self.run_cycle();
            debug!("Cycle {} done: {:?}", self.counters.cycle, report);
            if self.stop.is_stopped() {
                break;
            }
            self.set_state(MonitorState::Sleeping);
            if self.stop.wait(self.cycle_delay()) {
                break;
            }
        }

        self.set_state(MonitorState::Stopped);
        info!("Monitor stopped after {} cycles", self.counters.cycle);
    }

    /// Waits for the in-game screen before the first cycle.
    ///
    /// Returns whether it was found. Not finding it is reported once and
    /// the loop starts anyway.
    pub fn startup(&mut self) -> bool {
        self.set_state(MonitorState::Starting);
        let config = self.config;
        let startup = &config.startup;
        if self.stop.wait(Duration::from_millis(startup.delay_ms)) {
            return false;
        }

        for attempt in 1..=startup.max_attempts {
            if self.stop.is_stopped() {
                return false;
            }
            info!("Checking in-game status (attempt {}/{})...", attempt, startup.max_attempts);
            match self.acquire_frame() {
                Ok(frame) => {
                    let found = self
                        .classifier
                        .probe(GameState::InGame, &frame.shot, frame.window.as_ref())
                        .is_some_and(|m| m.matched);
                    if found {
                        info!("Trainer started");
                        self.play_sound(config.sounds.start.as_deref());
                        return true;
                    }
                }
                Err(e) => warn!("Startup capture failed: {}", e),
            }
            if attempt < startup.max_attempts {
                info!("Not in game yet; retrying in {}ms", startup.retry_delay_ms);
                if self.stop.wait(Duration::from_millis(startup.retry_delay_ms)) {
                    return false;
                }
            }
        }

        error!("Unable to detect the game screen at startup");
        let n = notify::error(
            &self.config.notification,
            &format!(
                "Game screen not detected after {} startup attempts",
                startup.max_attempts
            ),
            None,
        );
        self.dispatch(&n);
        false
    }

    /// Runs one full cycle, not including the sleep after it.
    pub fn run_cycle(&mut self) -> CycleReport {
        self.counters.cycle += 1;
        self.counters.escalated = false;
        let sent_before = self.counters.sent;
        let mut report = CycleReport::default();

        let Some(frame) = self.capture_with_retry() else {
            report.notifications = self.counters.sent - sent_before;
            return report;
        };

        self.set_state(MonitorState::Classifying);
        let state = self.classifier.classify(&frame.shot, frame.window.as_ref());
        if self.counters.last_state != Some(state) {
            info!("Game state: {} (frame {})", state, frame.shot.timestamp());
            self.counters.last_state = Some(state);
        }
        report.classified = Some(state);
        self.health_check(state, &frame);

        match state {
            GameState::InGame => {
                if self.read_due() {
                    report.readings = self.extract_and_decide(&frame);
                    self.counters.last_read = Some(Instant::now());
                }
                if !self.stop.is_stopped() {
                    self.act();
                }
            }
            GameState::Dialog | GameState::Inventory | GameState::CharacterMenu => {
                self.set_state(MonitorState::Acting);
                let steps = self.config.recovery.for_state(state);
                if let Err(e) = run_script(&format!("{} recovery", state), steps, self.io.input.as_ref(), &self.stop) {
                    warn!("{} recovery aborted: {}", state, e);
                }
            }
            GameState::Unknown => {}
        }

        report.notifications = self.counters.sent - sent_before;
        report
    }

    fn cycle_delay(&self) -> Duration {
        let cycle = &self.config.cycle;
        let jitter = if cycle.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=cycle.jitter_ms)
        } else {
            0
        };
        Duration::from_millis(cycle.interval_ms + jitter)
    }

    fn read_due(&self) -> bool {
        match self.counters.last_read {
            None => true,
            Some(at) => at.elapsed() >= Duration::from_millis(self.config.cycle.read_interval_ms),
        }
    }

    /// One capture attempt: find and focus the window, then grab the screen.
    fn acquire_frame(&self) -> Result<Frame, CaptureError> {
        let window_cfg = &self.config.window;
        let window = if window_cfg.title.is_empty() {
            None
        } else {
            let handle = self.io.windows.find_window(&window_cfg.title)?;
            if window_cfg.focus_each_cycle {
                self.io.windows.focus(handle)?;
                if self.stop.wait(Duration::from_millis(window_cfg.settle_ms)) {
                    return Err(CaptureError::Stopped);
                }
            }
            Some(self.io.windows.bounds(handle)?)
        };
        let shot = self.io.screen.capture(None)?;
        Ok(Frame { shot, window })
    }

    /// Up to `1 + capture_max_retries` attempts with backoff in between.
    /// Escalates once if every attempt fails.
    fn capture_with_retry(&mut self) -> Option<Frame> {
        let config = self.config;
        let retry = &config.retry;
        let attempts = retry.capture_max_retries + 1;
        let mut last_error = None;

        for attempt in 1..=attempts {
            self.set_state(MonitorState::Capturing);
            match self.acquire_frame() {
                Ok(frame) => {
                    if attempt > 1 {
                        info!("Capture recovered on attempt {}", attempt);
                    }
                    return Some(frame);
                }
                Err(CaptureError::Stopped) => return None,
                Err(e) => {
                    warn!("Capture attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = Some(e);
                }
            }
            if attempt < attempts {
                self.set_state(MonitorState::Retrying { attempt });
                if self.stop.wait(Duration::from_millis(retry.backoff_ms)) {
                    return None;
                }
            }
        }

        let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
        self.escalate(
            &format!("Screen capture failed after {} attempts: {}", attempts, reason),
            None,
        );
        None
    }

    /// Counts Unknown cycles and escalates once the streak reaches the
    /// threshold. A failed send is retried on the next Unknown cycle.
    fn health_check(&mut self, state: GameState, frame: &Frame) {
        if state != GameState::Unknown {
            self.counters.unknown.reset();
            return;
        }
        let owed = self.counters.unknown.bump(self.config.health_check_threshold);
        debug!("Unknown state streak: {}", self.counters.unknown.count);
        if let Some(streak) = owed {
            error!("Health check failed: state Unknown for {} cycles", streak);
            let n = notify::error(
                &self.config.notification,
                &format!("Game state unknown for {} consecutive cycles", streak),
                self.attachment(&frame.shot),
            );
            if self.dispatch(&n) {
                self.counters.unknown.escalated = true;
            }
        }
    }

    fn extract_and_decide(&mut self, frame: &Frame) -> Vec<NumericReading> {
        let mut readings = Vec::with_capacity(2);
        for kind in [NumericKind::Level, NumericKind::Zen] {
            if self.stop.is_stopped() {
                break;
            }
            self.set_state(MonitorState::Extracting);
            let Some(reading) = self.read_value(kind, frame) else {
                continue;
            };
            info!("Read {}", reading);

            self.set_state(MonitorState::Deciding);
            self.track_unresolved(&reading, frame);
            if let NotificationDecision::Notify { value, previous } = self.tracker.observe(&reading) {
                info!("{} milestone: {} -> {}", kind, previous, value);
                let n = notify::milestone(&self.config.notification, kind, value);
                if self.dispatch(&n) {
                    self.tracker.commit(kind, value);
                }
            }
            readings.push(reading);
        }
        readings
    }

    fn track_unresolved(&mut self, reading: &NumericReading, frame: &Frame) {
        let threshold = self.config.health_check_threshold;
        let streak = self.counters.unresolved(reading.kind);
        if reading.is_resolved() {
            streak.reset();
            return;
        }
        let Some(count) = streak.bump(threshold) else {
            return;
        };
        let n = notify::error(
            &self.config.notification,
            &format!("Unable to read {} for {} consecutive checks", reading.kind, count),
            self.attachment(&frame.shot),
        );
        if self.dispatch(&n) {
            self.counters.unresolved(reading.kind).escalated = true;
        }
    }

    /// Reads one value, opening and closing its menu first if configured.
    ///
    /// `None` means a transient failure that was already escalated.
    fn read_value(&mut self, kind: NumericKind, frame: &Frame) -> Option<NumericReading> {
        let config = self.config;
        let reading_cfg = config.reading(kind);
        let Some(reveal) = &reading_cfg.reveal else {
            return self.ocr_attempts(kind, Some(frame));
        };

        let Some(opened) = self.toggle_menu(reveal, true) else {
            self.escalate(
                &format!("Unable to open {} for {} check", reveal.state, kind),
                Some(&frame.shot),
            );
            return None;
        };
        let reading = self.ocr_attempts(kind, Some(&opened));

        if self.toggle_menu(reveal, false).is_none() {
            self.escalate(
                &format!("Unable to close {} after {} check", reveal.state, kind),
                Some(&opened.shot),
            );
        }
        reading
    }

    /// Taps the reveal key until the menu's template is (or is no longer)
    /// on screen. Returns the frame that confirmed it.
    fn toggle_menu(&mut self, reveal: &RevealConfig, open: bool) -> Option<Frame> {
        for attempt in 1..=reveal.max_attempts {
            if self.stop.is_stopped() {
                return None;
            }
            if let Err(e) = self.io.input.tap(&reveal.key) {
                warn!("Failed to tap {}: {}", reveal.key, e);
                return None;
            }
            let jitter = if reveal.jitter_ms > 0 {
                rand::thread_rng().gen_range(0..=reveal.jitter_ms)
            } else {
                0
            };
            if self.stop.wait(Duration::from_millis(reveal.delay_ms + jitter)) {
                return None;
            }

            let frame = match self.acquire_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Capture during menu toggle failed: {}", e);
                    continue;
                }
            };
            let visible = self
                .classifier
                .probe(reveal.state, &frame.shot, frame.window.as_ref())
                .is_some_and(|m| m.matched);
            debug!(
                "{} {} attempt {}: visible={}",
                if open { "Open" } else { "Close" },
                reveal.state,
                attempt,
                visible
            );
            if visible == open {
                return Some(frame);
            }
        }
        None
    }

    /// Runs OCR up to `attempts` times. The first try uses `first` when
    /// given; later tries recapture.
    fn ocr_attempts(&mut self, kind: NumericKind, first: Option<&Frame>) -> Option<NumericReading> {
        let config = self.config;
        let reading_cfg = config.reading(kind);
        let format = reading_cfg.format(kind);
        let mut last: Option<NumericReading> = None;
        let mut last_error = None;

        for attempt in 1..=reading_cfg.attempts {
            let recaptured;
            let frame = match (attempt, first) {
                (1, Some(frame)) => frame,
                _ => match self.acquire_frame() {
                    Ok(frame) => {
                        recaptured = frame;
                        &recaptured
                    }
                    Err(e) => {
                        warn!("Recapture for {} OCR failed: {}", kind, e);
                        continue;
                    }
                },
            };

            let cropped = match extract(&frame.shot.image, &reading_cfg.region, frame.window.as_ref()) {
                Ok(img) => img,
                Err(e) => {
                    warn!("{} region unusable: {}", kind, e);
                    return Some(NumericReading {
                        kind,
                        value: None,
                        raw: String::new(),
                    });
                }
            };

            match ocr::read(&cropped, kind, &format, self.io.ocr.as_ref()) {
                Ok(reading) if reading.is_resolved() => return Some(reading),
                Ok(reading) => {
                    debug!("{} attempt {} unresolved: {:?}", kind, attempt, reading.raw);
                    last = Some(reading);
                }
                Err(e) => {
                    warn!("{} OCR attempt {} failed: {}", kind, attempt, e);
                    last_error = Some(e);
                }
            }
        }

        if last.is_none() {
            if let Some(e) = last_error {
                let shot = first.map(|f| &f.shot);
                self.escalate(&format!("OCR failed for {}: {}", kind, e), shot);
                return None;
            }
        }
        Some(last.unwrap_or(NumericReading {
            kind,
            value: None,
            raw: String::new(),
        }))
    }

    /// Action script, then the reward check.
    fn act(&mut self) {
        self.set_state(MonitorState::Acting);
        match run_script("action", &self.config.actions, self.io.input.as_ref(), &self.stop) {
            Ok(ScriptOutcome::Stopped) => return,
            Ok(ScriptOutcome::Completed) => {}
            Err(e) => warn!("Action script aborted: {}", e),
        }

        let (Some(reward), Some(reward_cfg)) = (&self.reward, &self.config.reward) else {
            return;
        };
        let frame = match self.acquire_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Capture for reward check failed: {}", e);
                return;
            }
        };
        let result = reward.run(&frame.shot, frame.window.as_ref());
        info!(
            "Reward search -> {} ({:.3})",
            if result.matched { "FOUND" } else { "not found" },
            result.confidence
        );
        if !result.matched {
            return;
        }
        self.play_sound(self.config.sounds.reward.as_deref());
        if let Err(e) = run_script("reward", &reward_cfg.script(), self.io.input.as_ref(), &self.stop) {
            warn!("Failed to send reward key presses: {}", e);
        }
    }

    fn play_sound(&self, file: Option<&str>) {
        let Some(file) = file else {
            return;
        };
        let path = self.config.asset(file);
        if let Err(e) = self.io.audio.play(&path) {
            warn!("Sound playback failed: {}", e);
        }
    }

    fn attachment(&self, shot: &Screenshot) -> Option<Vec<u8>> {
        let cfg = &self.config.notification;
        if !cfg.attach_screenshot {
            return None;
        }
        notify::attachment_png(&shot.image, cfg.attachment_region.as_ref())
    }

    /// Sends one error notification for a transient failure, at most once
    /// per cycle.
    fn escalate(&mut self, message: &str, shot: Option<&Screenshot>) {
        error!("{}", message);
        if self.counters.escalated {
            debug!("Already escalated this cycle; not notifying again");
            return;
        }
        self.counters.escalated = true;
        let attachment = shot.and_then(|s| self.attachment(s));
        let n = notify::error(&self.config.notification, message, attachment);
        self.dispatch(&n);
    }

    /// Returns whether the sink accepted the notification.
    fn dispatch(&mut self, notification: &Notification) -> bool {
        match self.io.notifier.send(notification) {
            Ok(()) => {
                self.counters.sent += 1;
                true
            }
            Err(e) => {
                error!("Failed to send notification: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AudioError, InputError, NotifyError, OcrError};
    use crate::monitor::actions::ActionStep;
    use crate::platform::WindowHandle;
    use crate::vision::{Region, Template};
    use image::{GrayImage, ImageBuffer, Rgba, RgbaImage};
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::path::Path;
    use std::rc::Rc;

    // Fixture screens are 64x64 black with 8x8 textured patches marking states.
    const SLOTS: [(GameState, (u32, u32)); 4] = [
        (GameState::InGame, (2, 2)),
        (GameState::Dialog, (40, 40)),
        (GameState::Inventory, (50, 2)),
        (GameState::CharacterMenu, (2, 50)),
    ];

    fn patch(state: GameState) -> RgbaImage {
        let seed = SLOTS.iter().position(|(s, _)| *s == state).unwrap() as u32 + 1;
        ImageBuffer::from_fn(8, 8, move |x, y| {
            let v = ((x * 31 + y * 17 + seed * 101 + x * y * seed) % 251) as u8;
            Rgba([v, 255 - v, v / 2, 255])
        })
    }

    fn screen(states: &[GameState]) -> RgbaImage {
        let mut img: RgbaImage = ImageBuffer::from_pixel(64, 64, Rgba([0, 0, 0, 255]));
        for state in states {
            let (_, at) = SLOTS.iter().find(|(s, _)| s == state).unwrap();
            for (x, y, p) in patch(*state).enumerate_pixels() {
                img.put_pixel(at.0 + x, at.1 + y, *p);
            }
        }
        img
    }

    fn classifier() -> StateClassifier {
        let probes = SLOTS
            .iter()
            .map(|(state, at)| StateProbe {
                state: *state,
                template: Template::from_rgba(state.to_string(), &patch(*state), 0.9),
                search: Some(Region::absolute(at.0 as i32, at.1 as i32, 12, 12)),
            })
            .collect();
        StateClassifier::new(probes, &GameState::DEFAULT_PRIORITY).unwrap()
    }

    fn test_config() -> MonitorConfig {
        let mut config = MonitorConfig::default();
        config.notification.character_name = "Kael".to_string();
        config.window.settle_ms = 0;
        config.cycle.interval_ms = 0;
        config.cycle.read_interval_ms = 0;
        config.retry.backoff_ms = 0;
        config.startup.delay_ms = 0;
        config.startup.retry_delay_ms = 0;
        config.level.region = Region::absolute(20, 2, 16, 8);
        config.level.reveal = None;
        config.level.attempts = 1;
        config.zen.region = Region::absolute(20, 20, 16, 8);
        config.zen.reveal = None;
        config.zen.attempts = 1;
        config.actions = Vec::new();
        config.reward = None;
        config.sounds.start = None;
        config.sounds.reward = None;
        config
    }

    struct FakeWindows;

    impl WindowManager for FakeWindows {
        fn find_window(&self, _title: &str) -> Result<WindowHandle, CaptureError> {
            Ok(WindowHandle(1))
        }
        fn focus(&self, _handle: WindowHandle) -> Result<(), CaptureError> {
            Ok(())
        }
        fn bounds(&self, _handle: WindowHandle) -> Result<WindowRect, CaptureError> {
            Ok(WindowRect { left: 0, top: 0, width: 64, height: 64 })
        }
    }

    /// Serves queued frames (or failures), then repeats `fallback`.
    struct FakeScreen {
        queue: RefCell<VecDeque<Option<RgbaImage>>>,
        fallback: RgbaImage,
        captures: Rc<Cell<u32>>,
        stop_after: Option<(u32, StopSignal)>,
    }

    impl ScreenshotSource for FakeScreen {
        fn capture(&self, _region: Option<&crate::vision::PixelRect>) -> Result<Screenshot, CaptureError> {
            self.captures.set(self.captures.get() + 1);
            if let Some((n, stop)) = &self.stop_after {
                if self.captures.get() >= *n {
                    stop.stop();
                }
            }
            match self.queue.borrow_mut().pop_front() {
                Some(Some(img)) => Ok(Screenshot::new(img)),
                Some(None) => Err(CaptureError::Failed("window not focused".to_string())),
                None => Ok(Screenshot::new(self.fallback.clone())),
            }
        }
    }

    struct FakeOcr {
        texts: RefCell<VecDeque<&'static str>>,
    }

    impl OcrEngine for FakeOcr {
        fn recognize(&self, _img: &GrayImage, _whitelist: Option<&str>) -> Result<String, OcrError> {
            Ok(self.texts.borrow_mut().pop_front().unwrap_or("").to_string())
        }
    }

    #[derive(Clone, Default)]
    struct FakeInput {
        calls: Rc<RefCell<Vec<String>>>,
    }

    impl InputInjector for FakeInput {
        fn move_to(&self, x: i32, y: i32) -> Result<(), InputError> {
            self.calls.borrow_mut().push(format!("move_to {} {}", x, y));
            Ok(())
        }
        fn move_by(&self, dx: i32, dy: i32) -> Result<(), InputError> {
            self.calls.borrow_mut().push(format!("move_by {} {}", dx, dy));
            Ok(())
        }
        fn click(&self) -> Result<(), InputError> {
            self.calls.borrow_mut().push("click".to_string());
            Ok(())
        }
        fn right_click(&self) -> Result<(), InputError> {
            self.calls.borrow_mut().push("right_click".to_string());
            Ok(())
        }
        fn key_down(&self, key: &str) -> Result<(), InputError> {
            self.calls.borrow_mut().push(format!("tap {}", key));
            Ok(())
        }
        fn key_up(&self, _key: &str) -> Result<(), InputError> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct FakeAudio {
        played: Rc<RefCell<Vec<String>>>,
    }

    impl AudioPlayer for FakeAudio {
        fn play(&self, path: &Path) -> Result<(), AudioError> {
            self.played.borrow_mut().push(path.display().to_string());
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct FakeSink {
        sent: Rc<RefCell<Vec<Notification>>>,
        fail_next: Rc<Cell<u32>>,
    }

    impl NotificationSink for FakeSink {
        fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
            if self.fail_next.get() > 0 {
                self.fail_next.set(self.fail_next.get() - 1);
                return Err(NotifyError::Status(502));
            }
            self.sent.borrow_mut().push(notification.clone());
            Ok(())
        }
    }

    struct Harness {
        sink: FakeSink,
        input: FakeInput,
        audio: FakeAudio,
        captures: Rc<Cell<u32>>,
        stop: StopSignal,
    }

    impl Harness {
        fn sent(&self) -> Vec<String> {
            self.sink.sent.borrow().iter().map(|n| n.content.clone()).collect()
        }
    }

    fn build<'a>(
        config: &'a MonitorConfig,
        frames: Vec<Option<RgbaImage>>,
        fallback: RgbaImage,
        texts: Vec<&'static str>,
        stop_after: Option<u32>,
    ) -> (MonitorLoop<'a>, Harness) {
        let stop = StopSignal::new();
        let harness = Harness {
            sink: FakeSink::default(),
            input: FakeInput::default(),
            audio: FakeAudio::default(),
            captures: Rc::new(Cell::new(0)),
            stop: stop.clone(),
        };
        let io = Collaborators {
            windows: Box::new(FakeWindows),
            screen: Box::new(FakeScreen {
                queue: RefCell::new(frames.into()),
                fallback,
                captures: harness.captures.clone(),
                stop_after: stop_after.map(|n| (n, stop.clone())),
            }),
            input: Box::new(harness.input.clone()),
            ocr: Box::new(FakeOcr {
                texts: RefCell::new(texts.into()),
            }),
            audio: Box::new(harness.audio.clone()),
            notifier: Box::new(harness.sink.clone()),
        };
        let monitor = MonitorLoop::new(config, classifier(), None, io, stop);
        (monitor, harness)
    }

    #[test]
    fn test_ingame_readings_notify_level_milestone() {
        let config = test_config();
        let (mut monitor, harness) =
            build(&config, vec![], screen(&[GameState::InGame]), vec!["42", "1,250"], None);
        monitor.tracker_mut().seed(NumericKind::Level, 41);

        let report = monitor.run_cycle();

        assert_eq!(report.classified, Some(GameState::InGame));
        let values: Vec<_> = report.readings.iter().map(|r| (r.kind, r.value)).collect();
        assert_eq!(
            values,
            vec![(NumericKind::Level, Some(42)), (NumericKind::Zen, Some(1250))]
        );
        let sent = harness.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("42"), "{}", sent[0]);
        assert_eq!(monitor.tracker_mut().reference(NumericKind::Level), Some(42));
    }

    #[test]
    fn test_dialog_over_ingame_skips_extraction() {
        let mut config = test_config();
        config.recovery.dialog = vec![ActionStep::Tap { key: "escape".to_string() }];
        config.actions = vec![ActionStep::Click { count: 1, interval_ms: 0 }];
        let (mut monitor, harness) = build(
            &config,
            vec![],
            screen(&[GameState::InGame, GameState::Dialog]),
            vec!["42", "1,250"],
            None,
        );

        let report = monitor.run_cycle();
        assert_eq!(report.classified, Some(GameState::Dialog));
        assert!(report.readings.is_empty());
        assert_eq!(*harness.input.calls.borrow(), vec!["tap escape".to_string()]);
    }

    #[test]
    fn test_three_unknown_cycles_escalate_once_on_third() {
        let config = test_config();
        let (mut monitor, harness) = build(&config, vec![], screen(&[]), vec![], None);

        assert_eq!(monitor.run_cycle().classified, Some(GameState::Unknown));
        assert_eq!(harness.sent().len(), 0);
        monitor.run_cycle();
        assert_eq!(harness.sent().len(), 0);
        let third = monitor.run_cycle();
        assert_eq!(third.notifications, 1);
        assert!(harness.sent()[0].contains("Error for Kael"));

        monitor.run_cycle();
        monitor.run_cycle();
        assert_eq!(harness.sent().len(), 1);
    }

    #[test]
    fn test_unknown_streak_resets_on_known_state() {
        let config = test_config();
        let unknown = Some(screen(&[]));
        let frames = vec![unknown.clone(), unknown.clone(), Some(screen(&[GameState::Dialog])), unknown.clone(), unknown];
        let (mut monitor, harness) = build(&config, frames, screen(&[]), vec![], None);

        for _ in 0..5 {
            monitor.run_cycle();
        }
        assert!(harness.sent().is_empty());
        monitor.run_cycle();
        assert_eq!(harness.sent().len(), 1);
    }

    #[test]
    fn test_capture_recovers_within_retries() {
        let config = test_config();
        let (mut monitor, harness) =
            build(&config, vec![None, None], screen(&[GameState::Dialog]), vec![], None);

        let report = monitor.run_cycle();
        assert_eq!(report.classified, Some(GameState::Dialog));
        assert_eq!(harness.captures.get(), 3);
        assert!(harness.sent().is_empty());
    }

    #[test]
    fn test_capture_exhausted_escalates_once_and_continues() {
        let config = test_config();
        let (mut monitor, harness) = build(
            &config,
            vec![None, None, None, None],
            screen(&[GameState::Dialog]),
            vec![],
            None,
        );

        let report = monitor.run_cycle();
        assert_eq!(report.classified, None);
        assert_eq!(harness.captures.get(), 4);
        let sent = harness.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Screen capture failed after 4 attempts"));

        let next = monitor.run_cycle();
        assert_eq!(next.classified, Some(GameState::Dialog));
        assert_eq!(harness.sent().len(), 1);
    }

    #[test]
    fn test_failed_dispatch_is_retried_next_cycle() {
        let config = test_config();
        let (mut monitor, harness) = build(
            &config,
            vec![],
            screen(&[GameState::InGame]),
            vec!["42", "100", "42", "100", "42", "100"],
            None,
        );
        monitor.tracker_mut().seed(NumericKind::Level, 41);
        harness.sink.fail_next.set(1);

        monitor.run_cycle();
        assert!(harness.sent().is_empty());
        assert_eq!(monitor.tracker_mut().reference(NumericKind::Level), Some(41));

        monitor.run_cycle();
        assert_eq!(harness.sent().len(), 1);

        monitor.run_cycle();
        assert_eq!(harness.sent().len(), 1);
    }

    #[test]
    fn test_failed_health_escalation_is_resent_while_streak_lasts() {
        let config = test_config();
        let (mut monitor, harness) = build(&config, vec![], screen(&[]), vec![], None);

        monitor.run_cycle();
        monitor.run_cycle();
        harness.sink.fail_next.set(1);
        let third = monitor.run_cycle();
        assert_eq!(third.notifications, 0);
        assert!(harness.sent().is_empty());

        let fourth = monitor.run_cycle();
        assert_eq!(fourth.notifications, 1);
        let sent = harness.sent();
        assert!(sent[0].contains("Game state unknown for 4 consecutive cycles"), "{}", sent[0]);

        for _ in 0..5 {
            monitor.run_cycle();
        }
        assert_eq!(harness.sent().len(), 1);
    }

    #[test]
    fn test_failed_unresolved_escalation_is_resent() {
        let config = test_config();
        let texts = vec!["?", "500", "?", "500", "?", "500", "?", "500", "?", "500"];
        let (mut monitor, harness) = build(&config, vec![], screen(&[GameState::InGame]), texts, None);

        monitor.run_cycle();
        monitor.run_cycle();
        harness.sink.fail_next.set(1);
        monitor.run_cycle();
        assert!(harness.sent().is_empty());

        monitor.run_cycle();
        let sent = harness.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Unable to read level for 4 consecutive checks"), "{}", sent[0]);
        monitor.run_cycle();
        assert_eq!(harness.sent().len(), 1);
    }

    #[test]
    fn test_stop_during_focus_settle_skips_capture() {
        let mut config = test_config();
        config.window.title = "Game".to_string();
        config.window.focus_each_cycle = true;
        let (mut monitor, harness) = build(&config, vec![], screen(&[GameState::InGame]), vec![], None);
        harness.stop.stop();

        let report = monitor.run_cycle();

        assert_eq!(report.classified, None);
        assert_eq!(harness.captures.get(), 0);
        assert!(harness.sent().is_empty());
    }

    #[test]
    fn test_unresolved_streak_escalates_per_kind() {
        let config = test_config();
        let texts = vec!["??", "500", "", "500", "abc", "500", "", "500"];
        let (mut monitor, harness) = build(&config, vec![], screen(&[GameState::InGame]), texts, None);

        for _ in 0..2 {
            let report = monitor.run_cycle();
            assert!(!report.readings[0].is_resolved());
            assert!(report.readings[1].is_resolved());
        }
        assert!(harness.sent().is_empty());
        monitor.run_cycle();
        let sent = harness.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Unable to read level"));
        monitor.run_cycle();
        assert_eq!(harness.sent().len(), 1);
    }

    #[test]
    fn test_reveal_opens_reads_and_closes_menu() {
        let mut config = test_config();
        config.level.reveal = Some(RevealConfig {
            key: "c".to_string(),
            state: GameState::CharacterMenu,
            max_attempts: 3,
            delay_ms: 0,
            jitter_ms: 0,
        });
        let ingame = screen(&[GameState::InGame]);
        let menu = screen(&[GameState::InGame, GameState::CharacterMenu]);
        let frames = vec![
            Some(ingame.clone()),
            Some(ingame.clone()), // first tap didn't open it
            Some(menu.clone()),
            Some(ingame.clone()), // closed
        ];
        let (mut monitor, harness) = build(&config, frames, ingame, vec!["Level: 7/400", "1,000"], None);

        let report = monitor.run_cycle();
        assert_eq!(report.readings[0].value, Some(7));
        assert_eq!(report.readings[1].value, Some(1000));
        assert_eq!(
            *harness.input.calls.borrow(),
            vec!["tap c".to_string(), "tap c".to_string(), "tap c".to_string()]
        );
        assert!(harness.sent().is_empty());
    }

    #[test]
    fn test_reveal_failure_escalates_and_skips_reading() {
        let mut config = test_config();
        config.zen.reveal = Some(RevealConfig {
            key: "i".to_string(),
            state: GameState::Inventory,
            max_attempts: 2,
            delay_ms: 0,
            jitter_ms: 0,
        });
        let (mut monitor, harness) =
            build(&config, vec![], screen(&[GameState::InGame]), vec!["10", "999"], None);

        let report = monitor.run_cycle();
        assert_eq!(report.readings.len(), 1);
        assert_eq!(report.readings[0].kind, NumericKind::Level);
        let sent = harness.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Unable to open Inventory for zen check"));
    }

    #[test]
    fn test_startup_plays_sound_when_in_game() {
        let mut config = test_config();
        config.sounds.start = Some("start.mp3".to_string());
        let frames = vec![Some(screen(&[])), Some(screen(&[GameState::InGame]))];
        let (mut monitor, harness) = build(&config, frames, screen(&[]), vec![], None);

        assert!(monitor.startup());
        assert_eq!(harness.captures.get(), 2);
        assert_eq!(harness.audio.played.borrow().len(), 1);
        assert!(harness.audio.played.borrow()[0].ends_with("start.mp3"));
    }

    #[test]
    fn test_startup_failure_notifies_once() {
        let mut config = test_config();
        config.startup.max_attempts = 3;
        let (mut monitor, harness) = build(&config, vec![], screen(&[]), vec![], None);

        assert!(!monitor.startup());
        assert_eq!(harness.captures.get(), 3);
        assert_eq!(harness.sent().len(), 1);
    }

    #[test]
    fn test_reward_found_plays_sound_and_presses_key() {
        let mut config = test_config();
        config.sounds.reward = Some("reward.mp3".to_string());
        config.reward = Some(crate::monitor::config::RewardConfig {
            repeat: 2,
            interval_ms: 0,
            ..Default::default()
        });
        let stop = StopSignal::new();
        let input = FakeInput::default();
        let audio = FakeAudio::default();
        let sink = FakeSink::default();
        let reward_probe = StateProbe {
            state: GameState::InGame,
            template: Template::from_rgba("reward", &patch(GameState::Dialog), 0.9),
            search: None,
        };
        let io = Collaborators {
            windows: Box::new(FakeWindows),
            screen: Box::new(FakeScreen {
                queue: RefCell::new(VecDeque::from(vec![Some(screen(&[GameState::InGame]))])),
                fallback: screen(&[GameState::InGame, GameState::Dialog]),
                captures: Rc::new(Cell::new(0)),
                stop_after: None,
            }),
            input: Box::new(input.clone()),
            ocr: Box::new(FakeOcr { texts: RefCell::new(VecDeque::from(vec!["5", "5"])) }),
            audio: Box::new(audio.clone()),
            notifier: Box::new(sink.clone()),
        };
        let mut monitor = MonitorLoop::new(&config, classifier(), Some(reward_probe), io, stop);

        monitor.run_cycle();
        assert_eq!(audio.played.borrow().len(), 1);
        assert_eq!(
            *input.calls.borrow(),
            vec!["tap space".to_string(), "tap space".to_string()]
        );
    }

    #[test]
    fn test_run_stops_on_signal() {
        let config = test_config();
        let (mut monitor, harness) = build(&config, vec![], screen(&[GameState::Dialog]), vec![], Some(4));

        monitor.run();
        assert_eq!(*monitor.state(), MonitorState::Stopped);
        assert!(harness.stop.is_stopped());
        assert!(harness.captures.get() >= 4);
    }
}
