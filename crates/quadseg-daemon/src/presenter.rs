//! Presentation orchestration.
//!
//! Every display intent goes through one [`Stage`] behind a mutex. The stage
//! holds at most one running animation, so two timers can never write the
//! panel at the same time. Each animation is tagged with the epoch it was
//! armed in; a timer that wakes after being superseded finds a newer epoch
//! and exits without writing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate};
use quadseg_hw::scroll::{step_timer, DEFAULT_SCROLL_INTERVAL, MIN_INTERVAL};
use quadseg_hw::{BlinkRate, Bus, DigitalPin, Display, ScrollSession, ScrollTick};
use serde::Serialize;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::tally::{DailyLog, Event, Tally};

/// Decimal points for an instantaneous count: slot 3 only.
const COUNT_DOTS: [bool; 4] = [false, false, false, true];

/// Animation timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Quiet period after an event before the running total is shown.
    pub debounce: Duration,
    /// Period of the total/unique alternation.
    pub alternation: Duration,
    /// Default scroll step interval.
    pub scroll: Duration,
}

impl Timing {
    /// Periodic timings below one millisecond are raised to it. A zero
    /// debounce is allowed and shows the total on the next timer turn.
    pub fn new(debounce: Duration, alternation: Duration, scroll: Duration) -> Self {
        Self {
            debounce,
            alternation: alternation.max(MIN_INTERVAL),
            scroll: scroll.max(MIN_INTERVAL),
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(500),
            Duration::from_millis(1500),
            DEFAULT_SCROLL_INTERVAL,
        )
    }
}

/// Result of counting one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventOutcome {
    /// Times this participant has been seen, including this event.
    pub seen: u32,
    pub total: u64,
    pub unique: usize,
}

/// Which animation currently owns the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationKind {
    Idle,
    Debouncing,
    Alternating,
    Scrolling,
}

/// Snapshot of the stage for status queries.
#[derive(Debug, Clone, Serialize)]
pub struct StageStatus {
    /// Best-effort text of the last frame written.
    pub text: String,
    pub brightness: Option<u8>,
    pub blink: String,
    pub animation: AnimationKind,
    pub total: u64,
    pub unique: usize,
}

/// Handle to a spawned timer task.
struct Timer(AbortHandle);

impl Timer {
    /// Stops the task. Stopping a finished or already stopped task does nothing.
    fn cancel(self) {
        self.0.abort();
    }
}

/// The single active animation.
enum Animation {
    Idle,
    Debouncing(Timer),
    Alternating(Timer),
    Scrolling(Timer),
}

impl Animation {
    fn kind(&self) -> AnimationKind {
        match self {
            Animation::Idle => AnimationKind::Idle,
            Animation::Debouncing(_) => AnimationKind::Debouncing,
            Animation::Alternating(_) => AnimationKind::Alternating,
            Animation::Scrolling(_) => AnimationKind::Scrolling,
        }
    }

    fn cancel(&mut self) {
        match std::mem::replace(self, Animation::Idle) {
            Animation::Idle => {}
            Animation::Debouncing(timer)
            | Animation::Alternating(timer)
            | Animation::Scrolling(timer) => timer.cancel(),
        }
    }

    /// Hands a fired debounce timer over to the alternation.
    fn promote(&mut self) {
        if let Animation::Debouncing(timer) = std::mem::replace(self, Animation::Idle) {
            *self = Animation::Alternating(timer);
        }
    }
}

struct Stage<B: Bus> {
    display: Display<B>,
    tally: Tally,
    animation: Animation,
    epoch: u64,
}

impl<B: Bus> Stage<B> {
    /// Cancels the running animation and opens a new epoch.
    fn supersede(&mut self) -> u64 {
        if self.animation.kind() != AnimationKind::Idle {
            debug!("Cancelling {:?} animation", self.animation.kind());
        }
        self.animation.cancel();
        self.epoch = self.epoch.wrapping_add(1);
        self.epoch
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch
    }

    /// Ends the animation of `epoch` without aborting the calling task.
    fn finish(&mut self, epoch: u64) {
        if self.is_current(epoch) {
            self.animation = Animation::Idle;
        }
    }
}

/// Board LED flashed on every event.
#[derive(Clone)]
struct ActivityLed {
    pin: DigitalPin,
    flash: Duration,
}

impl ActivityLed {
    fn flash(&self) {
        if let Err(e) = self.pin.set(true) {
            warn!("Failed to light activity LED: {}", e);
            return;
        }
        let pin = self.pin.clone();
        let flash = self.flash;
        tokio::spawn(async move {
            tokio::time::sleep(flash).await;
            if let Err(e) = pin.set(false) {
                warn!("Failed to turn off activity LED: {}", e);
            }
        });
    }
}

fn lock<B: Bus>(stage: &Mutex<Stage<B>>) -> MutexGuard<'_, Stage<B>> {
    stage.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resolves event counts, totals, scrolls and static text into one frame
/// stream for a single display.
///
/// Timer-driven methods spawn tokio tasks and must be called from within a
/// runtime.
pub struct Presenter<B: Bus + 'static> {
    stage: Arc<Mutex<Stage<B>>>,
    timing: Timing,
    activity: Option<ActivityLed>,
}

impl<B: Bus + 'static> Clone for Presenter<B> {
    fn clone(&self) -> Self {
        Self {
            stage: Arc::clone(&self.stage),
            timing: self.timing,
            activity: self.activity.clone(),
        }
    }
}

impl<B: Bus + 'static> Presenter<B> {
    /// Takes ownership of an initialized display.
    pub fn new(display: Display<B>, timing: Timing) -> Self {
        Self {
            stage: Arc::new(Mutex::new(Stage {
                display,
                tally: Tally::default(),
                animation: Animation::Idle,
                epoch: 0,
            })),
            timing,
            activity: None,
        }
    }

    /// Flashes `pin` for `flash` on every recorded event.
    pub fn with_activity_led(mut self, pin: DigitalPin, flash: Duration) -> Self {
        info!("Activity LED on pin {} ({:?} flash)", pin.pin(), flash);
        self.activity = Some(ActivityLed { pin, flash });
        self
    }

    /// Counts an event and shows the participant's count with a decimal point.
    ///
    /// Any animation is cancelled first and the debounce towards the running
    /// total is re-armed, all before another intent can touch the display.
    /// A failed immediate write is returned after the debounce is armed, so
    /// the panel still settles on the total.
    pub fn record_event(&self, event: &Event) -> quadseg_hw::Result<EventOutcome> {
        let mut stage = lock(&self.stage);

        let seen = stage.tally.record(&event.participant_id);
        let outcome = EventOutcome {
            seen,
            total: stage.tally.total(),
            unique: stage.tally.unique(),
        };
        debug!(
            "Event from {} at {:?}: seen {}, total {}, unique {}",
            event.participant_id, event.timestamp, seen, outcome.total, outcome.unique
        );

        let epoch = stage.supersede();
        let written = stage
            .display
            .write_text(&format!("{:>4}", seen), &COUNT_DOTS);
        if let Some(led) = &self.activity {
            led.flash();
        }

        let task = tokio::spawn(settle(Arc::clone(&self.stage), epoch, self.timing));
        stage.animation = Animation::Debouncing(Timer(task.abort_handle()));

        written.map(|()| outcome)
    }

    /// Shows up to four characters until something else takes over.
    pub fn show_text(&self, text: &str, dots: &[bool]) -> quadseg_hw::Result<()> {
        let mut stage = lock(&self.stage);
        stage.supersede();
        stage.display.write_text(text, dots)
    }

    /// Starts scrolling `text`, replacing any running animation.
    ///
    /// The first step is written one interval from now. Without `stop` the
    /// text loops until superseded.
    pub fn scroll(&self, text: &str, interval: Option<Duration>, dots: &[bool], stop: bool) {
        let session = ScrollSession::new(text, interval.unwrap_or(self.timing.scroll), dots, stop);
        let mut stage = lock(&self.stage);
        let epoch = stage.supersede();
        debug!(
            "Scrolling {:?} every {:?} (stop: {})",
            session.text(),
            session.interval(),
            stop
        );
        let task = tokio::spawn(scroll(Arc::clone(&self.stage), epoch, session));
        stage.animation = Animation::Scrolling(Timer(task.abort_handle()));
    }

    /// Cancels any animation and blanks the panel.
    pub fn clear(&self) -> quadseg_hw::Result<()> {
        let mut stage = lock(&self.stage);
        stage.supersede();
        stage.display.clear()
    }

    /// Sets the brightness (clamped to 0-15) and returns the level in effect.
    pub fn set_brightness(&self, level: i32) -> quadseg_hw::Result<u8> {
        let mut stage = lock(&self.stage);
        stage.display.set_brightness(level)?;
        Ok(stage.display.brightness().unwrap_or_default())
    }

    pub fn set_blink_rate(&self, rate: BlinkRate) -> quadseg_hw::Result<()> {
        lock(&self.stage).display.set_blink_rate(rate)
    }

    /// Closes the day: cancels any animation, takes the counters and blanks
    /// the panel.
    ///
    /// A failed clear is logged; the closed counters are returned regardless.
    pub fn rollover(&self, day: NaiveDate, at: DateTime<Local>) -> DailyLog {
        let mut stage = lock(&self.stage);
        stage.supersede();
        let log = stage.tally.take(day, at);
        if let Err(e) = stage.display.clear() {
            warn!("Failed to clear display at rollover: {}", e);
        }
        info!(
            "Closed {}: {} events from {} participants",
            day, log.total_posts, log.total_users
        );
        log
    }

    /// Returns a snapshot of the stage.
    pub fn status(&self) -> StageStatus {
        let stage = lock(&self.stage);
        StageStatus {
            text: stage.display.frame().render_text(),
            brightness: stage.display.brightness(),
            blink: stage.display.blink_rate().to_string(),
            animation: stage.animation.kind(),
            total: stage.tally.total(),
            unique: stage.tally.unique(),
        }
    }

    /// Returns the animation that currently owns the panel.
    pub fn animation_kind(&self) -> AnimationKind {
        lock(&self.stage).animation.kind()
    }

    /// Cancels any animation and blanks the panel.
    pub fn shutdown(&self) -> quadseg_hw::Result<()> {
        let mut stage = lock(&self.stage);
        stage.supersede();
        stage.display.shutdown()
    }
}

/// Waits out the debounce, shows the total, then alternates between the
/// total and the unique count.
async fn settle<B: Bus>(stage: Arc<Mutex<Stage<B>>>, epoch: u64, timing: Timing) {
    tokio::time::sleep(timing.debounce).await;
    {
        let mut guard = lock(&stage);
        if !guard.is_current(epoch) {
            return;
        }
        let total = guard.tally.total();
        if let Err(e) = guard.display.write_text(&format!("{:>4}", total), &[]) {
            warn!("Failed to show running total: {}", e);
            guard.finish(epoch);
            return;
        }
        guard.animation.promote();
    }

    let mut ticker = step_timer(timing.alternation);
    let mut showing_total = true;

    loop {
        ticker.tick().await;
        let mut guard = lock(&stage);
        if !guard.is_current(epoch) {
            return;
        }
        let text = if showing_total {
            format!("{:>4}", guard.tally.total())
        } else {
            format!("U{:>3}", guard.tally.unique())
        };
        if let Err(e) = guard.display.write_text(&text, &[]) {
            warn!("Alternation stopped: {}", e);
            guard.finish(epoch);
            return;
        }
        showing_total = !showing_total;
    }
}

/// Drives a scroll session against the shared stage.
async fn scroll<B: Bus>(stage: Arc<Mutex<Stage<B>>>, epoch: u64, mut session: ScrollSession) {
    let mut ticker = step_timer(session.interval());

    loop {
        ticker.tick().await;
        let mut guard = lock(&stage);
        if !guard.is_current(epoch) {
            return;
        }
        match session.advance() {
            ScrollTick::Frame { text, dots } => {
                if let Err(e) = guard.display.write_text(&text, &dots) {
                    warn!("Scroll of {:?} stopped: {}", session.text(), e);
                    guard.finish(epoch);
                    return;
                }
            }
            ScrollTick::Rewound => debug!("Scroll of {:?} rewound", session.text()),
            ScrollTick::Finished => {
                debug!("Scroll of {:?} finished", session.text());
                guard.finish(epoch);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadseg_hw::firmata::{build_digital_pin_value, build_i2c_config, build_pin_mode};
    use quadseg_hw::firmata::{build_i2c_write, PIN_MODE_OUTPUT};
    use quadseg_hw::protocol::build_frame_packet;
    use quadseg_hw::{FirmataBus, Frame, RecordingBus, DEFAULT_ADDRESS};
    use tokio::io::AsyncReadExt;
    use tokio::time::{sleep, Instant};

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn presenter() -> (Presenter<RecordingBus>, RecordingBus) {
        let bus = RecordingBus::new();
        let display = Display::new(bus.clone(), DEFAULT_ADDRESS);
        (Presenter::new(display, Timing::default()), bus)
    }

    fn count(seen: &str) -> Frame {
        Frame::encode(seen, &COUNT_DOTS)
    }

    fn plain(text: &str) -> Frame {
        Frame::encode(text, &[])
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_then_total_after_quiet_period() {
        let (presenter, bus) = presenter();

        let outcome = presenter.record_event(&Event::new("U1")).unwrap();
        assert_eq!(
            outcome,
            EventOutcome {
                seen: 1,
                total: 1,
                unique: 1
            }
        );
        assert_eq!(bus.frames(), vec![count("   1")]);
        assert_eq!(presenter.animation_kind(), AnimationKind::Debouncing);

        sleep(ms(510)).await;
        assert_eq!(bus.frames(), vec![count("   1"), plain("   1")]);
        assert_eq!(presenter.animation_kind(), AnimationKind::Alternating);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_inside_window_restarts_debounce() {
        let (presenter, bus) = presenter();

        presenter.record_event(&Event::new("U1")).unwrap();
        sleep(ms(200)).await;
        presenter.record_event(&Event::new("U1")).unwrap();
        assert_eq!(bus.last_frame(), Some(count("   2")));

        // The first debounce would have fired at 500ms.
        sleep(ms(400)).await;
        assert_eq!(bus.frames(), vec![count("   1"), count("   2")]);

        sleep(ms(110)).await;
        assert_eq!(bus.last_frame(), Some(plain("   2")));
        assert_eq!(bus.frames().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_alternates_total_and_unique() {
        let (presenter, bus) = presenter();
        presenter.record_event(&Event::new("U1")).unwrap();
        presenter.record_event(&Event::new("U2")).unwrap();
        presenter.record_event(&Event::new("U1")).unwrap();
        assert_eq!(bus.last_frame(), Some(count("   2")));

        sleep(ms(510)).await;
        assert_eq!(bus.last_frame(), Some(plain("   3")));

        // First alternation tick at 2000ms shows the total again.
        sleep(ms(1500)).await;
        assert_eq!(bus.last_frame(), Some(plain("   3")));

        sleep(ms(1500)).await;
        assert_eq!(bus.last_frame(), Some(plain("U  2")));

        sleep(ms(1500)).await;
        assert_eq!(bus.last_frame(), Some(plain("   3")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_interrupts_alternation() {
        let (presenter, bus) = presenter();
        presenter.record_event(&Event::new("A")).unwrap();
        sleep(ms(2100)).await;
        assert_eq!(presenter.animation_kind(), AnimationKind::Alternating);

        bus.clear();
        presenter.record_event(&Event::new("B")).unwrap();
        assert_eq!(bus.frames(), vec![count("   1")]);
        assert_eq!(presenter.animation_kind(), AnimationKind::Debouncing);

        // No alternation tick from the old cycle lands before the new total.
        sleep(ms(1490)).await;
        assert_eq!(
            bus.frames(),
            vec![count("   1"), plain("   2")],
            "stale alternation wrote after being cancelled"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_scroll_replaces_first() {
        let (presenter, bus) = presenter();
        presenter.scroll("AAAA", Some(ms(100)), &[], false);
        presenter.scroll("BB", Some(ms(100)), &[], true);

        sleep(ms(350)).await;
        assert_eq!(
            bus.frames(),
            vec![plain("    "), plain("   B"), plain("  BB")]
        );
        assert_eq!(presenter.animation_kind(), AnimationKind::Scrolling);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_scroll_goes_idle() {
        let (presenter, bus) = presenter();
        presenter.scroll("HI", Some(ms(100)), &[], true);

        sleep(ms(850)).await;
        assert_eq!(bus.frames().len(), 7);
        assert_eq!(presenter.animation_kind(), AnimationKind::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_cancels_scroll() {
        let (presenter, bus) = presenter();
        presenter.scroll("LONG TEXT", Some(ms(100)), &[], false);
        sleep(ms(250)).await;

        presenter.record_event(&Event::new("U7")).unwrap();
        sleep(ms(400)).await;
        assert_eq!(bus.last_frame(), Some(count("   1")));
        assert_eq!(bus.frames().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_show_text_and_clear_cancel_timers() {
        let (presenter, bus) = presenter();
        presenter.record_event(&Event::new("U1")).unwrap();
        presenter.show_text("HOLD", &[]).unwrap();
        assert_eq!(presenter.animation_kind(), AnimationKind::Idle);

        sleep(ms(3000)).await;
        assert_eq!(bus.last_frame(), Some(plain("HOLD")));

        presenter.scroll("X", Some(ms(100)), &[], false);
        presenter.clear().unwrap();
        sleep(ms(1000)).await;
        assert_eq!(bus.last_frame(), Some(Frame::blank()));
        assert_eq!(bus.frames().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollover_resets_counters_and_clears() {
        let (presenter, bus) = presenter();
        presenter.record_event(&Event::new("U1")).unwrap();
        presenter.record_event(&Event::new("U2")).unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let log = presenter.rollover(day, Local::now());
        assert_eq!(log.total_posts, 2);
        assert_eq!(log.total_users, 2);
        assert_eq!(bus.last_frame(), Some(Frame::blank()));

        sleep(ms(1000)).await;
        assert_eq!(bus.last_frame(), Some(Frame::blank()));
        let status = presenter.status();
        assert_eq!(status.total, 0);
        assert_eq!(status.animation, AnimationKind::Idle);

        let outcome = presenter.record_event(&Event::new("U1")).unwrap();
        assert_eq!(outcome.seen, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_configuration_leaves_animation_running() {
        let (presenter, _bus) = presenter();
        presenter.record_event(&Event::new("U1")).unwrap();
        assert_eq!(presenter.set_brightness(99).unwrap(), 15);
        presenter.set_blink_rate(BlinkRate::OneHz).unwrap();
        assert_eq!(presenter.animation_kind(), AnimationKind::Debouncing);

        let status = presenter.status();
        assert_eq!(status.brightness, Some(15));
        assert_eq!(status.blink, "1hz");
        assert_eq!(status.text, "   1.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_immediate_write_still_settles() {
        let (presenter, bus) = presenter();
        bus.set_failing(true);
        assert!(presenter.record_event(&Event::new("U1")).is_err());
        assert_eq!(presenter.status().total, 1);

        bus.set_failing(false);
        sleep(ms(510)).await;
        assert_eq!(bus.last_frame(), Some(plain("   1")));
    }

    #[test]
    fn test_timing_raises_zero_periods() {
        let timing = Timing::new(Duration::ZERO, Duration::ZERO, Duration::ZERO);
        assert_eq!(timing.debounce, Duration::ZERO);
        assert_eq!(timing.alternation, MIN_INTERVAL);
        assert_eq!(timing.scroll, MIN_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timing_keeps_alternating() {
        let bus = RecordingBus::new();
        let display = Display::new(bus.clone(), DEFAULT_ADDRESS);
        let timing = Timing::new(Duration::ZERO, Duration::ZERO, Duration::ZERO);
        let presenter = Presenter::new(display, timing);

        presenter.record_event(&Event::new("U1")).unwrap();
        sleep(ms(10)).await;
        assert_eq!(presenter.animation_kind(), AnimationKind::Alternating);
        assert!(bus.frames().len() > 5);
        assert!(bus.frames().contains(&plain("U  1")));

        // The default scroll step was raised too.
        presenter.scroll("AB", None, &[], true);
        sleep(ms(20)).await;
        assert_eq!(presenter.animation_kind(), AnimationKind::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_flashes_activity_led() {
        let (near, mut far) = tokio::io::duplex(1024);
        let bus = FirmataBus::from_writer(near, "duplex");
        let led = bus.digital_output(13).unwrap();
        let display = Display::new(bus, DEFAULT_ADDRESS);
        let presenter = Presenter::new(display, Timing::default()).with_activity_led(led, ms(250));

        let started = Instant::now();
        presenter.record_event(&Event::new("U1")).unwrap();

        let mut expected = build_i2c_config(0).to_vec();
        expected.extend(build_pin_mode(13, PIN_MODE_OUTPUT));
        let packet = build_frame_packet(&count("   1"));
        expected.extend(build_i2c_write(DEFAULT_ADDRESS, &packet));
        expected.extend(build_digital_pin_value(13, true));
        let mut received = vec![0u8; expected.len()];
        far.read_exact(&mut received).await.unwrap();
        assert_eq!(received, expected);

        let mut off = [0u8; 3];
        far.read_exact(&mut off).await.unwrap();
        assert_eq!(off, build_digital_pin_value(13, false));
        assert_eq!(started.elapsed(), ms(250));
    }
}
