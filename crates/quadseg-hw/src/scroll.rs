//! Scrolling text.
//!
//! A session slides a 4-character window across the text padded with one
//! display width of blanks on each side, so the text fully enters and
//! leaves the panel.
//!
//! ```text
//! step 0: "    "
//! step 1: "   H"
//! step 4: "HELL"
//! step 5: "ELLO"
//! step 8: "O   "
//! step 9: "    "
//! ```

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::debug;

use crate::bus::Bus;
use crate::display::Display;
use crate::{Result, DISPLAY_WIDTH};

/// Default delay between scroll steps.
pub const DEFAULT_SCROLL_INTERVAL: Duration = Duration::from_millis(500);

/// Shortest accepted step interval.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Fixed-rate ticker shared by every display animation.
///
/// The first tick completes one `period` from now. Periods below
/// [`MIN_INTERVAL`] are raised to it, and late ticks are skipped rather than
/// replayed in a burst.
pub fn step_timer(period: Duration) -> Interval {
    let period = period.max(MIN_INTERVAL);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Outcome of one scroll tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrollTick {
    /// Write this window to the panel.
    Frame {
        text: String,
        dots: [bool; DISPLAY_WIDTH],
    },
    /// The pass completed and the session starts over; nothing is written.
    Rewound,
    /// The session is over.
    Finished,
}

/// Step-indexed scrolling state for one piece of text.
#[derive(Debug, Clone)]
pub struct ScrollSession {
    text: String,
    padded: Vec<char>,
    padded_dots: Vec<bool>,
    interval: Duration,
    stop: bool,
    step: usize,
    total_steps: usize,
    finished: bool,
}

impl ScrollSession {
    /// Creates a session.
    ///
    /// `dots` is aligned with the characters of `text`; missing entries are
    /// off and entries past the end of the text are ignored. With `stop`
    /// set the session ends after one pass, otherwise it loops forever.
    pub fn new(text: &str, interval: Duration, dots: &[bool], stop: bool) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();

        let blank = std::iter::repeat(' ').take(DISPLAY_WIDTH);
        let padded = blank.clone().chain(chars).chain(blank).collect();

        let off = std::iter::repeat(false).take(DISPLAY_WIDTH);
        let aligned = (0..len).map(|i| dots.get(i).copied().unwrap_or(false));
        let padded_dots = off.clone().chain(aligned).chain(off).collect();

        Self {
            text: text.to_string(),
            padded,
            padded_dots,
            interval: interval.max(MIN_INTERVAL),
            stop,
            step: 0,
            total_steps: DISPLAY_WIDTH + len,
            finished: false,
        }
    }

    /// Computes the next tick and advances the step index.
    pub fn advance(&mut self) -> ScrollTick {
        if self.finished {
            return ScrollTick::Finished;
        }
        if self.step > self.total_steps {
            if self.stop {
                self.finished = true;
                return ScrollTick::Finished;
            }
            self.step = 0;
            return ScrollTick::Rewound;
        }

        let window = self.step..self.step + DISPLAY_WIDTH;
        let text = self.padded[window.clone()].iter().collect();
        let mut dots = [false; DISPLAY_WIDTH];
        dots.copy_from_slice(&self.padded_dots[window]);
        self.step += 1;

        ScrollTick::Frame { text, dots }
    }

    /// Drives the session on a fixed-rate timer until it finishes.
    ///
    /// The first step is written one interval after the call. A looping
    /// session only returns on a bus error.
    pub async fn run<B: Bus>(mut self, display: &mut Display<B>) -> Result<()> {
        debug!(
            "Scrolling {:?} every {:?} ({} steps)",
            self.text, self.interval, self.total_steps
        );
        let mut ticker = step_timer(self.interval);

        loop {
            ticker.tick().await;
            match self.advance() {
                ScrollTick::Frame { text, dots } => display.write_text(&text, &dots)?,
                ScrollTick::Rewound => debug!("Scroll of {:?} rewound", self.text),
                ScrollTick::Finished => {
                    debug!("Scroll of {:?} finished", self.text);
                    return Ok(());
                }
            }
        }
    }

    /// Returns the text being scrolled.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the step interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the index of the next step.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Returns the index of the last step in one pass.
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Returns true if the session stops after one pass.
    pub fn stops(&self) -> bool {
        self.stop
    }

    /// Returns true once a stopping session has completed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::RecordingBus;
    use crate::frame::Frame;
    use std::collections::HashSet;

    fn frames(session: &mut ScrollSession) -> Vec<(String, [bool; DISPLAY_WIDTH])> {
        let mut out = Vec::new();
        while let ScrollTick::Frame { text, dots } = session.advance() {
            out.push((text, dots));
        }
        out
    }

    #[test]
    fn test_hello_pass() {
        let mut session = ScrollSession::new("HELLO", DEFAULT_SCROLL_INTERVAL, &[], true);
        assert_eq!(session.total_steps(), 9);

        let texts: Vec<String> = frames(&mut session).into_iter().map(|f| f.0).collect();
        assert_eq!(
            texts,
            vec!["    ", "   H", "  HE", " HEL", "HELL", "ELLO", "LLO ", "LO  ", "O   ", "    "]
        );
        assert_eq!(session.advance(), ScrollTick::Finished);
        assert!(session.is_finished());
    }

    #[test]
    fn test_distinct_frames_per_pass() {
        for text in ["A", "HI", "WORLD", "ABCDEFGHIJ"] {
            let mut session = ScrollSession::new(text, DEFAULT_SCROLL_INTERVAL, &[], true);
            let pass = frames(&mut session);
            let distinct: HashSet<_> = pass.iter().collect();
            assert_eq!(pass.len(), 5 + text.len(), "{:?}", text);
            assert_eq!(distinct.len(), 4 + text.len(), "{:?}", text);
            assert_eq!(pass.first().map(|f| f.0.as_str()), Some("    "));
            assert_eq!(pass.last().map(|f| f.0.as_str()), Some("    "));
        }
    }

    #[test]
    fn test_empty_text_is_four_blank_steps() {
        let mut session = ScrollSession::new("", DEFAULT_SCROLL_INTERVAL, &[], true);
        assert_eq!(session.total_steps(), 4);
        let pass = frames(&mut session);
        assert_eq!(pass.len(), 5);
        assert!(pass.iter().all(|(text, dots)| text == "    " && dots == &[false; 4]));
    }

    #[test]
    fn test_looping_session_rewinds() {
        let mut session = ScrollSession::new("AB", DEFAULT_SCROLL_INTERVAL, &[], false);
        let first = frames(&mut session);
        assert_eq!(first.len(), 7);
        // The tick that ended the pass was the rewind; the next starts over.
        assert_eq!(session.step(), 0);
        assert_eq!(frames(&mut session), first);
    }

    #[test]
    fn test_dots_travel_with_text() {
        let mut session =
            ScrollSession::new("1.5", DEFAULT_SCROLL_INTERVAL, &[true, false], true);
        let pass = frames(&mut session);
        assert_eq!(pass[1], ("   1".to_string(), [false, false, false, true]));
        assert_eq!(pass[2], ("  1.".to_string(), [false, false, true, false]));
        assert_eq!(pass[4], ("1.5 ".to_string(), [true, false, false, false]));
        assert_eq!(pass[5], (".5  ".to_string(), [false, false, false, false]));
    }

    #[test]
    fn test_zero_interval_is_raised() {
        let session = ScrollSession::new("X", Duration::ZERO, &[], true);
        assert_eq!(session.interval(), MIN_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_timer_raises_zero_period() {
        let started = Instant::now();
        let mut ticker = step_timer(Duration::ZERO);
        ticker.tick().await;
        ticker.tick().await;
        assert_eq!(ticker.period(), MIN_INTERVAL);
        assert_eq!(started.elapsed(), MIN_INTERVAL * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_timer_skips_missed_ticks() {
        let started = Instant::now();
        let mut ticker = step_timer(Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(350)).await;
        // The overdue tick fires at once, then the schedule resumes on the grid.
        ticker.tick().await;
        assert_eq!(started.elapsed(), Duration::from_millis(350));
        ticker.tick().await;
        assert_eq!(started.elapsed(), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_writes_one_pass() {
        let bus = RecordingBus::new();
        let mut display = Display::new(bus.clone(), crate::DEFAULT_ADDRESS);
        let session = ScrollSession::new("HI", Duration::from_millis(100), &[], true);

        let started = Instant::now();
        session.run(&mut display).await.unwrap();

        let written = bus.frames();
        assert_eq!(written.len(), 7);
        assert_eq!(written[3], Frame::encode(" HI ", &[]));
        assert!(written.first().is_some_and(Frame::is_blank));
        assert!(written.last().is_some_and(Frame::is_blank));
        // Seven frames plus the tick that observed the end of the pass.
        assert_eq!(started.elapsed(), Duration::from_millis(800));
    }
}
