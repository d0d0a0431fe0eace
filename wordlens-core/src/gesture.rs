use std::time::{Duration, Instant};

use crate::{Point, Rect};

pub const TRIPLE_TAP_COUNT: u32 = 3;
pub const DEFAULT_TAP_WINDOW: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq)]
pub enum GestureSignal {
    TripleTap,
    WordSelected(WordSelection),
}

/// A single accepted word and where its lookup popover is anchored.
#[derive(Debug, Clone, PartialEq)]
pub struct WordSelection {
    pub word: String,
    pub position: Point,
}

/// Counts taps and reports every third one that arrives before the reset
/// timer fires. The timer is restarted by each non-final tap.
#[derive(Debug, Clone)]
pub struct TapDetector {
    window: Duration,
    count: u32,
    deadline: Option<Instant>,
}

impl Default for TapDetector {
    fn default() -> Self {
        Self::new(DEFAULT_TAP_WINDOW)
    }
}

impl TapDetector {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            count: 0,
            deadline: None,
        }
    }

    pub fn pending_taps(&self) -> u32 {
        self.count
    }

    pub fn on_tap(&mut self, at: Instant) -> Option<GestureSignal> {
        self.expire(at);
        self.count += 1;
        if self.count >= TRIPLE_TAP_COUNT {
            self.reset();
            return Some(GestureSignal::TripleTap);
        }
        self.deadline = Some(at + self.window);
        None
    }

    /// Fires the reset timer if its deadline has passed. Returns true when
    /// pending taps were discarded.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now > deadline => {
                self.reset();
                true
            }
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.deadline = None;
    }
}

/// Accepts a text selection only when it is exactly one whitespace-free
/// token. Multi-word and blank selections are ignored rather than trimmed
/// down to a word.
pub fn classify_selection(text: &str, bounds: Rect) -> Option<WordSelection> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
        return None;
    }
    Some(WordSelection {
        word: trimmed.to_string(),
        position: bounds.top_center(),
    })
}
