//! Dot spinner driven by self-rescheduling ticks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Delay between frames.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

const FRAMES: &[&str] = &["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Animation state. Each spinner has its own id so ticks scheduled for a
/// stage that has since been replaced are recognised and dropped.
#[derive(Debug)]
pub struct Spinner {
    id: u64,
    frame: usize,
}

impl Spinner {
    pub fn new() -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            frame: 0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Advance one frame if the tick belongs to this spinner.
    pub fn tick(&mut self, id: u64) -> bool {
        if id != self.id {
            return false;
        }
        self.frame = (self.frame + 1) % FRAMES.len();
        true
    }

    pub fn frame(&self) -> &'static str {
        FRAMES[self.frame]
    }
}

impl Default for Spinner {
    fn default() -> Self {
        Self::new()
    }
}
