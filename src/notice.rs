use std::collections::VecDeque;
use std::time::{Duration, SystemTime};

use crate::clock::Clock;

/// Severity of a transient notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

/// A transient, dismissable notification. These carry persistence outcomes
/// to the user without ever touching gameplay state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            text: text.into(),
        }
    }
}

const NOTICE_TTL: Duration = Duration::from_secs(4);
const MAX_VISIBLE: usize = 3;

/// Holds currently visible notices and expires them on ticks
#[derive(Debug, Default)]
pub struct NoticeBoard {
    visible: VecDeque<(Notice, SystemTime)>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notice: Notice, clock: &impl Clock) {
        self.visible.push_back((notice, clock.now() + NOTICE_TTL));
        while self.visible.len() > MAX_VISIBLE {
            self.visible.pop_front();
        }
    }

    /// Drop notices whose display window has passed
    pub fn on_tick(&mut self, clock: &impl Clock) {
        let now = clock.now();
        self.visible.retain(|(_, expires)| *expires > now);
    }

    pub fn dismiss_all(&mut self) {
        self.visible.clear();
    }

    pub fn visible(&self) -> impl Iterator<Item = &Notice> {
        self.visible.iter().map(|(n, _)| n)
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }
}
