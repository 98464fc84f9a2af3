//! Feed collaborator seam and the in-memory feed board used on the device.

use heapless::{Deque, String};
use log::debug;

use crate::{
    error::FeedError,
    link::Peer,
    schedule::{ClockTick, PollTask},
};

pub const RECENT_LINES: usize = 8;
pub const RECENT_LINE_BYTES: usize = 80;

/// Receives poll triggers and complete peer lines from the scheduler.
///
/// `refresh` is fire-and-forget: the scheduler records the task as run
/// whatever the result.
pub trait FeedHandler {
    fn refresh(&mut self, task: PollTask, now: ClockTick) -> Result<(), FeedError>;
    fn on_line(&mut self, peer: Peer, line: &str);
}

/// Handler that accepts every trigger and drops every line.
#[derive(Default, Debug, Clone, Copy)]
pub struct NullFeeds;

impl FeedHandler for NullFeeds {
    fn refresh(&mut self, _task: PollTask, _now: ClockTick) -> Result<(), FeedError> {
        Ok(())
    }

    fn on_line(&mut self, _peer: Peer, _line: &str) {}
}

/// Bounded history of the most recent lines, oldest evicted first.
#[derive(Debug, Clone, Default)]
pub struct RecentLines {
    lines: Deque<String<RECENT_LINE_BYTES>, RECENT_LINES>,
    total: u32,
}

impl RecentLines {
    pub const fn new() -> Self {
        Self {
            lines: Deque::new(),
            total: 0,
        }
    }

    /// Stores `line`, cut at a character boundary if it is too long to keep.
    pub fn push(&mut self, line: &str) {
        let mut stored = String::new();
        for ch in line.chars() {
            if stored.push(ch).is_err() {
                break;
            }
        }

        if self.lines.is_full() {
            let _ = self.lines.pop_front();
        }
        let _ = self.lines.push_back(stored);
        self.total = self.total.saturating_add(1);
    }

    /// Newest first.
    pub fn iter_newest(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().rev().map(|line| line.as_str())
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines received since boot, including evicted ones.
    pub const fn total(&self) -> u32 {
        self.total
    }
}

/// Keeps what the screens show about each feed: recent cluster lines and
/// the tick each poll feed was last triggered at.
#[derive(Debug, Clone, Default)]
pub struct FeedBoard {
    dx: RecentLines,
    aprs: RecentLines,
    weather_at: Option<ClockTick>,
    propagation_at: Option<ClockTick>,
    pota_at: Option<ClockTick>,
}

impl FeedBoard {
    pub const fn new() -> Self {
        Self {
            dx: RecentLines::new(),
            aprs: RecentLines::new(),
            weather_at: None,
            propagation_at: None,
            pota_at: None,
        }
    }

    pub fn lines(&self, peer: Peer) -> &RecentLines {
        match peer {
            Peer::DxCluster => &self.dx,
            Peer::AprsIs => &self.aprs,
        }
    }

    pub fn last_refresh(&self, task: PollTask) -> Option<ClockTick> {
        match task {
            PollTask::Weather => self.weather_at,
            PollTask::Propagation => self.propagation_at,
            PollTask::Pota => self.pota_at,
        }
    }
}

impl FeedHandler for FeedBoard {
    fn refresh(&mut self, task: PollTask, now: ClockTick) -> Result<(), FeedError> {
        let slot = match task {
            PollTask::Weather => &mut self.weather_at,
            PollTask::Propagation => &mut self.propagation_at,
            PollTask::Pota => &mut self.pota_at,
        };
        *slot = Some(now);
        debug!("feed: refresh task={} at={}", task.as_str(), now);
        Ok(())
    }

    fn on_line(&mut self, peer: Peer, line: &str) {
        match peer {
            Peer::DxCluster => self.dx.push(line),
            Peer::AprsIs => self.aprs.push(line),
        }
    }
}
