//! Scheduler status published for readers on other execution contexts.

use core::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use crate::{link::LinkStatus, screen::ScreenId};

/// Immutable status snapshot.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StatusSnapshot {
    pub uptime_s: u32,
    pub dx: LinkStatus,
    pub aprs: LinkStatus,
    pub screen: ScreenId,
    pub revision: u32,
}

/// Lock-free status written by the scheduler after each pass.
#[derive(Debug)]
pub struct StatusBoard {
    uptime_s: AtomicU32,
    dx: AtomicU8,
    aprs: AtomicU8,
    screen: AtomicU8,
    revision: AtomicU32,
}

impl StatusBoard {
    pub const fn new() -> Self {
        Self {
            uptime_s: AtomicU32::new(0),
            dx: AtomicU8::new(LinkStatus::Disconnected as u8),
            aprs: AtomicU8::new(LinkStatus::Disconnected as u8),
            screen: AtomicU8::new(ScreenId::Clock as u8),
            revision: AtomicU32::new(0),
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            uptime_s: self.uptime_s.load(Ordering::Acquire),
            dx: LinkStatus::from_raw(self.dx.load(Ordering::Acquire)),
            aprs: LinkStatus::from_raw(self.aprs.load(Ordering::Acquire)),
            screen: ScreenId::from_index(self.screen.load(Ordering::Acquire))
                .unwrap_or(ScreenId::Clock),
            revision: self.revision.load(Ordering::Acquire),
        }
    }

    pub fn publish(&self, uptime_s: u32, dx: LinkStatus, aprs: LinkStatus, screen: ScreenId) {
        self.uptime_s.store(uptime_s, Ordering::Release);

        let mut changed = false;
        changed |= self.dx.swap(dx as u8, Ordering::AcqRel) != dx as u8;
        changed |= self.aprs.swap(aprs as u8, Ordering::AcqRel) != aprs as u8;
        changed |= self.screen.swap(screen.index(), Ordering::AcqRel) != screen.index();
        if changed {
            self.revision.fetch_add(1, Ordering::AcqRel);
        }
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revision_moves_only_on_state_change() {
        let board = StatusBoard::new();
        board.publish(1, LinkStatus::Disconnected, LinkStatus::Disconnected, ScreenId::Clock);
        assert_eq!(board.snapshot().revision, 0);
        assert_eq!(board.snapshot().uptime_s, 1);

        board.publish(2, LinkStatus::Connected, LinkStatus::Disconnected, ScreenId::Clock);
        board.publish(3, LinkStatus::Connected, LinkStatus::Disconnected, ScreenId::Weather);
        let snapshot = board.snapshot();
        assert_eq!(snapshot.revision, 2);
        assert_eq!(snapshot.dx, LinkStatus::Connected);
        assert_eq!(snapshot.screen, ScreenId::Weather);
    }
}
