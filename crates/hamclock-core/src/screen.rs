//! Screen set and touch navigation.

use core::sync::atomic::{AtomicU8, Ordering};

use log::debug;

use crate::touch::TouchEvent;

/// Width of the left/right gesture columns and height of the bottom band.
pub const NAV_ZONE_PX: u16 = 40;

/// Fixed, ordered set of mutually exclusive views.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ScreenId {
    Clock = 0,
    DxCluster = 1,
    Aprs = 2,
    Bands = 3,
    Propagation = 4,
    Weather = 5,
    Pota = 6,
    Matrix = 7,
}

impl ScreenId {
    pub const COUNT: u8 = 8;
    pub const ALL: [Self; Self::COUNT as usize] = [
        Self::Clock,
        Self::DxCluster,
        Self::Aprs,
        Self::Bands,
        Self::Propagation,
        Self::Weather,
        Self::Pota,
        Self::Matrix,
    ];

    /// Returns `None` for indices outside `0..COUNT`.
    pub const fn from_index(index: u8) -> Option<Self> {
        if index < Self::COUNT {
            Some(Self::ALL[index as usize])
        } else {
            None
        }
    }

    pub const fn index(self) -> u8 {
        self as u8
    }

    pub const fn next(self) -> Self {
        Self::ALL[((self.index() + 1) % Self::COUNT) as usize]
    }

    pub const fn previous(self) -> Self {
        Self::ALL[((self.index() + Self::COUNT - 1) % Self::COUNT) as usize]
    }

    pub const fn title(self) -> &'static str {
        match self {
            Self::Clock => "CLOCK",
            Self::DxCluster => "DX CLUSTER",
            Self::Aprs => "APRS-IS",
            Self::Bands => "HF BANDS",
            Self::Propagation => "PROPAGATION",
            Self::Weather => "WEATHER",
            Self::Pota => "POTA",
            Self::Matrix => "MATRIX CLOCK",
        }
    }
}

/// Display size in pixels after rotation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ScreenBounds {
    pub width: u16,
    pub height: u16,
}

impl ScreenBounds {
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// First row below the content area; touches under it are gestures.
    pub const fn nav_band_top(self) -> u16 {
        self.height.saturating_sub(NAV_ZONE_PX)
    }
}

/// Owns the current screen and applies gestures and external selection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Navigator {
    current: ScreenId,
}

impl Navigator {
    pub const fn new(initial: ScreenId) -> Self {
        Self { current: initial }
    }

    pub const fn current(&self) -> ScreenId {
        self.current
    }

    /// Applies one touch event. Only press edges in the bottom band's left or
    /// right column change the screen.
    pub fn on_touch(&mut self, event: TouchEvent, bounds: ScreenBounds) -> Option<ScreenId> {
        if !event.edge {
            return None;
        }

        if event.y <= bounds.nav_band_top() {
            return None;
        }

        let next = if event.x < NAV_ZONE_PX {
            self.current.previous()
        } else if event.x > bounds.width.saturating_sub(NAV_ZONE_PX) {
            self.current.next()
        } else {
            return None;
        };

        debug!(
            "nav: gesture x={} y={} from={} to={}",
            event.x,
            event.y,
            self.current.index(),
            next.index()
        );
        self.current = next;
        Some(next)
    }

    /// Direct selection. Returns `true` when the screen changed.
    pub fn select(&mut self, screen: ScreenId) -> bool {
        if self.current == screen {
            return false;
        }
        self.current = screen;
        true
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(ScreenId::Clock)
    }
}

const MAILBOX_EMPTY: u8 = u8::MAX;

/// Single-slot, lock-free hand-off of an external screen selection.
///
/// Writers on other execution contexts post here; the scheduler takes the
/// slot at the start of its next pass. A newer request overwrites an older
/// one that was not yet taken.
#[derive(Debug)]
pub struct ScreenMailbox {
    slot: AtomicU8,
}

impl ScreenMailbox {
    pub const fn new() -> Self {
        Self {
            slot: AtomicU8::new(MAILBOX_EMPTY),
        }
    }

    pub fn post(&self, screen: ScreenId) {
        self.slot.store(screen.index(), Ordering::Release);
    }

    /// Posts a raw index, rejecting anything outside the screen set.
    pub fn post_index(&self, index: u8) -> Option<ScreenId> {
        let screen = ScreenId::from_index(index)?;
        self.post(screen);
        Some(screen)
    }

    pub fn take(&self) -> Option<ScreenId> {
        let raw = self.slot.swap(MAILBOX_EMPTY, Ordering::AcqRel);
        ScreenId::from_index(raw)
    }
}

impl Default for ScreenMailbox {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: ScreenBounds = ScreenBounds::new(320, 240);

    fn press(x: u16, y: u16) -> TouchEvent {
        TouchEvent { x, y, edge: true }
    }

    #[test]
    fn previous_from_first_screen_wraps_to_last() {
        let mut nav = Navigator::new(ScreenId::Clock);
        assert_eq!(nav.on_touch(press(10, 230), BOUNDS), Some(ScreenId::Matrix));
        assert_eq!(nav.current().index(), ScreenId::COUNT - 1);
    }

    #[test]
    fn next_from_last_screen_wraps_to_first() {
        let mut nav = Navigator::new(ScreenId::Matrix);
        assert_eq!(nav.on_touch(press(310, 230), BOUNDS), Some(ScreenId::Clock));
    }

    #[test]
    fn held_samples_do_not_navigate() {
        let mut nav = Navigator::new(ScreenId::Aprs);
        let held = TouchEvent {
            x: 310,
            y: 230,
            edge: false,
        };
        assert_eq!(nav.on_touch(held, BOUNDS), None);
        assert_eq!(nav.current(), ScreenId::Aprs);
    }

    #[test]
    fn touches_outside_gesture_zones_are_ignored() {
        let mut nav = Navigator::default();

        // Middle of the bottom band.
        assert_eq!(nav.on_touch(press(160, 230), BOUNDS), None);
        // Left column but above the band.
        assert_eq!(nav.on_touch(press(10, 100), BOUNDS), None);
        // Band boundary is exclusive.
        assert_eq!(nav.on_touch(press(10, 200), BOUNDS), None);
        assert_eq!(nav.on_touch(press(40, 230), BOUNDS), None);
        assert_eq!(nav.on_touch(press(280, 230), BOUNDS), None);

        assert_eq!(nav.current(), ScreenId::Clock);
    }

    #[test]
    fn portrait_bounds_move_the_nav_band_down() {
        let portrait = ScreenBounds::new(240, 320);
        assert_eq!(portrait.nav_band_top(), 280);
        assert_eq!(BOUNDS.nav_band_top(), 200);

        let mut nav = Navigator::new(ScreenId::Clock);
        // Mid-screen in portrait is content, not the nav band.
        assert_eq!(nav.on_touch(press(230, 230), portrait), None);
        assert_eq!(nav.on_touch(press(230, 300), portrait), Some(ScreenId::DxCluster));
    }

    #[test]
    fn screen_index_round_trips_only_for_valid_range() {
        for screen in ScreenId::ALL {
            assert_eq!(ScreenId::from_index(screen.index()), Some(screen));
        }
        assert_eq!(ScreenId::from_index(ScreenId::COUNT), None);
        assert_eq!(ScreenId::from_index(u8::MAX), None);
    }

    #[test]
    fn mailbox_is_single_slot_and_rejects_invalid_indices() {
        let mailbox = ScreenMailbox::new();
        assert_eq!(mailbox.take(), None);

        assert_eq!(mailbox.post_index(9), None);
        assert_eq!(mailbox.take(), None);

        mailbox.post(ScreenId::Weather);
        assert_eq!(mailbox.post_index(2), Some(ScreenId::Aprs));
        assert_eq!(mailbox.take(), Some(ScreenId::Aprs));
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn select_reports_change_only_when_different() {
        let mut nav = Navigator::default();
        assert!(!nav.select(ScreenId::Clock));
        assert!(nav.select(ScreenId::Pota));
        assert_eq!(nav.current(), ScreenId::Pota);
    }
}
