//! Render-facing view of the scheduler state.

use crate::{link::LinkStatus, screen::ScreenId};

/// Everything a renderer may read for one frame. Borrowed from the app for
/// the duration of the render call only.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ScreenView<'a> {
    pub screen: ScreenId,
    pub uptime_s: u32,
    pub dx: LinkStatus,
    pub aprs: LinkStatus,
    pub callsign: &'a str,
    pub locator: &'a str,
}

impl ScreenView<'_> {
    /// `HH:MM:SS` components of the uptime, wrapping every 24 h.
    pub const fn uptime_hms(&self) -> (u8, u8, u8) {
        let secs = self.uptime_s % 86_400;
        ((secs / 3_600) as u8, ((secs / 60) % 60) as u8, (secs % 60) as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_splits_into_clock_fields() {
        let view = ScreenView {
            screen: ScreenId::Clock,
            uptime_s: 86_400 + 3_600 * 13 + 60 * 7 + 9,
            dx: LinkStatus::Disconnected,
            aprs: LinkStatus::Disconnected,
            callsign: "",
            locator: "",
        };
        assert_eq!(view.uptime_hms(), (13, 7, 9));
    }
}
