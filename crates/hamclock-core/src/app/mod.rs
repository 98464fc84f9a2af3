//! Cooperative scheduler tying timers, peer links and navigation together.

use heapless::String;
use log::{debug, info, warn};

use crate::{
    config::{CALLSIGN_BYTES, HamConfig, LOCATOR_BYTES},
    error::FeedError,
    feeds::FeedHandler,
    link::{LinkPoll, LinkStatus, Peer, PeerLink, Transport},
    render::ScreenView,
    schedule::{ClockTick, PollTask, TaskTimers},
    screen::{Navigator, ScreenBounds, ScreenId},
    status::StatusBoard,
    touch::{TouchInput, TouchTracker},
};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TickResult {
    #[default]
    NoRender,
    RenderRequested,
}

/// What happened during one scheduler pass.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PassReport {
    pub render: TickResult,
    pub screen_changed: bool,
    pub polls_triggered: u8,
    pub lines: usize,
    pub links_changed: bool,
}

pub struct HamClock<DX, APRS, IN, FEEDS>
where
    DX: Transport,
    APRS: Transport,
    IN: TouchInput,
    FEEDS: FeedHandler,
{
    dx_transport: DX,
    aprs_transport: APRS,
    touch: IN,
    feeds: FEEDS,
    dx: PeerLink,
    aprs: PeerLink,
    timers: TaskTimers,
    nav: Navigator,
    tracker: TouchTracker,
    bounds: ScreenBounds,
    weather_configured: bool,
    callsign: String<CALLSIGN_BYTES>,
    locator: String<LOCATOR_BYTES>,
    touch_fault_logged: bool,
    last_tick: ClockTick,
}

impl<DX, APRS, IN, FEEDS> HamClock<DX, APRS, IN, FEEDS>
where
    DX: Transport,
    APRS: Transport,
    IN: TouchInput,
    FEEDS: FeedHandler,
{
    pub fn new(
        dx_transport: DX,
        aprs_transport: APRS,
        touch: IN,
        feeds: FEEDS,
        config: &HamConfig,
        bounds: ScreenBounds,
    ) -> Self {
        let dx = PeerLink::dx_cluster(config.dx_endpoint());
        let aprs = PeerLink::aprs_is(config.aprs_endpoint());
        let weather_configured = config.weather_configured();

        info!(
            "app: configured dx={} aprs={} weather={} bounds={}x{}",
            dx.endpoint().is_some(),
            aprs.endpoint().is_some(),
            weather_configured,
            bounds.width,
            bounds.height
        );

        Self {
            dx_transport,
            aprs_transport,
            touch,
            feeds,
            dx,
            aprs,
            timers: TaskTimers::new(),
            nav: Navigator::default(),
            tracker: TouchTracker::new(),
            bounds,
            weather_configured,
            callsign: config.callsign.clone(),
            locator: config.locator.clone(),
            touch_fault_logged: false,
            last_tick: 0,
        }
    }

    pub fn with_touch_tracker(mut self, tracker: TouchTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_initial_screen(mut self, screen: ScreenId) -> Self {
        self.nav = Navigator::new(screen);
        self
    }

    pub fn with_timers(mut self, timers: TaskTimers) -> Self {
        self.timers = timers;
        self
    }

    pub fn current_screen(&self) -> ScreenId {
        self.nav.current()
    }

    pub fn link_status(&self, peer: Peer) -> LinkStatus {
        match peer {
            Peer::DxCluster => self.dx.status(),
            Peer::AprsIs => self.aprs.status(),
        }
    }

    pub fn link(&self, peer: Peer) -> &PeerLink {
        match peer {
            Peer::DxCluster => &self.dx,
            Peer::AprsIs => &self.aprs,
        }
    }

    pub fn timers(&self) -> &TaskTimers {
        &self.timers
    }

    pub fn feeds(&self) -> &FEEDS {
        &self.feeds
    }

    pub fn dx_transport(&self) -> &DX {
        &self.dx_transport
    }

    pub fn aprs_transport(&self) -> &APRS {
        &self.aprs_transport
    }

    /// Writes link state and current screen for the HTTP status endpoint.
    pub fn publish_status(&self, board: &StatusBoard) {
        board.publish(
            self.last_tick / 1_000,
            self.dx.status(),
            self.aprs.status(),
            self.nav.current(),
        );
    }
}

include!("runtime.rs");
include!("view.rs");

#[cfg(test)]
mod tests;
