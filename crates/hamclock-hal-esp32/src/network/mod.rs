//! Wi-Fi/network connectivity state shared between async network workers,
//! the scheduler loop and the config API.

pub mod bridge;
pub mod dhcp_server;

use core::{
    fmt::Write as _,
    net::Ipv4Addr,
    sync::atomic::{AtomicBool, AtomicI8, AtomicU8, AtomicU32, Ordering},
};

use heapless::String;

/// Dotted-quad text of an IPv4 address.
pub const IP_TEXT_BYTES: usize = 16;

/// Setup network raised when no configured station can be joined.
pub const SETUP_AP_SSID: &str = "ESP32-HAM-CLOCK";
pub const SETUP_AP_PASSWORD: &str = "1234567890";
pub const SETUP_AP_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);
pub const SETUP_AP_PREFIX_LEN: u8 = 24;

/// High-level station state for UI + logs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ConnectivityState {
    Disconnected = 0,
    Connecting = 1,
    LinkUpNoIp = 2,
    Connected = 3,
}

impl ConnectivityState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Connecting,
            2 => Self::LinkUpNoIp,
            3 => Self::Connected,
            _ => Self::Disconnected,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::LinkUpNoIp => "link_up_no_ip",
            Self::Connected => "connected",
        }
    }
}

/// Immutable connectivity snapshot for renderer, scheduler and API.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ConnectivitySnapshot {
    pub state: ConnectivityState,
    pub ipv4: Option<Ipv4Addr>,
    pub rssi: i8,
    /// Index of the credential set in use (0 primary, 1 secondary).
    pub credential: u8,
    /// The setup access point is up next to (or instead of) the station.
    pub access_point: bool,
    pub revision: u32,
}

impl ConnectivitySnapshot {
    pub const fn disconnected() -> Self {
        Self {
            state: ConnectivityState::Disconnected,
            ipv4: None,
            rssi: 0,
            credential: 0,
            access_point: false,
            revision: 0,
        }
    }

    /// Station has both link and an IPv4 lease.
    pub const fn is_online(self) -> bool {
        matches!(self.state, ConnectivityState::Connected)
    }

    /// `0.0.0.0` while no lease is held.
    pub fn ip_text(&self) -> String<IP_TEXT_BYTES> {
        let mut text = String::new();
        let ip = self.ipv4.unwrap_or(Ipv4Addr::UNSPECIFIED);
        let _ = write!(text, "{}", ip);
        text
    }
}

/// Lock-free shared connectivity status.
#[derive(Debug)]
pub struct ConnectivityHandle {
    state: AtomicU8,
    link_up: AtomicBool,
    ipv4: AtomicU32,
    rssi: AtomicI8,
    credential: AtomicU8,
    access_point: AtomicBool,
    revision: AtomicU32,
}

impl ConnectivityHandle {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectivityState::Disconnected as u8),
            link_up: AtomicBool::new(false),
            ipv4: AtomicU32::new(0),
            rssi: AtomicI8::new(0),
            credential: AtomicU8::new(0),
            access_point: AtomicBool::new(false),
            revision: AtomicU32::new(0),
        }
    }

    pub fn snapshot(&self) -> ConnectivitySnapshot {
        let raw_ip = self.ipv4.load(Ordering::Acquire);
        ConnectivitySnapshot {
            state: ConnectivityState::from_raw(self.state.load(Ordering::Acquire)),
            ipv4: (raw_ip != 0).then(|| Ipv4Addr::from(raw_ip)),
            rssi: self.rssi.load(Ordering::Acquire),
            credential: self.credential.load(Ordering::Acquire),
            access_point: self.access_point.load(Ordering::Acquire),
            revision: self.revision.load(Ordering::Acquire),
        }
    }

    pub fn mark_connecting(&self, credential: u8) {
        let mut changed = false;
        changed |= self.credential.swap(credential, Ordering::AcqRel) != credential;
        changed |= self.store_state(ConnectivityState::Connecting);
        if changed {
            self.bump_revision();
        }
    }

    pub fn mark_disconnected(&self) {
        let mut changed = false;
        changed |= self.link_up.swap(false, Ordering::AcqRel);
        changed |= self.ipv4.swap(0, Ordering::AcqRel) != 0;
        self.rssi.store(0, Ordering::Release);
        changed |= self.store_state(ConnectivityState::Disconnected);
        if changed {
            self.bump_revision();
        }
    }

    pub fn update_link_ip(&self, link_up: bool, ipv4: Option<Ipv4Addr>) {
        let raw_ip = ipv4.map(u32::from).unwrap_or(0);

        let mut changed = false;
        changed |= self.link_up.swap(link_up, Ordering::AcqRel) != link_up;
        changed |= self.ipv4.swap(raw_ip, Ordering::AcqRel) != raw_ip;

        let next = if !link_up {
            ConnectivityState::Disconnected
        } else if ipv4.is_none() {
            ConnectivityState::LinkUpNoIp
        } else {
            ConnectivityState::Connected
        };
        changed |= self.store_state(next);

        if changed {
            self.bump_revision();
        }
    }

    pub fn mark_access_point(&self, active: bool) {
        if self.access_point.swap(active, Ordering::AcqRel) != active {
            self.bump_revision();
        }
    }

    /// Signal strength changes do not bump the revision; they are sampled.
    pub fn update_rssi(&self, rssi: i8) {
        self.rssi.store(rssi, Ordering::Release);
    }

    fn store_state(&self, next: ConnectivityState) -> bool {
        self.state.swap(next as u8, Ordering::AcqRel) != next as u8
    }

    fn bump_revision(&self) {
        self.revision.fetch_add(1, Ordering::AcqRel);
    }
}

impl Default for ConnectivityHandle {
    fn default() -> Self {
        Self::new()
    }
}
