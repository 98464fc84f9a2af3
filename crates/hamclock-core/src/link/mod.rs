//! Per-peer connection state machine (DX cluster, APRS-IS).
//!
//! `Disconnected -> Connecting -> Connected -> Disconnected`. Every step is
//! non-blocking: connects complete over several passes, the identity line is
//! sent once a settle delay has passed, and inbound bytes are drained in
//! bounded slices.

pub mod aprs;
mod lines;
mod session;
mod transport;

pub use lines::LineAssembler;
pub use session::{SessionCell, SessionState};
pub use transport::{ConnectPoll, NullTransport, Transport};

use heapless::String;
use log::{debug, info, warn};

use crate::{
    error::LinkError,
    schedule::{ClockTick, DX_KEEPALIVE_INTERVAL_MS, RECONNECT_BACKOFF_MS, TaskSchedule, elapsed_ms},
};

pub const HOST_BYTES: usize = 64;
pub const LOGIN_BYTES: usize = 160;
pub const LINE_BYTES: usize = 256;

pub const CONNECT_TIMEOUT_MS: u32 = 10_000;
pub const HANDSHAKE_SETTLE_MS: u32 = 1_000;
pub const DRAIN_BUDGET_BYTES: usize = 512;

const READ_CHUNK_BYTES: usize = 64;
const KEEPALIVE_PAYLOAD: &[u8] = b"\r\n";
const LINE_END: &[u8] = b"\r\n";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Peer {
    DxCluster,
    AprsIs,
}

impl Peer {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DxCluster => "dx",
            Self::AprsIs => "aprs",
        }
    }
}

/// Externally observable connection status.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum LinkStatus {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl LinkStatus {
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => Self::Disconnected,
        }
    }

    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

/// Where to connect and how to introduce ourselves.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Endpoint {
    pub host: String<HOST_BYTES>,
    pub port: u16,
    /// Identity line sent once after connect, without line terminator.
    pub login: String<LOGIN_BYTES>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum LinkState {
    Disconnected,
    Connecting { started: ClockTick },
    Connected { since: ClockTick, greeted: bool },
}

/// Outcome of one [`PeerLink::poll`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LinkPoll {
    pub lines: usize,
    pub error: Option<LinkError>,
    pub status_changed: bool,
}

/// Connection state plus the reconnect and keepalive timers of one peer.
#[derive(Debug, Clone)]
pub struct PeerLink {
    peer: Peer,
    endpoint: Option<Endpoint>,
    state: LinkState,
    reconnect: TaskSchedule,
    keepalive: Option<TaskSchedule>,
    lines: LineAssembler<LINE_BYTES>,
    attempts: u32,
}

impl PeerLink {
    /// DX cluster link: sends a keepalive while connected.
    pub fn dx_cluster(endpoint: Option<Endpoint>) -> Self {
        Self::new(Peer::DxCluster, endpoint)
            .with_keepalive(TaskSchedule::new("dx-keepalive", DX_KEEPALIVE_INTERVAL_MS))
    }

    /// APRS-IS link: the server keeps the session alive on its own.
    pub fn aprs_is(endpoint: Option<Endpoint>) -> Self {
        Self::new(Peer::AprsIs, endpoint)
    }

    pub fn new(peer: Peer, endpoint: Option<Endpoint>) -> Self {
        Self {
            peer,
            endpoint,
            state: LinkState::Disconnected,
            reconnect: TaskSchedule::new(reconnect_name(peer), RECONNECT_BACKOFF_MS),
            keepalive: None,
            lines: LineAssembler::new(),
            attempts: 0,
        }
    }

    pub fn with_keepalive(mut self, keepalive: TaskSchedule) -> Self {
        self.keepalive = Some(keepalive);
        self
    }

    pub const fn peer(&self) -> Peer {
        self.peer
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    pub const fn status(&self) -> LinkStatus {
        match self.state {
            LinkState::Disconnected => LinkStatus::Disconnected,
            LinkState::Connecting { .. } => LinkStatus::Connecting,
            LinkState::Connected { .. } => LinkStatus::Connected,
        }
    }

    /// Connect attempts started since boot.
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Lines discarded as over-long or not UTF-8.
    pub fn dropped_lines(&self) -> u32 {
        self.lines.dropped()
    }

    /// Runs the branch for the current state once.
    pub fn poll<T, F>(&mut self, now: ClockTick, transport: &mut T, on_line: F) -> LinkPoll
    where
        T: Transport,
        F: FnMut(&str),
    {
        let before = self.status();
        let mut outcome = match self.state {
            LinkState::Disconnected => self.poll_disconnected(now, transport),
            LinkState::Connecting { started } => self.poll_connecting(now, started, transport),
            LinkState::Connected { since, greeted } => {
                self.poll_connected(now, since, greeted, transport, on_line)
            }
        };
        outcome.status_changed = self.status() != before;
        outcome
    }

    fn poll_disconnected<T: Transport>(&mut self, now: ClockTick, transport: &mut T) -> LinkPoll {
        if !self.reconnect.is_due(now) {
            return LinkPoll::default();
        }

        let Some(endpoint) = self.endpoint.as_ref() else {
            return LinkPoll::error(LinkError::ConfigMissing);
        };

        self.reconnect.mark_run(now);
        self.attempts = self.attempts.saturating_add(1);
        info!(
            "{}: connecting host={} port={} attempt={}",
            self.peer.as_str(),
            endpoint.host.as_str(),
            endpoint.port,
            self.attempts
        );

        if let Err(err) = transport.begin_connect(endpoint.host.as_str(), endpoint.port) {
            warn!("{}: connect failed err={:?}", self.peer.as_str(), err);
            return LinkPoll::error(LinkError::ConnectFailure);
        }

        self.state = LinkState::Connecting { started: now };
        self.poll_connecting(now, now, transport)
    }

    fn poll_connecting<T: Transport>(
        &mut self,
        now: ClockTick,
        started: ClockTick,
        transport: &mut T,
    ) -> LinkPoll {
        match transport.poll_connect() {
            ConnectPoll::Established => {
                info!("{}: connected", self.peer.as_str());
                self.state = LinkState::Connected {
                    since: now,
                    greeted: false,
                };
                self.lines.clear();
                if let Some(keepalive) = self.keepalive.as_mut() {
                    keepalive.mark_run(now);
                }
                LinkPoll::default()
            }
            ConnectPoll::Failed => {
                warn!("{}: connect refused", self.peer.as_str());
                self.to_disconnected(transport);
                LinkPoll::error(LinkError::ConnectFailure)
            }
            ConnectPoll::Pending if elapsed_ms(now, started) >= CONNECT_TIMEOUT_MS => {
                warn!(
                    "{}: connect timed out after {}ms",
                    self.peer.as_str(),
                    CONNECT_TIMEOUT_MS
                );
                self.to_disconnected(transport);
                LinkPoll::error(LinkError::ConnectTimeout)
            }
            ConnectPoll::Pending => LinkPoll::default(),
        }
    }

    fn poll_connected<T, F>(
        &mut self,
        now: ClockTick,
        since: ClockTick,
        greeted: bool,
        transport: &mut T,
        mut on_line: F,
    ) -> LinkPoll
    where
        T: Transport,
        F: FnMut(&str),
    {
        if !transport.connected() {
            info!("{}: peer closed", self.peer.as_str());
            self.to_disconnected(transport);
            return LinkPoll::error(LinkError::UnexpectedDisconnect);
        }

        let mut outcome = LinkPoll::default();
        let mut budget = DRAIN_BUDGET_BYTES;
        let mut chunk = [0u8; READ_CHUNK_BYTES];

        while budget > 0 {
            let available = transport.available();
            if available == 0 {
                break;
            }

            let want = available.min(budget).min(READ_CHUNK_BYTES);
            match transport.read(&mut chunk[..want]) {
                Ok(0) => break,
                Ok(read) => {
                    budget = budget.saturating_sub(read);
                    outcome.lines += self.lines.push(&chunk[..read], &mut on_line);
                }
                Err(err) => {
                    warn!("{}: read failed err={:?}", self.peer.as_str(), err);
                    self.to_disconnected(transport);
                    outcome.error = Some(LinkError::UnexpectedDisconnect);
                    return outcome;
                }
            }
        }

        if !greeted && elapsed_ms(now, since) >= HANDSHAKE_SETTLE_MS {
            if let Err(err) = self.send_login(transport) {
                warn!("{}: login write failed err={:?}", self.peer.as_str(), err);
                self.to_disconnected(transport);
                outcome.error = Some(LinkError::UnexpectedDisconnect);
                return outcome;
            }
            self.state = LinkState::Connected {
                since,
                greeted: true,
            };
            return outcome;
        }

        if greeted
            && let Some(keepalive) = self.keepalive.as_mut()
            && keepalive.is_due(now)
        {
            if let Err(err) = transport.write(KEEPALIVE_PAYLOAD) {
                warn!("{}: keepalive failed err={:?}", self.peer.as_str(), err);
                self.to_disconnected(transport);
                outcome.error = Some(LinkError::UnexpectedDisconnect);
                return outcome;
            }
            keepalive.mark_run(now);
            debug!("{}: keepalive sent", self.peer.as_str());
        }

        outcome
    }

    fn send_login<T: Transport>(&mut self, transport: &mut T) -> Result<(), T::Error> {
        let Some(endpoint) = self.endpoint.as_ref() else {
            return Ok(());
        };
        transport.write(endpoint.login.as_bytes())?;
        transport.write(LINE_END)?;
        info!("{}: login sent", self.peer.as_str());
        Ok(())
    }

    fn to_disconnected<T: Transport>(&mut self, transport: &mut T) {
        transport.close();
        self.state = LinkState::Disconnected;
        self.lines.clear();
    }
}

impl LinkPoll {
    const fn error(error: LinkError) -> Self {
        Self {
            lines: 0,
            error: Some(error),
            status_changed: false,
        }
    }
}

const fn reconnect_name(peer: Peer) -> &'static str {
    match peer {
        Peer::DxCluster => "dx-reconnect",
        Peer::AprsIs => "aprs-reconnect",
    }
}

#[cfg(test)]
mod tests;
