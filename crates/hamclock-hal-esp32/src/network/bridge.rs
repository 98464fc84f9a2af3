//! Bridges the scheduler's non-blocking `Transport` to an async
//! `embassy-net` TCP socket.
//!
//! The scheduler side only touches pipes, a signal and a session word. A
//! pump future per peer owns the socket, resolves the host, connects with a
//! bound and shuttles bytes between the socket and the pipes.

use core::net::Ipv4Addr;

use embassy_futures::select::{Either3, select3};
use embassy_net::{IpAddress, Stack, dns::DnsQueryType, tcp::TcpSocket};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, pipe::Pipe, signal::Signal};
use embassy_time::{Duration, WithTimeout};
use hamclock_core::link::{
    CONNECT_TIMEOUT_MS, ConnectPoll, HOST_BYTES, Peer, SessionCell, SessionState, Transport,
};
use heapless::String;
use log::{debug, info, warn};

/// Buffered bytes per direction between scheduler and pump.
pub const PIPE_BYTES: usize = 1_024;
/// Socket buffers the pump needs per direction.
pub const SOCKET_BUFFER_BYTES: usize = 1_536;

const PUMP_CHUNK_BYTES: usize = 256;
const SOCKET_IDLE_TIMEOUT_SECS: u64 = 300;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BridgeError {
    HostTooLong,
    NotConnected,
    /// Outbound pipe has no room for the whole write.
    Overflow,
}

#[derive(Clone, Debug)]
enum Command {
    Connect {
        host: String<HOST_BYTES>,
        port: u16,
        attempt: u32,
    },
    Close,
}

/// Shared half of one peer connection. Lives in a `static`.
pub struct SocketBridge {
    inbound: Pipe<CriticalSectionRawMutex, PIPE_BYTES>,
    outbound: Pipe<CriticalSectionRawMutex, PIPE_BYTES>,
    command: Signal<CriticalSectionRawMutex, Command>,
    session: SessionCell,
}

impl SocketBridge {
    pub const fn new() -> Self {
        Self {
            inbound: Pipe::new(),
            outbound: Pipe::new(),
            command: Signal::new(),
            session: SessionCell::new(),
        }
    }

    /// Scheduler-side handle.
    pub const fn transport(&'static self) -> BridgeTransport {
        BridgeTransport { bridge: self }
    }

    fn reset_pipes(&self) {
        self.inbound.clear();
        self.outbound.clear();
    }
}

impl Default for SocketBridge {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-blocking `Transport` over a [`SocketBridge`].
#[derive(Clone, Copy)]
pub struct BridgeTransport {
    bridge: &'static SocketBridge,
}

impl Transport for BridgeTransport {
    type Error = BridgeError;

    fn begin_connect(&mut self, host: &str, port: u16) -> Result<(), Self::Error> {
        let mut owned = String::new();
        owned.push_str(host).map_err(|_| BridgeError::HostTooLong)?;

        self.bridge.reset_pipes();
        let attempt = self.bridge.session.begin();
        self.bridge.command.signal(Command::Connect {
            host: owned,
            port,
            attempt,
        });
        Ok(())
    }

    fn poll_connect(&mut self) -> ConnectPoll {
        match self.bridge.session.state() {
            SessionState::Connecting => ConnectPoll::Pending,
            SessionState::Open => ConnectPoll::Established,
            SessionState::Idle | SessionState::Failed | SessionState::Closed => ConnectPoll::Failed,
        }
    }

    fn connected(&self) -> bool {
        self.bridge.session.state() == SessionState::Open
    }

    fn available(&self) -> usize {
        self.bridge.inbound.len()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(self.bridge.inbound.try_read(buf).unwrap_or(0))
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        if !self.connected() {
            return Err(BridgeError::NotConnected);
        }
        if self.bridge.outbound.free_capacity() < bytes.len() {
            return Err(BridgeError::Overflow);
        }

        let mut rest = bytes;
        while !rest.is_empty() {
            let n = self
                .bridge
                .outbound
                .try_write(rest)
                .map_err(|_| BridgeError::Overflow)?;
            rest = &rest[n..];
        }
        Ok(())
    }

    fn close(&mut self) {
        self.bridge.session.reset();
        self.bridge.reset_pipes();
        self.bridge.command.signal(Command::Close);
    }
}

/// Services one peer's connect requests forever.
pub async fn run_socket_pump(
    stack: Stack<'_>,
    bridge: &'static SocketBridge,
    peer: Peer,
    rx_buffer: &mut [u8],
    tx_buffer: &mut [u8],
) -> ! {
    loop {
        let (host, port, attempt) = match bridge.command.wait().await {
            Command::Connect {
                host,
                port,
                attempt,
            } => (host, port, attempt),
            Command::Close => continue,
        };
        if !bridge.session.is_current(attempt) {
            debug!("{}: skipping abandoned attempt={}", peer.as_str(), attempt);
            continue;
        }

        let address = match resolve(stack, &host).await {
            Some(address) => address,
            None => {
                warn!("{}: dns lookup failed host={}", peer.as_str(), host);
                bridge
                    .session
                    .advance(attempt, SessionState::Connecting, SessionState::Failed);
                continue;
            }
        };

        let mut socket = TcpSocket::new(stack, &mut *rx_buffer, &mut *tx_buffer);
        socket.set_timeout(Some(Duration::from_secs(SOCKET_IDLE_TIMEOUT_SECS)));

        let connect = socket
            .connect((address, port))
            .with_timeout(Duration::from_millis(CONNECT_TIMEOUT_MS as u64))
            .await;
        match connect {
            Ok(Ok(())) => {
                // Bytes a previous session left behind must not reach this one.
                bridge.inbound.clear();
                if !bridge
                    .session
                    .advance(attempt, SessionState::Connecting, SessionState::Open)
                {
                    info!("{}: attempt={} abandoned before open", peer.as_str(), attempt);
                    socket.abort();
                    continue;
                }
                info!("{}: socket open host={} port={}", peer.as_str(), host, port);
            }
            Ok(Err(err)) => {
                warn!("{}: socket connect failed err={:?}", peer.as_str(), err);
                bridge
                    .session
                    .advance(attempt, SessionState::Connecting, SessionState::Failed);
                socket.abort();
                continue;
            }
            Err(_) => {
                warn!("{}: socket connect timed out", peer.as_str());
                bridge
                    .session
                    .advance(attempt, SessionState::Connecting, SessionState::Failed);
                socket.abort();
                continue;
            }
        }

        service_socket(&mut socket, bridge, peer, attempt).await;
        socket.abort();
    }
}

async fn service_socket(
    socket: &mut TcpSocket<'_>,
    bridge: &'static SocketBridge,
    peer: Peer,
    attempt: u32,
) {
    let mut rx_chunk = [0u8; PUMP_CHUNK_BYTES];
    let mut tx_chunk = [0u8; PUMP_CHUNK_BYTES];
    let mark_closed = || {
        bridge
            .session
            .advance(attempt, SessionState::Open, SessionState::Closed);
    };

    loop {
        let event = select3(
            socket.read(&mut rx_chunk),
            bridge.outbound.read(&mut tx_chunk),
            bridge.command.wait(),
        )
        .await;

        match event {
            Either3::First(Ok(0)) => {
                info!("{}: peer closed socket", peer.as_str());
                mark_closed();
                return;
            }
            Either3::First(Ok(n)) => {
                // Waits for the scheduler to drain; the socket window stalls
                // the peer meanwhile.
                bridge.inbound.write_all(&rx_chunk[..n]).await;
                if !bridge.session.is_current(attempt) {
                    return;
                }
            }
            Either3::First(Err(err)) => {
                warn!("{}: socket read failed err={:?}", peer.as_str(), err);
                mark_closed();
                return;
            }
            Either3::Second(n) => {
                if let Err(err) = write_all(socket, &tx_chunk[..n]).await {
                    warn!("{}: socket write failed err={:?}", peer.as_str(), err);
                    mark_closed();
                    return;
                }
            }
            Either3::Third(Command::Close) => {
                socket.close();
                let _ = socket.flush().await;
                return;
            }
            Either3::Third(command @ Command::Connect { .. }) => {
                // A fresh attempt replaces this session; hand it back to the pump.
                bridge.command.signal(command);
                return;
            }
        }
    }
}

async fn write_all(
    socket: &mut TcpSocket<'_>,
    mut data: &[u8],
) -> Result<(), embassy_net::tcp::Error> {
    while !data.is_empty() {
        let n = socket.write(data).await?;
        if n == 0 {
            return Err(embassy_net::tcp::Error::ConnectionReset);
        }
        data = &data[n..];
    }
    socket.flush().await
}

async fn resolve(stack: Stack<'_>, host: &str) -> Option<IpAddress> {
    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        return Some(IpAddress::Ipv4(ip));
    }

    match stack.dns_query(host, DnsQueryType::A).await {
        Ok(addresses) => addresses.first().copied(),
        Err(err) => {
            warn!("dns: query failed host={} err={:?}", host, err);
            None
        }
    }
}
