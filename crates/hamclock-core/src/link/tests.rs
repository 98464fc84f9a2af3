use super::*;
use std::{collections::VecDeque, string::String as StdString, vec::Vec as StdVec};

#[derive(Default)]
struct MockTransport {
    connect_results: VecDeque<ConnectPoll>,
    connect_calls: StdVec<(StdString, u16)>,
    pending: Option<ConnectPoll>,
    open: bool,
    inbound: VecDeque<u8>,
    written: StdVec<u8>,
    fail_writes: bool,
    closes: usize,
}

impl MockTransport {
    fn accepting() -> Self {
        let mut transport = Self::default();
        transport.connect_results.push_back(ConnectPoll::Established);
        transport
    }

    fn queue_connect(&mut self, result: ConnectPoll) {
        self.connect_results.push_back(result);
    }

    fn feed(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes.iter().copied());
    }

    fn written_text(&self) -> &str {
        core::str::from_utf8(&self.written).unwrap()
    }
}

impl Transport for MockTransport {
    type Error = ();

    fn begin_connect(&mut self, host: &str, port: u16) -> Result<(), Self::Error> {
        self.connect_calls.push((StdString::from(host), port));
        self.pending = Some(self.connect_results.pop_front().unwrap_or(ConnectPoll::Failed));
        Ok(())
    }

    fn poll_connect(&mut self) -> ConnectPoll {
        let result = self.pending.unwrap_or(ConnectPoll::Failed);
        if result == ConnectPoll::Established {
            self.open = true;
        }
        result
    }

    fn connected(&self) -> bool {
        self.open
    }

    fn available(&self) -> usize {
        self.inbound.len()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut count = 0;
        while count < buf.len() {
            let Some(byte) = self.inbound.pop_front() else {
                break;
            };
            buf[count] = byte;
            count += 1;
        }
        Ok(count)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(());
        }
        self.written.extend_from_slice(bytes);
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
        self.pending = None;
        self.closes += 1;
    }
}

fn endpoint(host: &str, port: u16, login: &str) -> Endpoint {
    Endpoint {
        host: String::try_from(host).unwrap(),
        port,
        login: String::try_from(login).unwrap(),
    }
}

fn dx_link() -> PeerLink {
    PeerLink::dx_cluster(Some(endpoint("dx.example.com", 7300, "N0CALL")))
}

fn poll_collect(link: &mut PeerLink, now: ClockTick, transport: &mut MockTransport) -> (LinkPoll, StdVec<StdString>) {
    let mut lines = StdVec::new();
    let outcome = link.poll(now, transport, |line| lines.push(StdString::from(line)));
    (outcome, lines)
}

#[test]
fn successful_connect_reaches_connected_in_one_pass() {
    let mut link = dx_link();
    let mut transport = MockTransport::accepting();

    assert_eq!(link.status(), LinkStatus::Disconnected);
    let (outcome, _) = poll_collect(&mut link, 0, &mut transport);

    assert_eq!(link.status(), LinkStatus::Connected);
    assert!(outcome.status_changed);
    assert_eq!(outcome.error, None);
    assert_eq!(transport.connect_calls, [(StdString::from("dx.example.com"), 7300)]);
}

#[test]
fn failed_connects_respect_backoff_window() {
    let mut link = dx_link();
    let mut transport = MockTransport::default();

    let (outcome, _) = poll_collect(&mut link, 0, &mut transport);
    assert_eq!(outcome.error, Some(LinkError::ConnectFailure));
    assert_eq!(link.status(), LinkStatus::Disconnected);
    assert_eq!(transport.connect_calls.len(), 1);

    for now in [10, 5_000, 19_999] {
        let (outcome, _) = poll_collect(&mut link, now, &mut transport);
        assert_eq!(outcome, LinkPoll::default());
    }
    assert_eq!(transport.connect_calls.len(), 1);

    let _ = poll_collect(&mut link, 20_000, &mut transport);
    assert_eq!(transport.connect_calls.len(), 2);
    assert_eq!(link.attempts(), 2);
}

#[test]
fn missing_endpoint_skips_without_touching_transport() {
    let mut link = PeerLink::aprs_is(None);
    let mut transport = MockTransport::accepting();

    let (outcome, _) = poll_collect(&mut link, 0, &mut transport);
    assert_eq!(outcome.error, Some(LinkError::ConfigMissing));
    assert!(transport.connect_calls.is_empty());
    assert_eq!(link.status(), LinkStatus::Disconnected);
}

#[test]
fn pending_connect_times_out_and_backs_off() {
    let mut link = dx_link();
    let mut transport = MockTransport::default();
    transport.queue_connect(ConnectPoll::Pending);

    let _ = poll_collect(&mut link, 0, &mut transport);
    assert_eq!(link.status(), LinkStatus::Connecting);

    let _ = poll_collect(&mut link, CONNECT_TIMEOUT_MS - 1, &mut transport);
    assert_eq!(link.status(), LinkStatus::Connecting);

    let (outcome, _) = poll_collect(&mut link, CONNECT_TIMEOUT_MS, &mut transport);
    assert_eq!(outcome.error, Some(LinkError::ConnectTimeout));
    assert_eq!(link.status(), LinkStatus::Disconnected);
    assert_eq!(transport.closes, 1);

    // Backoff counts from the attempt, not from the timeout.
    let _ = poll_collect(&mut link, RECONNECT_BACKOFF_MS - 1, &mut transport);
    assert_eq!(transport.connect_calls.len(), 1);
    let _ = poll_collect(&mut link, RECONNECT_BACKOFF_MS, &mut transport);
    assert_eq!(transport.connect_calls.len(), 2);
}

#[test]
fn login_is_sent_once_after_settle_delay() {
    let mut link = dx_link();
    let mut transport = MockTransport::accepting();

    let _ = poll_collect(&mut link, 100, &mut transport);
    let _ = poll_collect(&mut link, 100 + HANDSHAKE_SETTLE_MS - 1, &mut transport);
    assert!(transport.written.is_empty());

    let _ = poll_collect(&mut link, 100 + HANDSHAKE_SETTLE_MS, &mut transport);
    assert_eq!(transport.written_text(), "N0CALL\r\n");

    let _ = poll_collect(&mut link, 100 + HANDSHAKE_SETTLE_MS + 10, &mut transport);
    assert_eq!(transport.written_text(), "N0CALL\r\n");
}

#[test]
fn keepalive_follows_its_interval_while_connected() {
    let mut link = dx_link();
    let mut transport = MockTransport::accepting();

    let _ = poll_collect(&mut link, 0, &mut transport);
    let _ = poll_collect(&mut link, HANDSHAKE_SETTLE_MS, &mut transport);
    transport.written.clear();

    let _ = poll_collect(&mut link, DX_KEEPALIVE_INTERVAL_MS - 1, &mut transport);
    assert!(transport.written.is_empty());

    let _ = poll_collect(&mut link, DX_KEEPALIVE_INTERVAL_MS, &mut transport);
    assert_eq!(transport.written, b"\r\n");

    let _ = poll_collect(&mut link, DX_KEEPALIVE_INTERVAL_MS + 1_000, &mut transport);
    assert_eq!(transport.written, b"\r\n");
}

#[test]
fn aprs_link_sends_no_keepalive() {
    let mut link = PeerLink::aprs_is(Some(endpoint("rotate.aprs2.net", 14580, "user N0CALL")));
    let mut transport = MockTransport::accepting();

    let _ = poll_collect(&mut link, 0, &mut transport);
    let _ = poll_collect(&mut link, HANDSHAKE_SETTLE_MS, &mut transport);
    transport.written.clear();

    let _ = poll_collect(&mut link, 10 * DX_KEEPALIVE_INTERVAL_MS, &mut transport);
    assert!(transport.written.is_empty());
}

#[test]
fn partial_line_is_buffered_across_passes() {
    let mut link = dx_link();
    let mut transport = MockTransport::accepting();
    let _ = poll_collect(&mut link, 0, &mut transport);

    transport.feed(b"WX9XYZ DE ");
    let (_, lines) = poll_collect(&mut link, 10, &mut transport);
    assert!(lines.is_empty());

    transport.feed(b"N0CALL");
    let (_, lines) = poll_collect(&mut link, 20, &mut transport);
    assert!(lines.is_empty());

    transport.feed(b"\r\n");
    let (outcome, lines) = poll_collect(&mut link, 30, &mut transport);
    assert_eq!(lines, ["WX9XYZ DE N0CALL"]);
    assert_eq!(outcome.lines, 1);
}

#[test]
fn drain_is_bounded_per_pass() {
    let mut link = dx_link();
    let mut transport = MockTransport::accepting();
    let _ = poll_collect(&mut link, 0, &mut transport);

    let mut flood = StdVec::new();
    for _ in 0..100 {
        flood.extend_from_slice(b"DX de N0CALL:  14074.0  W1AW  FT8\r\n");
    }
    transport.feed(&flood);

    let _ = poll_collect(&mut link, 10, &mut transport);
    assert_eq!(transport.available(), flood.len() - DRAIN_BUDGET_BYTES);
}

#[test]
fn peer_close_disconnects_without_same_pass_reconnect() {
    let mut link = dx_link();
    let mut transport = MockTransport::accepting();
    transport.queue_connect(ConnectPoll::Established);

    let _ = poll_collect(&mut link, 0, &mut transport);
    transport.open = false;

    let (outcome, _) = poll_collect(&mut link, 25_000, &mut transport);
    assert_eq!(outcome.error, Some(LinkError::UnexpectedDisconnect));
    assert!(outcome.status_changed);
    assert_eq!(link.status(), LinkStatus::Disconnected);
    assert_eq!(transport.connect_calls.len(), 1);

    let _ = poll_collect(&mut link, 25_010, &mut transport);
    assert_eq!(transport.connect_calls.len(), 2);
    assert_eq!(link.status(), LinkStatus::Connected);
}

#[test]
fn write_failure_drops_connection() {
    let mut link = dx_link();
    let mut transport = MockTransport::accepting();
    let _ = poll_collect(&mut link, 0, &mut transport);

    transport.fail_writes = true;
    let (outcome, _) = poll_collect(&mut link, HANDSHAKE_SETTLE_MS, &mut transport);
    assert_eq!(outcome.error, Some(LinkError::UnexpectedDisconnect));
    assert_eq!(link.status(), LinkStatus::Disconnected);
    assert_eq!(transport.closes, 1);
}

#[test]
fn overlong_peer_line_is_counted_not_delivered() {
    let mut link = dx_link();
    let mut transport = MockTransport::accepting();
    let _ = poll_collect(&mut link, 0, &mut transport);

    let mut long = StdVec::from(&[b'x'; LINE_BYTES + 10][..]);
    long.extend_from_slice(b"\r\nDX de W1AW\r\n");
    transport.feed(&long);

    let (_, lines) = poll_collect(&mut link, 10, &mut transport);
    assert_eq!(lines, ["DX de W1AW"]);
    assert_eq!(link.dropped_lines(), 1);
}

#[test]
fn capacity_sized_line_with_crlf_is_delivered() {
    let mut link = dx_link();
    let mut transport = MockTransport::accepting();
    let _ = poll_collect(&mut link, 0, &mut transport);

    let mut exact = StdVec::from(&[b'y'; LINE_BYTES][..]);
    exact.extend_from_slice(b"\r\n");
    transport.feed(&exact);

    let (_, lines) = poll_collect(&mut link, 10, &mut transport);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].len(), LINE_BYTES);
    assert_eq!(link.dropped_lines(), 0);
}
