//! DHCPv4 responder for the setup access point.
//!
//! Hands a small fixed pool of addresses to stations that join the setup
//! network so a phone or laptop can reach the configuration API without
//! manual addressing. Only DISCOVER, REQUEST and RELEASE are answered;
//! relays, options overload and renewals through other servers are ignored.

use core::net::Ipv4Addr;

pub const SERVER_PORT: u16 = 67;
pub const CLIENT_PORT: u16 = 68;
pub const LEASE_SECS: u32 = 3_600;
/// Replies are padded to the BOOTP minimum.
pub const REPLY_BYTES: usize = 300;

pub const POOL_SIZE: usize = 8;
/// Host part of the first leased address; the server keeps `.1`.
const POOL_FIRST_HOST: u8 = 2;
const SUBNET_MASK: [u8; 4] = [255, 255, 255, 0];

const BOOTREQUEST: u8 = 1;
const BOOTREPLY: u8 = 2;
const HTYPE_ETHERNET: u8 = 1;
const HLEN_ETHERNET: u8 = 6;
const MAGIC_COOKIE: [u8; 4] = [99, 130, 83, 99];
/// op through file, before the magic cookie.
const FIXED_BYTES: usize = 236;
const OPTIONS_START: usize = FIXED_BYTES + MAGIC_COOKIE.len();

const OPT_PAD: u8 = 0;
const OPT_SUBNET_MASK: u8 = 1;
const OPT_ROUTER: u8 = 3;
const OPT_REQUESTED_IP: u8 = 50;
const OPT_LEASE_TIME: u8 = 51;
const OPT_MESSAGE_TYPE: u8 = 53;
const OPT_SERVER_ID: u8 = 54;
const OPT_END: u8 = 255;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum MessageType {
    Discover = 1,
    Offer = 2,
    Request = 3,
    Decline = 4,
    Ack = 5,
    Nak = 6,
    Release = 7,
    Inform = 8,
}

impl MessageType {
    fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            1 => Self::Discover,
            2 => Self::Offer,
            3 => Self::Request,
            4 => Self::Decline,
            5 => Self::Ack,
            6 => Self::Nak,
            7 => Self::Release,
            8 => Self::Inform,
            _ => return None,
        })
    }
}

/// Client fields a reply is built from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct ClientRequest {
    kind: MessageType,
    xid: [u8; 4],
    flags: [u8; 2],
    ciaddr: Ipv4Addr,
    mac: [u8; 6],
    requested: Option<Ipv4Addr>,
    server_id: Option<Ipv4Addr>,
}

fn ipv4_at(bytes: &[u8], at: usize) -> Ipv4Addr {
    Ipv4Addr::new(bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3])
}

fn parse(packet: &[u8]) -> Option<ClientRequest> {
    if packet.len() < OPTIONS_START
        || packet[0] != BOOTREQUEST
        || packet[1] != HTYPE_ETHERNET
        || packet[2] != HLEN_ETHERNET
        || packet[FIXED_BYTES..OPTIONS_START] != MAGIC_COOKIE
    {
        return None;
    }

    let mut kind = None;
    let mut requested = None;
    let mut server_id = None;

    let mut at = OPTIONS_START;
    while at < packet.len() {
        let code = packet[at];
        if code == OPT_PAD {
            at += 1;
            continue;
        }
        if code == OPT_END {
            break;
        }
        let len = usize::from(*packet.get(at + 1)?);
        let value = packet.get(at + 2..at + 2 + len)?;
        match (code, len) {
            (OPT_MESSAGE_TYPE, 1) => kind = MessageType::from_raw(value[0]),
            (OPT_REQUESTED_IP, 4) => requested = Some(ipv4_at(value, 0)),
            (OPT_SERVER_ID, 4) => server_id = Some(ipv4_at(value, 0)),
            _ => {}
        }
        at += 2 + len;
    }

    let mut mac = [0u8; 6];
    mac.copy_from_slice(&packet[28..34]);

    Some(ClientRequest {
        kind: kind?,
        xid: [packet[4], packet[5], packet[6], packet[7]],
        flags: [packet[10], packet[11]],
        ciaddr: ipv4_at(packet, 12),
        mac,
        requested,
        server_id,
    })
}

/// Lease table keyed by client hardware address.
#[derive(Debug)]
pub struct DhcpServer {
    address: Ipv4Addr,
    leases: [Option<[u8; 6]>; POOL_SIZE],
}

impl DhcpServer {
    /// `address` is the server's own address on a /24 network.
    pub const fn new(address: Ipv4Addr) -> Self {
        Self {
            address,
            leases: [None; POOL_SIZE],
        }
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn leases_in_use(&self) -> usize {
        self.leases.iter().filter(|lease| lease.is_some()).count()
    }

    /// Handles one client datagram and writes the reply into `out`.
    ///
    /// Returns the reply length, or `None` when nothing should be sent.
    pub fn handle(&mut self, packet: &[u8], out: &mut [u8]) -> Option<usize> {
        if out.len() < REPLY_BYTES {
            return None;
        }
        let request = parse(packet)?;

        match request.kind {
            MessageType::Discover => {
                let offered = self.lease_for(request.mac)?;
                Some(self.reply(&request, MessageType::Offer, offered, out))
            }
            MessageType::Request => {
                if request.server_id.is_some_and(|id| id != self.address) {
                    // The client picked another server's offer.
                    self.release(request.mac);
                    return None;
                }
                let wanted = request
                    .requested
                    .or((!request.ciaddr.is_unspecified()).then_some(request.ciaddr));
                match (self.lease_for(request.mac), wanted) {
                    (Some(leased), wanted) if wanted.is_none_or(|wanted| wanted == leased) => {
                        Some(self.reply(&request, MessageType::Ack, leased, out))
                    }
                    _ => {
                        let unspecified = Ipv4Addr::UNSPECIFIED;
                        Some(self.reply(&request, MessageType::Nak, unspecified, out))
                    }
                }
            }
            MessageType::Release | MessageType::Decline => {
                self.release(request.mac);
                None
            }
            _ => None,
        }
    }

    fn pool_address(&self, slot: usize) -> Ipv4Addr {
        let [a, b, c, _] = self.address.octets();
        Ipv4Addr::new(a, b, c, POOL_FIRST_HOST + slot as u8)
    }

    /// Existing lease for `mac`, or a fresh one from the pool.
    fn lease_for(&mut self, mac: [u8; 6]) -> Option<Ipv4Addr> {
        let slot = match self.leases.iter().position(|lease| *lease == Some(mac)) {
            Some(slot) => slot,
            None => {
                let slot = self.leases.iter().position(Option::is_none)?;
                self.leases[slot] = Some(mac);
                slot
            }
        };
        Some(self.pool_address(slot))
    }

    fn release(&mut self, mac: [u8; 6]) {
        for lease in self.leases.iter_mut() {
            if *lease == Some(mac) {
                *lease = None;
            }
        }
    }

    fn reply(
        &self,
        request: &ClientRequest,
        kind: MessageType,
        yiaddr: Ipv4Addr,
        out: &mut [u8],
    ) -> usize {
        let out = &mut out[..REPLY_BYTES];
        out.fill(0);

        out[0] = BOOTREPLY;
        out[1] = HTYPE_ETHERNET;
        out[2] = HLEN_ETHERNET;
        out[4..8].copy_from_slice(&request.xid);
        out[10..12].copy_from_slice(&request.flags);
        out[16..20].copy_from_slice(&yiaddr.octets());
        out[20..24].copy_from_slice(&self.address.octets());
        out[28..34].copy_from_slice(&request.mac);
        out[FIXED_BYTES..OPTIONS_START].copy_from_slice(&MAGIC_COOKIE);

        let mut options = OptionWriter {
            buf: out,
            at: OPTIONS_START,
        };
        options.put(OPT_MESSAGE_TYPE, &[kind as u8]);
        options.put(OPT_SERVER_ID, &self.address.octets());
        if kind != MessageType::Nak {
            options.put(OPT_LEASE_TIME, &LEASE_SECS.to_be_bytes());
            options.put(OPT_SUBNET_MASK, &SUBNET_MASK);
            options.put(OPT_ROUTER, &self.address.octets());
        }
        options.end();

        REPLY_BYTES
    }
}

struct OptionWriter<'a> {
    buf: &'a mut [u8],
    at: usize,
}

impl OptionWriter<'_> {
    fn put(&mut self, code: u8, value: &[u8]) {
        self.buf[self.at] = code;
        self.buf[self.at + 1] = value.len() as u8;
        self.buf[self.at + 2..self.at + 2 + value.len()].copy_from_slice(value);
        self.at += 2 + value.len();
    }

    fn end(&mut self) {
        self.buf[self.at] = OPT_END;
        self.at += 1;
    }
}
