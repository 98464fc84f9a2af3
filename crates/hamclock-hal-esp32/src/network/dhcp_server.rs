use embassy_net::{
    IpAddress, IpEndpoint, Stack,
    udp::{PacketMetadata, UdpSocket},
};
use embassy_time::Timer;
use hamclock_core::dhcp::{CLIENT_PORT, DhcpServer, REPLY_BYTES, SERVER_PORT};
use log::{debug, info, warn};

const DATAGRAM_BYTES: usize = 576;
const BIND_RETRY_SECS: u64 = 5;

/// Answers DHCP clients on the setup access point stack.
///
/// Replies go to the limited broadcast address: a joining station has no
/// address yet to unicast to.
pub async fn run_dhcp_server(stack: Stack<'_>, mut server: DhcpServer) -> ! {
    let mut rx_meta = [PacketMetadata::EMPTY; 4];
    let mut rx_buffer = [0u8; DATAGRAM_BYTES * 2];
    let mut tx_meta = [PacketMetadata::EMPTY; 4];
    let mut tx_buffer = [0u8; DATAGRAM_BYTES * 2];
    let mut request = [0u8; DATAGRAM_BYTES];
    let mut reply = [0u8; REPLY_BYTES];

    let mut socket = UdpSocket::new(
        stack,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );
    while let Err(err) = socket.bind(SERVER_PORT) {
        warn!("dhcp: bind failed err={:?}", err);
        Timer::after_secs(BIND_RETRY_SECS).await;
    }
    info!("dhcp: serving leases from {}", server.address());

    let broadcast = IpEndpoint::new(IpAddress::v4(255, 255, 255, 255), CLIENT_PORT);
    loop {
        let n = match socket.recv_from(&mut request).await {
            Ok((n, _)) => n,
            Err(err) => {
                debug!("dhcp: receive failed err={:?}", err);
                continue;
            }
        };

        let Some(len) = server.handle(&request[..n], &mut reply) else {
            continue;
        };
        if let Err(err) = socket.send_to(&reply[..len], broadcast).await {
            warn!("dhcp: reply failed err={:?}", err);
        } else {
            debug!("dhcp: replied leases_in_use={}", server.leases_in_use());
        }
    }
}
