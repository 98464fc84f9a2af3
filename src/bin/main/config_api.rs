use core::cell::RefCell;

use embassy_net::{Stack, tcp::TcpSocket};
use embassy_time::{Duration, Timer};
use hamclock_core::{
    api::{
        self, ApiAction, ApiContext, ApiResponse, MAX_REQUEST_BYTES, NetworkStatus,
        parse_request, response_head,
    },
    config::{ConfigStore, HamConfig},
    error::ApiError,
    screen::ScreenMailbox,
    status::StatusBoard,
};
use hamclock_hal_esp32::{network::ConnectivityHandle, storage::flash_config::FlashConfigStore};
use log::{info, warn};

const HTTP_PORT: u16 = 80;
const REQUEST_TIMEOUT_SECS: u64 = 5;
const ACCEPT_RETRY_MS: u64 = 500;
const RESTART_DELAY_MS: u64 = 1_000;
const RX_BUFFER_BYTES: usize = 1_024;
const TX_BUFFER_BYTES: usize = 2_048;

/// State every API listener reads; the store is shared between the station
/// and setup access point listeners.
#[derive(Clone, Copy)]
pub(super) struct ApiShared<'a> {
    pub config: &'static HamConfig,
    pub connectivity: &'static ConnectivityHandle,
    pub status: &'static StatusBoard,
    pub mailbox: &'static ScreenMailbox,
    pub store: &'a RefCell<Option<FlashConfigStore>>,
}

/// Serves the JSON API on port 80 of `stack`, one connection at a time. A
/// successful configuration write is persisted, answered, then followed by
/// a restart.
pub(super) async fn config_api_loop(
    stack: Stack<'_>,
    shared: ApiShared<'_>,
    interface: &'static str,
) -> ! {
    let mut rx_buffer = [0u8; RX_BUFFER_BYTES];
    let mut tx_buffer = [0u8; TX_BUFFER_BYTES];
    let mut request = [0u8; MAX_REQUEST_BYTES];

    info!("api: listening interface={} port={}", interface, HTTP_PORT);

    loop {
        let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
        socket.set_timeout(Some(Duration::from_secs(REQUEST_TIMEOUT_SECS)));

        if let Err(err) = socket.accept(HTTP_PORT).await {
            warn!("api: accept failed interface={} err={:?}", interface, err);
            Timer::after_millis(ACCEPT_RETRY_MS).await;
            continue;
        }

        let Some(mut response) = read_request(&mut socket, &mut request, &shared).await else {
            socket.abort();
            continue;
        };

        let saved = match &response.action {
            ApiAction::SaveAndRestart(next) => Some(persist(shared.store, next)),
            ApiAction::None => None,
        };
        let restart = match saved {
            Some(Ok(())) => true,
            Some(Err(message)) => {
                response = ApiResponse {
                    status: 500,
                    content_type: api::CONTENT_TEXT,
                    body: message.into(),
                    action: ApiAction::None,
                };
                false
            }
            None => false,
        };

        if let Err(err) = send_response(&mut socket, &response).await {
            warn!("api: response write failed err={:?}", err);
        }
        socket.close();
        let _ = socket.flush().await;
        socket.abort();

        if restart {
            info!("api: configuration saved; restarting");
            Timer::after_millis(RESTART_DELAY_MS).await;
            esp_hal::system::software_reset();
        }
    }
}

fn persist(
    store: &RefCell<Option<FlashConfigStore>>,
    next: &HamConfig,
) -> Result<(), &'static str> {
    let Ok(mut store) = store.try_borrow_mut() else {
        warn!("api: configuration storage busy");
        return Err("Configuration storage busy");
    };
    let Some(store) = store.as_mut() else {
        warn!("api: configuration storage unavailable");
        return Err("Configuration storage unavailable");
    };
    store.save(next).map_err(|err| {
        warn!("api: configuration save failed err={:?}", err);
        "Configuration save failed"
    })
}

/// Reads until a full request is buffered; `None` when the client left.
async fn read_request(
    socket: &mut TcpSocket<'_>,
    buf: &mut [u8; MAX_REQUEST_BYTES],
    shared: &ApiShared<'_>,
) -> Option<ApiResponse> {
    let mut filled = 0usize;

    loop {
        if filled == buf.len() {
            return Some(ApiResponse::error(ApiError::PayloadTooLarge));
        }

        let n = match socket.read(&mut buf[filled..]).await {
            Ok(0) => return None,
            Ok(n) => n,
            Err(err) => {
                warn!("api: request read failed err={:?}", err);
                return None;
            }
        };
        filled += n;

        match parse_request(&buf[..filled]) {
            Ok(Some(request)) => {
                let network = shared.connectivity.snapshot();
                let ip = network.ip_text();
                let ctx = ApiContext {
                    config: shared.config,
                    network: NetworkStatus {
                        wifi_connected: network.is_online(),
                        wifi_rssi: network.rssi,
                        ip: &ip,
                    },
                    status: shared.status.snapshot(),
                    mailbox: shared.mailbox,
                };
                return Some(api::handle(&request, &ctx));
            }
            Ok(None) => {}
            Err(err) => return Some(ApiResponse::error(err)),
        }
    }
}

async fn send_response(
    socket: &mut TcpSocket<'_>,
    response: &ApiResponse,
) -> Result<(), embassy_net::tcp::Error> {
    let Some(head) = response_head(response.status, response.content_type, response.body.len())
    else {
        return Ok(());
    };
    write_all(socket, head.as_bytes()).await?;
    write_all(socket, response.body.as_bytes()).await
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
    Ok(())
}
