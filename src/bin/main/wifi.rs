use embassy_net::Stack;
use embassy_time::{Duration, Timer, WithTimeout};
use esp_radio::wifi::{AccessPointConfig, AuthMethod, ClientConfig, ModeConfig, WifiController};
use hamclock_core::config::WifiCredentials;
use hamclock_hal_esp32::network::{ConnectivityHandle, SETUP_AP_PASSWORD, SETUP_AP_SSID};
use log::{info, warn};

const WIFI_RETRY_BACKOFF_MIN_SECS: u64 = 2;
const WIFI_RETRY_BACKOFF_MAX_SECS: u64 = 120;
const NETWORK_POLL_INTERVAL_MS: u64 = 500;
const DHCP_TIMEOUT_SECS: u64 = 15;
const UNCONFIGURED_POLL_SECS: u64 = 60;

fn wifi_retry_backoff_secs(consecutive_failures: u32) -> u64 {
    // 2, 4, 8, 16, 32, 64, 120, 120, ...
    let shift = consecutive_failures.min(6);
    WIFI_RETRY_BACKOFF_MIN_SECS
        .saturating_mul(1u64 << shift)
        .min(WIFI_RETRY_BACKOFF_MAX_SECS)
}

async fn wait_before_wifi_retry(consecutive_failures: &mut u32) {
    let delay_secs = wifi_retry_backoff_secs(*consecutive_failures);
    *consecutive_failures = consecutive_failures.saturating_add(1);
    info!(
        "wifi: retrying in {}s consecutive_failures={}",
        delay_secs, *consecutive_failures
    );
    Timer::after_secs(delay_secs).await;
}

fn setup_access_point() -> AccessPointConfig {
    AccessPointConfig::default()
        .with_ssid(SETUP_AP_SSID.into())
        .with_password(SETUP_AP_PASSWORD.into())
        .with_auth_method(AuthMethod::Wpa2Personal)
}

fn mode_config(credentials: WifiCredentials<'_>, access_point: bool) -> ModeConfig {
    let client = ClientConfig::default()
        .with_ssid(credentials.ssid.into())
        .with_password(credentials.password.into());
    if access_point {
        ModeConfig::ApSta(client, setup_access_point())
    } else {
        ModeConfig::Client(client)
    }
}

/// Applies `mode` and makes sure the radio runs. `restart` stops the
/// controller first; the interface set only changes across a restart.
async fn start_mode(controller: &mut WifiController<'_>, mode: &ModeConfig, restart: bool) -> bool {
    if restart && matches!(controller.is_started(), Ok(true)) {
        let _ = controller.stop_async().await;
    }

    if let Err(err) = controller.set_config(mode) {
        warn!("wifi: mode config failed err={:?}", err);
        return false;
    }

    if !controller.is_started().unwrap_or(false)
        && let Err(err) = controller.start_async().await
    {
        warn!("wifi: start failed err={:?}", err);
        return false;
    }
    true
}

/// Runs the setup access point alone; never returns.
async fn serve_setup_only(
    controller: &mut WifiController<'_>,
    connectivity: &'static ConnectivityHandle,
) -> ! {
    let mode = ModeConfig::AccessPoint(setup_access_point());
    while !start_mode(controller, &mode, false).await {
        Timer::after_secs(WIFI_RETRY_BACKOFF_MAX_SECS).await;
    }
    connectivity.mark_access_point(true);
    info!("wifi: setup access point up ssid={}", SETUP_AP_SSID);

    loop {
        Timer::after_secs(UNCONFIGURED_POLL_SECS).await;
    }
}

/// Keeps the station associated, rotating through `candidates` after each
/// failed attempt. Once every candidate has failed in a row the setup
/// access point is raised next to the station and stays up; station
/// retries continue behind it.
pub(super) async fn wifi_connection_loop(
    controller: &mut WifiController<'_>,
    stack: Stack<'_>,
    connectivity: &'static ConnectivityHandle,
    candidates: &[WifiCredentials<'_>],
) -> ! {
    if candidates.is_empty() {
        warn!("wifi: no station configured; raising setup access point");
        connectivity.mark_disconnected();
        serve_setup_only(controller, connectivity).await
    }

    let mut consecutive_failures = 0u32;
    let mut slot = 0usize;
    let mut access_point = false;
    let mut access_point_applied = false;

    loop {
        let credentials = candidates[slot];
        let rotate = |slot: usize| (slot + 1) % candidates.len();

        if !access_point && consecutive_failures >= candidates.len() as u32 {
            info!(
                "wifi: no station reachable; raising setup access point ssid={}",
                SETUP_AP_SSID
            );
            access_point = true;
        }

        connectivity.mark_connecting(slot as u8);

        let mode = mode_config(credentials, access_point);
        let restart = access_point != access_point_applied;
        if !start_mode(controller, &mode, restart).await {
            connectivity.mark_disconnected();
            slot = rotate(slot);
            wait_before_wifi_retry(&mut consecutive_failures).await;
            continue;
        }
        access_point_applied = access_point;
        connectivity.mark_access_point(access_point);

        info!("wifi: connecting ssid={} slot={}", credentials.ssid, slot);
        if let Err(err) = controller.connect_async().await {
            warn!("wifi: connect failed ssid={} err={:?}", credentials.ssid, err);
            connectivity.mark_disconnected();
            let _ = controller.disconnect_async().await;
            slot = rotate(slot);
            wait_before_wifi_retry(&mut consecutive_failures).await;
            continue;
        }

        match stack
            .wait_config_up()
            .with_timeout(Duration::from_secs(DHCP_TIMEOUT_SECS))
            .await
        {
            Ok(()) => {
                let ipv4 = stack.config_v4().map(|config| config.address.address());
                connectivity.update_link_ip(stack.is_link_up(), ipv4);
                info!("wifi: connected ssid={} ip={:?}", credentials.ssid, ipv4);
            }
            Err(_) => {
                warn!("wifi: dhcp timeout; forcing reconnect");
                connectivity.update_link_ip(stack.is_link_up(), None);
                let _ = controller.disconnect_async().await;
                slot = rotate(slot);
                wait_before_wifi_retry(&mut consecutive_failures).await;
                continue;
            }
        }

        consecutive_failures = 0;

        loop {
            let link_up = stack.is_link_up();
            let ipv4 = stack.config_v4().map(|config| config.address.address());
            let is_connected = matches!(controller.is_connected(), Ok(true));

            connectivity.update_link_ip(link_up, ipv4);
            if let Ok(rssi) = controller.rssi() {
                connectivity.update_rssi(rssi.clamp(i8::MIN as i32, 0) as i8);
            }

            if !(link_up && ipv4.is_some() && is_connected) {
                info!(
                    "wifi: state lost link_up={} has_ipv4={} connected={}; reconnecting",
                    link_up,
                    ipv4.is_some(),
                    is_connected
                );
                break;
            }

            Timer::after_millis(NETWORK_POLL_INTERVAL_MS).await;
        }

        connectivity.mark_disconnected();
        let _ = controller.disconnect_async().await;
        wait_before_wifi_retry(&mut consecutive_failures).await;
    }
}
