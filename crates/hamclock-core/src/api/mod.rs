//! JSON configuration and status API.
//!
//! Routes:
//! - `GET /api/config`: current configuration without secrets
//! - `POST /api/config`: partial update; persisted by the caller, then restart
//! - `GET /api/status`: uptime, Wi-Fi link, peer links, current screen
//! - `POST /api/screen`: `{"screen": n}` selects a screen without restart

pub mod http;

use alloc::string::String;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    config::{FieldTooLong, HamConfig, assign},
    error::ApiError,
    screen::ScreenMailbox,
    status::StatusSnapshot,
};

pub use http::{MAX_REQUEST_BYTES, Method, Request, parse_request, response_head};

pub const CONTENT_JSON: &str = "application/json";
pub const CONTENT_TEXT: &str = "text/plain";
pub const CONTENT_HTML: &str = "text/html";

const SAVED_MESSAGE: &str = "Configuration saved. Restarting...";

const INDEX_HTML: &str = "<!doctype html><html><head><title>HAM Clock</title></head><body>\
<h1>HAM Clock</h1><p><a href=\"/api/config\">/api/config</a> \
<a href=\"/api/status\">/api/status</a></p></body></html>";

/// Network facts the scheduler does not own.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NetworkStatus<'a> {
    pub wifi_connected: bool,
    pub wifi_rssi: i8,
    pub ip: &'a str,
}

/// Everything a request may read or write.
pub struct ApiContext<'a> {
    pub config: &'a HamConfig,
    pub network: NetworkStatus<'a>,
    pub status: StatusSnapshot,
    pub mailbox: &'a ScreenMailbox,
}

/// Follow-up the server must perform after sending the response.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ApiAction {
    None,
    SaveAndRestart(HamConfig),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    pub action: ApiAction,
}

impl ApiResponse {
    fn ok(content_type: &'static str, body: String) -> Self {
        Self {
            status: 200,
            content_type,
            body,
            action: ApiAction::None,
        }
    }

    pub fn error(error: ApiError) -> Self {
        Self {
            status: error.status(),
            content_type: CONTENT_TEXT,
            body: String::from(error.message()),
            action: ApiAction::None,
        }
    }
}

#[derive(Serialize)]
struct ConfigView<'a> {
    wifi_ssid: &'a str,
    wifi_ssid2: &'a str,
    dx_host: &'a str,
    dx_port: u16,
    callsign: &'a str,
    locator: &'a str,
    brightness: u8,
    language: &'a str,
    rotation: u8,
    aprs_host: &'a str,
    aprs_port: u16,
    aprs_filter: &'a str,
}

#[derive(Serialize)]
struct StatusView<'a> {
    uptime: u32,
    wifi_connected: bool,
    wifi_rssi: i8,
    ip: &'a str,
    dx_connected: bool,
    aprs_connected: bool,
    screen: u8,
}

/// Partial update; absent keys keep their value, unknown keys are ignored.
#[derive(Deserialize, Default, Debug)]
#[serde(default)]
struct ConfigPatch {
    wifi_ssid: Option<String>,
    wifi_password: Option<String>,
    wifi_ssid2: Option<String>,
    wifi_password2: Option<String>,
    dx_host: Option<String>,
    dx_port: Option<u16>,
    callsign: Option<String>,
    locator: Option<String>,
    ow_key: Option<String>,
    qrz_key: Option<String>,
    brightness: Option<u8>,
    language: Option<String>,
    rotation: Option<u8>,
    aprs_host: Option<String>,
    aprs_port: Option<u16>,
    aprs_filter: Option<String>,
}

#[derive(Deserialize, Serialize)]
struct ScreenSelect {
    screen: u8,
}

/// Dispatches one parsed request.
pub fn handle(request: &Request<'_>, ctx: &ApiContext<'_>) -> ApiResponse {
    let result = match (request.path, request.method) {
        ("/", Method::Get) | ("/index.html", Method::Get) => {
            Ok(ApiResponse::ok(CONTENT_HTML, String::from(INDEX_HTML)))
        }
        ("/api/config", Method::Get) => config_view(ctx.config),
        ("/api/config", Method::Post) => update_config(ctx.config, request.body),
        ("/api/status", Method::Get) => status_view(ctx),
        ("/api/screen", Method::Post) => select_screen(ctx.mailbox, request.body),
        ("/", _) | ("/index.html", _) | ("/api/config", _) | ("/api/status", _)
        | ("/api/screen", _) => Err(ApiError::MethodNotAllowed),
        _ => Err(ApiError::NotFound),
    };

    result.unwrap_or_else(|err| {
        warn!("api: {} {} rejected err={:?}", method_str(request.method), request.path, err);
        ApiResponse::error(err)
    })
}

fn config_view(config: &HamConfig) -> Result<ApiResponse, ApiError> {
    let view = ConfigView {
        wifi_ssid: &config.wifi_ssid,
        wifi_ssid2: &config.wifi_ssid2,
        dx_host: &config.dx_host,
        dx_port: config.dx_port,
        callsign: &config.callsign,
        locator: &config.locator,
        brightness: config.brightness,
        language: &config.language,
        rotation: config.rotation,
        aprs_host: &config.aprs_host,
        aprs_port: config.aprs_port,
        aprs_filter: &config.aprs_filter,
    };
    let body = serde_json::to_string(&view).map_err(|_| ApiError::InvalidJson)?;
    Ok(ApiResponse::ok(CONTENT_JSON, body))
}

fn update_config(current: &HamConfig, body: &[u8]) -> Result<ApiResponse, ApiError> {
    let patch: ConfigPatch = serde_json::from_slice(body).map_err(|_| ApiError::InvalidJson)?;

    let mut next = current.clone();
    apply_patch(&mut next, patch).map_err(|FieldTooLong(field)| {
        warn!("api: value too long field={}", field);
        ApiError::ValueTooLong
    })?;

    info!("api: configuration updated; restart scheduled");
    Ok(ApiResponse {
        status: 200,
        content_type: CONTENT_TEXT,
        body: String::from(SAVED_MESSAGE),
        action: ApiAction::SaveAndRestart(next),
    })
}

fn apply_patch(config: &mut HamConfig, patch: ConfigPatch) -> Result<(), FieldTooLong> {
    if let Some(value) = patch.wifi_ssid {
        assign(&mut config.wifi_ssid, "wifi_ssid", &value)?;
    }
    if let Some(value) = patch.wifi_password {
        assign(&mut config.wifi_password, "wifi_password", &value)?;
    }
    if let Some(value) = patch.wifi_ssid2 {
        assign(&mut config.wifi_ssid2, "wifi_ssid2", &value)?;
    }
    if let Some(value) = patch.wifi_password2 {
        assign(&mut config.wifi_password2, "wifi_password2", &value)?;
    }
    if let Some(value) = patch.dx_host {
        assign(&mut config.dx_host, "dx_host", &value)?;
    }
    if let Some(value) = patch.dx_port {
        config.dx_port = value;
    }
    if let Some(value) = patch.callsign {
        assign(&mut config.callsign, "callsign", &value)?;
    }
    if let Some(value) = patch.locator {
        assign(&mut config.locator, "locator", &value)?;
    }
    if let Some(value) = patch.ow_key {
        assign(&mut config.ow_key, "ow_key", &value)?;
    }
    if let Some(value) = patch.qrz_key {
        assign(&mut config.qrz_key, "qrz_key", &value)?;
    }
    if let Some(value) = patch.brightness {
        config.brightness = value;
    }
    if let Some(value) = patch.language {
        assign(&mut config.language, "language", &value)?;
    }
    if let Some(value) = patch.rotation {
        config.rotation = value % 4;
    }
    if let Some(value) = patch.aprs_host {
        assign(&mut config.aprs_host, "aprs_host", &value)?;
    }
    if let Some(value) = patch.aprs_port {
        config.aprs_port = value;
    }
    if let Some(value) = patch.aprs_filter {
        assign(&mut config.aprs_filter, "aprs_filter", &value)?;
    }
    Ok(())
}

fn status_view(ctx: &ApiContext<'_>) -> Result<ApiResponse, ApiError> {
    let view = StatusView {
        uptime: ctx.status.uptime_s,
        wifi_connected: ctx.network.wifi_connected,
        wifi_rssi: ctx.network.wifi_rssi,
        ip: ctx.network.ip,
        dx_connected: ctx.status.dx.is_connected(),
        aprs_connected: ctx.status.aprs.is_connected(),
        screen: ctx.status.screen.index(),
    };
    let body = serde_json::to_string(&view).map_err(|_| ApiError::InvalidJson)?;
    Ok(ApiResponse::ok(CONTENT_JSON, body))
}

fn select_screen(mailbox: &ScreenMailbox, body: &[u8]) -> Result<ApiResponse, ApiError> {
    let request: ScreenSelect = serde_json::from_slice(body).map_err(|_| ApiError::InvalidJson)?;
    let screen = mailbox
        .post_index(request.screen)
        .ok_or(ApiError::InvalidScreen)?;

    let body = serde_json::to_string(&ScreenSelect {
        screen: screen.index(),
    })
    .map_err(|_| ApiError::InvalidJson)?;
    Ok(ApiResponse::ok(CONTENT_JSON, body))
}

const fn method_str(method: Method) -> &'static str {
    match method {
        Method::Get => "GET",
        Method::Post => "POST",
        Method::Other => "OTHER",
    }
}
