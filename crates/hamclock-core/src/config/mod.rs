//! Device configuration and its persistence seam.

mod record;

pub use record::{RECORD_MAX_BYTES, decode_record, encode_record, is_erased};

use heapless::{String, Vec};

use crate::link::{Endpoint, aprs};

pub const SSID_BYTES: usize = 32;
pub const PASSWORD_BYTES: usize = 64;
pub const HOST_BYTES: usize = crate::link::HOST_BYTES;
pub const CALLSIGN_BYTES: usize = 16;
pub const LOCATOR_BYTES: usize = 8;
pub const KEY_BYTES: usize = 48;
pub const LANGUAGE_BYTES: usize = 4;
pub const FILTER_BYTES: usize = 64;

pub const DEFAULT_DX_PORT: u16 = 7300;
pub const DEFAULT_APRS_PORT: u16 = 14580;
pub const DEFAULT_BRIGHTNESS: u8 = 128;
pub const DEFAULT_ROTATION: u8 = 1;
pub const DEFAULT_LANGUAGE: &str = "EN";

/// A string value did not fit its field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FieldTooLong(pub &'static str);

/// Everything the firmware reads from persistent storage at boot.
///
/// Wi-Fi credentials and peer endpoints are only read at boot; a change is
/// applied by saving and restarting.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HamConfig {
    pub wifi_ssid: String<SSID_BYTES>,
    pub wifi_password: String<PASSWORD_BYTES>,
    pub wifi_ssid2: String<SSID_BYTES>,
    pub wifi_password2: String<PASSWORD_BYTES>,
    pub dx_host: String<HOST_BYTES>,
    pub dx_port: u16,
    pub callsign: String<CALLSIGN_BYTES>,
    pub locator: String<LOCATOR_BYTES>,
    pub ow_key: String<KEY_BYTES>,
    pub qrz_key: String<KEY_BYTES>,
    pub brightness: u8,
    pub language: String<LANGUAGE_BYTES>,
    pub rotation: u8,
    pub aprs_host: String<HOST_BYTES>,
    pub aprs_port: u16,
    pub aprs_filter: String<FILTER_BYTES>,
}

impl Default for HamConfig {
    fn default() -> Self {
        let mut language = String::new();
        let _ = language.push_str(DEFAULT_LANGUAGE);

        Self {
            wifi_ssid: String::new(),
            wifi_password: String::new(),
            wifi_ssid2: String::new(),
            wifi_password2: String::new(),
            dx_host: String::new(),
            dx_port: DEFAULT_DX_PORT,
            callsign: String::new(),
            locator: String::new(),
            ow_key: String::new(),
            qrz_key: String::new(),
            brightness: DEFAULT_BRIGHTNESS,
            language,
            rotation: DEFAULT_ROTATION,
            aprs_host: String::new(),
            aprs_port: DEFAULT_APRS_PORT,
            aprs_filter: String::new(),
        }
    }
}

/// One station credential pair.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WifiCredentials<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

impl HamConfig {
    /// DX cluster endpoint, or `None` when host or callsign is missing.
    ///
    /// A `host:port` value in `dx_host` overrides `dx_port`.
    pub fn dx_endpoint(&self) -> Option<Endpoint> {
        let callsign = self.callsign.trim();
        let (host, port) = split_host_port(self.dx_host.trim(), self.dx_port);
        if host.is_empty() || callsign.is_empty() || port == 0 {
            return None;
        }

        Some(Endpoint {
            host: String::try_from(host).ok()?,
            port,
            login: String::try_from(callsign).ok()?,
        })
    }

    /// APRS-IS endpoint, or `None` when no server is configured.
    pub fn aprs_endpoint(&self) -> Option<Endpoint> {
        let callsign = self.callsign.trim();
        let (host, port) = split_host_port(self.aprs_host.trim(), self.aprs_port);
        if host.is_empty() || callsign.is_empty() || port == 0 {
            return None;
        }

        Some(Endpoint {
            host: String::try_from(host).ok()?,
            port,
            login: aprs::login_line(callsign, &self.aprs_filter)?,
        })
    }

    /// Weather lookups need both an API key and a locator.
    pub fn weather_configured(&self) -> bool {
        !self.ow_key.trim().is_empty() && !self.locator.trim().is_empty()
    }

    /// Backlight PWM duty in percent, rounded to nearest.
    pub fn backlight_duty_pct(&self) -> u8 {
        ((u16::from(self.brightness) * 100 + 127) / 255) as u8
    }

    /// Configured stations in the order they should be tried.
    pub fn wifi_candidates(&self) -> Vec<WifiCredentials<'_>, 2> {
        let mut out = Vec::new();
        for (ssid, password) in [
            (&self.wifi_ssid, &self.wifi_password),
            (&self.wifi_ssid2, &self.wifi_password2),
        ] {
            if !ssid.is_empty() {
                let _ = out.push(WifiCredentials {
                    ssid: ssid.as_str(),
                    password: password.as_str(),
                });
            }
        }
        out
    }
}

/// Splits `host:port`. Falls back to `default_port` when there is no port
/// suffix or it does not parse.
pub fn split_host_port(value: &str, default_port: u16) -> (&str, u16) {
    match value.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => match port.parse::<u16>() {
            Ok(port) => (host, port),
            Err(_) => (value, default_port),
        },
        _ => (value, default_port),
    }
}

/// Replaces the contents of a bounded string field.
pub fn assign<const N: usize>(
    field: &mut String<N>,
    name: &'static str,
    value: &str,
) -> Result<(), FieldTooLong> {
    let mut next = String::new();
    next.push_str(value).map_err(|_| FieldTooLong(name))?;
    *field = next;
    Ok(())
}

/// Abstract configuration persistence backend.
pub trait ConfigStore {
    type Error;

    fn load(&mut self) -> Result<Option<HamConfig>, Self::Error>;
    fn save(&mut self, config: &HamConfig) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_dx(host: &str, callsign: &str) -> HamConfig {
        let mut config = HamConfig::default();
        assign(&mut config.dx_host, "dx_host", host).unwrap();
        assign(&mut config.callsign, "callsign", callsign).unwrap();
        config
    }

    #[test]
    fn defaults_match_factory_values() {
        let config = HamConfig::default();
        assert_eq!(config.dx_port, 7300);
        assert_eq!(config.brightness, 128);
        assert_eq!(config.rotation, 1);
        assert_eq!(config.language.as_str(), "EN");
        assert!(config.dx_endpoint().is_none());
        assert!(config.aprs_endpoint().is_none());
        assert!(!config.weather_configured());
    }

    #[test]
    fn brightness_maps_onto_duty_percent() {
        let mut config = HamConfig::default();
        assert_eq!(config.backlight_duty_pct(), 50);
        for (brightness, pct) in [(0, 0), (1, 0), (3, 1), (254, 100), (255, 100)] {
            config.brightness = brightness;
            assert_eq!(config.backlight_duty_pct(), pct, "brightness {brightness}");
        }
    }

    #[test]
    fn host_port_suffix_overrides_port_field() {
        let endpoint = with_dx("dx.example.com:7373", "N0CALL").dx_endpoint().unwrap();
        assert_eq!(endpoint.host.as_str(), "dx.example.com");
        assert_eq!(endpoint.port, 7373);
        assert_eq!(endpoint.login.as_str(), "N0CALL");

        let plain = with_dx("dx.example.com", "N0CALL").dx_endpoint().unwrap();
        assert_eq!(plain.port, DEFAULT_DX_PORT);
    }

    #[test]
    fn unparsable_port_suffix_keeps_value_and_default_port() {
        assert_eq!(split_host_port("host:abc", 23), ("host:abc", 23));
        assert_eq!(split_host_port(":7300", 23), (":7300", 23));
        assert_eq!(split_host_port("10.0.0.2:8000", 23), ("10.0.0.2", 8000));
    }

    #[test]
    fn dx_endpoint_requires_callsign() {
        assert!(with_dx("dx.example.com", "").dx_endpoint().is_none());
        assert!(with_dx("", "N0CALL").dx_endpoint().is_none());
    }

    #[test]
    fn aprs_endpoint_uses_login_line() {
        let mut config = with_dx("", "N0CALL");
        assign(&mut config.aprs_host, "aprs_host", "rotate.aprs2.net").unwrap();

        let endpoint = config.aprs_endpoint().unwrap();
        assert_eq!(endpoint.port, DEFAULT_APRS_PORT);
        assert!(endpoint.login.starts_with("user N0CALL pass 13023 "));
    }

    #[test]
    fn wifi_candidates_skip_empty_slots() {
        let mut config = HamConfig::default();
        assert!(config.wifi_candidates().is_empty());

        assign(&mut config.wifi_ssid2, "wifi_ssid2", "backup").unwrap();
        {
            let candidates = config.wifi_candidates();
            assert_eq!(candidates.len(), 1);
            assert_eq!(candidates[0].ssid, "backup");
        }

        assign(&mut config.wifi_ssid, "wifi_ssid", "home").unwrap();
        assert_eq!(config.wifi_candidates()[0].ssid, "home");
    }

    #[test]
    fn assign_rejects_oversized_values() {
        let mut config = HamConfig::default();
        assert_eq!(
            assign(&mut config.locator, "locator", "JO62QM12345"),
            Err(FieldTooLong("locator"))
        );
        assert!(config.locator.is_empty());
    }
}
