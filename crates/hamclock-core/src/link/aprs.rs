use core::fmt::Write as _;

use heapless::String;

use super::LOGIN_BYTES;

const PASSCODE_SEED: u16 = 0x73E2;

pub const CLIENT_NAME: &str = "HamClock";
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// APRS-IS passcode for `callsign`. The SSID suffix is ignored and the hash
/// is case-insensitive.
pub fn aprs_passcode(callsign: &str) -> u16 {
    let base = callsign.split('-').next().unwrap_or_default();

    let mut hash = PASSCODE_SEED;
    for (i, byte) in base.bytes().enumerate() {
        let byte = byte.to_ascii_uppercase() as u16;
        if i % 2 == 0 {
            hash ^= byte << 8;
        } else {
            hash ^= byte;
        }
    }

    hash & 0x7FFF
}

/// `user <CALL> pass <CODE> vers <NAME> <VER>[ filter <SPEC>]`
pub fn login_line(callsign: &str, filter: &str) -> Option<String<LOGIN_BYTES>> {
    let mut line = String::new();
    write!(
        line,
        "user {} pass {} vers {} {}",
        callsign,
        aprs_passcode(callsign),
        CLIENT_NAME,
        CLIENT_VERSION
    )
    .ok()?;

    let filter = filter.trim();
    if !filter.is_empty() {
        write!(line, " filter {}", filter).ok()?;
    }

    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passcode_matches_known_value() {
        assert_eq!(aprs_passcode("N0CALL"), 13023);
    }

    #[test]
    fn passcode_ignores_ssid_and_case() {
        assert_eq!(aprs_passcode("n0call-9"), aprs_passcode("N0CALL"));
    }

    #[test]
    fn passcode_fits_fifteen_bits() {
        for call in ["W1AW", "DL1ABC", "VK2XYZ-15", ""] {
            assert!(aprs_passcode(call) <= 0x7FFF);
        }
    }

    #[test]
    fn login_line_includes_optional_filter() {
        let plain = login_line("N0CALL", "").unwrap();
        assert!(plain.starts_with("user N0CALL pass 13023 vers HamClock "));
        assert!(!plain.contains("filter"));

        let filtered = login_line("N0CALL", " r/52/13/100 ").unwrap();
        assert!(filtered.ends_with(" filter r/52/13/100"));
    }
}
