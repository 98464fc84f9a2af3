//! Versioned binary record for [`HamConfig`].
//!
//! Layout (little endian):
//! - 4 bytes magic `"HCK1"`
//! - 1 byte version
//! - 2 bytes body length
//! - body: length-prefixed strings and fixed-width integers in field order
//! - 4 bytes FNV-1a checksum over header and body

use heapless::String;

use super::{HamConfig, assign};
use crate::error::RecordError;

pub const RECORD_MAX_BYTES: usize = 640;

const RECORD_MAGIC: u32 = 0x314B_4348; // "HCK1"
const RECORD_VERSION: u8 = 1;
const HEADER_LEN: usize = 7;
const CHECKSUM_LEN: usize = 4;

/// Erased flash reads back as all `0xFF`.
pub fn is_erased(bytes: &[u8]) -> bool {
    bytes.iter().all(|b| *b == 0xFF)
}

/// Serializes `config` into `out`, returning the record length.
pub fn encode_record(
    config: &HamConfig,
    out: &mut [u8; RECORD_MAX_BYTES],
) -> Result<usize, RecordError> {
    let mut writer = Writer {
        buf: &mut *out,
        pos: HEADER_LEN,
    };

    writer.str(&config.wifi_ssid)?;
    writer.str(&config.wifi_password)?;
    writer.str(&config.wifi_ssid2)?;
    writer.str(&config.wifi_password2)?;
    writer.str(&config.dx_host)?;
    writer.u16(config.dx_port)?;
    writer.str(&config.callsign)?;
    writer.str(&config.locator)?;
    writer.str(&config.ow_key)?;
    writer.str(&config.qrz_key)?;
    writer.u8(config.brightness)?;
    writer.str(&config.language)?;
    writer.u8(config.rotation)?;
    writer.str(&config.aprs_host)?;
    writer.u16(config.aprs_port)?;
    writer.str(&config.aprs_filter)?;

    let body_len = writer.pos - HEADER_LEN;
    let end = writer.pos;
    if end + CHECKSUM_LEN > RECORD_MAX_BYTES {
        return Err(RecordError::FieldTooLong);
    }

    out[0..4].copy_from_slice(&RECORD_MAGIC.to_le_bytes());
    out[4] = RECORD_VERSION;
    out[5..7].copy_from_slice(&(body_len as u16).to_le_bytes());
    let checksum = checksum32(&out[..end]);
    out[end..end + CHECKSUM_LEN].copy_from_slice(&checksum.to_le_bytes());

    Ok(end + CHECKSUM_LEN)
}

/// Parses a record produced by [`encode_record`]. Trailing bytes are ignored.
pub fn decode_record(bytes: &[u8]) -> Result<HamConfig, RecordError> {
    if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
        return Err(RecordError::Truncated);
    }

    let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if magic != RECORD_MAGIC {
        return Err(RecordError::BadMagic);
    }

    let version = bytes[4];
    if version != RECORD_VERSION {
        return Err(RecordError::UnsupportedVersion(version));
    }

    let body_len = u16::from_le_bytes([bytes[5], bytes[6]]) as usize;
    let end = HEADER_LEN + body_len;
    if bytes.len() < end + CHECKSUM_LEN {
        return Err(RecordError::Truncated);
    }

    let expected = u32::from_le_bytes([bytes[end], bytes[end + 1], bytes[end + 2], bytes[end + 3]]);
    if checksum32(&bytes[..end]) != expected {
        return Err(RecordError::Checksum);
    }

    let mut reader = Reader {
        buf: &bytes[..end],
        pos: HEADER_LEN,
    };
    let mut config = HamConfig::default();

    reader.str_into(&mut config.wifi_ssid)?;
    reader.str_into(&mut config.wifi_password)?;
    reader.str_into(&mut config.wifi_ssid2)?;
    reader.str_into(&mut config.wifi_password2)?;
    reader.str_into(&mut config.dx_host)?;
    config.dx_port = reader.u16()?;
    reader.str_into(&mut config.callsign)?;
    reader.str_into(&mut config.locator)?;
    reader.str_into(&mut config.ow_key)?;
    reader.str_into(&mut config.qrz_key)?;
    config.brightness = reader.u8()?;
    reader.str_into(&mut config.language)?;
    config.rotation = reader.u8()?;
    reader.str_into(&mut config.aprs_host)?;
    config.aprs_port = reader.u16()?;
    reader.str_into(&mut config.aprs_filter)?;

    Ok(config)
}

struct Writer<'a> {
    buf: &'a mut [u8; RECORD_MAX_BYTES],
    pos: usize,
}

impl Writer<'_> {
    fn bytes(&mut self, data: &[u8]) -> Result<(), RecordError> {
        let end = self.pos + data.len();
        if end + CHECKSUM_LEN > RECORD_MAX_BYTES {
            return Err(RecordError::FieldTooLong);
        }
        self.buf[self.pos..end].copy_from_slice(data);
        self.pos = end;
        Ok(())
    }

    fn u8(&mut self, value: u8) -> Result<(), RecordError> {
        self.bytes(&[value])
    }

    fn u16(&mut self, value: u16) -> Result<(), RecordError> {
        self.bytes(&value.to_le_bytes())
    }

    fn str(&mut self, value: &str) -> Result<(), RecordError> {
        let len = u8::try_from(value.len()).map_err(|_| RecordError::FieldTooLong)?;
        self.u8(len)?;
        self.bytes(value.as_bytes())
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], RecordError> {
        let end = self.pos + len;
        let slice = self.buf.get(self.pos..end).ok_or(RecordError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, RecordError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, RecordError> {
        let raw = self.take(2)?;
        Ok(u16::from_le_bytes([raw[0], raw[1]]))
    }

    fn str_into<const N: usize>(&mut self, field: &mut String<N>) -> Result<(), RecordError> {
        let len = self.u8()? as usize;
        let raw = self.take(len)?;
        let text = core::str::from_utf8(raw).map_err(|_| RecordError::InvalidUtf8)?;
        assign(field, "record", text).map_err(|_| RecordError::FieldTooLong)
    }
}

fn checksum32(bytes: &[u8]) -> u32 {
    let mut hash = 0x811C9DC5u32;
    for b in bytes {
        hash ^= *b as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HamConfig {
        let mut config = HamConfig::default();
        assign(&mut config.wifi_ssid, "wifi_ssid", "shack").unwrap();
        assign(&mut config.wifi_password, "wifi_password", "hunter22").unwrap();
        assign(&mut config.dx_host, "dx_host", "dx.example.com:7373").unwrap();
        assign(&mut config.callsign, "callsign", "N0CALL").unwrap();
        assign(&mut config.locator, "locator", "JO62qm").unwrap();
        config.brightness = 200;
        config.rotation = 3;
        config
    }

    #[test]
    fn record_restores_every_field() {
        let config = sample();
        let mut buf = [0xFFu8; RECORD_MAX_BYTES];
        let len = encode_record(&config, &mut buf).unwrap();

        assert!(len < RECORD_MAX_BYTES);
        assert_eq!(decode_record(&buf), Ok(config));
    }

    #[test]
    fn fully_populated_config_fits_record() {
        let mut config = HamConfig::default();
        let long = "x".repeat(64);
        assign(&mut config.wifi_ssid, "", &long[..32]).unwrap();
        assign(&mut config.wifi_ssid2, "", &long[..32]).unwrap();
        assign(&mut config.wifi_password, "", &long).unwrap();
        assign(&mut config.wifi_password2, "", &long).unwrap();
        assign(&mut config.dx_host, "", &long).unwrap();
        assign(&mut config.aprs_host, "", &long).unwrap();
        assign(&mut config.aprs_filter, "", &long).unwrap();
        assign(&mut config.callsign, "", &long[..16]).unwrap();
        assign(&mut config.locator, "", &long[..8]).unwrap();
        assign(&mut config.ow_key, "", &long[..48]).unwrap();
        assign(&mut config.qrz_key, "", &long[..48]).unwrap();

        let mut buf = [0u8; RECORD_MAX_BYTES];
        assert!(encode_record(&config, &mut buf).is_ok());
        assert_eq!(decode_record(&buf), Ok(config));
    }

    #[test]
    fn flipped_byte_fails_checksum() {
        let mut buf = [0xFFu8; RECORD_MAX_BYTES];
        encode_record(&sample(), &mut buf).unwrap();
        buf[12] ^= 0x01;
        assert_eq!(decode_record(&buf), Err(RecordError::Checksum));
    }

    #[test]
    fn erased_and_foreign_sectors_are_recognised() {
        let erased = [0xFFu8; RECORD_MAX_BYTES];
        assert!(is_erased(&erased));
        assert_eq!(decode_record(&erased), Err(RecordError::BadMagic));

        let mut buf = [0u8; RECORD_MAX_BYTES];
        encode_record(&sample(), &mut buf).unwrap();
        buf[4] = 9;
        assert_eq!(decode_record(&buf), Err(RecordError::UnsupportedVersion(9)));
    }

    #[test]
    fn short_buffer_is_truncated() {
        let mut buf = [0u8; RECORD_MAX_BYTES];
        let len = encode_record(&sample(), &mut buf).unwrap();
        assert_eq!(decode_record(&buf[..len - 1]), Err(RecordError::Truncated));
    }
}
