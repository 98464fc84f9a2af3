use embedded_storage::{ReadStorage, Storage};
use esp_bootloader_esp_idf::partitions::{
    DataPartitionSubType, PARTITION_TABLE_MAX_LEN, PartitionType, read_partition_table,
};
use esp_rom_sys::rom::spiflash::{
    ESP_ROM_SPIFLASH_RESULT_OK, esp_rom_spiflash_erase_sector, esp_rom_spiflash_read,
    esp_rom_spiflash_unlock, esp_rom_spiflash_write,
};
use hamclock_core::{
    config::{ConfigStore, HamConfig, RECORD_MAX_BYTES, decode_record, encode_record, is_erased},
    error::RecordError,
};
use log::warn;

const FLASH_SECTOR_SIZE: u32 = 4096;
const DEFAULT_FLASH_CAPACITY_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FlashConfigError {
    PartitionTable,
    ConfigPartitionMissing,
    PartitionTooSmall,
    FlashOpFailed(i32),
    Record(RecordError),
    Unsupported,
}

#[derive(Debug)]
struct RawFlash;

impl RawFlash {
    fn new() -> Result<Self, FlashConfigError> {
        let rc = unsafe { esp_rom_spiflash_unlock() };
        if rc != ESP_ROM_SPIFLASH_RESULT_OK {
            return Err(FlashConfigError::FlashOpFailed(rc));
        }
        Ok(Self)
    }

    fn erase_sector(&mut self, sector_addr: u32) -> Result<(), FlashConfigError> {
        if !sector_addr.is_multiple_of(FLASH_SECTOR_SIZE) {
            return Err(FlashConfigError::Unsupported);
        }

        let rc = unsafe { esp_rom_spiflash_erase_sector(sector_addr / FLASH_SECTOR_SIZE) };
        if rc != ESP_ROM_SPIFLASH_RESULT_OK {
            return Err(FlashConfigError::FlashOpFailed(rc));
        }
        Ok(())
    }

    fn read_word(&mut self, addr: u32) -> Result<u32, FlashConfigError> {
        if !addr.is_multiple_of(4) {
            return Err(FlashConfigError::Unsupported);
        }

        let mut word = 0u32;
        let rc = unsafe { esp_rom_spiflash_read(addr, &mut word as *mut u32 as *const u32, 4) };
        if rc != ESP_ROM_SPIFLASH_RESULT_OK {
            return Err(FlashConfigError::FlashOpFailed(rc));
        }
        Ok(word)
    }

    fn write_word(&mut self, addr: u32, word: u32) -> Result<(), FlashConfigError> {
        if !addr.is_multiple_of(4) {
            return Err(FlashConfigError::Unsupported);
        }

        let rc = unsafe { esp_rom_spiflash_write(addr, &word as *const u32, 4) };
        if rc != ESP_ROM_SPIFLASH_RESULT_OK {
            return Err(FlashConfigError::FlashOpFailed(rc));
        }
        Ok(())
    }

    /// Word-aligned read of an arbitrary byte range.
    fn read_bytes(&mut self, addr: u32, out: &mut [u8]) -> Result<(), FlashConfigError> {
        let start = addr & !0b11;
        let lead = (addr - start) as usize;
        let mut filled = 0usize;
        let mut word_addr = start;

        while filled < out.len() {
            let bytes = self.read_word(word_addr)?.to_le_bytes();
            let skip = if word_addr == start { lead } else { 0 };
            for b in &bytes[skip..] {
                if filled == out.len() {
                    break;
                }
                out[filled] = *b;
                filled += 1;
            }
            word_addr += 4;
        }
        Ok(())
    }

    /// Writes into a freshly erased, word-aligned region. Tail bytes stay `0xFF`.
    fn write_erased_bytes(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashConfigError> {
        if !addr.is_multiple_of(4) {
            return Err(FlashConfigError::Unsupported);
        }

        for (i, chunk) in data.chunks(4).enumerate() {
            let mut bytes = [0xFFu8; 4];
            bytes[..chunk.len()].copy_from_slice(chunk);
            self.write_word(addr + (i as u32) * 4, u32::from_le_bytes(bytes))?;
        }
        Ok(())
    }
}

impl ReadStorage for RawFlash {
    type Error = FlashConfigError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.read_bytes(offset, bytes)
    }

    fn capacity(&self) -> usize {
        DEFAULT_FLASH_CAPACITY_BYTES
    }
}

impl Storage for RawFlash {
    fn write(&mut self, _offset: u32, _bytes: &[u8]) -> Result<(), Self::Error> {
        Err(FlashConfigError::Unsupported)
    }
}

/// Configuration record kept in the last sector of a writable data
/// partition (an undefined-subtype partition if present, else NVS).
#[derive(Debug)]
pub struct FlashConfigStore {
    flash: RawFlash,
    record_sector_addr: u32,
}

impl FlashConfigStore {
    pub fn new() -> Result<Self, FlashConfigError> {
        let mut flash = RawFlash::new()?;

        let mut table_buf = [0u8; PARTITION_TABLE_MAX_LEN];
        let table = read_partition_table(&mut flash, &mut table_buf)
            .map_err(|_| FlashConfigError::PartitionTable)?;

        let mut data_undefined: Option<(u32, u32)> = None;
        let mut fallback_nvs: Option<(u32, u32)> = None;

        for entry in table.iter() {
            if entry.is_read_only() || entry.len() < FLASH_SECTOR_SIZE {
                continue;
            }

            match entry.partition_type() {
                PartitionType::Data(DataPartitionSubType::Undefined) => {
                    data_undefined = Some((entry.offset(), entry.len()));
                    break;
                }
                PartitionType::Data(DataPartitionSubType::Nvs) if fallback_nvs.is_none() => {
                    fallback_nvs = Some((entry.offset(), entry.len()));
                }
                _ => {}
            }
        }

        let (offset, len) = data_undefined
            .or(fallback_nvs)
            .ok_or(FlashConfigError::ConfigPartitionMissing)?;

        if len < FLASH_SECTOR_SIZE {
            return Err(FlashConfigError::PartitionTooSmall);
        }

        Ok(Self {
            flash,
            record_sector_addr: offset + len - FLASH_SECTOR_SIZE,
        })
    }
}

impl ConfigStore for FlashConfigStore {
    type Error = FlashConfigError;

    fn load(&mut self) -> Result<Option<HamConfig>, Self::Error> {
        let mut buf = [0u8; RECORD_MAX_BYTES];
        self.flash.read_bytes(self.record_sector_addr, &mut buf)?;

        if is_erased(&buf) {
            return Ok(None);
        }

        match decode_record(&buf) {
            Ok(config) => Ok(Some(config)),
            Err(RecordError::BadMagic) => {
                warn!("config: foreign data in record sector; using defaults");
                Ok(None)
            }
            Err(err) => Err(FlashConfigError::Record(err)),
        }
    }

    fn save(&mut self, config: &HamConfig) -> Result<(), Self::Error> {
        let mut buf = [0xFFu8; RECORD_MAX_BYTES];
        let len = encode_record(config, &mut buf).map_err(FlashConfigError::Record)?;

        self.flash.erase_sector(self.record_sector_addr)?;
        self.flash
            .write_erased_bytes(self.record_sector_addr, &buf[..len])?;
        Ok(())
    }
}
