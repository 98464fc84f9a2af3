#![cfg_attr(not(test), no_std)]

//! ILI9341 (240x320 RGB565 TFT) driver primitives over a 4-wire SPI bus.

pub mod protocol;

#[cfg(feature = "embedded-graphics")]
mod graphics;

use embedded_hal::{delay::DelayNs, digital::OutputPin, spi::SpiDevice};

pub use protocol::Orientation;

use protocol::command;

/// Pixels staged per SPI write while streaming.
const STREAM_CHUNK_PIXELS: usize = 64;

/// Driver configuration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Config {
    /// Expected SPI clock in Hz (documented for board glue).
    pub spi_hz: u32,
    pub orientation: Orientation,
    /// Settle time after the software reset command.
    pub reset_settle_ms: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spi_hz: 40_000_000,
            orientation: Orientation::Landscape,
            reset_settle_ms: 150,
        }
    }
}

/// Driver errors.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Error<SpiErr, DcErr> {
    /// SPI transaction failed.
    Spi(SpiErr),
    /// Data/command pin operation failed.
    Dc(DcErr),
    /// Rectangle is empty or outside the visible area.
    InvalidInput,
}

pub type DriverResult<SpiErr, DcErr> = Result<(), Error<SpiErr, DcErr>>;

/// ILI9341 driver. The panel reset line is assumed tied to the board reset.
#[derive(Debug)]
pub struct Ili9341<SPI, DC> {
    spi: SPI,
    dc: DC,
    config: Config,
}

impl<SPI, DC> Ili9341<SPI, DC>
where
    SPI: SpiDevice<u8>,
    DC: OutputPin,
{
    pub fn new(spi: SPI, dc: DC, config: Config) -> Self {
        Self { spi, dc, config }
    }

    pub fn config(&self) -> Config {
        self.config
    }

    /// Releases owned bus and pin.
    pub fn release(self) -> (SPI, DC) {
        (self.spi, self.dc)
    }

    /// Visible `(width, height)` for the current orientation.
    pub fn dimensions(&self) -> (u16, u16) {
        self.config.orientation.dimensions()
    }

    /// Software reset, power-on sequence, then orientation.
    pub fn initialize<D>(&mut self, delay: &mut D) -> DriverResult<SPI::Error, DC::Error>
    where
        D: DelayNs,
    {
        self.command(command::SOFTWARE_RESET, &[])?;
        delay.delay_ms(self.config.reset_settle_ms);

        for step in protocol::INIT_SEQUENCE {
            self.command(step.command, step.params)?;
            if step.delay_ms > 0 {
                delay.delay_ms(step.delay_ms);
            }
        }

        self.set_orientation(self.config.orientation)
    }

    pub fn set_orientation(&mut self, orientation: Orientation) -> DriverResult<SPI::Error, DC::Error> {
        self.command(command::MEMORY_ACCESS_CONTROL, &[orientation.madctl()])?;
        self.config.orientation = orientation;
        Ok(())
    }

    pub fn display_on(&mut self, on: bool) -> DriverResult<SPI::Error, DC::Error> {
        let cmd = if on {
            command::DISPLAY_ON
        } else {
            command::DISPLAY_OFF
        };
        self.command(cmd, &[])
    }

    /// Opens a write window and leaves the panel expecting pixel data.
    pub fn set_window(
        &mut self,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
    ) -> DriverResult<SPI::Error, DC::Error> {
        let (columns, pages) = protocol::window(self.config.orientation, x, y, width, height)
            .ok_or(Error::InvalidInput)?;
        self.command(command::COLUMN_ADDRESS_SET, &columns)?;
        self.command(command::PAGE_ADDRESS_SET, &pages)?;
        self.command(command::MEMORY_WRITE, &[])
    }

    /// Streams raw RGB565 pixels into the open window.
    pub fn write_pixels<I>(&mut self, pixels: I) -> DriverResult<SPI::Error, DC::Error>
    where
        I: IntoIterator<Item = u16>,
    {
        self.dc.set_high().map_err(Error::Dc)?;

        let mut chunk = [0u8; STREAM_CHUNK_PIXELS * 2];
        let mut filled = 0usize;
        for raw in pixels {
            chunk[filled..filled + 2].copy_from_slice(&protocol::pixel_bytes(raw));
            filled += 2;
            if filled == chunk.len() {
                self.spi.write(&chunk).map_err(Error::Spi)?;
                filled = 0;
            }
        }
        if filled > 0 {
            self.spi.write(&chunk[..filled]).map_err(Error::Spi)?;
        }
        Ok(())
    }

    /// Fills a rectangle with one raw RGB565 color.
    pub fn fill_rect(
        &mut self,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        raw: u16,
    ) -> DriverResult<SPI::Error, DC::Error> {
        self.set_window(x, y, width, height)?;
        let count = width as usize * height as usize;
        self.write_pixels(core::iter::repeat_n(raw, count))
    }

    pub fn clear(&mut self, raw: u16) -> DriverResult<SPI::Error, DC::Error> {
        let (width, height) = self.dimensions();
        self.fill_rect(0, 0, width, height, raw)
    }

    fn command(&mut self, cmd: u8, params: &[u8]) -> DriverResult<SPI::Error, DC::Error> {
        self.dc.set_low().map_err(Error::Dc)?;
        self.spi.write(&[cmd]).map_err(Error::Spi)?;
        if !params.is_empty() {
            self.dc.set_high().map_err(Error::Dc)?;
            self.spi.write(params).map_err(Error::Spi)?;
        }
        Ok(())
    }
}
