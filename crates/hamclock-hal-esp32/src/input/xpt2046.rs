use embedded_hal::{
    digital::InputPin,
    spi::{Operation, SpiDevice},
};

use hamclock_core::touch::{TOUCH_ADC_MAX, TouchCalibration, TouchInput, TouchPoint};

// Control bytes: start bit, channel select, 12-bit differential mode.
// PD bits are left at 00 so the pen IRQ stays armed between reads.
const CMD_X: u8 = 0x90;
const CMD_Y: u8 = 0xD0;
const CMD_Z1: u8 = 0xB0;
const CMD_Z2: u8 = 0xC0;

const PRESSURE_THRESHOLD: u16 = 400;
const SAMPLES: usize = 3;

fn median(mut samples: [u16; SAMPLES]) -> u16 {
    samples.sort_unstable();
    samples[SAMPLES / 2]
}

#[derive(Debug)]
pub enum TouchError<SpiErr, IrqErr> {
    Spi(SpiErr),
    Irq(IrqErr),
}

/// XPT2046 resistive touch controller with its pen-interrupt line.
#[derive(Debug)]
pub struct Xpt2046<SPI, IRQ> {
    spi: SPI,
    irq: IRQ,
    calibration: TouchCalibration,
}

impl<SPI, IRQ> Xpt2046<SPI, IRQ>
where
    SPI: SpiDevice<u8>,
    IRQ: InputPin,
{
    pub fn new(spi: SPI, irq: IRQ, calibration: TouchCalibration) -> Self {
        Self {
            spi,
            irq,
            calibration,
        }
    }

    fn read_channel(&mut self, command: u8) -> Result<u16, SPI::Error> {
        let mut rx = [0u8; 2];
        self.spi
            .transaction(&mut [Operation::Write(&[command]), Operation::Read(&mut rx)])?;
        Ok((u16::from_be_bytes(rx) >> 3) & TOUCH_ADC_MAX)
    }

    fn pressure(&mut self) -> Result<u16, SPI::Error> {
        let z1 = self.read_channel(CMD_Z1)?;
        let z2 = self.read_channel(CMD_Z2)?;
        Ok((z1 + TOUCH_ADC_MAX).saturating_sub(z2))
    }
}

impl<SPI, IRQ> TouchInput for Xpt2046<SPI, IRQ>
where
    SPI: SpiDevice<u8>,
    IRQ: InputPin,
{
    type Error = TouchError<SPI::Error, IRQ::Error>;

    fn poll_touch(&mut self) -> Result<Option<TouchPoint>, Self::Error> {
        // Pen IRQ is active low.
        if self.irq.is_high().map_err(TouchError::Irq)? {
            return Ok(None);
        }

        let pressure = self.pressure().map_err(TouchError::Spi)?;
        if pressure < PRESSURE_THRESHOLD {
            return Ok(None);
        }

        let mut xs = [0u16; SAMPLES];
        let mut ys = [0u16; SAMPLES];
        for i in 0..SAMPLES {
            xs[i] = self.read_channel(CMD_X).map_err(TouchError::Spi)?;
            ys[i] = self.read_channel(CMD_Y).map_err(TouchError::Spi)?;
        }

        Ok(Some(self.calibration.map(median(xs), median(ys))))
    }
}
