//! Command set and parameter encoding for the ILI9341 controller.

/// Native (portrait) panel width in pixels.
pub const NATIVE_WIDTH: u16 = 240;
/// Native (portrait) panel height in pixels.
pub const NATIVE_HEIGHT: u16 = 320;

pub mod command {
    pub const SOFTWARE_RESET: u8 = 0x01;
    pub const SLEEP_OUT: u8 = 0x11;
    pub const GAMMA_SET: u8 = 0x26;
    pub const DISPLAY_OFF: u8 = 0x28;
    pub const DISPLAY_ON: u8 = 0x29;
    pub const COLUMN_ADDRESS_SET: u8 = 0x2A;
    pub const PAGE_ADDRESS_SET: u8 = 0x2B;
    pub const MEMORY_WRITE: u8 = 0x2C;
    pub const MEMORY_ACCESS_CONTROL: u8 = 0x36;
    pub const VERTICAL_SCROLL_START: u8 = 0x37;
    pub const PIXEL_FORMAT_SET: u8 = 0x3A;
    pub const FRAME_RATE_CONTROL: u8 = 0xB1;
    pub const DISPLAY_FUNCTION_CONTROL: u8 = 0xB6;
    pub const POWER_CONTROL_1: u8 = 0xC0;
    pub const POWER_CONTROL_2: u8 = 0xC1;
    pub const VCOM_CONTROL_1: u8 = 0xC5;
    pub const VCOM_CONTROL_2: u8 = 0xC7;
    pub const POSITIVE_GAMMA: u8 = 0xE0;
    pub const NEGATIVE_GAMMA: u8 = 0xE1;
}

// MADCTL bits.
const MADCTL_MY: u8 = 0x80;
const MADCTL_MX: u8 = 0x40;
const MADCTL_MV: u8 = 0x20;
const MADCTL_BGR: u8 = 0x08;

/// 16 bits per pixel on the MCU interface.
const PIXEL_FORMAT_RGB565: u8 = 0x55;

/// One command with its parameters and the settle time after it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InitStep {
    pub command: u8,
    pub params: &'static [u8],
    pub delay_ms: u32,
}

const fn step(command: u8, params: &'static [u8]) -> InitStep {
    InitStep {
        command,
        params,
        delay_ms: 0,
    }
}

/// Power-on sequence sent after a software reset.
///
/// The undocumented `0xEF..0xF7` entries are vendor power/timing tweaks
/// carried by every common ILI9341 module bring-up.
pub const INIT_SEQUENCE: &[InitStep] = &[
    step(0xEF, &[0x03, 0x80, 0x02]),
    step(0xCF, &[0x00, 0xC1, 0x30]),
    step(0xED, &[0x64, 0x03, 0x12, 0x81]),
    step(0xE8, &[0x85, 0x00, 0x78]),
    step(0xCB, &[0x39, 0x2C, 0x00, 0x34, 0x02]),
    step(0xF7, &[0x20]),
    step(0xEA, &[0x00, 0x00]),
    step(command::POWER_CONTROL_1, &[0x23]),
    step(command::POWER_CONTROL_2, &[0x10]),
    step(command::VCOM_CONTROL_1, &[0x3E, 0x28]),
    step(command::VCOM_CONTROL_2, &[0x86]),
    step(command::VERTICAL_SCROLL_START, &[0x00]),
    step(command::PIXEL_FORMAT_SET, &[PIXEL_FORMAT_RGB565]),
    step(command::FRAME_RATE_CONTROL, &[0x00, 0x18]),
    step(command::DISPLAY_FUNCTION_CONTROL, &[0x08, 0x82, 0x27]),
    step(0xF2, &[0x00]),
    step(command::GAMMA_SET, &[0x01]),
    step(
        command::POSITIVE_GAMMA,
        &[
            0x0F, 0x31, 0x2B, 0x0C, 0x0E, 0x08, 0x4E, 0xF1, 0x37, 0x07, 0x10, 0x03, 0x0E, 0x09,
            0x00,
        ],
    ),
    step(
        command::NEGATIVE_GAMMA,
        &[
            0x00, 0x0E, 0x14, 0x03, 0x11, 0x07, 0x31, 0xC1, 0x48, 0x08, 0x0F, 0x0C, 0x31, 0x36,
            0x0F,
        ],
    ),
    InitStep {
        command: command::SLEEP_OUT,
        params: &[],
        delay_ms: 120,
    },
    InitStep {
        command: command::DISPLAY_ON,
        params: &[],
        delay_ms: 20,
    },
];

/// Panel orientation in quarter turns.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Orientation {
    Portrait,
    #[default]
    Landscape,
    PortraitFlipped,
    LandscapeFlipped,
}

impl Orientation {
    /// Maps a stored rotation value; only the low two bits matter.
    pub const fn from_rotation(rotation: u8) -> Self {
        match rotation & 0b11 {
            0 => Self::Portrait,
            1 => Self::Landscape,
            2 => Self::PortraitFlipped,
            _ => Self::LandscapeFlipped,
        }
    }

    pub const fn madctl(self) -> u8 {
        match self {
            Self::Portrait => MADCTL_MX | MADCTL_BGR,
            Self::Landscape => MADCTL_MV | MADCTL_BGR,
            Self::PortraitFlipped => MADCTL_MY | MADCTL_BGR,
            Self::LandscapeFlipped => MADCTL_MX | MADCTL_MY | MADCTL_MV | MADCTL_BGR,
        }
    }

    /// Visible `(width, height)` after rotation.
    pub const fn dimensions(self) -> (u16, u16) {
        match self {
            Self::Portrait | Self::PortraitFlipped => (NATIVE_WIDTH, NATIVE_HEIGHT),
            Self::Landscape | Self::LandscapeFlipped => (NATIVE_HEIGHT, NATIVE_WIDTH),
        }
    }
}

/// Column/page address parameters: big-endian start then end, inclusive.
#[inline]
pub const fn address_params(start: u16, end: u16) -> [u8; 4] {
    let [s_hi, s_lo] = start.to_be_bytes();
    let [e_hi, e_lo] = end.to_be_bytes();
    [s_hi, s_lo, e_hi, e_lo]
}

/// Inclusive address window for a `width` x `height` rectangle at `(x, y)`.
///
/// Returns `None` when the rectangle is empty or leaves the visible area.
pub fn window(
    orientation: Orientation,
    x: u16,
    y: u16,
    width: u16,
    height: u16,
) -> Option<([u8; 4], [u8; 4])> {
    if width == 0 || height == 0 {
        return None;
    }
    let (max_w, max_h) = orientation.dimensions();
    let x_end = x.checked_add(width - 1)?;
    let y_end = y.checked_add(height - 1)?;
    if x_end >= max_w || y_end >= max_h {
        return None;
    }
    Some((address_params(x, x_end), address_params(y, y_end)))
}

/// Packs 8-bit RGB into the panel's 5-6-5 format.
#[inline]
pub const fn rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3)
}

/// Wire order for one pixel.
#[inline]
pub const fn pixel_bytes(raw: u16) -> [u8; 2] {
    raw.to_be_bytes()
}
