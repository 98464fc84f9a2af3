//! Text-mode screens for the 320x240 panel.
//!
//! The whole panel is cleared only when the screen changes. Refreshes
//! overwrite fixed-width body rows with an opaque background, which keeps the
//! 1 Hz redraw free of flicker without a framebuffer.

use core::fmt::Write as _;

use embedded_graphics::{
    mono_font::{
        MonoTextStyle, MonoTextStyleBuilder,
        ascii::{FONT_8X13, FONT_10X20},
    },
    pixelcolor::{Rgb565, RgbColor},
    prelude::*,
    text::{Baseline, Text},
};
use hamclock_core::{
    feeds::FeedBoard,
    link::{LinkStatus, Peer},
    render::ScreenView,
    schedule::PollTask,
    screen::{ScreenBounds, ScreenId},
};
use heapless::String;

use crate::network::{ConnectivitySnapshot, SETUP_AP_ADDRESS, SETUP_AP_SSID};

const MARGIN_X: i32 = 8;
const TITLE_Y: i32 = 8;
const BODY_TOP: i32 = 40;
const ROW_HEIGHT: i32 = 15;
const BODY_ROWS: usize = 11;
const ROW_COLUMNS: usize = 38;
// Footer text sits this far below the top of the touch nav band.
const FOOTER_INSET: i32 = 14;

const ORANGE: Rgb565 = Rgb565::new(31, 40, 0);

type Row = String<ROW_COLUMNS>;

const BANDS: [(&str, &str); 9] = [
    ("160m", "1.800 - 2.000"),
    ("80m", "3.500 - 4.000"),
    ("40m", "7.000 - 7.300"),
    ("30m", "10.100 - 10.150"),
    ("20m", "14.000 - 14.350"),
    ("17m", "18.068 - 18.168"),
    ("15m", "21.000 - 21.450"),
    ("12m", "24.890 - 24.990"),
    ("10m", "28.000 - 29.700"),
];

fn accent(screen: ScreenId) -> Rgb565 {
    match screen {
        ScreenId::Clock => Rgb565::WHITE,
        ScreenId::DxCluster | ScreenId::Matrix => Rgb565::GREEN,
        ScreenId::Aprs => Rgb565::CYAN,
        ScreenId::Bands => Rgb565::YELLOW,
        ScreenId::Propagation => ORANGE,
        ScreenId::Weather => Rgb565::BLUE,
        ScreenId::Pota => Rgb565::MAGENTA,
    }
}

/// Pads or cuts `text` to exactly one body row.
fn row(text: &str) -> Row {
    let mut out = Row::new();
    for ch in text.chars().filter(|c| c.is_ascii() && !c.is_ascii_control()) {
        if out.push(ch).is_err() {
            return out;
        }
    }
    while out.push(' ').is_ok() {}
    out
}

fn formatted(args: core::fmt::Arguments<'_>) -> Row {
    let mut text: String<64> = String::new();
    let _ = text.write_fmt(args);
    row(&text)
}

/// Seconds since `at`, in the uptime clock of `view`.
fn age_text(view: &ScreenView<'_>, at: Option<u32>) -> Row {
    match at {
        Some(at_ms) => {
            let age = view.uptime_s.saturating_sub(at_ms / 1_000);
            formatted(format_args!("Updated {}m {:02}s ago", age / 60, age % 60))
        }
        None => row("Waiting for first update"),
    }
}

#[derive(Debug, Default)]
pub struct ScreenRenderer {
    last_screen: Option<ScreenId>,
}

impl ScreenRenderer {
    pub const fn new() -> Self {
        Self { last_screen: None }
    }

    /// Forces a full clear on the next render.
    pub fn invalidate(&mut self) {
        self.last_screen = None;
    }

    pub fn render<D>(
        &mut self,
        view: ScreenView<'_>,
        feeds: &FeedBoard,
        network: ConnectivitySnapshot,
        target: &mut D,
    ) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb565>,
    {
        let color = accent(view.screen);

        if self.last_screen != Some(view.screen) {
            target.clear(Rgb565::BLACK)?;
            let title = MonoTextStyle::new(&FONT_10X20, color);
            Text::with_baseline(
                view.screen.title(),
                Point::new(MARGIN_X, TITLE_Y),
                title,
                Baseline::Top,
            )
            .draw(target)?;
            self.draw_footer(view.screen, target)?;
            self.last_screen = Some(view.screen);
        }

        let mut rows: [Row; BODY_ROWS] = core::array::from_fn(|_| row(""));
        fill_body(&mut rows, &view, feeds, network);

        let body = MonoTextStyleBuilder::new()
            .font(&FONT_8X13)
            .text_color(color)
            .background_color(Rgb565::BLACK)
            .build();
        for (i, line) in rows.iter().enumerate() {
            Text::with_baseline(
                line,
                Point::new(MARGIN_X, BODY_TOP + i as i32 * ROW_HEIGHT),
                body,
                Baseline::Top,
            )
            .draw(target)?;
        }
        Ok(())
    }

    fn draw_footer<D>(&self, screen: ScreenId, target: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb565>,
    {
        let style = MonoTextStyle::new(&FONT_8X13, Rgb565::WHITE);
        let size = target.bounding_box().size;
        let width = size.width as i32;
        let footer_y = footer_top(size);

        Text::with_baseline("<", Point::new(MARGIN_X, footer_y), style, Baseline::Top)
            .draw(target)?;
        Text::with_baseline(">", Point::new(width - MARGIN_X - 8, footer_y), style, Baseline::Top)
            .draw(target)?;

        let page = formatted(format_args!("{}/{}", screen.index() + 1, ScreenId::COUNT));
        Text::with_baseline(
            page.trim_end(),
            Point::new(width / 2 - 12, footer_y),
            style,
            Baseline::Top,
        )
        .draw(target)?;
        Ok(())
    }
}

/// Top of the footer hints, inside the bottom nav band.
fn footer_top(size: Size) -> i32 {
    let bounds = ScreenBounds::new(size.width as u16, size.height as u16);
    bounds.nav_band_top() as i32 + FOOTER_INSET
}

fn link_row(peer: Peer, status: LinkStatus) -> Row {
    formatted(format_args!("{} link: {}", peer.as_str(), status.as_str()))
}

fn fill_body(
    rows: &mut [Row; BODY_ROWS],
    view: &ScreenView<'_>,
    feeds: &FeedBoard,
    network: ConnectivitySnapshot,
) {
    match view.screen {
        ScreenId::Clock => {
            let (h, m, s) = view.uptime_hms();
            rows[0] = formatted(format_args!("Uptime {:02}:{:02}:{:02}", h, m, s));
            rows[2] = formatted(format_args!("Call {}", view.callsign));
            rows[3] = formatted(format_args!("Grid {}", view.locator));
            rows[5] = formatted(format_args!("IP   {}", network.ip_text()));
            rows[6] = if network.is_online() {
                formatted(format_args!("WiFi {} dBm", network.rssi))
            } else {
                formatted(format_args!("WiFi {}", network.state.as_str()))
            };
            if network.access_point {
                rows[7] = formatted(format_args!("AP   {} {}", SETUP_AP_SSID, SETUP_AP_ADDRESS));
            }
            rows[8] = link_row(Peer::DxCluster, view.dx);
            rows[9] = link_row(Peer::AprsIs, view.aprs);
        }
        ScreenId::DxCluster => fill_lines(rows, Peer::DxCluster, view.dx, feeds),
        ScreenId::Aprs => fill_lines(rows, Peer::AprsIs, view.aprs, feeds),
        ScreenId::Bands => {
            for (slot, (band, range)) in rows.iter_mut().zip(BANDS.iter()) {
                *slot = formatted(format_args!("{:<5} {} MHz", band, range));
            }
        }
        ScreenId::Propagation => {
            rows[0] = age_text(view, feeds.last_refresh(PollTask::Propagation));
        }
        ScreenId::Weather => {
            rows[0] = formatted(format_args!("Grid {}", view.locator));
            rows[1] = age_text(view, feeds.last_refresh(PollTask::Weather));
        }
        ScreenId::Pota => {
            rows[0] = age_text(view, feeds.last_refresh(PollTask::Pota));
        }
        ScreenId::Matrix => {
            let (h, m, s) = view.uptime_hms();
            rows[4] = formatted(format_args!("        {:02} : {:02} : {:02}", h, m, s));
        }
    }
}

fn fill_lines(rows: &mut [Row; BODY_ROWS], peer: Peer, status: LinkStatus, feeds: &FeedBoard) {
    rows[0] = link_row(peer, status);
    let recent = feeds.lines(peer);
    rows[1] = formatted(format_args!("{} lines received", recent.total()));
    for (slot, line) in rows.iter_mut().skip(3).zip(recent.iter_newest()) {
        *slot = row(line);
    }
}
