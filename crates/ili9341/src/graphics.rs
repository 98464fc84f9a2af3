use embedded_graphics_core::{
    Pixel,
    draw_target::DrawTarget,
    geometry::{Dimensions, OriginDimensions, Size},
    pixelcolor::{IntoStorage, Rgb565},
    primitives::{PointsIter, Rectangle},
};
use embedded_hal::{digital::OutputPin, spi::SpiDevice};

use crate::{Error, Ili9341};

fn raw(color: Rgb565) -> u16 {
    color.into_storage()
}

/// Clips `area` to the panel; `None` when nothing is visible.
fn visible(area: &Rectangle, bounds: &Rectangle) -> Option<(u16, u16, u16, u16)> {
    let clipped = area.intersection(bounds);
    if clipped.size.width == 0 || clipped.size.height == 0 {
        return None;
    }
    Some((
        clipped.top_left.x as u16,
        clipped.top_left.y as u16,
        clipped.size.width as u16,
        clipped.size.height as u16,
    ))
}

impl<SPI, DC> DrawTarget for Ili9341<SPI, DC>
where
    SPI: SpiDevice<u8>,
    DC: OutputPin,
{
    type Color = Rgb565;
    type Error = Error<SPI::Error, DC::Error>;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (width, height) = self.dimensions();
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 || point.x >= width as i32 || point.y >= height as i32 {
                continue;
            }
            self.set_window(point.x as u16, point.y as u16, 1, 1)?;
            self.write_pixels([raw(color)])?;
        }
        Ok(())
    }

    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        let bounds = self.bounding_box();
        let Some((x, y, width, height)) = visible(area, &bounds) else {
            return Ok(());
        };

        if width as u32 == area.size.width && height as u32 == area.size.height {
            self.set_window(x, y, width, height)?;
            return self.write_pixels(colors.into_iter().map(raw));
        }

        // Partially visible: per-pixel writes, draw_iter drops the clipped part.
        let pixels = area
            .points()
            .zip(colors)
            .map(|(point, color)| Pixel(point, color));
        self.draw_iter(pixels)
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let bounds = self.bounding_box();
        match visible(area, &bounds) {
            Some((x, y, width, height)) => self.fill_rect(x, y, width, height, raw(color)),
            None => Ok(()),
        }
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        Ili9341::clear(self, raw(color))
    }
}

impl<SPI, DC> OriginDimensions for Ili9341<SPI, DC>
where
    SPI: SpiDevice<u8>,
    DC: OutputPin,
{
    fn size(&self) -> Size {
        let (width, height) = self.dimensions();
        Size::new(width as u32, height as u32)
    }
}
