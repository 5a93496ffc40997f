//! embedded-graphics support for drawing straight into the driver's
//! framebuffer
//!
//! Every draw is clipped to the panel, converted through [`Gray16`] and
//! registered with the dirty region tracker, so the next update tick knows
//! which part of the panel to flush.

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
    spi::SpiBus,
};

use embedded_graphics_core::prelude::*;
use embedded_graphics_core::primitives::Rectangle;

use super::It8951e;
use crate::color::Gray16;

impl<SPI, CS, BUSY, RST, DELAY> DrawTarget for It8951e<SPI, CS, BUSY, RST, DELAY>
where
    SPI: SpiBus,
    CS: OutputPin,
    BUSY: InputPin,
    RST: OutputPin,
    DELAY: DelayNs,
{
    type Color = Gray16;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (width, height) = (self.info.width() as i32, self.info.height() as i32);

        // bounding box of the pixels that actually landed on the panel
        let (mut min_x, mut min_y) = (i32::MAX, i32::MAX);
        let (mut max_x, mut max_y) = (i32::MIN, i32::MIN);

        for Pixel(point, color) in pixels {
            if point.x < 0 || point.x >= width || point.y < 0 || point.y >= height {
                continue;
            }
            self.set_pixel(point.x as u16, point.y as u16, color);

            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }

        if min_x <= max_x {
            self.notify_update(
                min_x as u16,
                min_y as u16,
                (max_x - min_x + 1) as u16,
                (max_y - min_y + 1) as u16,
            );
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let clipped = area.intersection(&self.bounding_box());
        if clipped.is_zero_sized() {
            return Ok(());
        }

        let (left, top) = (clipped.top_left.x as u16, clipped.top_left.y as u16);
        for y in 0..clipped.size.height as u16 {
            for x in 0..clipped.size.width as u16 {
                self.set_pixel(left + x, top + y, color);
            }
        }

        self.notify_update(
            left,
            top,
            clipped.size.width as u16,
            clipped.size.height as u16,
        );
        Ok(())
    }
}

impl<SPI, CS, BUSY, RST, DELAY> OriginDimensions for It8951e<SPI, CS, BUSY, RST, DELAY>
where
    SPI: SpiBus,
    CS: OutputPin,
    BUSY: InputPin,
    RST: OutputPin,
    DELAY: DelayNs,
{
    fn size(&self) -> Size {
        Size::new(self.info.width() as u32, self.info.height() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::GrayBuffer;
    use crate::it8951e::DeviceInfo;
    use crate::rect::Rect;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::Mock as PinMock;
    use embedded_hal_mock::eh1::spi::Mock as SpiMock;

    type Driver = It8951e<SpiMock<u8>, PinMock, PinMock, PinMock, NoopDelay>;

    fn small_panel() -> (Driver, [PinMock; 3]) {
        let cs = PinMock::new(&[]);
        let busy = PinMock::new(&[]);
        let rst = PinMock::new(&[]);
        let mut epd: Driver = It8951e::new(cs.clone(), busy.clone(), rst.clone(), None);
        epd.info = DeviceInfo {
            width: 32,
            height: 16,
            ..DeviceInfo::default()
        };
        epd.buffer = GrayBuffer::new(32, 16, Gray16::WHITE);
        (epd, [cs, busy, rst])
    }

    #[test]
    fn draw_iter_clips_and_tracks_dirty() {
        let (mut epd, mut pins) = small_panel();

        epd.draw_iter([
            Pixel(Point::new(-5, 2), Gray16::BLACK),
            Pixel(Point::new(2, 3), Gray16::BLACK),
            Pixel(Point::new(6, 7), Gray16::BLACK),
            Pixel(Point::new(100, 100), Gray16::BLACK),
        ])
        .unwrap();

        let buffer = epd.buffer.as_ref().unwrap();
        assert_eq!(buffer.pixel(2, 3), Gray16::BLACK);
        assert_eq!(buffer.pixel(6, 7), Gray16::BLACK);
        // bounding box of the in-bounds pixels only
        assert_eq!(epd.dirty.as_slice(), &[Rect::new(2, 3, 5, 5)]);

        pins.iter_mut().for_each(|pin| pin.done());
    }

    #[test]
    fn fill_solid_clips_to_panel() {
        let (mut epd, mut pins) = small_panel();

        epd.fill_solid(
            &Rectangle::new(Point::new(28, 12), Size::new(10, 10)),
            Gray16::BLACK,
        )
        .unwrap();

        let buffer = epd.buffer.as_ref().unwrap();
        assert_eq!(buffer.pixel(28, 12), Gray16::BLACK);
        assert_eq!(buffer.pixel(31, 15), Gray16::BLACK);
        assert_eq!(buffer.pixel(27, 12), Gray16::WHITE);
        assert_eq!(epd.dirty.as_slice(), &[Rect::new(28, 12, 4, 4)]);

        pins.iter_mut().for_each(|pin| pin.done());
    }

    #[test]
    fn draw_without_buffer_is_a_noop() {
        let (mut epd, mut pins) = small_panel();
        epd.buffer = None;

        epd.draw_iter([Pixel(Point::new(2, 3), Gray16::BLACK)])
            .unwrap();
        // the touched region is still tracked; the flush no-ops later
        assert_eq!(epd.dirty.len(), 1);

        pins.iter_mut().for_each(|pin| pin.done());
    }

    #[test]
    fn embedded_graphics_line() {
        use embedded_graphics::primitives::{Line, Primitive, PrimitiveStyle};
        use embedded_graphics::Drawable;

        let (mut epd, mut pins) = small_panel();
        Line::new(Point::new(0, 0), Point::new(7, 0))
            .into_styled(PrimitiveStyle::with_stroke(Gray16::BLACK, 1))
            .draw(&mut epd)
            .unwrap();

        let buffer = epd.buffer.as_ref().unwrap();
        for x in 0..8 {
            assert_eq!(buffer.pixel(x, 0), Gray16::BLACK);
        }
        assert_eq!(buffer.pixel(8, 0), Gray16::WHITE);
        assert!(!epd.dirty.is_empty());

        pins.iter_mut().for_each(|pin| pin.done());
    }

    #[test]
    fn reported_size_is_the_negotiated_one() {
        let (epd, mut pins) = small_panel();
        assert_eq!(epd.size(), Size::new(32, 16));
        pins.iter_mut().for_each(|pin| pin.done());
    }
}
