//! A Driver for e-paper panels behind the ITE IT8951E timing controller via SPI
//!
//! Used by the M5Paper and several Waveshare e-paper HATs with 16 gray
//! levels. The panel geometry and the controller-internal image buffer
//! address are not hardcoded anywhere: they are negotiated from the
//! controller during setup.
//!
//! # References
//!
//! - [IT8951 datasheet](https://www.waveshare.net/w/upload/c/c4/IT8951_D_V0.2.4.3_20170728.pdf)
//! - [M5Paper documentation](https://docs.m5stack.com/en/core/m5paper)
//! - [Waveshare IT8951 driver HAT](https://www.waveshare.com/wiki/10.3inch_e-Paper_HAT)
//!
//! Drawing goes into a local packed 4bpp framebuffer and is tracked as
//! dirty rectangles; one [update](crate::prelude::EpaperDisplay::update)
//! tick flushes the dirty regions with a reduced-flash GL16 refresh and,
//! once the panel has been quiet for 20s, issues a single full-quality
//! GC16 pass to clean up the ghosting the partial refreshes leave behind.

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
    spi::SpiBus,
};

pub mod command;

#[cfg(feature = "graphics")]
mod graphics;

use self::command::{
    load_image_arg, Command, MemoryEndian, PixelFormat, Register, Rotation, UpdateMode,
};
use crate::color::Gray16;
use crate::graphics::GrayBuffer;
use crate::interface::DisplayInterface;
use crate::rect::{DirtyRegions, Rect};
use crate::traits::EpaperDisplay;

/// Panel width assumed until negotiation (the M5Paper geometry)
pub const DEFAULT_WIDTH: u16 = 960;

/// Panel height assumed until negotiation
pub const DEFAULT_HEIGHT: u16 = 540;

/// Image buffer base address assumed until negotiation, split into the
/// high/low words the controller wants
const DEFAULT_IMAGE_BUFFER_HIGH: u16 = 0x0012;
const DEFAULT_IMAGE_BUFFER_LOW: u16 = 0x36E0;

/// Negotiated dimensions outside this window mean the device info read was
/// garbage (usually a too fast SPI clock), not a real panel
const PLAUSIBLE_DIMENSIONS: core::ops::RangeInclusive<u16> = 50..=2048;

/// VCOM bias in mV below ground, -2.30V
const VCOM_MILLIVOLTS: u16 = 2300;

/// Quiet time after the last flush before the cleaning pass runs
const CLEAN_DELAY_MS: u32 = 20_000;

/// Bound on waiting for the display engine to finish an in-flight update
const DISPLAY_READY_TIMEOUT_MS: u32 = 3000;

/// Sleep between two polls of the display engine status register
const DISPLAY_READY_POLL_MS: u32 = 10;

/// The device descriptor negotiated from the controller.
///
/// Populated once during setup from the 40 byte device info response and
/// read-only afterwards.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    width: u16,
    height: u16,
    image_buffer_low: u16,
    image_buffer_high: u16,
    lut_version: [u8; 16],
    fw_version: [u8; 16],
}

impl Default for DeviceInfo {
    fn default() -> Self {
        DeviceInfo {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            image_buffer_low: DEFAULT_IMAGE_BUFFER_LOW,
            image_buffer_high: DEFAULT_IMAGE_BUFFER_HIGH,
            lut_version: [0; 16],
            fw_version: [0; 16],
        }
    }
}

impl DeviceInfo {
    /// Parses the 40 byte device info response: width, height, image buffer
    /// address low/high word, LUT version string, firmware version string.
    /// All words big-endian, the strings fixed-length and NUL-padded.
    fn from_bytes(raw: &[u8; 40]) -> Self {
        let word = |i: usize| (raw[i] as u16) << 8 | raw[i + 1] as u16;

        let mut lut_version = [0; 16];
        lut_version.copy_from_slice(&raw[8..24]);
        let mut fw_version = [0; 16];
        fw_version.copy_from_slice(&raw[24..40]);

        DeviceInfo {
            width: word(0),
            height: word(2),
            image_buffer_low: word(4),
            image_buffer_high: word(6),
            lut_version,
            fw_version,
        }
    }

    /// Width of the panel in pixels
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Height of the panel in pixels
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Base address of the image buffer in controller memory
    pub fn image_buffer_address(&self) -> u32 {
        (self.image_buffer_high as u32) << 16 | self.image_buffer_low as u32
    }

    /// The waveform LUT version reported by the controller
    pub fn lut_version(&self) -> &str {
        str_from_nul_padded(&self.lut_version)
    }

    /// The firmware version reported by the controller
    pub fn firmware_version(&self) -> &str {
        str_from_nul_padded(&self.fw_version)
    }
}

fn str_from_nul_padded(raw: &[u8]) -> &str {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    core::str::from_utf8(&raw[..end]).unwrap_or("")
}

/// Rounds a coordinate or width up to the controller's DMA granularity of 4
/// pixels
const fn align4(value: u16) -> u16 {
    (value + 3) & !3
}

/// It8951e driver
pub struct It8951e<SPI, CS, BUSY, RST, DELAY> {
    /// Connection Interface
    interface: DisplayInterface<SPI, CS, BUSY, RST, DELAY>,
    /// Negotiated device descriptor
    info: DeviceInfo,
    /// Local framebuffer; `None` when the allocation failed, which degrades
    /// drawing to a no-op but keeps device control working
    buffer: Option<GrayBuffer>,
    /// Panel regions touched since the last flush
    dirty: DirtyRegions,
    /// Timestamp of the last flush, in host scheduler milliseconds
    last_flush_ms: u32,
    /// A full-quality cleaning pass is owed after the quiet window
    clean_owed: bool,
    /// Invert the gray levels for panels mounted with reversed optics
    reversed: bool,
    /// Set when the negotiated geometry was implausible; the driver then
    /// never touches the bus again
    failed: bool,
}

impl<SPI, CS, BUSY, RST, DELAY> It8951e<SPI, CS, BUSY, RST, DELAY>
where
    SPI: SpiBus,
    CS: OutputPin,
    BUSY: InputPin,
    RST: OutputPin,
    DELAY: DelayNs,
{
    /// Creates a new driver from the chip select, ready and reset pins.
    ///
    /// `timeout_ms` bounds each ready line poll, `None` for the default of
    /// 3000ms. Nothing is sent on the bus until
    /// [setup](EpaperDisplay::setup).
    pub fn new(cs: CS, busy: BUSY, rst: RST, timeout_ms: Option<u32>) -> Self {
        It8951e {
            interface: DisplayInterface::new(cs, busy, rst, timeout_ms),
            info: DeviceInfo::default(),
            buffer: None,
            dirty: DirtyRegions::new(),
            last_flush_ms: 0,
            clean_owed: false,
            reversed: false,
            failed: false,
        }
    }

    /// Invert the gray levels written by all future draws.
    ///
    /// For panels mounted with reversed optics.
    pub fn set_reversed(&mut self, reversed: bool) {
        self.reversed = reversed;
    }

    /// Whether reversed output is configured
    pub fn reversed(&self) -> bool {
        self.reversed
    }

    /// The negotiated device descriptor
    pub fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Whether the driver marked itself permanently failed during
    /// negotiation
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Writes one pixel into the local framebuffer, applying the reversed
    /// mode.
    ///
    /// `x` and `y` must be inside the panel; the drawing entry points clip
    /// before they get here. No-op while no framebuffer is allocated.
    pub fn set_pixel(&mut self, x: u16, y: u16, color: Gray16) {
        let color = if self.reversed { color.inverse() } else { color };
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.set_pixel(x, y, color);
        }
    }

    /// Registers a panel region as touched so the next
    /// [update](EpaperDisplay::update) tick flushes it.
    ///
    /// The region is clipped against the panel and merged into the first
    /// overlapping region already pending.
    pub fn notify_update(&mut self, x: u16, y: u16, w: u16, h: u16) {
        if self.failed {
            return;
        }
        log::debug!("notify update: {}, {}, {}, {}", x, y, w, h);
        let w = w.min(self.info.width.saturating_sub(x));
        let h = h.min(self.info.height.saturating_sub(y));
        self.dirty.push(Rect::new(x, y, w, h));
    }

    fn read_register(
        &mut self,
        spi: &mut SPI,
        delay: &mut DELAY,
        register: Register,
    ) -> Result<u16, SPI::Error> {
        self.interface.cmd(spi, delay, Command::RegRead)?;
        self.interface.write_word(spi, delay, register.address())?;
        self.interface.read_word(spi, delay)
    }

    fn write_register(
        &mut self,
        spi: &mut SPI,
        delay: &mut DELAY,
        register: Register,
        value: u16,
    ) -> Result<(), SPI::Error> {
        self.interface.cmd(spi, delay, Command::RegWrite)?;
        self.interface.write_word(spi, delay, register.address())?;
        self.interface.write_word(spi, delay, value)
    }

    /// Polls the display engine status until it is idle, so a new area
    /// update never overlaps one still in flight.
    fn wait_display_ready(
        &mut self,
        spi: &mut SPI,
        delay: &mut DELAY,
    ) -> Result<bool, SPI::Error> {
        let mut waited = 0;
        loop {
            if self.read_register(spi, delay, Register::Lutafsr)? == 0 {
                return Ok(true);
            }
            if waited >= DISPLAY_READY_TIMEOUT_MS {
                return Ok(false);
            }
            delay.delay_ms(DISPLAY_READY_POLL_MS);
            waited += DISPLAY_READY_POLL_MS;
        }
    }

    /// Points the controller's image load machinery at the negotiated
    /// buffer base address
    fn set_target_memory_addr(
        &mut self,
        spi: &mut SPI,
        delay: &mut DELAY,
    ) -> Result<(), SPI::Error> {
        let (high, low) = (self.info.image_buffer_high, self.info.image_buffer_low);
        self.write_register(spi, delay, Register::Lisarh, high)?;
        self.write_register(spi, delay, Register::Lisar, low)
    }

    /// Declares the image buffer sub-area the following byte stream is
    /// loaded into.
    ///
    /// Big-endian 4bpp, no rotation; x and the width rounded up to the
    /// controller's granularity of 4.
    fn set_area(
        &mut self,
        spi: &mut SPI,
        delay: &mut DELAY,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
    ) -> Result<(), SPI::Error> {
        let args = [
            load_image_arg(MemoryEndian::Big, PixelFormat::Bpp4, Rotation::Rotate0),
            align4(x),
            y,
            align4(w),
            h,
        ];
        self.interface
            .cmd_with_args(spi, delay, Command::LoadImageArea, &args)
    }

    /// Refreshes the given panel area from the controller's image buffer
    /// with the given waveform.
    fn update_area(
        &mut self,
        spi: &mut SPI,
        delay: &mut DELAY,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
        mode: UpdateMode,
    ) -> Result<(), SPI::Error> {
        if mode == UpdateMode::None {
            return Ok(());
        }

        let w = if x + w > self.info.width {
            self.info.width - x
        } else {
            w
        };
        let h = if y + h > self.info.height {
            self.info.height - y
        } else {
            h
        };

        if !self.wait_display_ready(spi, delay)? {
            log::warn!("display engine still busy, queueing update anyway");
        }

        let args = [
            align4(x),
            y,
            align4(w),
            h,
            mode as u16,
            self.info.image_buffer_low,
            self.info.image_buffer_high,
        ];
        self.interface
            .cmd_with_args(spi, delay, Command::DisplayBufArea, &args)
    }

    /// Streams the framebuffer content of one dirty region into the
    /// controller and refreshes it with the reduced-flash GL16 waveform.
    fn write_buffer_to_display(
        &mut self,
        spi: &mut SPI,
        delay: &mut DELAY,
        area: Rect,
    ) -> Result<(), SPI::Error> {
        if self.buffer.is_none() {
            log::error!("no buffer to read data from");
            return Ok(());
        }
        if area.x > self.info.width || area.y > self.info.height {
            log::error!("pos ({}, {}) out of bounds", area.x, area.y);
            return Ok(());
        }

        self.set_target_memory_addr(spi, delay)?;
        self.set_area(spi, delay, area.x, area.y, area.w, area.h)?;

        let rows = area.y..(area.y + area.h).min(self.info.height);
        let (x, w) = (align4(area.x), align4(area.w));
        let Self {
            interface, buffer, ..
        } = self;
        if let Some(buffer) = buffer.as_ref() {
            interface.data_frames(spi, delay, rows.map(|row| buffer.row_slice(row, x, w)))?;
        }

        self.interface.cmd(spi, delay, Command::LoadImageEnd)?;

        self.update_area(spi, delay, area.x, area.y, area.w, area.h, UpdateMode::GL16)
    }

    /// Reads the device info block and validates it.
    ///
    /// Garbage geometry marks the driver permanently failed instead of
    /// letting a misconfigured bus clock corrupt everything after it.
    fn update_device_info(&mut self, spi: &mut SPI, delay: &mut DELAY) -> Result<(), SPI::Error> {
        let mut raw = [0u8; 40];
        self.interface.cmd(spi, delay, Command::GetDeviceInfo)?;
        self.interface.read_bytes(spi, delay, &mut raw)?;

        let info = DeviceInfo::from_bytes(&raw);
        if !PLAUSIBLE_DIMENSIONS.contains(&info.width)
            || !PLAUSIBLE_DIMENSIONS.contains(&info.height)
        {
            log::error!(
                "implausible display dimensions: {} x {}. Check the SPI clock speed",
                info.width,
                info.height
            );
            self.failed = true;
            return Ok(());
        }

        log::debug!(
            "width: {}, height: {}, LUT: {}, FW: {}, mem: {:#010x}",
            info.width,
            info.height,
            info.lut_version(),
            info.firmware_version(),
            info.image_buffer_address()
        );
        self.info = info;
        Ok(())
    }

    /// The gray level that reads as white on the panel with the current
    /// reversed setting
    fn background(&self) -> Gray16 {
        if self.reversed {
            Gray16::WHITE.inverse()
        } else {
            Gray16::WHITE
        }
    }
}

impl<SPI, CS, BUSY, RST, DELAY> EpaperDisplay<SPI, CS, BUSY, RST, DELAY>
    for It8951e<SPI, CS, BUSY, RST, DELAY>
where
    SPI: SpiBus,
    CS: OutputPin,
    BUSY: InputPin,
    RST: OutputPin,
    DELAY: DelayNs,
{
    type DisplayColor = Gray16;

    fn setup(&mut self, spi: &mut SPI, delay: &mut DELAY) -> Result<(), SPI::Error> {
        if self.failed {
            return Ok(());
        }
        log::debug!("init starting");

        self.interface.reset(delay);

        self.update_device_info(spi, delay)?;
        if self.failed {
            return Ok(());
        }

        self.buffer = GrayBuffer::new(self.info.width, self.info.height, self.background());
        if self.buffer.is_none() {
            log::error!("could not allocate buffer for display!");
        }

        self.interface.cmd(spi, delay, Command::SysRun)?;

        // enable pack write
        self.write_register(spi, delay, Register::I80Cpcr, 0x0001)?;

        log::debug!("set VCOM");
        self.interface
            .cmd_with_args(spi, delay, Command::Vcom, &[0x0001, VCOM_MILLIVOLTS])?;

        self.clear_frame(spi, delay, true)?;

        log::debug!("init done");
        Ok(())
    }

    fn update(&mut self, spi: &mut SPI, delay: &mut DELAY, now_ms: u32) -> Result<(), SPI::Error> {
        if self.failed {
            return Ok(());
        }

        if !self.dirty.is_empty() {
            for area in self.dirty.take() {
                log::debug!(
                    "pushing area ({}, {}) --> ({}, {}) to display",
                    area.x,
                    area.y,
                    area.x + area.w,
                    area.y + area.h
                );
                self.write_buffer_to_display(spi, delay, area)?;
            }
            self.last_flush_ms = now_ms;
            self.clean_owed = true;
        }

        if self.clean_owed && now_ms.wrapping_sub(self.last_flush_ms) >= CLEAN_DELAY_MS {
            // image data is already in the controller, only the refresh runs
            log::debug!("inactivity - cleaning display");
            let (width, height) = (self.info.width, self.info.height);
            self.update_area(spi, delay, 0, 0, width, height, UpdateMode::GC16)?;
            self.last_flush_ms = now_ms;
            self.clean_owed = false;
        }

        Ok(())
    }

    fn clear_frame(
        &mut self,
        spi: &mut SPI,
        delay: &mut DELAY,
        refresh: bool,
    ) -> Result<(), SPI::Error> {
        if self.failed {
            return Ok(());
        }

        self.set_target_memory_addr(spi, delay)?;
        let (width, height) = (self.info.width, self.info.height);
        self.set_area(spi, delay, 0, 0, width, height)?;

        let background = self.background();
        let Self {
            interface, buffer, ..
        } = self;
        if let Some(buffer) = buffer.as_mut() {
            buffer.fill(background);
            interface.data_frames(spi, delay, core::iter::once(buffer.data()))?;
        }

        self.interface.cmd(spi, delay, Command::LoadImageEnd)?;

        if refresh {
            self.update_area(spi, delay, 0, 0, width, height, UpdateMode::Init)?;
        }
        Ok(())
    }

    fn width(&self) -> u16 {
        self.info.width
    }

    fn height(&self) -> u16 {
        self.info.height
    }

    fn dump_config(&self) {
        log::info!("IT8951E:");
        log::info!("  Size: {}x{} (WxH)", self.info.width, self.info.height);
        log::info!("  Reversed: {}", if self.reversed { "yes" } else { "no" });
        log::info!("  FW version:  '{}'", self.info.firmware_version());
        log::info!("  LUT version: '{}'", self.info.lut_version());
        if self.failed {
            log::info!("  marked failed, the display is not updating");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };
    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

    type Driver = It8951e<SpiMock<u8>, PinMock, PinMock, PinMock, NoopDelay>;

    /// The pin traffic of one guarded preamble/payload pair
    fn cs_cycles(count: usize) -> Vec<PinTransaction> {
        let mut cycles = Vec::new();
        for _ in 0..count {
            cycles.push(PinTransaction::set(PinState::Low));
            cycles.push(PinTransaction::set(PinState::High));
        }
        cycles
    }

    /// Ready polls answered immediately
    fn ready(count: usize) -> Vec<PinTransaction> {
        vec![PinTransaction::get(PinState::High); count]
    }

    /// SPI traffic of a command: preamble word plus command word
    fn spi_cmd(cmd: u16) -> [SpiTransaction<u8>; 3] {
        [
            SpiTransaction::write_vec(vec![0x60, 0x00]),
            SpiTransaction::write_vec(cmd.to_be_bytes().to_vec()),
            SpiTransaction::flush(),
        ]
    }

    /// SPI traffic of one data word write
    fn spi_word(word: u16) -> [SpiTransaction<u8>; 3] {
        [
            SpiTransaction::write_vec(vec![0x00, 0x00]),
            SpiTransaction::write_vec(word.to_be_bytes().to_vec()),
            SpiTransaction::flush(),
        ]
    }

    /// SPI traffic of a byte read: read preamble, dummy word, data
    fn spi_read(response: Vec<u8>) -> [SpiTransaction<u8>; 4] {
        [
            SpiTransaction::write_vec(vec![0x10, 0x00]),
            SpiTransaction::write_vec(vec![0x00, 0x00]),
            SpiTransaction::read_vec(response),
            SpiTransaction::flush(),
        ]
    }

    fn device_info_bytes(width: u16, height: u16) -> Vec<u8> {
        let mut raw = vec![0u8; 40];
        raw[0..2].copy_from_slice(&width.to_be_bytes());
        raw[2..4].copy_from_slice(&height.to_be_bytes());
        raw[4..6].copy_from_slice(&0x36E0u16.to_be_bytes());
        raw[6..8].copy_from_slice(&0x0012u16.to_be_bytes());
        raw[8..11].copy_from_slice(b"M84");
        raw[24..28].copy_from_slice(b"SWv1");
        raw
    }

    #[test]
    fn device_info_parsing() {
        let raw: [u8; 40] = device_info_bytes(960, 540).try_into().unwrap();
        let info = DeviceInfo::from_bytes(&raw);
        assert_eq!(info.width(), 960);
        assert_eq!(info.height(), 540);
        assert_eq!(info.image_buffer_address(), 0x001236E0);
        assert_eq!(info.lut_version(), "M84");
        assert_eq!(info.firmware_version(), "SWv1");
    }

    #[test]
    fn align4_rounds_up() {
        assert_eq!(align4(0), 0);
        assert_eq!(align4(1), 4);
        assert_eq!(align4(4), 4);
        assert_eq!(align4(957), 960);
    }

    #[test]
    fn register_write_framing() {
        let mut spi_expect = Vec::new();
        spi_expect.extend(spi_cmd(0x0011));
        spi_expect.extend(spi_word(0x0004));
        spi_expect.extend(spi_word(0x0001));
        let mut spi = SpiMock::new(&spi_expect);

        let mut cs = PinMock::new(&cs_cycles(3));
        // two ready polls per preamble/payload pair
        let mut busy = PinMock::new(&ready(6));
        let mut rst = PinMock::new(&[]);
        let mut delay = NoopDelay::new();

        let mut epd: Driver = It8951e::new(cs.clone(), busy.clone(), rst.clone(), None);
        epd.write_register(&mut spi, &mut delay, Register::I80Cpcr, 0x0001)
            .unwrap();

        spi.done();
        cs.done();
        busy.done();
        rst.done();
    }

    #[test]
    fn register_read_framing() {
        let mut spi_expect = Vec::new();
        spi_expect.extend(spi_cmd(0x0010));
        spi_expect.extend(spi_word(0x1224));
        spi_expect.extend(spi_read(vec![0x80, 0x01]));
        let mut spi = SpiMock::new(&spi_expect);

        let mut cs = PinMock::new(&cs_cycles(3));
        // 2 + 2 + 3 ready polls
        let mut busy = PinMock::new(&ready(7));
        let mut rst = PinMock::new(&[]);
        let mut delay = NoopDelay::new();

        let mut epd: Driver = It8951e::new(cs.clone(), busy.clone(), rst.clone(), None);
        let value = epd
            .read_register(&mut spi, &mut delay, Register::Lutafsr)
            .unwrap();
        // the word comes off the wire big-endian
        assert_eq!(value, 0x8001);

        spi.done();
        cs.done();
        busy.done();
        rst.done();
    }

    #[test]
    fn rejects_implausible_geometry() {
        let mut spi_expect = Vec::new();
        spi_expect.extend(spi_cmd(0x0302));
        spi_expect.extend(spi_read(device_info_bytes(2100, 10)));
        let mut spi = SpiMock::new(&spi_expect);

        let mut cs = PinMock::new(&cs_cycles(2));
        // 2 polls for the command, 3 for the read
        let mut busy = PinMock::new(&ready(5));
        let mut rst = PinMock::new(&[
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
        ]);
        let mut delay = NoopDelay::new();

        let mut epd: Driver = It8951e::new(cs.clone(), busy.clone(), rst.clone(), None);
        epd.setup(&mut spi, &mut delay).unwrap();
        assert!(epd.is_failed());

        // permanently failed: no bus traffic from any further operation
        epd.notify_update(0, 0, 10, 10);
        epd.update(&mut spi, &mut delay, 50_000).unwrap();
        epd.clear_frame(&mut spi, &mut delay, true).unwrap();
        epd.setup(&mut spi, &mut delay).unwrap();

        spi.done();
        cs.done();
        busy.done();
        rst.done();
    }

    #[test]
    fn clean_pass_after_quiet_window() {
        // the flush happens with a missing framebuffer (degraded mode): no
        // bus traffic, but the clean pass is still owed and runs once the
        // panel has been quiet for 20s
        let mut spi_expect = Vec::new();
        // wait_display_ready: one LUTAFSR read returning idle
        spi_expect.extend(spi_cmd(0x0010));
        spi_expect.extend(spi_word(0x1224));
        spi_expect.extend(spi_read(vec![0x00, 0x00]));
        // full panel GC16 refresh from the negotiated buffer address
        spi_expect.extend(spi_cmd(0x0037));
        spi_expect.push(SpiTransaction::write_vec(vec![0x00, 0x00]));
        for arg in [0u16, 0, 960, 540, 2, 0x36E0, 0x0012] {
            spi_expect.push(SpiTransaction::write_vec(arg.to_be_bytes().to_vec()));
        }
        spi_expect.push(SpiTransaction::flush());
        let mut spi = SpiMock::new(&spi_expect);

        let mut cs = PinMock::new(&cs_cycles(5));
        // 2 + 2 + 3 polls for the register read, 2 for the command,
        // 1 + 7 for the argument words
        let mut busy = PinMock::new(&ready(17));
        let mut rst = PinMock::new(&[]);
        let mut delay = NoopDelay::new();

        let mut epd: Driver = It8951e::new(cs.clone(), busy.clone(), rst.clone(), None);
        epd.notify_update(10, 10, 50, 50);
        assert_eq!(epd.dirty.len(), 1);

        // first tick: flush (no-op without a buffer), clean now owed
        epd.update(&mut spi, &mut delay, 1_000).unwrap();
        assert!(epd.dirty.is_empty());
        assert!(epd.clean_owed);

        // second tick 25s later: exactly one GC16 full refresh
        epd.update(&mut spi, &mut delay, 26_000).unwrap();
        assert!(!epd.clean_owed);

        // third tick: nothing left to do
        epd.update(&mut spi, &mut delay, 27_000).unwrap();

        spi.done();
        cs.done();
        busy.done();
        rst.done();
    }

    #[test]
    fn no_clean_pass_inside_quiet_window() {
        let mut spi = SpiMock::new(&[]);
        let mut cs = PinMock::new(&[]);
        let mut busy = PinMock::new(&[]);
        let mut rst = PinMock::new(&[]);
        let mut delay = NoopDelay::new();

        let mut epd: Driver = It8951e::new(cs.clone(), busy.clone(), rst.clone(), None);
        epd.notify_update(10, 10, 50, 50);

        epd.update(&mut spi, &mut delay, 1_000).unwrap();
        // 19s of quiet is not enough
        epd.update(&mut spi, &mut delay, 20_000).unwrap();
        assert!(epd.clean_owed);

        spi.done();
        cs.done();
        busy.done();
        rst.done();
    }

    #[test]
    fn dirty_regions_merge_through_notify() {
        let mut cs = PinMock::new(&[]);
        let mut busy = PinMock::new(&[]);
        let mut rst = PinMock::new(&[]);

        let mut epd: Driver = It8951e::new(cs.clone(), busy.clone(), rst.clone(), None);
        epd.notify_update(10, 10, 50, 50);
        epd.notify_update(40, 40, 50, 50);
        assert_eq!(epd.dirty.as_slice(), &[Rect::new(10, 10, 80, 80)]);

        cs.done();
        busy.done();
        rst.done();
    }

    #[test]
    fn set_pixel_reversed_roundtrip() {
        let mut cs = PinMock::new(&[]);
        let mut busy = PinMock::new(&[]);
        let mut rst = PinMock::new(&[]);

        let mut epd: Driver = It8951e::new(cs.clone(), busy.clone(), rst.clone(), None);
        epd.buffer = GrayBuffer::new(16, 4, Gray16::WHITE);

        epd.set_pixel(3, 1, Gray16::new(5));
        assert_eq!(epd.buffer.as_ref().unwrap().pixel(3, 1), Gray16::new(5));

        epd.set_reversed(true);
        epd.set_pixel(3, 1, Gray16::new(5));
        assert_eq!(epd.buffer.as_ref().unwrap().pixel(3, 1), Gray16::new(10));

        cs.done();
        busy.done();
        rst.done();
    }

    #[test]
    fn notify_update_clips_to_panel() {
        let mut cs = PinMock::new(&[]);
        let mut busy = PinMock::new(&[]);
        let mut rst = PinMock::new(&[]);

        let mut epd: Driver = It8951e::new(cs.clone(), busy.clone(), rst.clone(), None);

        epd.notify_update(950, 530, 50, 50);
        assert_eq!(epd.dirty.as_slice(), &[Rect::new(950, 530, 10, 10)]);

        // entirely outside: dropped
        epd.notify_update(2000, 2000, 10, 10);
        assert_eq!(epd.dirty.len(), 1);

        cs.done();
        busy.done();
        rst.done();
    }
}
