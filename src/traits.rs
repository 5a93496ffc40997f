use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
    spi::SpiBus,
};

/// All commands need to have this trait which gives the 16-bit command word
/// which needs to be sent via SPI after the command preamble
pub(crate) trait Command: Copy {
    fn address(self) -> u16;
}

/// All the functions to interact with the panel from a host scheduler
///
/// This trait includes all public functions needed to drive the display as a
/// best-effort peripheral: nothing in here returns the controller's protocol
/// faults to the caller, only transport errors of the SPI bus itself.
///
/// Drawing happens against the internal framebuffer (see the `DrawTarget`
/// implementation of the driver) and is pushed out on the next
/// [update](EpaperDisplay::update) tick.
pub trait EpaperDisplay<SPI, CS, BUSY, RST, DELAY>
where
    SPI: SpiBus,
    CS: OutputPin,
    BUSY: InputPin,
    RST: OutputPin,
    DELAY: DelayNs,
{
    /// The Color Type used by the Display
    type DisplayColor;

    /// Resets the controller, negotiates the panel geometry and image buffer
    /// address, allocates the framebuffer, powers the controller up and
    /// clears the panel.
    ///
    /// Implausible geometry from the controller marks the driver permanently
    /// failed; every later call is then a no-op.
    fn setup(&mut self, spi: &mut SPI, delay: &mut DELAY) -> Result<(), SPI::Error>;

    /// One scheduler tick.
    ///
    /// Flushes all dirty regions to the panel with a reduced-flash update,
    /// and after 20s without further draws issues one full-quality cleaning
    /// pass to remove accumulated ghosting.
    ///
    /// `now_ms` is a monotonic millisecond timestamp supplied by the host
    /// scheduler; wrap-around is handled.
    fn update(&mut self, spi: &mut SPI, delay: &mut DELAY, now_ms: u32) -> Result<(), SPI::Error>;

    /// Fills the framebuffer with white and pushes the full panel through
    /// the image load protocol.
    ///
    /// With `refresh` an Init mode update follows, which is the only path
    /// guaranteed to remove ghosting from an unknown starting state.
    fn clear_frame(
        &mut self,
        spi: &mut SPI,
        delay: &mut DELAY,
        refresh: bool,
    ) -> Result<(), SPI::Error>;

    /// Get the width of the panel
    fn width(&self) -> u16;

    /// Get the height of the panel
    fn height(&self) -> u16;

    /// Log the negotiated panel geometry, version strings and driver state
    fn dump_config(&self);
}
