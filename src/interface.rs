use crate::traits::Command;
use core::marker::PhantomData;
use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
    spi::SpiBus,
};

/// Every 16-bit word group on the bus is introduced by one of these
/// preamble words.
pub(crate) const PREAMBLE_COMMAND: u16 = 0x6000;
pub(crate) const PREAMBLE_WRITE_DATA: u16 = 0x0000;
pub(crate) const PREAMBLE_READ_DATA: u16 = 0x1000;

/// How long a single ready poll may take before the transaction is dropped
const DEFAULT_READY_TIMEOUT_MS: u32 = 3000;
/// Sleep between two ready polls
const READY_POLL_MS: u32 = 10;

/// The Connection Interface of IT8951E based panels
///
/// The controller has no data/command pin; instead every bus phase starts
/// with a preamble word, and the HRDY line gates each phase. A phase that
/// never becomes ready is logged and silently dropped - the controller is a
/// best-effort peripheral and its callers must not assume side effects
/// completed.
pub(crate) struct DisplayInterface<SPI, CS, BUSY, RST, DELAY> {
    /// SPI
    _spi: PhantomData<SPI>,
    /// DELAY
    _delay: PhantomData<DELAY>,
    /// Active-low chip select, driven by the interface itself
    cs: CS,
    /// High when the controller can accept the next bus phase
    busy: BUSY,
    /// Pin for Resetting
    rst: RST,
    /// Bound on each ready poll in ms
    timeout_ms: u32,
}

/// Asserts the active-low chip select on construction and releases it again
/// on drop, covering every exit path of a preamble/payload pair - including
/// the early ones where a ready poll timed out and the payload was skipped.
struct SelectGuard<'a, CS: OutputPin> {
    cs: &'a mut CS,
}

impl<'a, CS: OutputPin> SelectGuard<'a, CS> {
    fn new(cs: &'a mut CS) -> Self {
        let _ = cs.set_low();
        SelectGuard { cs }
    }
}

impl<CS: OutputPin> Drop for SelectGuard<'_, CS> {
    fn drop(&mut self) {
        let _ = self.cs.set_high();
    }
}

/// The controller is big-endian while the usual host is not, so all words
/// are put on the wire high byte first.
fn send_word<SPI: SpiBus>(spi: &mut SPI, word: u16) -> Result<(), SPI::Error> {
    spi.write(&word.to_be_bytes())
}

fn wait_ready<BUSY: InputPin, DELAY: DelayNs>(
    busy: &mut BUSY,
    delay: &mut DELAY,
    timeout_ms: u32,
) -> bool {
    let mut waited = 0;
    loop {
        if busy.is_high().unwrap_or(false) {
            return true;
        }
        if waited >= timeout_ms {
            return false;
        }
        delay.delay_ms(READY_POLL_MS);
        waited += READY_POLL_MS;
    }
}

impl<SPI, CS, BUSY, RST, DELAY> DisplayInterface<SPI, CS, BUSY, RST, DELAY>
where
    SPI: SpiBus,
    CS: OutputPin,
    BUSY: InputPin,
    RST: OutputPin,
    DELAY: DelayNs,
{
    /// Creates a new `DisplayInterface` struct
    ///
    /// If no ready timeout is given, a default timeout of 3000ms is used.
    pub fn new(cs: CS, busy: BUSY, rst: RST, timeout_ms: Option<u32>) -> Self {
        let timeout_ms = timeout_ms.unwrap_or(DEFAULT_READY_TIMEOUT_MS);
        DisplayInterface {
            _spi: PhantomData,
            _delay: PhantomData,
            cs,
            busy,
            rst,
            timeout_ms,
        }
    }

    /// Waits until the controller can accept the next bus phase.
    ///
    /// Returns false once the timeout elapsed; the pending operation is then
    /// dropped without transferring anything.
    pub(crate) fn wait_ready(&mut self, delay: &mut DELAY) -> bool {
        wait_ready(&mut self.busy, delay, self.timeout_ms)
    }

    /// Basic function for sending [Commands](Command).
    ///
    /// Enables direct interaction with the device with the help of
    /// [write_word()](DisplayInterface::write_word())
    pub(crate) fn cmd<T: Command>(
        &mut self,
        spi: &mut SPI,
        delay: &mut DELAY,
        command: T,
    ) -> Result<(), SPI::Error> {
        log::debug!("write command {:#06x}", command.address());
        if !self.wait_ready(delay) {
            log::error!(
                "display busy trying to write preamble for command {:#06x}",
                command.address()
            );
            return Ok(());
        }

        let Self {
            cs,
            busy,
            timeout_ms,
            ..
        } = self;
        let _select = SelectGuard::new(cs);

        send_word(spi, PREAMBLE_COMMAND)?;

        if wait_ready(busy, delay, *timeout_ms) {
            send_word(spi, command.address())?;
        } else {
            log::error!(
                "display busy trying to write command {:#06x}",
                command.address()
            );
        }
        spi.flush()
    }

    /// Basic function for sending [Commands](Command) and the argument words
    /// belonging to it.
    ///
    /// A readiness timeout mid-sequence aborts the remaining arguments.
    pub(crate) fn cmd_with_args<T: Command>(
        &mut self,
        spi: &mut SPI,
        delay: &mut DELAY,
        command: T,
        args: &[u16],
    ) -> Result<(), SPI::Error> {
        self.cmd(spi, delay, command)?;

        if !self.wait_ready(delay) {
            log::error!("display not ready to receive command arguments preamble");
            return Ok(());
        }

        let Self {
            cs,
            busy,
            timeout_ms,
            ..
        } = self;
        let _select = SelectGuard::new(cs);

        send_word(spi, PREAMBLE_WRITE_DATA)?;

        for (argument, &arg) in args.iter().enumerate() {
            if !wait_ready(busy, delay, *timeout_ms) {
                log::error!("display not ready to receive command argument #{}", argument);
                break;
            }
            send_word(spi, arg)?;
        }
        spi.flush()
    }

    /// Writes one data word to the controller
    pub(crate) fn write_word(
        &mut self,
        spi: &mut SPI,
        delay: &mut DELAY,
        data: u16,
    ) -> Result<(), SPI::Error> {
        log::trace!("write word {:#06x}", data);
        if !self.wait_ready(delay) {
            log::error!(
                "display busy trying to write preamble for writing {:#06x}",
                data
            );
            return Ok(());
        }

        let Self {
            cs,
            busy,
            timeout_ms,
            ..
        } = self;
        let _select = SelectGuard::new(cs);

        send_word(spi, PREAMBLE_WRITE_DATA)?;

        if wait_ready(busy, delay, *timeout_ms) {
            send_word(spi, data)?;
        } else {
            log::error!("display busy trying to write {:#06x}", data);
        }
        spi.flush()
    }

    /// Reads multiple bytes from the controller into the given buffer.
    ///
    /// A dropped phase leaves the buffer as it was - with the usual zeroed
    /// buffer the caller then sees all-zero data, never garbage.
    ///
    /// Reads shorter than 4 bytes may clock out 4 bytes on DMA-capable
    /// hosts, so chaining several short reads can lose data; read into one
    /// buffer instead.
    pub(crate) fn read_bytes(
        &mut self,
        spi: &mut SPI,
        delay: &mut DELAY,
        buf: &mut [u8],
    ) -> Result<(), SPI::Error> {
        if !self.wait_ready(delay) {
            log::error!("display not ready to receive read data preamble");
            return Ok(());
        }

        let Self {
            cs,
            busy,
            timeout_ms,
            ..
        } = self;
        let _select = SelectGuard::new(cs);

        send_word(spi, PREAMBLE_READ_DATA)?;

        if wait_ready(busy, delay, *timeout_ms) {
            // one dummy word before the controller starts clocking data out
            send_word(spi, 0x0000)?;
            if wait_ready(busy, delay, *timeout_ms) {
                spi.read(buf)?;
            } else {
                log::error!("display not ready to send data");
            }
        } else {
            log::error!("display not ready to receive read data dummy word");
        }
        spi.flush()
    }

    /// Reads one data word from the controller, swapping it to host byte
    /// order. A dropped phase reads as 0.
    pub(crate) fn read_word(
        &mut self,
        spi: &mut SPI,
        delay: &mut DELAY,
    ) -> Result<u16, SPI::Error> {
        let mut buf = [0u8; 2];
        self.read_bytes(spi, delay, &mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Streams raw image bytes under a single chip-select assertion: one
    /// write-data preamble, then every slice back to back.
    ///
    /// This is the bulk load path; the controller accepts the whole burst
    /// without per-word handshaking.
    pub(crate) fn data_frames<'a, I>(
        &mut self,
        spi: &mut SPI,
        delay: &mut DELAY,
        frames: I,
    ) -> Result<(), SPI::Error>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        if !self.wait_ready(delay) {
            log::error!("display not ready to receive image data");
            return Ok(());
        }

        let _select = SelectGuard::new(&mut self.cs);

        send_word(spi, PREAMBLE_WRITE_DATA)?;
        for frame in frames {
            spi.write(frame)?;
        }
        spi.flush()
    }

    /// Resets the device.
    ///
    /// The controller needs the reset line held low for 20ms and takes
    /// around 100ms to come back up afterwards.
    pub(crate) fn reset(&mut self, delay: &mut DELAY) {
        let _ = self.rst.set_high();
        let _ = self.rst.set_low();
        delay.delay_ms(20);
        let _ = self.rst.set_high();
        delay.delay_ms(100);
    }
}
