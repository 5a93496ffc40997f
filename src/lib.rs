//! A simple Driver for e-paper panels driven by the ITE IT8951E controller via SPI
//!
//! This driver was built using [`embedded-hal`] traits.
//!
//! [`embedded-hal`]: https://docs.rs/embedded-hal/~1
//!
//! # Requirements
//!
//! ### SPI
//!
//! - MISO is connected (device info and registers are read back)
//! - SPI_MODE_0 is used (CPHL = 0, CPOL = 0)
//! - 8 bits per word, MSB first
//! - Max. speed tested by myself was 12Mhz (the M5Paper reference design)
//!
//! The controller multiplexes commands, register access and image data over
//! 16-bit words, each word group introduced by a preamble word, and its HRDY
//! (ready) line must be high before every bus phase. Because the ready poll
//! happens *inside* a chip-select assertion, the driver owns the chip-select
//! pin itself and takes an [`embedded_hal::spi::SpiBus`] instead of an
//! `SpiDevice`.
//!
//! ### Other....
//!
//! - The panel geometry is not hardcoded: it is negotiated from the
//!   controller during [setup](crate::prelude::EpaperDisplay::setup)
//! - Buffersize: the internal framebuffer uses 4 bits per pixel, so it
//!   always needs to be of the size: `width * height / 2`
//!
//! # Examples
//!
//! ```ignore
//! use it8951e::{it8951e::It8951e, prelude::*};
//!
//! let mut epd = It8951e::new(cs, busy, rst, None);
//! epd.setup(&mut spi, &mut delay)?;
//!
//! // draw something into the internal framebuffer with embedded-graphics
//! let _ = Line::new(Point::new(0, 120), Point::new(0, 295))
//!     .into_styled(PrimitiveStyle::with_stroke(Gray16::BLACK, 1))
//!     .draw(&mut epd);
//!
//! // one scheduler tick: flushes the dirty regions to the panel, and after
//! // 20s of inactivity issues one full-quality cleaning pass
//! epd.update(&mut spi, &mut delay, millis())?;
//! ```
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod color;

/// Interface for the physical connection between display and the controlling device
mod interface;

mod traits;

pub mod graphics;

pub mod rect;

pub mod it8951e;

/// Computes the needed buffer length for the packed 4 bits per pixel
/// framebuffer of a panel with the given dimensions
pub const fn buffer_len(width: usize, height: usize) -> usize {
    width * height / 2
}

pub mod prelude {
    //! Exports the commonly used types
    pub use crate::color::Gray16;
    pub use crate::it8951e::command::UpdateMode;
    pub use crate::it8951e::It8951e;
    pub use crate::traits::EpaperDisplay;
    pub use crate::SPI_MODE;
}

use embedded_hal::spi::{Mode, Phase, Polarity};

/// SPI mode -
/// For more infos see [Requirements: SPI](index.html#spi)
pub const SPI_MODE: Mode = Mode {
    phase: Phase::CaptureOnFirstTransition,
    polarity: Polarity::IdleLow,
};
