//! Commands, registers and update modes of the IT8951E controller
//!
//! For more infos about the command set and the waveform tradeoffs look
//! into the IT8951 datasheet and the E Ink waveform application notes.

use crate::traits;

use bit_field::BitField;

/// IT8951E command words
#[allow(dead_code)]
#[derive(Copy, Clone)]
pub(crate) enum Command {
    /// Leave standby and run the system
    SysRun = 0x0001,
    /// Put the system in standby (defined for completeness, never issued)
    Standby = 0x0002,
    /// Put the system to sleep (defined for completeness, never issued)
    Sleep = 0x0003,
    /// Read a register
    RegRead = 0x0010,
    /// Write a register
    RegWrite = 0x0011,
    /// Memory burst read prepare
    MemBurstReadTrigger = 0x0012,
    /// Memory burst read start
    MemBurstReadStart = 0x0013,
    /// Memory burst write
    MemBurstWrite = 0x0014,
    /// End memory burst operation
    MemBurstEnd = 0x0015,
    /// Load a full frame into the image buffer
    LoadImage = 0x0020,
    /// Load a sub-area of the image buffer
    LoadImageArea = 0x0021,
    /// End an image load
    LoadImageEnd = 0x0022,
    /// Refresh an area of the panel
    DisplayArea = 0x0034,
    /// Refresh an area of the panel from a given buffer address
    DisplayBufArea = 0x0037,
    /// Get or set the VCOM voltage
    Vcom = 0x0039,
    /// Read the 40 byte device info block
    GetDeviceInfo = 0x0302,
}

impl traits::Command for Command {
    /// Returns the command word
    fn address(self) -> u16 {
        self as u16
    }
}

/// IT8951E register addresses
#[allow(dead_code)]
#[derive(Copy, Clone)]
pub(crate) enum Register {
    /// I80 pack write configuration
    I80Cpcr = 0x0004,
    /// Memory converter control/status
    Mcsr = 0x0200,
    /// Image buffer target address, low word
    Lisar = 0x0208,
    /// Image buffer target address, high word
    Lisarh = 0x020C,
    /// LUT0 engine width/height
    Lut0Ewhr = 0x1000,
    /// LUT0 XY
    Lut0Xyr = 0x1040,
    /// LUT0 base address
    Lut0Baddr = 0x1080,
    /// LUT0 mode and frame number
    Lut0Mfn = 0x10C0,
    /// LUT0 and LUT1 active flag
    Lut01Af = 0x1114,
    /// Update parameter 0
    Up0Sr = 0x1134,
    /// Update parameter 1
    Up1Sr = 0x1138,
    /// LUT0 alpha blend and fill rectangle value
    Lut0Abfrv = 0x113C,
    /// Update buffer base address
    Upbbaddr = 0x117C,
    /// LUT0 image buffer XY offset
    Lut0Imxy = 0x1180,
    /// Status of all LUT engines; 0 when the display engine is idle
    Lutafsr = 0x1224,
    /// Bitmap (1bpp) image color table
    Bgvr = 0x1250,
}

impl Register {
    /// Returns the register address
    pub(crate) fn address(self) -> u16 {
        self as u16
    }
}

/// Waveform selection for a panel refresh.
///
/// Each mode is a controller-internal voltage sequence with its own
/// speed/ghosting/gray-level tradeoff. The update scheduler picks these
/// programmatically: GL16 for the reduced-flash partial flushes, GC16 for
/// the periodic cleaning pass, Init for clearing from an unknown state.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum UpdateMode {
    /// Erases the display to white regardless of the image buffer
    /// (~2000ms, no ghosting left behind).
    ///
    /// Useful whenever the optical state of the panel is not a faithful
    /// rendition of the buffer, e.g. right after power-up.
    Init = 0,
    /// Direct update, any graytone to black or white only (~260ms, low
    /// ghosting). Fast enough for menu/touch feedback.
    DU = 1,
    /// Grayscale clearing with a full flash, 16 gray levels (~450ms, very
    /// low ghosting). The high-quality mode used for the cleaning pass.
    GC16 = 2,
    /// 16 gray levels with reduced flash (~450ms, medium ghosting). Suited
    /// for sparse content on a white background such as text; used for the
    /// partial flushes.
    GL16 = 3,
    /// GL16 variant for hosts with an image preprocessing algorithm
    /// (~450ms, low ghosting); behaves as GL16 with even pixel states.
    GLR16 = 4,
    /// Like GLR16 with a lighter background flash; recommended for full
    /// panel updates only (~450ms, low ghosting).
    GLD16 = 5,
    /// Fast page flipping at reduced contrast, 4 gray levels (~120ms,
    /// medium ghosting).
    DU4 = 6,
    /// Fast black/white animation mode (~290ms, medium ghosting); pairs
    /// with a white transition image to limit ghosting buildup.
    A2 = 7,
    /// No update at all; an area refresh with this mode is dropped
    None = 8,
}

/// Pixel depth of an image load
#[allow(dead_code)]
#[derive(Copy, Clone)]
pub(crate) enum PixelFormat {
    Bpp2 = 0,
    Bpp3 = 1,
    Bpp4 = 2,
    Bpp8 = 3,
}

/// Byte order of the packed pixels in an image load.
///
/// Big endian puts the pixel with the lower x of a 4bpp pair into the high
/// nibble, which is how the framebuffer is packed.
#[allow(dead_code)]
#[derive(Copy, Clone)]
pub(crate) enum MemoryEndian {
    Little = 0,
    Big = 1,
}

/// Hardware rotation applied by the controller during an image load
#[allow(dead_code)]
#[derive(Copy, Clone)]
pub(crate) enum Rotation {
    Rotate0 = 0,
    Rotate90 = 1,
    Rotate180 = 2,
    Rotate270 = 3,
}

/// Packs the first argument word of a load-image command:
/// bit 8 endianness, bits 7..4 pixel format, bits 3..0 rotation
pub(crate) fn load_image_arg(
    endian: MemoryEndian,
    format: PixelFormat,
    rotation: Rotation,
) -> u16 {
    *0u16
        .set_bits(8..9, endian as u16)
        .set_bits(4..8, format as u16)
        .set_bits(0..4, rotation as u16)
}
