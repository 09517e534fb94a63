//! Protocol constants

/// Width of the detonation bitmap in bits (one slot per participant)
pub const BITMAP_BITS: usize = 128;

/// Width of the detonation bitmap in bytes
pub const BITMAP_BYTES: usize = BITMAP_BITS / 8;

/// Baud rate the effector boards run at
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Terminator of device reply lines
pub const REPLY_TERMINATOR: u8 = b'\n';
