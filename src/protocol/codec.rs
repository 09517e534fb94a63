//! Device command frame encoding
//!
//! The effector boards speak a tiny ASCII protocol: one command per frame,
//! `#` prefix, comma-separated payload, `;` terminator.
//!
//! ```text
//! #SID,<ddd>;     assign board ID (3-digit zero-padded decimal)
//! #RID,;          request board ID (reply logged, never parsed)
//! #DET,<hex32>;   128-bit detonation bitmap, 32 lowercase hex chars
//! #ARM,<1|0>;     arm / disarm
//! ```
//!
//! The detonation bitmap is built MSB-first (bit position 0 is the most
//! significant bit of the first byte), but the boards clock each byte out
//! LSB-first, so the bit order of every byte is reversed independently
//! before hex rendering. Encoding is pure: no I/O happens here.

use std::collections::BTreeSet;

use super::constants::{BITMAP_BITS, BITMAP_BYTES};

/// One command for the effector boards
///
/// Commands are stateless and constructed fresh per transmission. `Reset`
/// carries no ASCII frame; it is an out-of-band control-line toggle handled
/// by the device link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    /// Assign a board ID
    SetId(u32),
    /// Request the board ID
    ReadId,
    /// Transmit the kill set as a 128-bit bitmap
    Detonate(BTreeSet<u32>),
    /// Arm (true) or disarm (false) the boards
    Arm(bool),
    /// Hardware reset via the DTR line
    Reset,
}

impl DeviceCommand {
    /// Render the ASCII frame for this command, or `None` for `Reset`
    pub fn frame(&self) -> Option<String> {
        match self {
            DeviceCommand::SetId(number) => Some(encode_set_id(*number)),
            DeviceCommand::ReadId => Some(encode_read_id()),
            DeviceCommand::Detonate(ids) => Some(encode_detonate(ids)),
            DeviceCommand::Arm(armed) => Some(encode_arm(*armed)),
            DeviceCommand::Reset => None,
        }
    }
}

/// Encode a board-ID assignment frame
pub fn encode_set_id(number: u32) -> String {
    format!("#SID,{:03};", number)
}

/// Encode a board-ID request frame
pub fn encode_read_id() -> String {
    "#RID,;".to_string()
}

/// Encode an arm/disarm frame
pub fn encode_arm(armed: bool) -> String {
    format!("#ARM,{};", if armed { 1 } else { 0 })
}

/// Encode a detonation frame for the given participant numbers
///
/// Bit position equals the raw participant number, counted MSB-first across
/// the 16-byte field; number 128 lands on bit position 0, so the full set
/// `{1..128}` covers every bit. Numbers outside `1..=128` are ignored (the
/// bitmap has no slot for them). The result is deterministic and does not
/// depend on input order.
pub fn encode_detonate(ids: &BTreeSet<u32>) -> String {
    let mut field = [0u8; BITMAP_BYTES];
    for &id in ids {
        if id < 1 || id > BITMAP_BITS as u32 {
            continue;
        }
        let pos = (id as usize) % BITMAP_BITS;
        field[pos / 8] |= 0x80 >> (pos % 8);
    }

    let mut payload = String::with_capacity(BITMAP_BYTES * 2);
    for byte in field {
        // Per-byte bit reversal: the board shifts each byte out LSB-first.
        payload.push_str(&format!("{:02x}", byte.reverse_bits()));
    }
    format!("#DET,{};", payload)
}

/// Decode a detonation payload (the 32 hex chars, without frame framing)
/// back into the participant numbers it targets
///
/// Inverse of [`encode_detonate`] for every subset of `1..=128`. Returns
/// `None` if the payload is not exactly 32 hex characters. Used by tests
/// and diagnostics; the live protocol never decodes.
pub fn decode_detonate(payload: &str) -> Option<BTreeSet<u32>> {
    if payload.len() != BITMAP_BYTES * 2 {
        return None;
    }

    let mut ids = BTreeSet::new();
    for (index, chunk) in payload.as_bytes().chunks(2).enumerate() {
        let text = std::str::from_utf8(chunk).ok()?;
        let byte = u8::from_str_radix(text, 16).ok()?.reverse_bits();
        for bit in 0..8 {
            if byte & (0x80 >> bit) != 0 {
                let pos = index * 8 + bit;
                ids.insert(if pos == 0 { BITMAP_BITS as u32 } else { pos as u32 });
            }
        }
    }
    Some(ids)
}
