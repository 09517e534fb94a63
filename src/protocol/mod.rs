//! Effector board command protocol
//!
//! Pure encode/decode for the ASCII frames the boards understand. The
//! device link in [`crate::device`] owns transmission; nothing in this
//! module performs I/O.

pub mod codec;
pub mod constants;

pub use codec::{
    decode_detonate, encode_arm, encode_detonate, encode_read_id, encode_set_id, DeviceCommand,
};
