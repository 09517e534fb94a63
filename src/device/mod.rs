//! Serial device transport

pub mod link;

pub use link::DeviceLink;
