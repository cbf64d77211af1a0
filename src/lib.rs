//! masterknx - Headless host for the KNX device screens
//!
//! Drives the device list presentation model from stdin and reports what a
//! view would render as NDJSON on stdout.

pub mod headless;
pub mod message;
pub mod signals;

pub use headless::runner::run_headless;
