//! Navigation messages sent by the device screens

/// Leave the current screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Back;
