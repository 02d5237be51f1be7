//! Peer state machines and their wire values.
//!
//! Each peer owns exactly one state word and never stores to the other's.
//! The numeric values are part of the wire protocol; both peers must
//! agree on them, so they are fixed here and pinned by tests.

use std::fmt;

/// Writer-owned state word values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum WriterState {
    /// Process not yet running or region freshly zeroed.
    Uninitialised = 0,
    /// First-time setup in progress; header fields are being zeroed.
    Initialising = 1,
    /// Idle between messages; the only state in which a completed
    /// message may be observed by the reader.
    Ready = 2,
    /// A message for the advertised `sequence` is published and stable.
    Sending = 3,
    /// Shutdown: no further messages will be published.
    Completed = 4,
}

impl WriterState {
    /// Decode a wire value. Returns `None` for values outside the enum.
    #[inline]
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Uninitialised),
            1 => Some(Self::Initialising),
            2 => Some(Self::Ready),
            3 => Some(Self::Sending),
            4 => Some(Self::Completed),
            _ => None,
        }
    }

    /// State name for transition logging.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Uninitialised => "UNINITIALISED",
            Self::Initialising => "INITIALISING",
            Self::Ready => "READY",
            Self::Sending => "SENDING",
            Self::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for WriterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reader-owned state word values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ReaderState {
    /// Process not yet running or region freshly zeroed.
    Uninitialised = 0,
    /// Waiting for the writer's ready token.
    WaitingForWriter = 1,
    /// Idle between messages.
    Ready = 2,
    /// Consuming the currently advertised message.
    Processing = 3,
    /// Timings (and error code) written; message fully consumed.
    Acknowledged = 4,
}

impl ReaderState {
    /// Decode a wire value. Returns `None` for values outside the enum.
    #[inline]
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Uninitialised),
            1 => Some(Self::WaitingForWriter),
            2 => Some(Self::Ready),
            3 => Some(Self::Processing),
            4 => Some(Self::Acknowledged),
            _ => None,
        }
    }

    /// State name for transition logging.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Uninitialised => "UNINITIALISED",
            Self::WaitingForWriter => "WAITING_FOR_WRITER",
            Self::Ready => "READY",
            Self::Processing => "PROCESSING",
            Self::Acknowledged => "ACKNOWLEDGED",
        }
    }
}

impl fmt::Display for ReaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Format a possibly-invalid writer state word for diagnostics.
pub fn writer_state_label(value: u32) -> String {
    match WriterState::from_u32(value) {
        Some(state) => state.name().to_string(),
        None => format!("INVALID({value})"),
    }
}

/// Format a possibly-invalid reader state word for diagnostics.
pub fn reader_state_label(value: u32) -> String {
    match ReaderState::from_u32(value) {
        Some(state) => state.name().to_string(),
        None => format!("INVALID({value})"),
    }
}
