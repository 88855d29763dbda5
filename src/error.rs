//! Error types

use std::fmt;

/// An error returned when a driver invokes the tracker out of order.
///
/// These are usage errors: they indicate that the scheduler integration broke
/// the call-order contract, not that the load signal is inaccurate. The
/// tracker's state is left untouched whenever one is returned.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Error {
    kind: Kind,
}

/// The call-order rule a driver broke.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Violation {
    /// A wait began while another wait was still in flight.
    WaitPending,
    /// A wait ended but none was in flight.
    NoWaitPending,
    /// The loop was reported stopped and has not been restarted with
    /// `on_loop_start`.
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Uninitialized,
    Protocol(Violation),
}

/// An invalid tracker configuration.
#[derive(Debug)]
pub struct InvalidConfig(&'static str);

// ===== impl Error =====

impl Error {
    pub(crate) fn uninitialized() -> Self {
        Error {
            kind: Kind::Uninitialized,
        }
    }

    pub(crate) fn protocol(violation: Violation) -> Self {
        Error {
            kind: Kind::Protocol(violation),
        }
    }

    /// Returns `true` if the tracker was used before `on_loop_start`.
    pub fn is_uninitialized(&self) -> bool {
        self.kind == Kind::Uninitialized
    }

    /// Returns `true` if the driver broke the hook call order.
    pub fn is_protocol(&self) -> bool {
        matches!(self.kind, Kind::Protocol(_))
    }

    /// Returns the broken call-order rule, if this is a protocol violation.
    pub fn violation(&self) -> Option<Violation> {
        match self.kind {
            Kind::Protocol(v) => Some(v),
            Kind::Uninitialized => None,
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Kind::Uninitialized => f.write_str("Uninitialized"),
            Kind::Protocol(v) => f.debug_tuple("Protocol").field(&v).finish(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Kind::Uninitialized => f.write_str("load tracker used before loop start"),
            Kind::Protocol(v) => write!(f, "loop hook protocol violation: {}", v),
        }
    }
}

impl std::error::Error for Error {}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::WaitPending => f.write_str("a wait is already in flight"),
            Violation::NoWaitPending => f.write_str("no wait is in flight"),
            Violation::Stopped => f.write_str("loop stopped without a restart"),
        }
    }
}

// ===== impl InvalidConfig =====

impl InvalidConfig {
    pub(crate) fn new(reason: &'static str) -> Self {
        InvalidConfig(reason)
    }
}

impl fmt::Display for InvalidConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid load tracker config: {}", self.0)
    }
}

impl std::error::Error for InvalidConfig {}
