//! Stream-kind selectors.
//!
//! Byte 0 of every frame header names the process stream the payload
//! belongs to. Any other selector value is carried on the wire but never
//! routed to a subscriber.

use std::fmt;
use std::str::FromStr;

use crate::error::FrameError;

/// Selector byte for standard input.
pub const STDIN: u8 = 0;

/// Selector byte for standard output.
pub const STDOUT: u8 = 1;

/// Selector byte for standard error.
pub const STDERR: u8 = 2;

/// The process stream a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StreamKind {
    Stdin = STDIN,
    Stdout = STDOUT,
    Stderr = STDERR,
}

impl StreamKind {
    /// All routable kinds, in selector order.
    pub const ALL: [StreamKind; 3] = [StreamKind::Stdin, StreamKind::Stdout, StreamKind::Stderr];

    /// Resolve a header selector byte.
    pub fn from_selector(selector: u8) -> Option<Self> {
        match selector {
            STDIN => Some(Self::Stdin),
            STDOUT => Some(Self::Stdout),
            STDERR => Some(Self::Stderr),
            _ => None,
        }
    }

    /// The header selector byte for this kind.
    pub fn selector(self) -> u8 {
        self as u8
    }

    /// Lower-case stream name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Stdin => "stdin",
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StreamKind {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdin" | "0" => Ok(Self::Stdin),
            "stdout" | "1" => Ok(Self::Stdout),
            "stderr" | "2" => Ok(Self::Stderr),
            _ => Err(FrameError::UnknownStream(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_roundtrip() {
        for kind in StreamKind::ALL {
            assert_eq!(StreamKind::from_selector(kind.selector()), Some(kind));
        }
    }

    #[test]
    fn out_of_range_selector_is_unrouted() {
        assert_eq!(StreamKind::from_selector(3), None);
        assert_eq!(StreamKind::from_selector(0xFF), None);
    }

    #[test]
    fn parses_names() {
        assert_eq!("stdout".parse::<StreamKind>().unwrap(), StreamKind::Stdout);
        assert_eq!(" STDERR ".parse::<StreamKind>().unwrap(), StreamKind::Stderr);
        assert!(matches!(
            "tty".parse::<StreamKind>(),
            Err(FrameError::UnknownStream(_))
        ));
    }
}
