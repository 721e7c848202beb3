// SPDX-License-Identifier: Apache-2.0

use std::fmt;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[non_exhaustive]
pub enum ErrorKind {
    InvalidArgument,
    Bug,
    InvalidDhcpMessage,
    InvalidDhcpServerReply,
    NoLease,
    NotSupported,
    Timeout,
    IoError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidArgument => "invalid_argument",
            Self::Bug => "bug",
            Self::InvalidDhcpMessage => "invalid_dhcp_message",
            Self::InvalidDhcpServerReply => "invalid_dhcp_server_reply",
            Self::NoLease => "no_lease",
            Self::NotSupported => "not_supported",
            Self::Timeout => "timeout",
            Self::IoError => "io_error",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DhcpError {
    kind: ErrorKind,
    msg: String,
}

impl DhcpError {
    pub fn new(kind: ErrorKind, msg: String) -> Self {
        Self { kind, msg }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn msg(&self) -> &str {
        &self.msg
    }
}

impl fmt::Display for DhcpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.msg)
    }
}

impl std::error::Error for DhcpError {}

/// Extension trait for wrapping a lower-level `Result` with a higher-level
/// message while preserving the kind the conversion from the source error
/// already picked.
pub(crate) trait ErrorContext<T> {
    fn context(self, msg: &str) -> Result<T, DhcpError>;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: Into<DhcpError>,
{
    fn context(self, msg: &str) -> Result<T, DhcpError> {
        self.map_err(|e| {
            let e: DhcpError = e.into();
            DhcpError::new(e.kind, format!("{msg}: {}", e.msg))
        })
    }
}

impl From<std::io::Error> for DhcpError {
    fn from(e: std::io::Error) -> Self {
        let kind = match e.kind() {
            std::io::ErrorKind::TimedOut => ErrorKind::Timeout,
            _ => ErrorKind::IoError,
        };
        DhcpError::new(kind, format!("I/O error: {e}"))
    }
}

impl From<std::ffi::NulError> for DhcpError {
    fn from(e: std::ffi::NulError) -> Self {
        DhcpError::new(ErrorKind::InvalidArgument, format!("{e}"))
    }
}

impl From<nix::Error> for DhcpError {
    fn from(e: nix::Error) -> Self {
        DhcpError::new(ErrorKind::IoError, format!("{e}"))
    }
}

#[cfg(feature = "netlink")]
impl From<rtnetlink::Error> for DhcpError {
    fn from(e: rtnetlink::Error) -> Self {
        DhcpError::new(ErrorKind::Bug, format!("netlink error: {e}"))
    }
}
