use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No bus handle is held.
    Disconnected,
    /// The bus is unreachable or a transaction failed.
    Transport,
    /// The bus is connected but no filesystem is mounted.
    NotMounted,
    /// Media carries no valid super block for the configured geometry.
    NotFormatted,
    /// A block failed its magic or CRC check.
    InconsistentState,
    OutOfBounds,
    OutOfSpace,
    /// A small-integer write carried a value that does not fit in a byte.
    InvalidValue,
    InvalidName,
    InvalidConfig,
    NoEntry,
    AlreadyExists,
}

/// Coarse grouping callers translate into their own error surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transport,
    Filesystem,
    NotFound,
    Conflict,
    Capacity,
    Invalid,
}

impl ErrorKind {
    pub fn class(&self) -> ErrorClass {
        match self {
            ErrorKind::Disconnected | ErrorKind::Transport => ErrorClass::Transport,
            ErrorKind::NotMounted | ErrorKind::NotFormatted | ErrorKind::InconsistentState => {
                ErrorClass::Filesystem
            }
            ErrorKind::OutOfBounds | ErrorKind::OutOfSpace => ErrorClass::Capacity,
            ErrorKind::NoEntry => ErrorClass::NotFound,
            ErrorKind::AlreadyExists => ErrorClass::Conflict,
            ErrorKind::InvalidValue | ErrorKind::InvalidName | ErrorKind::InvalidConfig => {
                ErrorClass::Invalid
            }
        }
    }

    /// HTTP status an API layer reports for this error.
    ///
    /// Capacity errors share the internal-error code with filesystem failures.
    pub fn status_code(&self) -> u16 {
        match self.class() {
            ErrorClass::NotFound => 404,
            ErrorClass::Conflict | ErrorClass::Invalid => 400,
            ErrorClass::Transport => 503,
            ErrorClass::Filesystem | ErrorClass::Capacity => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ErrorKind::Disconnected => "bus not connected",
            ErrorKind::Transport => "bus transaction failed",
            ErrorKind::NotMounted => "filesystem not mounted",
            ErrorKind::NotFormatted => "media not formatted",
            ErrorKind::InconsistentState => "corrupt block",
            ErrorKind::OutOfBounds => "range outside device capacity",
            ErrorKind::OutOfSpace => "no space left on device",
            ErrorKind::InvalidValue => "value does not fit in a byte",
            ErrorKind::InvalidName => "invalid file name",
            ErrorKind::InvalidConfig => "invalid configuration",
            ErrorKind::NoEntry => "no such file",
            ErrorKind::AlreadyExists => "file already exists",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ErrorKind {}
