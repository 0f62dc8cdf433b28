use std::convert::From;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::result;
use std::{io, sync};

/// StatusCode describes various failure modes of database operations.
#[derive(Clone, Debug, PartialEq)]
#[allow(dead_code)]
pub enum StatusCode {
    OK,

    AlreadyExists,
    Corruption,
    CompressionError,
    IOError,
    InvalidArgument,
    InvalidData,
    LockError,
    NotFound,
    NotSupported,
    PermissionDenied,
    Unknown,
    #[cfg(feature = "fs")]
    Errno(errno::Errno),
}

/// Status encapsulates a `StatusCode` and an error message. Errors are sticky on iterators: once
/// an iterator's `status()` goes non-OK it never clears on its own; navigation keeps going but a
/// caller must check `status()` to learn that some entries were skipped rather than consumed.
#[derive(Clone, Debug, PartialEq)]
pub struct Status {
    pub code: StatusCode,
    pub err: String,
}

impl Default for Status {
    fn default() -> Status {
        Status {
            code: StatusCode::OK,
            err: String::new(),
        }
    }
}

impl Display for Status {
    fn fmt(&self, fmt: &mut Formatter) -> result::Result<(), fmt::Error> {
        fmt.write_str(&self.err)
    }
}

impl Error for Status {}

impl Status {
    pub fn new(code: StatusCode, msg: &str) -> Status {
        let err = if msg.is_empty() {
            format!("{:?}", code)
        } else {
            format!("{:?}: {}", code, msg)
        };
        Status { code, err }
    }

    pub fn ok() -> Status {
        Status::default()
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::OK
    }

    pub fn annotate<S: AsRef<str>>(self, msg: S) -> Status {
        Status {
            code: self.code,
            err: format!("{}: {}", msg.as_ref(), self.err),
        }
    }
}

/// The core's result type.
pub type Result<T> = result::Result<T, Status>;

/// Shorthand for `Err(Status::new(code, msg))`, used at the many call sites in the codec, block
/// and table readers that bail out with a fresh status rather than propagating one.
pub fn err<T>(code: StatusCode, msg: &str) -> Result<T> {
    Err(Status::new(code, msg))
}

impl From<io::Error> for Status {
    fn from(e: io::Error) -> Status {
        let c = match e.kind() {
            io::ErrorKind::NotFound => StatusCode::NotFound,
            io::ErrorKind::InvalidData => StatusCode::Corruption,
            io::ErrorKind::InvalidInput => StatusCode::InvalidArgument,
            io::ErrorKind::PermissionDenied => StatusCode::PermissionDenied,
            _ => StatusCode::IOError,
        };

        Status::new(c, &e.to_string())
    }
}

/// Converts a raw `io::Result`, used by `Env` implementations whose underlying calls return
/// `io::Result` rather than our `Status`-based one.
pub fn from_io_result<T>(r: io::Result<T>) -> Result<T> {
    r.map_err(Status::from)
}

impl<T> From<sync::PoisonError<T>> for Status {
    fn from(_: sync::PoisonError<T>) -> Status {
        Status::new(StatusCode::LockError, "lock poisoned")
    }
}

#[cfg(feature = "fs")]
impl From<errno::Errno> for Status {
    fn from(e: errno::Errno) -> Status {
        let msg = e.to_string();
        Status::new(StatusCode::Errno(e), &msg)
    }
}
