use alloc::boxed::Box;
use core::fmt;

/// Represents an error while parsing an SMF file or decoding one of its tracks.
///
/// This type wraps an `ErrorKind`, an optional chain of underlying errors and, when known, the
/// track and absolute byte position where decoding failed.
///
/// If the `std` feature is enabled, this type implements `std::error::Error`.
/// Otherwise, only `Display` and `Debug` are implemented (the `source` method on the `Error` type
/// itself is still available, though).
///
/// For more information about the error classes used by `smfread`, see
/// [`ErrorKind`](enum.ErrorKind.html).
#[derive(Clone)]
pub struct Error {
    kind: &'static ErrorKind,
    track: Option<usize>,
    position: Option<usize>,
    src: Option<Box<Error>>,
}
impl Error {
    /// Create a new error with the given `ErrorKind`.
    #[inline]
    pub fn new(kind: &'static ErrorKind) -> Error {
        Error::from(kind)
    }

    /// More information about the error itself.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        *self.kind
    }

    /// The underlying cause for this error.
    ///
    /// This method is available even if the `std` feature is not enabled.
    #[inline]
    pub fn source(&self) -> Option<&Error> {
        self.src.as_deref()
    }

    /// The index of the track being decoded when the error occurred, if any.
    #[inline]
    pub fn track(&self) -> Option<usize> {
        self.track
    }

    /// The absolute byte position in the file where the failing chunk or event starts, if known.
    #[inline]
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// Whether the file itself could not be indexed.
    #[inline]
    pub fn is_invalid(&self) -> bool {
        matches!(self.kind, ErrorKind::Invalid(_))
    }

    /// Whether the event stream of a track is corrupted.
    #[inline]
    pub fn is_malformed(&self) -> bool {
        matches!(self.kind, ErrorKind::Malformed(_))
    }

    /// Wrap this error in a new context, keeping its location.
    #[inline]
    pub(crate) fn chain_ctx(self, ctx: &'static ErrorKind) -> Error {
        Error {
            kind: ctx,
            track: self.track,
            position: self.position,
            src: Some(Box::new(self)),
        }
    }

    /// Attach the track index, unless a location was already attached deeper in the chain.
    #[inline]
    pub(crate) fn at_track(mut self, track: usize) -> Error {
        if self.track.is_none() {
            self.track = Some(track);
        }
        self
    }

    #[inline]
    pub(crate) fn at_position(mut self, position: usize) -> Error {
        if self.position.is_none() {
            self.position = Some(position);
        }
        self
    }
}
impl From<&'static ErrorKind> for Error {
    #[inline]
    fn from(kind: &'static ErrorKind) -> Error {
        Error {
            kind,
            track: None,
            position: None,
            src: None,
        }
    }
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self.kind, f)?;
        match (self.track, self.position) {
            (Some(track), Some(pos)) => write!(f, " (track {}, byte {:#X})", track, pos),
            (Some(track), None) => write!(f, " (track {})", track),
            (None, Some(pos)) => write!(f, " (byte {:#X})", pos),
            (None, None) => Ok(()),
        }
    }
}
impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)?;
        let mut maybe_src = self.source();
        while let Some(src) = maybe_src {
            writeln!(f)?;
            write!(f, "  caused by: {}", src.kind())?;
            maybe_src = src.source();
        }
        Ok(())
    }
}
#[cfg(feature = "std")]
impl std::error::Error for Error {
    #[inline]
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// The type of error that occurred.
///
/// Errors are broadly categorized into 3 classes, and specific error info is provided as a
/// non-normative string literal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Structural errors while indexing the file. It is likely that the file is not a MIDI file
    /// or is severely corrupted.
    ///
    /// Parsing stops as soon as one of these is found, and no `Smf` is produced.
    Invalid(&'static str),

    /// The event stream of a track is corrupted.
    ///
    /// These are reported by the call that decodes the broken event. Other tracks of the same
    /// file can still be read.
    Malformed(&'static str),

    /// The caller asked for something that does not exist, such as a track index out of range.
    Usage(&'static str),
}
impl ErrorKind {
    /// Get the informative message on what exact part of the MIDI format was not respected.
    #[inline]
    pub fn message(&self) -> &'static str {
        match *self {
            ErrorKind::Invalid(msg) => msg,
            ErrorKind::Malformed(msg) => msg,
            ErrorKind::Usage(msg) => msg,
        }
    }
}
impl fmt::Display for ErrorKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::Invalid(msg) => write!(f, "invalid midi: {}", msg),
            ErrorKind::Malformed(msg) => write!(f, "malformed midi: {}", msg),
            ErrorKind::Usage(msg) => write!(f, "invalid usage: {}", msg),
        }
    }
}

macro_rules! err_invalid {
    ($msg:expr) => {{
        const ERR_KIND: &'static ErrorKind = &ErrorKind::Invalid($msg);
        ERR_KIND
    }};
}
macro_rules! err_malformed {
    ($msg:expr) => {{
        const ERR_KIND: &'static ErrorKind = &ErrorKind::Malformed($msg);
        ERR_KIND
    }};
}
macro_rules! err_usage {
    ($msg:expr) => {{
        const ERR_KIND: &'static ErrorKind = &ErrorKind::Usage($msg);
        ERR_KIND
    }};
}

pub(crate) trait ResultExt<T> {
    fn context(self, ctx: &'static ErrorKind) -> StdResult<T, Error>;
}
impl<T> ResultExt<T> for StdResult<T, Error> {
    #[inline]
    fn context(self, ctx: &'static ErrorKind) -> StdResult<T, Error> {
        self.map_err(|err| err.chain_ctx(ctx))
    }
}
impl<T> ResultExt<T> for StdResult<T, &'static ErrorKind> {
    #[inline]
    fn context(self, ctx: &'static ErrorKind) -> StdResult<T, Error> {
        self.map_err(|errkind| Error::from(errkind).chain_ctx(ctx))
    }
}

/// The result type used by the MIDI decoder.
pub type Result<T> = StdResult<T, Error>;
pub(crate) use core::result::Result as StdResult;
