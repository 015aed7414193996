//! Byte sources handed to decoders.

use crate::{Error, Result};
use std::io::{self, Read, Seek, SeekFrom};

type Rewind<R> = fn(&mut R, u64) -> io::Result<()>;

fn rewind<R: Seek>(reader: &mut R, start: u64) -> io::Result<()> {
    reader.seek(SeekFrom::Start(start)).map(|_| ())
}

enum State<R> {
    Fresh,
    Consumed,
    Seekable { start: u64, rewind: Rewind<R> },
}

impl<R> std::fmt::Debug for State<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Fresh => f.write_str("Fresh"),
            State::Consumed => f.write_str("Consumed"),
            State::Seekable { start, .. } => write!(f, "Seekable({})", start),
        }
    }
}

/// A reader a decoder pulls its bytes from.
///
/// A forward source may be decoded once; a seekable one remembers where the
/// payload starts and goes back there before every decode.
///
/// ```rust
/// use ipld_stream::codec::ByteSource;
/// use ipld_stream::Error;
/// use std::io::Cursor;
///
/// let mut forward = ByteSource::forward(Cursor::new(vec![1, 2, 3]));
/// assert!(forward.begin().is_ok());
/// assert!(matches!(forward.begin(), Err(Error::AlreadyConsumed)));
///
/// let mut seekable = ByteSource::seekable(Cursor::new(vec![1, 2, 3])).unwrap();
/// assert!(seekable.begin().is_ok());
/// assert!(seekable.begin().is_ok());
/// ```
#[derive(Debug)]
pub struct ByteSource<R> {
    inner: R,
    state: State<R>,
}

impl<R: Read> ByteSource<R> {
    pub fn forward(inner: R) -> Self {
        ByteSource {
            inner,
            state: State::Fresh,
        }
    }

    /// Positions the source at the start of the payload.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyConsumed`] on the second call to a forward source,
    /// [`Error::Io`] if seeking back fails.
    pub fn begin(&mut self) -> Result<&mut R> {
        match self.state {
            State::Fresh => self.state = State::Consumed,
            State::Consumed => return Err(Error::AlreadyConsumed),
            State::Seekable { start, rewind } => rewind(&mut self.inner, start)?,
        }
        Ok(&mut self.inner)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> ByteSource<R> {
    /// Wraps a seekable reader, taking its current position as the start.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the position cannot be queried.
    pub fn seekable(mut inner: R) -> Result<Self> {
        let start = inner.stream_position()?;
        Ok(ByteSource {
            inner,
            state: State::Seekable {
                start,
                rewind: rewind::<R>,
            },
        })
    }
}
