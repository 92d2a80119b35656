use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::{self, ErrorKind, Read};
use std::ops::Range;
use std::path::Path;
use std::str::{self, Utf8Error};
use std::sync::{Arc, OnceLock};

const DEFAULT_CAPACITY: usize = 1024;
const GROWTH_FACTOR: usize = 2;
const HASH_PREFIX_LEN: usize = 256;

/// An immutable view into shared byte storage.
///
/// Slicing never copies: every slice of a `ByteBuffer` points into the same
/// reference counted storage as its parent, narrowed by offset and length.
/// Equality and hashing are by content. Use [`ByteBuffer::compact`] to get a
/// copy that does not keep a larger parent buffer alive.
#[derive(Clone)]
pub struct ByteBuffer {
    storage: Arc<[u8]>,
    offset: usize,
    len: usize,
    hash: OnceLock<u32>,
}

/// A slice was requested that does not fit inside the buffer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OutOfBounds {
    pub offset: usize,
    pub length: usize,
    pub available: usize,
}

impl fmt::Display for OutOfBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bytes at offset {} exceed buffer of {} bytes",
            self.length, self.offset, self.available
        )
    }
}

impl std::error::Error for OutOfBounds {}

impl ByteBuffer {
    fn new(storage: Arc<[u8]>, offset: usize, len: usize) -> Self {
        debug_assert!(offset + len <= storage.len());
        ByteBuffer {
            storage,
            offset,
            len,
            hash: OnceLock::new(),
        }
    }

    /// The shared zero length buffer. Every empty result is a clone of this one.
    pub fn empty() -> Self {
        static EMPTY: OnceLock<ByteBuffer> = OnceLock::new();
        EMPTY
            .get_or_init(|| ByteBuffer::new(Arc::from(Vec::new()), 0, 0))
            .clone()
    }

    /// Copies `bytes` into new storage.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Self::empty();
        }
        Self::new(Arc::from(bytes), 0, bytes.len())
    }

    pub fn from_vec(bytes: Vec<u8>) -> Self {
        if bytes.is_empty() {
            return Self::empty();
        }
        let len = bytes.len();
        Self::new(Arc::from(bytes), 0, len)
    }

    /// Reads everything `reader` has to offer.
    ///
    /// When `known_len` is provided, exactly that much storage is allocated and
    /// reading stops once it is full or the reader signals end of input,
    /// whichever comes first. Otherwise reading starts with a small buffer that
    /// grows by half its size each time it fills up. When the reader is
    /// exhausted and more than `trim_threshold` bytes of the buffer are unused,
    /// the data is copied into tightly sized storage.
    pub fn read_from<R: Read>(
        mut reader: R,
        known_len: Option<usize>,
        trim_threshold: usize,
    ) -> io::Result<Self> {
        let (mut buf, resizable) = match known_len {
            Some(0) => return Ok(Self::empty()),
            Some(len) => (vec![0_u8; len], false),
            None => (vec![0_u8; DEFAULT_CAPACITY], true),
        };

        let mut total = 0;
        loop {
            if total == buf.len() {
                if !resizable {
                    break;
                }
                let grown = buf.len().saturating_add(buf.len() / GROWTH_FACTOR);
                buf.resize(grown, 0);
            }
            match reader.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(read) => total += read,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        if total == 0 {
            Ok(Self::empty())
        } else if buf.len() - total > trim_threshold {
            Ok(Self::from_bytes(&buf[..total]))
        } else {
            Ok(Self::new(Arc::from(buf), 0, total))
        }
    }

    /// Reads the file at `path`, pre-sizing the buffer from the file metadata.
    ///
    /// Files reporting a size of zero are read as if their size was unknown,
    /// since pseudo files and pipes report zero even when they have content.
    pub fn from_path(path: &Path, trim_threshold: usize) -> io::Result<Self> {
        let file = File::open(path)?;
        let known_len = match usize::try_from(file.metadata()?.len()) {
            Ok(0) | Err(_) => None,
            Ok(len) => Some(len),
        };
        Self::read_from(file, known_len, trim_threshold)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.storage[self.offset..self.offset + self.len]
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        self.as_bytes().get(index).copied()
    }

    /// Returns `length` bytes starting at `offset` without copying.
    ///
    /// A request covering the whole buffer returns a clone of `self`, and any
    /// zero length request returns the shared empty buffer. Requests that do
    /// not fit are rejected, never clamped.
    pub fn slice(&self, offset: usize, length: usize) -> Result<Self, OutOfBounds> {
        match offset.checked_add(length) {
            Some(end) if end <= self.len => {}
            _ => {
                return Err(OutOfBounds {
                    offset,
                    length,
                    available: self.len,
                })
            }
        }
        if length == 0 {
            return Ok(Self::empty());
        }
        if offset == 0 && length == self.len {
            return Ok(self.clone());
        }
        Ok(Self::new(self.storage.clone(), self.offset + offset, length))
    }

    pub fn range(&self, range: Range<usize>) -> Result<Self, OutOfBounds> {
        let length = range.end.checked_sub(range.start).ok_or(OutOfBounds {
            offset: range.start,
            length: 0,
            available: self.len,
        })?;
        self.slice(range.start, length)
    }

    /// Returns a buffer with the same content that does not share storage
    /// with anything larger than itself. Copies only when needed.
    pub fn compact(&self) -> Self {
        if self.offset == 0 && self.len == self.storage.len() {
            self.clone()
        } else {
            Self::from_bytes(self.as_bytes())
        }
    }

    /// Decodes the content as standard, padded base64. Returns `None` if the
    /// content is not valid base64.
    pub fn decode_base64(&self) -> Option<Self> {
        BASE64_STANDARD
            .decode(self.as_bytes())
            .ok()
            .map(Self::from_vec)
    }

    pub fn to_str(&self) -> Result<&str, Utf8Error> {
        str::from_utf8(self.as_bytes())
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }

    pub fn starts_with(&self, prefix: &ByteBuffer) -> bool {
        if self.len < prefix.len {
            return false;
        }
        if self.shares_storage_with(prefix) && self.offset == prefix.offset {
            return true;
        }
        self.as_bytes().starts_with(prefix.as_bytes())
    }

    pub fn shares_storage_with(&self, other: &ByteBuffer) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    // Only the first HASH_PREFIX_LEN bytes take part, so long buffers with a
    // common prefix collide. Content never changes, so the value is cached.
    fn content_hash(&self) -> u32 {
        *self.hash.get_or_init(|| {
            self.as_bytes()
                .iter()
                .take(HASH_PREFIX_LEN)
                .fold(17_u32, |acc, b| acc.wrapping_mul(31).wrapping_add(*b as u32))
        })
    }
}

impl PartialEq for ByteBuffer {
    fn eq(&self, other: &Self) -> bool {
        if self.len != other.len {
            return false;
        }
        if self.shares_storage_with(other) && self.offset == other.offset {
            return true;
        }
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for ByteBuffer {}

impl Hash for ByteBuffer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.content_hash());
    }
}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ByteBuffer")
            .field(&self.as_bytes().escape_ascii().to_string())
            .finish()
    }
}

impl Default for ByteBuffer {
    fn default() -> Self {
        Self::empty()
    }
}
