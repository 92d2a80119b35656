use crate::buffer::ByteBuffer;
use std::env;
use std::io;
use std::path::Path;

/// Unused capacity tolerated when reading the user-auth file before the
/// content is copied into a tightly sized buffer.
const TRIM_THRESHOLD: usize = 256;

/// Access to the process environment, kept behind a trait so the
/// orchestration code can be tested without touching the real one.
pub trait Environment {
    /// Value of the environment variable `name`, if set and valid unicode.
    fn var(&self, name: &str) -> Option<String>;

    fn read_file(&self, path: &Path) -> io::Result<ByteBuffer>;
}

pub struct UnixEnvironment;

impl Environment for UnixEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        env::var(name).ok()
    }

    fn read_file(&self, path: &Path) -> io::Result<ByteBuffer> {
        ByteBuffer::from_path(path, TRIM_THRESHOLD)
    }
}
