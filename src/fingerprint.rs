//! Document identity used to decide whether a file was seen before

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Hex MD5 of the full document content.
///
/// Content based rather than path based, so a moved or renamed file keeps
/// its reading position and a different file under the same name does not
/// inherit it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentFingerprint(String);

impl DocumentFingerprint {
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let mut file = File::open(path)?;
        let mut context = md5::Context::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            context.consume(&buf[..n]);
        }
        Ok(Self(format!("{:x}", context.compute())))
    }

    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(format!("{:x}", md5::compute(bytes)))
    }

    /// Wrap a fingerprint read back from settings
    #[must_use]
    pub fn from_stored(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
