//! Redacting wrapper for passwords and other sensitive values

use std::fmt;
use std::path::Path;

use zeroize::Zeroize;

/// Sensitive value. Debug and Display print `[REDACTED]`; the inner value is
/// zeroed when dropped.
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Borrow the inner value. Keep the borrow short and never log it.
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Secret<String> {
    /// Read a secret kept alone in a file, as written by `echo` or a secrets
    /// mount. Trailing line endings are dropped. A file with nothing else in
    /// it yields `None`.
    pub fn read_from_file(path: &Path) -> std::io::Result<Option<Self>> {
        let mut raw = std::fs::read_to_string(path)?;
        let value = raw.trim_end_matches(['\r', '\n']).to_owned();
        raw.zeroize();
        if value.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self::new(value)))
    }
}

impl From<String> for Secret<String> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}
