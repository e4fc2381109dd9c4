//! Redaction wrapper for identity data
//!
//! Environment values such as the current user name end up in selection
//! logs. Wrapping them in `Sensitive<T>` keeps them out of `Debug` and
//! `Display` output.

use std::fmt;

/// Wrapper that redacts its content in `Debug` and `Display`
///
/// # Example
///
/// ```
/// use typecfg_core_types::Sensitive;
///
/// let user = Sensitive::new("bob");
/// assert_eq!(format!("{}", user), "***REDACTED***");
/// assert_eq!(user.expose(), &"bob");
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Sensitive<T>(T);

const REDACTED: &str = "***REDACTED***";

impl<T> Sensitive<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Access the wrapped value; keep call sites rare
    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<T> fmt::Display for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}
