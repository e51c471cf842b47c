//! Bearer credential.

use std::fmt;

/// Header value sent while no one is signed in.
pub const SENTINEL: &str = "NULL";

/// An opaque bearer token, sent verbatim as the `Authorization` header.
///
/// There is no `Option` here: the signed-out state is the [`SENTINEL`]
/// token, which can be substituted into a header like any other. Use
/// [`Credential::is_present`] to tell the two apart.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The signed-out sentinel.
    pub fn none() -> Self {
        Self(SENTINEL.to_string())
    }

    /// `false` for the sentinel and for blank tokens.
    pub fn is_present(&self) -> bool {
        let token = self.0.trim();
        !token.is_empty() && token != SENTINEL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Credential {
    fn default() -> Self {
        Self::none()
    }
}

// Tokens must not end up in logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_present() {
            f.write_str("Credential(<redacted>)")
        } else {
            f.write_str("Credential(NULL)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_absent() {
        assert!(!Credential::none().is_present());
        assert_eq!(Credential::none().as_str(), "NULL");
        assert!(!Credential::new("  ").is_present());
        assert!(Credential::new("abc.def.ghi").is_present());
    }

    #[test]
    fn debug_redacts_token() {
        let shown = format!("{:?}", Credential::new("secret-token"));
        assert!(!shown.contains("secret-token"));
    }
}
