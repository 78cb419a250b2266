//! Secret wrapper for sensitive values
//!
//! Client secrets and cookie keys are never accepted inline in the config file.
//! They come from an environment variable first, then from a file path named
//! in the config.

use std::fmt;
use std::path::Path;
use zeroize::Zeroize;

use crate::error::{Error, Result};

/// Sensitive value - redacted in Debug/Display/logs
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    /// Create a new secret value
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Expose the inner value (use sparingly)
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Secret<String> {
    /// Resolve a secret from `env_var`, falling back to the contents of `file`.
    ///
    /// File contents are trimmed. An empty env var or a whitespace-only file
    /// counts as absent, so the result is `Ok(None)` rather than an empty secret.
    /// A configured file that cannot be read is an error.
    pub fn resolve(env_var: &str, file: Option<&Path>) -> Result<Option<Self>> {
        if let Ok(value) = std::env::var(env_var)
            && !value.is_empty()
        {
            return Ok(Some(Self::new(value)));
        }

        let Some(path) = file else {
            return Ok(None);
        };

        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read secret file {}: {e}", path.display()))
        })?;
        let trimmed = contents.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self::new(trimmed.to_owned())))
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that touch process environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn secret_redacts_debug_and_display() {
        let secret = Secret::new(String::from("client-secret-value"));
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
        assert_eq!(format!("{secret}"), "[REDACTED]");
    }

    #[test]
    fn secret_exposes_value() {
        let secret = Secret::new(String::from("client-secret-value"));
        assert_eq!(secret.expose(), "client-secret-value");
    }

    #[test]
    fn resolve_prefers_env_over_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret");
        std::fs::write(&path, "from-file").unwrap();

        unsafe { std::env::set_var("COMMON_TEST_SECRET_A", "from-env") };
        let secret = Secret::resolve("COMMON_TEST_SECRET_A", Some(&path))
            .unwrap()
            .unwrap();
        unsafe { std::env::remove_var("COMMON_TEST_SECRET_A") };

        assert_eq!(secret.expose(), "from-env");
    }

    #[test]
    fn resolve_reads_trimmed_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret");
        std::fs::write(&path, "  from-file\n").unwrap();

        unsafe { std::env::remove_var("COMMON_TEST_SECRET_B") };
        let secret = Secret::resolve("COMMON_TEST_SECRET_B", Some(&path))
            .unwrap()
            .unwrap();
        assert_eq!(secret.expose(), "from-file");
    }

    #[test]
    fn resolve_whitespace_file_is_absent() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret");
        std::fs::write(&path, " \n\t").unwrap();

        unsafe { std::env::remove_var("COMMON_TEST_SECRET_C") };
        let secret = Secret::resolve("COMMON_TEST_SECRET_C", Some(&path)).unwrap();
        assert!(secret.is_none());
    }

    #[test]
    fn resolve_missing_file_is_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { std::env::remove_var("COMMON_TEST_SECRET_D") };
        let result = Secret::resolve(
            "COMMON_TEST_SECRET_D",
            Some(Path::new("/nonexistent/secret")),
        );
        assert!(result.is_err());
    }

    #[test]
    fn resolve_nothing_configured_is_none() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { std::env::remove_var("COMMON_TEST_SECRET_E") };
        assert!(Secret::resolve("COMMON_TEST_SECRET_E", None).unwrap().is_none());
    }
}
