//! Timeout mapping and the single retry on transient failure.
//!
//! Every request to the remote source carries an explicit timeout (set on
//! the HTTP client) and is attempted at most `1 + retries` times, where the
//! extra attempt only happens for `SourceError::is_transient` failures.

use std::time::Duration;

use crate::logging::{self, DataSource};
use crate::model::SourceError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            retries: 0,
            delay: Duration::ZERO,
        }
    }

    /// Runs `op`, retrying transient failures up to `self.retries` times.
    pub fn run<T, F>(&self, operation: &str, mut op: F) -> Result<T, SourceError>
    where
        F: FnMut() -> Result<T, SourceError>,
    {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    logging::warn(
                        DataSource::EarthEngine,
                        None,
                        &format!("{} failed ({}), retry {}/{}", operation, e, attempt, self.retries),
                    );
                    if !self.delay.is_zero() {
                        std::thread::sleep(self.delay);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Maps a transport-level reqwest error onto `SourceError`.
pub fn from_reqwest(err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout
    } else if err.is_decode() {
        SourceError::ParseError(err.to_string())
    } else if err.is_builder() {
        SourceError::Configuration(err.to_string())
    } else if let Some(status) = err.status() {
        from_status(status.as_u16(), &err.to_string())
    } else {
        SourceError::Network(err.to_string())
    }
}

/// Maps a non-2xx status onto `SourceError`.
pub fn from_status(status: u16, body: &str) -> SourceError {
    match status {
        401 | 403 => SourceError::Unauthorized(truncate(body, 200)),
        code => SourceError::HttpError(code),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
