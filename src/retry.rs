#![forbid(unsafe_code)]

//! Bounded, delay-free retry loop shared by metadata fetches and downloads.

use std::fmt::Display;
use tracing::warn;

/// Runs `op` until it succeeds, fails with an error `should_retry` rejects, or
/// `max_attempts` calls have been made. The closure receives the 1-based
/// attempt number. A `max_attempts` of zero still performs one attempt.
pub fn retry<T, E, F, P>(max_attempts: u32, mut should_retry: P, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Result<T, E>,
    P: FnMut(&E) -> bool,
    E: Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts && should_retry(&err) => {
                warn!("Trying again ({attempt}/{max_attempts}): {err}");
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
