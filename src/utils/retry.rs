use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use log::warn;

/// Runs `op` up to `1 + retries` times, doubling `base_delay` between
/// attempts. Returns the first success or the last error.
pub async fn with_retry<T, E, F, Fut>(
    label: &str,
    retries: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut delay = base_delay;
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < retries => {
                warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                    label,
                    attempt + 1,
                    retries + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
