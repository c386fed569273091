use std::time::Duration;

#[derive(Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_max: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(400),
            jitter_max: Some(Duration::from_millis(50)),
        }
    }
}

impl RetryConfig {
    /// Profile for the best-effort persistence path: more attempts, since a
    /// dropped write here means a lost result for the user.
    pub fn persistence() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(1000),
            jitter_max: Some(Duration::from_millis(100)),
        }
    }
}

/// Retries `f` with exponential backoff and jitter until it succeeds or the
/// attempt budget is exhausted, returning the last error.
pub async fn retry_with_config<F, Fut, T, E>(config: RetryConfig, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempts_left = config.max_attempts;
    let mut backoff = config.base_backoff;

    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                attempts_left = attempts_left.saturating_sub(1);
                if attempts_left == 0 {
                    return Err(error);
                }

                let jitter = config
                    .jitter_max
                    .map(|jitter_max| {
                        let jitter_ms = jitter_max.as_millis() as u64;
                        if jitter_ms == 0 {
                            Duration::ZERO
                        } else {
                            Duration::from_millis(rand::random::<u64>() % (jitter_ms + 1))
                        }
                    })
                    .unwrap_or(Duration::ZERO);

                tokio::time::sleep(backoff + jitter).await;
                backoff = std::cmp::min(backoff * 2, config.max_backoff);
            }
        }
    }
}
