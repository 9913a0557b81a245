//! Bounded retry with exponential jittered backoff
//!
//! Wraps lock-sensitive sweep bodies. Only errors the taxonomy marks
//! retryable (`CoreError::is_retryable`) are retried; domain and validation
//! failures surface unchanged on the first attempt. Exhausting attempts logs
//! a terminal failure and returns the last error — the scheduler thread
//! stays alive.

use super::config::CoreConfig;
use super::error::{CoreError, CoreResult};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// 재시도 정책 (최대 횟수, 지수 백오프, 지터)
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: Duration::from_secs(10),
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(
            config.retry_max_attempts,
            Duration::from_millis(config.retry_base_delay_ms),
        )
    }

    /// attempt번째 실패 후 대기 시간: base × 2^(attempt-1), 상한 적용, ±50% 지터
    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(1u32 << (attempt - 1).min(16));
        let capped = exp.min(self.max_delay);
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        capped.mul_f64(jitter)
    }

    /// 본문을 실행하고 재시도 가능한 오류에 한해 백오프 후 다시 실행
    pub async fn run<T, F, Fut>(&self, task: &str, mut body: F) -> CoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CoreResult<T>>,
    {
        let mut attempt = 1u32;
        loop {
            match body().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        task,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retryable failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        tracing::error!(task, attempts = attempt, error = %e, "Retries exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn retries_lock_timeouts_until_success() {
        let calls = AtomicU32::new(0);
        let result = quick_policy(3)
            .run("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(CoreError::LockTimeout("product:1".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn domain_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: CoreResult<()> = quick_policy(5)
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(CoreError::domain("불가")) }
            })
            .await;
        assert!(matches!(result, Err(CoreError::Domain(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: CoreResult<()> = quick_policy(3)
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(CoreError::LockTimeout("user:9".into())) }
            })
            .await;
        assert!(matches!(result, Err(CoreError::LockTimeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
