//! Batched embedding with bounded retry

use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;

/// Exponential backoff for transient provider failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// Turns texts into vectors through an `EmbeddingProvider`
///
/// Inputs are sent in batches of `batch_size`. A call either returns one
/// validated vector per input, in input order, or fails as a whole.
#[derive(Clone)]
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    dimensions: usize,
    retry: RetryPolicy,
}

impl EmbeddingClient {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
        retry: RetryPolicy,
    ) -> Self {
        let dimensions = provider.dimensions();
        Self {
            provider,
            batch_size: batch_size.max(1),
            dimensions,
            retry,
        }
    }

    pub fn from_config(provider: Arc<dyn EmbeddingProvider>, config: &EmbeddingConfig) -> Self {
        Self::new(
            provider,
            config.batch_size,
            RetryPolicy::new(config.max_retries, config.retry_base_delay()),
        )
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embed every text, preserving order
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for (batch_no, batch) in texts.chunks(self.batch_size).enumerate() {
            let embedded = self.embed_with_retry(batch).await?;
            self.validate(batch.len(), &embedded)?;
            tracing::debug!(
                "Embedded batch {} ({} texts) with {}",
                batch_no + 1,
                batch.len(),
                self.provider.model()
            );
            vectors.extend(embedded);
        }

        Ok(vectors)
    }

    /// Embed a single text
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding("Empty embedding result"))
    }

    async fn embed_with_retry(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut attempt = 0;
        loop {
            match self.provider.embed_batch(batch).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay(attempt);
                    tracing::warn!(
                        "Embedding attempt {} of {} failed, retrying in {:?}: {}",
                        attempt + 1,
                        self.retry.max_retries + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn validate(&self, expected: usize, vectors: &[Vec<f32>]) -> Result<()> {
        if vectors.len() != expected {
            return Err(Error::embedding(format!(
                "Provider returned {} vectors for {} texts",
                vectors.len(),
                expected
            )));
        }
        for vector in vectors {
            if vector.len() != self.dimensions {
                return Err(Error::DimensionMismatch {
                    expected: self.dimensions,
                    actual: vector.len(),
                });
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(Error::embedding("Provider returned non-finite values"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` calls, then embeds each text as [len, 1]
    struct FlakyProvider {
        failures: usize,
        calls: AtomicUsize,
        batches: Mutex<Vec<usize>>,
        dims: usize,
        error: fn() -> Error,
    }

    impl FlakyProvider {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                calls: AtomicUsize::new(0),
                batches: Mutex::new(Vec::new()),
                dims: 2,
                error: || Error::embedding("connection refused"),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyProvider {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err((self.error)());
            }
            self.batches.lock().push(texts.len());
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        fn dimensions(&self) -> usize {
            self.dims
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "flaky"
        }

        fn model(&self) -> &str {
            "flaky-model"
        }
    }

    fn client(provider: Arc<FlakyProvider>, batch_size: usize, retries: u32) -> EmbeddingClient {
        EmbeddingClient::new(
            provider,
            batch_size,
            RetryPolicy::new(retries, Duration::from_millis(1)),
        )
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| "x".repeat(i + 1)).collect()
    }

    #[tokio::test]
    async fn test_batches_preserve_order() {
        let provider = Arc::new(FlakyProvider::new(0));
        let vectors = client(provider.clone(), 2, 0).embed(&texts(5)).await.unwrap();

        assert_eq!(vectors.len(), 5);
        assert_eq!(
            vectors.iter().map(|v| v[0]).collect::<Vec<_>>(),
            vec![1.0, 2.0, 3.0, 4.0, 5.0]
        );
        assert_eq!(*provider.batches.lock(), vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let provider = Arc::new(FlakyProvider::new(2));
        let vectors = client(provider.clone(), 8, 3).embed(&texts(3)).await.unwrap();
        assert_eq!(vectors.len(), 3);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let provider = Arc::new(FlakyProvider::new(10));
        let result = client(provider.clone(), 8, 2).embed(&texts(3)).await;
        assert!(matches!(result, Err(Error::EmbeddingService(_))));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_errors_fail_fast() {
        let mut flaky = FlakyProvider::new(5);
        flaky.error = || Error::Config("bad model".into());
        let provider = Arc::new(flaky);

        let result = client(provider.clone(), 8, 3).embed(&texts(1)).await;
        assert!(matches!(result, Err(Error::Config(_))));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_in_later_batch_fails_whole_call() {
        struct SecondBatchFails(AtomicUsize);

        #[async_trait]
        impl EmbeddingProvider for SecondBatchFails {
            async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
                if self.0.fetch_add(1, Ordering::SeqCst) == 1 {
                    return Err(Error::Config("rejected".into()));
                }
                Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
            }
            fn dimensions(&self) -> usize {
                2
            }
            async fn health_check(&self) -> Result<bool> {
                Ok(true)
            }
            fn name(&self) -> &str {
                "second"
            }
            fn model(&self) -> &str {
                "second"
            }
        }

        let client = EmbeddingClient::new(
            Arc::new(SecondBatchFails(AtomicUsize::new(0))),
            2,
            RetryPolicy::new(0, Duration::from_millis(1)),
        );
        assert!(client.embed(&texts(4)).await.is_err());
    }

    #[tokio::test]
    async fn test_wrong_dimension_is_rejected() {
        let mut flaky = FlakyProvider::new(0);
        flaky.dims = 3;
        let result = client(Arc::new(flaky), 8, 0).embed(&texts(2)).await;
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }

    #[tokio::test]
    async fn test_embed_one() {
        let provider = Arc::new(FlakyProvider::new(0));
        let vector = client(provider, 4, 0).embed_one("abcd").await.unwrap();
        assert_eq!(vector, vec![4.0, 1.0]);
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(400));
    }
}
