//! Bounded retry with a fixed delay, shared by every remote call site.
//!
//! Failures never escape: after the last attempt the caller gets `None` and
//! decides how to carry on (usually: skip the item, keep the batch going).

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use backon::{ConstantBuilder, Retryable, Sleeper};

/// One page of a paged listing.
///
/// `fetched` is the number of rows the remote returned for the page. It can
/// be larger than `items.len()` when unusable rows were dropped, and it is
/// what decides whether more pages follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub fetched: usize,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, fetched: usize) -> Self {
        Self { items, fetched }
    }
}

impl<T> From<Vec<T>> for Page<T> {
    fn from(items: Vec<T>) -> Self {
        let fetched = items.len();
        Self { items, fetched }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn backoff(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times(self.max_attempts - 1)
    }

    /// Run `operation` until it succeeds or the attempts run out, sleeping
    /// with tokio between attempts.
    pub async fn execute<T, E, F, Fut>(&self, label: &str, operation: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.execute_with_sleeper(label, operation, tokio::time::sleep)
            .await
    }

    /// Same as [`RetryPolicy::execute`] with a custom sleeper.
    pub async fn execute_with_sleeper<T, E, F, Fut, S>(
        &self,
        label: &str,
        operation: F,
        sleeper: S,
    ) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        S: Sleeper,
    {
        let max_attempts = self.max_attempts;
        let mut attempt = 0;

        let result = operation
            .retry(self.backoff())
            .sleep(sleeper)
            .notify(|error: &E, delay: Duration| {
                attempt += 1;
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    label,
                    attempt,
                    max_attempts,
                    error,
                    delay
                );
            })
            .await;

        match result {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}; giving up",
                    label,
                    max_attempts,
                    max_attempts,
                    error
                );
                None
            }
        }
    }

    /// Collect a paged listing, retrying each page on its own.
    ///
    /// Paging stops at the first page that fetched fewer than `page_size`
    /// rows, at an empty page, or at a page that still fails after all
    /// attempts. Items gathered before a failed page are returned, not
    /// discarded.
    pub async fn paginate<T, E, F, Fut>(&self, label: &str, page_size: usize, fetch_page: F) -> Vec<T>
    where
        F: Fn(usize) -> Fut,
        Fut: Future<Output = Result<Page<T>, E>>,
        E: Display,
    {
        let mut items = Vec::new();
        let mut offset = 0;

        loop {
            let page_label = format!("{label} (offset {offset})");
            let Some(page) = self.execute(&page_label, || fetch_page(offset)).await else {
                tracing::warn!("{} ended early with {} items", label, items.len());
                break;
            };

            let fetched = page.fetched;
            items.extend(page.items);
            if fetched == 0 || fetched < page_size {
                break;
            }
            offset += page_size;
        }

        items
    }
}
