use super::store::{HighlightBackend, HighlightMap, HighlightStore};
use super::{
    ArticleKey, Highlight, HighlightError, StorageError, ValidationError, RETRIEVE_ONLY_CONTEXT,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Async handle that serializes store access and bounds every operation.
///
/// Appends rewrite the whole document, so a single lock covers all keys.
/// Blocking file I/O runs on the blocking pool and is abandoned after `timeout`.
pub struct GuardedStore<B> {
    inner: Arc<HighlightStore<B>>,
    lock: Arc<Mutex<()>>,
    timeout: Duration,
}

impl<B> Clone for GuardedStore<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            lock: Arc::clone(&self.lock),
            timeout: self.timeout,
        }
    }
}

impl<B: HighlightBackend + 'static> GuardedStore<B> {
    /// Wraps a store with a per-operation time bound.
    pub fn new(store: HighlightStore<B>, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(store),
            lock: Arc::new(Mutex::new(())),
            timeout,
        }
    }

    /// Configured per-operation bound.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// See [`HighlightStore::append`].
    pub async fn append(
        &self,
        key: ArticleKey,
        text: String,
        context: String,
    ) -> Result<Vec<Highlight>, StorageError> {
        self.run(move |store| store.append(&key, &text, &context))
            .await?
    }

    /// Append-or-retrieve entry point for request handlers.
    ///
    /// A missing `text`, or a `context` equal to [`RETRIEVE_ONLY_CONTEXT`], reads the
    /// bucket without mutating it. Supplied text that is blank is rejected.
    pub async fn submit(
        &self,
        raw_key: &str,
        text: Option<String>,
        context: Option<String>,
    ) -> Result<(ArticleKey, Vec<Highlight>), HighlightError> {
        let key = ArticleKey::parse(raw_key)?;
        let context = context.unwrap_or_default();
        let highlights = match text {
            Some(text) if context != RETRIEVE_ONLY_CONTEXT => {
                if text.trim().is_empty() {
                    return Err(ValidationError::EmptyText.into());
                }
                self.append(key.clone(), text, context).await?
            }
            _ => self.get(key.clone()).await?,
        };
        Ok((key, highlights))
    }

    /// See [`HighlightStore::get`].
    pub async fn get(&self, key: ArticleKey) -> Result<Vec<Highlight>, StorageError> {
        self.run(move |store| store.get(&key)).await
    }

    /// See [`HighlightStore::load_all`].
    pub async fn load_all(&self) -> Result<HighlightMap, StorageError> {
        self.run(|store| store.load_all()).await
    }

    async fn run<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&HighlightStore<B>) -> T + Send + 'static,
    {
        let store = Arc::clone(&self.inner);
        let lock = Arc::clone(&self.lock);
        let task = async move {
            let guard = lock.lock_owned().await;
            // The guard moves into the blocking task so an abandoned write still
            // holds the lock until it finishes.
            tokio::task::spawn_blocking(move || {
                let result = op(&*store);
                drop(guard);
                result
            })
            .await
            .map_err(|err| StorageError::Task(err.to_string()))
        };
        match tokio::time::timeout(self.timeout, task).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "highlight store operation timed out"
                );
                Err(StorageError::Timeout(self.timeout))
            }
        }
    }
}
