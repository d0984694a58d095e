//! Ready/not-ready container for the shared corpus.
//!
//! The handle starts empty, moves to `Loading` when the first loader claims
//! it, and settles on either `Ready` or `Failed`. Settled states never
//! change. Readers never block: [`CorpusHandle::get`] answers immediately,
//! and [`CorpusHandle::wait_ready`] is the only way to wait.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use super::{load_corpus, Corpus};
use crate::errors::CoreError;

/// Observable state of a [`CorpusHandle`].
#[derive(Debug, Clone, Default)]
pub enum CorpusState {
    /// No load has been started.
    #[default]
    Empty,
    /// A loader is reading the corpus.
    Loading,
    /// The corpus is loaded and immutable.
    Ready(Arc<Corpus>),
    /// Loading failed; the index will never become ready.
    Failed(String),
}

impl CorpusState {
    fn is_settled(&self) -> bool {
        matches!(self, Self::Ready(_) | Self::Failed(_))
    }
}

/// Shared, cloneable handle to the process-wide corpus.
#[derive(Debug, Clone)]
pub struct CorpusHandle {
    state: Arc<watch::Sender<CorpusState>>,
}

impl Default for CorpusHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CorpusHandle {
    /// Create an empty (not ready) handle.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(CorpusState::Empty);
        Self { state: Arc::new(tx) }
    }

    /// Create a handle that is already ready with `corpus`.
    pub fn ready(corpus: Corpus) -> Self {
        let (tx, _rx) = watch::channel(CorpusState::Ready(Arc::new(corpus)));
        Self { state: Arc::new(tx) }
    }

    /// Load the corpus from `path` exactly once.
    ///
    /// The first caller performs the load; concurrent callers wait for its
    /// outcome. If that loader is dropped before it settles, the handle goes
    /// back to `Empty` and a waiting caller claims the load itself. Once
    /// settled, every later call returns the settled result without touching
    /// the filesystem again.
    pub async fn load_from(&self, path: &Path) -> Result<Arc<Corpus>, CoreError> {
        while !self.try_claim() {
            debug!("Corpus load already claimed, waiting for outcome");
            let mut rx = self.state.subscribe();
            let settled = rx
                .wait_for(|state| !matches!(state, CorpusState::Loading))
                .await
                .map_err(|_| CoreError::IndexNotReady)?
                .is_settled();
            if settled {
                return self.get();
            }
            debug!("Corpus loader was cancelled, claiming the load");
        }

        // Reset to Empty if this future is dropped mid-load.
        let guard = LoadingGuard { state: &self.state };

        let outcome = load_corpus(path).await;
        std::mem::forget(guard);

        match outcome {
            Ok(corpus) => {
                let corpus = Arc::new(corpus);
                self.state.send_replace(CorpusState::Ready(Arc::clone(&corpus)));
                Ok(corpus)
            }
            Err(e) => {
                warn!("Corpus load failed: {}", e);
                self.state.send_replace(CorpusState::Failed(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Move `Empty` to `Loading`; true when this caller now owns the load.
    fn try_claim(&self) -> bool {
        self.state.send_if_modified(|state| {
            if matches!(state, CorpusState::Empty) {
                *state = CorpusState::Loading;
                true
            } else {
                false
            }
        })
    }

    /// Return the corpus if ready, without waiting.
    ///
    /// - `Empty` / `Loading` yield [`CoreError::IndexNotReady`]
    /// - `Failed` yields [`CoreError::CorpusUnavailable`]
    pub fn get(&self) -> Result<Arc<Corpus>, CoreError> {
        match &*self.state.borrow() {
            CorpusState::Ready(corpus) => Ok(Arc::clone(corpus)),
            CorpusState::Failed(reason) => Err(CoreError::CorpusUnavailable(reason.clone())),
            CorpusState::Empty | CorpusState::Loading => Err(CoreError::IndexNotReady),
        }
    }

    /// Whether the corpus is loaded.
    pub fn is_ready(&self) -> bool {
        matches!(&*self.state.borrow(), CorpusState::Ready(_))
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> CorpusState {
        self.state.borrow().clone()
    }

    /// Wait up to `timeout` for the handle to settle.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<Arc<Corpus>, CoreError> {
        let mut rx = self.state.subscribe();
        let settled = tokio::time::timeout(timeout, rx.wait_for(CorpusState::is_settled))
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false);
        if settled {
            self.get()
        } else {
            Err(CoreError::IndexNotReady)
        }
    }
}

struct LoadingGuard<'a> {
    state: &'a watch::Sender<CorpusState>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state.send_if_modified(|state| {
            if matches!(state, CorpusState::Loading) {
                *state = CorpusState::Empty;
                true
            } else {
                false
            }
        });
    }
}
