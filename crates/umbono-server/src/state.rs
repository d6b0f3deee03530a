//! Shared application state

use std::sync::Arc;

use umbono_core::{ByteFetcher, ImageClassifier};

/// State injected into every handler.
///
/// The classifier is immutable after bootstrap, so handlers share it through
/// a plain `Arc` with no locking.
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<ImageClassifier>,
    pub fetcher: ByteFetcher,
}

impl AppState {
    pub fn new(classifier: ImageClassifier, fetcher: ByteFetcher) -> Self {
        Self {
            classifier: Arc::new(classifier),
            fetcher,
        }
    }
}
