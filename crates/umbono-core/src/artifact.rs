//! Artifact download and startup bootstrap
//!
//! The serialized model artifact is fetched once per install: if the file is
//! already present locally it is reused as-is, otherwise it is downloaded and
//! written before the classifier is deserialized. The whole sequence runs to
//! completion before the server starts accepting requests.

use std::path::Path;
use tracing::{debug, info};

use crate::classifier::ImageClassifier;
use crate::config::ClassifierConfig;
use crate::error::{Error, Result};
use crate::fetch::ByteFetcher;

/// Ensure the artifact exists at `dest`, downloading it from `url` if missing.
///
/// Idempotent: an existing file is never re-fetched or overwritten, and no
/// integrity check is performed on it.
pub async fn ensure_local(fetcher: &ByteFetcher, url: &str, dest: &Path) -> Result<()> {
    if dest.exists() {
        debug!("Artifact already present at {:?}", dest);
        return Ok(());
    }

    info!("Downloading artifact from {} to {:?}", url, dest);
    let bytes = fetcher.fetch(url).await?;

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(dest, &bytes).await?;

    info!("Wrote {} bytes to {:?}", bytes.len(), dest);
    Ok(())
}

/// One-shot startup bootstrap: download the artifact if needed, then
/// deserialize it into a ready classifier.
///
/// Deserialization is CPU-bound, so it runs on a blocking thread. Callers
/// await this fully before binding a listener.
pub async fn bootstrap(config: &ClassifierConfig) -> Result<ImageClassifier> {
    let fetcher = ByteFetcher::new(config.fetch_timeout_secs)?;
    let dest = config.artifact_path();

    ensure_local(&fetcher, &config.artifact_url, &dest).await?;

    let dir = config.artifact_dir.clone();
    let filename = config.artifact_filename.clone();
    let classifier = tokio::task::spawn_blocking(move || ImageClassifier::load(&dir, &filename))
        .await
        .map_err(|e| Error::ModelLoad(e.to_string()))??;

    info!(
        "Classifier ready: {} classes, {}x{} input",
        classifier.labels().len(),
        classifier.input_size(),
        classifier.input_size()
    );
    Ok(classifier)
}
