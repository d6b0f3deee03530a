//! Umbono Core - image classification engine
//!
//! This crate provides everything the HTTP server needs to classify images:
//! a byte fetcher for remote URLs, a one-shot artifact bootstrap (download if
//! missing, then deserialize), and the classifier itself, which decodes image
//! bytes, runs a CPU forward pass, and returns the full ranked class list.
//!
//! # Example
//!
//! ```ignore
//! use umbono_core::{artifact, ClassifierConfig};
//!
//! let config = ClassifierConfig::default();
//! let classifier = artifact::bootstrap(&config).await?;
//! let result = classifier.predict(&image_bytes)?;
//! ```

pub mod artifact;
pub mod classifier;
pub mod config;
pub mod error;
pub mod fetch;

pub use classifier::{rank_predictions, ImageClassifier, PredictionResult};
pub use config::ClassifierConfig;
pub use error::{Error, Result};
pub use fetch::ByteFetcher;
