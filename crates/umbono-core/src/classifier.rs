//! Image classifier: artifact deserialization and the prediction pass
//!
//! The artifact is a single safetensors file holding the classifier weights
//! (`fc1` / `fc2` linear layers) plus a string metadata table describing the
//! fixed class label set, the square input size, and the execution
//! environment the model was exported for. The classifier is constructed once
//! at startup and shared read-only across request handlers.

use candle_core::{Device, Tensor, D};
use candle_nn::{Linear, Module};
use image::imageops::FilterType;
use safetensors::SafeTensors;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Ranked per-class scores for one submitted image.
///
/// Serializes to `{"predictions": [[label, score], ...]}`, sorted by
/// descending score, one entry per known class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predictions: Vec<(String, f64)>,
}

/// Pair labels with scores and sort by descending score.
///
/// The sort is stable: equal scores keep the label order fixed at load time.
pub fn rank_predictions(labels: &[String], scores: &[f64]) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = labels
        .iter()
        .cloned()
        .zip(scores.iter().copied())
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked
}

/// In-memory predictor: deserialized weights plus the fixed label set
#[derive(Debug)]
pub struct ImageClassifier {
    fc1: Linear,
    fc2: Linear,
    labels: Vec<String>,
    input_size: usize,
    device: Device,
}

impl ImageClassifier {
    /// Deserialize the artifact file at `dir/filename`
    pub fn load(dir: &Path, filename: &str) -> Result<Self> {
        let path = dir.join(filename);
        info!("Loading classifier from {:?}", path);
        let bytes = std::fs::read(&path)?;
        Self::from_bytes(&bytes)
    }

    /// Deserialize an artifact from an in-memory buffer
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (_, header) = SafeTensors::read_metadata(bytes)
            .map_err(|e| Error::ModelLoad(format!("invalid safetensors artifact: {e}")))?;
        let metadata = header
            .metadata()
            .as_ref()
            .ok_or_else(|| Error::ModelLoad("artifact carries no metadata table".to_string()))?;

        // Environment check up front: artifacts exported for an accelerator
        // cannot be loaded by a build that lacks it.
        let required = metadata
            .get("device")
            .map(String::as_str)
            .unwrap_or("cpu")
            .to_ascii_lowercase();
        if !runtime_supports(&required) {
            return Err(Error::IncompatibleArtifact { required });
        }

        let labels: Vec<String> = metadata
            .get("labels")
            .ok_or_else(|| Error::ModelLoad("artifact metadata missing 'labels'".to_string()))
            .and_then(|raw| {
                serde_json::from_str(raw)
                    .map_err(|e| Error::ModelLoad(format!("invalid 'labels' metadata: {e}")))
            })?;
        if labels.is_empty() {
            return Err(Error::ModelLoad("artifact declares no class labels".to_string()));
        }

        let input_size: usize = metadata
            .get("image_size")
            .ok_or_else(|| Error::ModelLoad("artifact metadata missing 'image_size'".to_string()))
            .and_then(|raw| {
                raw.parse()
                    .map_err(|e| Error::ModelLoad(format!("invalid 'image_size' metadata: {e}")))
            })?;

        let device = Device::Cpu;
        let mut tensors = candle_core::safetensors::load_buffer(bytes, &device)
            .map_err(|e| Error::ModelLoad(format!("failed to read artifact tensors: {e}")))?;

        let mut take = |name: &str| -> Result<Tensor> {
            tensors
                .remove(name)
                .ok_or_else(|| Error::ModelLoad(format!("artifact missing tensor '{name}'")))
        };

        let fc1_weight = take("fc1.weight")?;
        let fc1_bias = take("fc1.bias")?;
        let fc2_weight = take("fc2.weight")?;
        let fc2_bias = take("fc2.bias")?;

        let (hidden, in_dim) = fc1_weight
            .dims2()
            .map_err(|e| Error::ModelLoad(format!("bad fc1.weight shape: {e}")))?;
        let (classes, fc2_in) = fc2_weight
            .dims2()
            .map_err(|e| Error::ModelLoad(format!("bad fc2.weight shape: {e}")))?;

        if in_dim != 3 * input_size * input_size {
            return Err(Error::ModelLoad(format!(
                "fc1 input dimension {} does not match declared {}x{} RGB input",
                in_dim, input_size, input_size
            )));
        }
        if fc2_in != hidden {
            return Err(Error::ModelLoad(format!(
                "fc2 input dimension {fc2_in} does not match fc1 output {hidden}"
            )));
        }
        if classes != labels.len() {
            return Err(Error::ModelLoad(format!(
                "artifact declares {} labels but fc2 produces {} scores",
                labels.len(),
                classes
            )));
        }

        debug!(
            "Classifier weights: {}x{} -> {} -> {} classes",
            input_size, input_size, hidden, classes
        );

        Ok(Self {
            fc1: Linear::new(fc1_weight, Some(fc1_bias)),
            fc2: Linear::new(fc2_weight, Some(fc2_bias)),
            labels,
            input_size,
            device,
        })
    }

    /// Class labels in their fixed load-time order
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Square input side in pixels
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Decode `image_bytes`, run the forward pass, and return the full
    /// ranked class list.
    ///
    /// Read-only with respect to `self`; safe to call concurrently from
    /// multiple requests.
    pub fn predict(&self, image_bytes: &[u8]) -> Result<PredictionResult> {
        let decoded = image::load_from_memory(image_bytes)
            .map_err(|e| Error::ImageDecode(e.to_string()))?;

        let side = self.input_size as u32;
        let rgb = decoded.resize_exact(side, side, FilterType::Triangle).to_rgb8();
        let pixels: Vec<f32> = rgb.into_raw().iter().map(|&p| p as f32 / 255.0).collect();

        let scores = self.forward(pixels)?;
        let scores: Vec<f64> = scores.into_iter().map(f64::from).collect();

        Ok(PredictionResult {
            predictions: rank_predictions(&self.labels, &scores),
        })
    }

    fn forward(&self, pixels: Vec<f32>) -> Result<Vec<f32>> {
        let run = || -> candle_core::Result<Vec<f32>> {
            let input = Tensor::from_vec(
                pixels,
                (1, 3 * self.input_size * self.input_size),
                &self.device,
            )?;
            let hidden = self.fc1.forward(&input)?.relu()?;
            let logits = self.fc2.forward(&hidden)?;
            let scores = candle_nn::ops::softmax(&logits, D::Minus1)?;
            scores.squeeze(0)?.to_vec1::<f32>()
        };
        run().map_err(|e| Error::Inference(e.to_string()))
    }
}

/// Whether this build can execute artifacts exported for `device`
fn runtime_supports(device: &str) -> bool {
    match device {
        "cpu" => true,
        "cuda" => candle_core::utils::cuda_is_available(),
        "metal" => candle_core::utils::metal_is_available(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safetensors::tensor::{Dtype, TensorView};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn le_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// Build an artifact buffer for a tiny deterministic classifier.
    fn artifact_bytes(labels: &[&str], image_size: usize, device: &str) -> Vec<u8> {
        let in_dim = 3 * image_size * image_size;
        let hidden = 6;
        let classes = labels.len();

        let fc1_weight: Vec<f32> = (0..hidden * in_dim)
            .map(|i| ((i % 13) as f32 - 6.0) / 13.0)
            .collect();
        let fc1_bias: Vec<f32> = (0..hidden).map(|i| i as f32 / 10.0).collect();
        let fc2_weight: Vec<f32> = (0..classes * hidden)
            .map(|i| ((i % 7) as f32 - 3.0) / 7.0)
            .collect();
        let fc2_bias: Vec<f32> = (0..classes).map(|i| (classes - i) as f32 / 5.0).collect();

        let buffers = [
            ("fc1.weight", vec![hidden, in_dim], le_bytes(&fc1_weight)),
            ("fc1.bias", vec![hidden], le_bytes(&fc1_bias)),
            ("fc2.weight", vec![classes, hidden], le_bytes(&fc2_weight)),
            ("fc2.bias", vec![classes], le_bytes(&fc2_bias)),
        ];

        let views: Vec<(&str, TensorView)> = buffers
            .iter()
            .map(|(name, shape, data)| {
                (*name, TensorView::new(Dtype::F32, shape.clone(), data).unwrap())
            })
            .collect();

        let labels_json =
            serde_json::to_string(&labels.iter().map(|l| l.to_string()).collect::<Vec<_>>())
                .unwrap();
        let metadata = HashMap::from([
            ("labels".to_string(), labels_json),
            ("image_size".to_string(), image_size.to_string()),
            ("device".to_string(), device.to_string()),
        ]);

        safetensors::serialize(views, &Some(metadata)).unwrap()
    }

    fn png_bytes(seed: u8) -> Vec<u8> {
        let img = image::RgbImage::from_fn(8, 8, |x, y| {
            image::Rgb([seed, (x * 20) as u8, (y * 20) as u8])
        });
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn ranks_two_class_scores_descending() {
        let labels = vec!["cat".to_string(), "dog".to_string()];
        let ranked = rank_predictions(&labels, &[0.2, 0.8]);
        assert_eq!(
            ranked,
            vec![("dog".to_string(), 0.8), ("cat".to_string(), 0.2)]
        );
    }

    #[test]
    fn equal_scores_keep_label_order() {
        let labels = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let ranked = rank_predictions(&labels, &[0.3, 0.4, 0.3]);
        assert_eq!(ranked[0].0, "b");
        assert_eq!(ranked[1].0, "a");
        assert_eq!(ranked[2].0, "c");
    }

    #[test]
    fn loads_cpu_artifact_with_labels() {
        let bytes = artifact_bytes(&["cat", "dog", "horse"], 4, "cpu");
        let classifier = ImageClassifier::from_bytes(&bytes).unwrap();
        assert_eq!(classifier.labels(), &["cat", "dog", "horse"]);
        assert_eq!(classifier.input_size(), 4);
    }

    #[test]
    fn accelerator_artifact_is_rejected_with_remediation() {
        let bytes = artifact_bytes(&["cat", "dog"], 4, "cuda");
        match ImageClassifier::from_bytes(&bytes) {
            Err(Error::IncompatibleArtifact { required }) => assert_eq!(required, "cuda"),
            other => panic!("expected IncompatibleArtifact, got {other:?}"),
        }
    }

    #[test]
    fn label_count_mismatch_fails_load() {
        // Three labels declared, but the weights only produce two scores.
        let bytes = artifact_bytes_with_labels_meta(&["cat", "dog"], &["a", "b", "c"], 4);
        match ImageClassifier::from_bytes(&bytes) {
            Err(Error::ModelLoad(msg)) => assert!(msg.contains("labels")),
            other => panic!("expected ModelLoad, got {other:?}"),
        }
    }

    /// Artifact whose weights fit `weight_labels` but whose metadata declares
    /// `meta_labels`.
    fn artifact_bytes_with_labels_meta(
        weight_labels: &[&str],
        meta_labels: &[&str],
        image_size: usize,
    ) -> Vec<u8> {
        let base = artifact_bytes(weight_labels, image_size, "cpu");
        let (_, header) = SafeTensors::read_metadata(&base).unwrap();
        let mut metadata = header.metadata().clone().unwrap();
        metadata.insert(
            "labels".to_string(),
            serde_json::to_string(
                &meta_labels.iter().map(|l| l.to_string()).collect::<Vec<_>>(),
            )
            .unwrap(),
        );

        let tensors = candle_core::safetensors::load_buffer(&base, &Device::Cpu).unwrap();
        let buffers: Vec<(String, Vec<usize>, Vec<u8>)> = tensors
            .iter()
            .map(|(name, t)| {
                let flat: Vec<f32> = t.flatten_all().unwrap().to_vec1::<f32>().unwrap();
                (name.clone(), t.dims().to_vec(), le_bytes(&flat))
            })
            .collect();
        let views: Vec<(&str, TensorView)> = buffers
            .iter()
            .map(|(name, shape, data)| {
                (
                    name.as_str(),
                    TensorView::new(Dtype::F32, shape.clone(), data).unwrap(),
                )
            })
            .collect();
        safetensors::serialize(views, &Some(metadata)).unwrap()
    }

    #[test]
    fn predict_returns_one_sorted_score_per_class() {
        let bytes = artifact_bytes(&["cat", "dog", "horse"], 4, "cpu");
        let classifier = ImageClassifier::from_bytes(&bytes).unwrap();

        let result = classifier.predict(&png_bytes(200)).unwrap();
        assert_eq!(result.predictions.len(), 3);
        for pair in result.predictions.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[test]
    fn predict_rejects_non_image_bytes() {
        let bytes = artifact_bytes(&["cat", "dog"], 4, "cpu");
        let classifier = ImageClassifier::from_bytes(&bytes).unwrap();

        match classifier.predict(b"definitely not an image") {
            Err(Error::ImageDecode(_)) => {}
            other => panic!("expected ImageDecode, got {other:?}"),
        }
    }

    #[test]
    fn concurrent_predictions_do_not_interfere() {
        let bytes = artifact_bytes(&["cat", "dog", "horse"], 4, "cpu");
        let classifier = Arc::new(ImageClassifier::from_bytes(&bytes).unwrap());

        let image_a = png_bytes(10);
        let image_b = png_bytes(250);
        let alone = classifier.predict(&image_a).unwrap();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let classifier_a = classifier.clone();
            let image_a = image_a.clone();
            handles.push(std::thread::spawn(move || classifier_a.predict(&image_a)));
            let classifier_b = classifier.clone();
            let image_b = image_b.clone();
            handles.push(std::thread::spawn(move || classifier_b.predict(&image_b)));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            let result = handle.join().unwrap().unwrap();
            if i % 2 == 0 {
                assert_eq!(result, alone);
            }
        }
    }
}
