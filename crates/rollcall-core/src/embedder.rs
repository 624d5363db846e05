//! ONNX embedding provider: SCRFD detection, alignment, ArcFace descriptors.

use crate::detector::FaceDetector;
use crate::provider::{DetectedFace, EmbeddingProvider, ProviderError};
use crate::recognizer::FaceRecognizer;
use image::DynamicImage;
use std::path::Path;

pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";

/// Lowest Euclidean match threshold suited to ArcFace descriptors.
///
/// Descriptors are unit length, so distance `d` corresponds to cosine
/// similarity `1 - d²/2`. 1.0 is cosine 0.5; about 1.1 is cosine 0.4.
/// The registry default of 0.4 (cosine 0.92) rejects most genuine pairs.
pub const ARCFACE_MIN_THRESHOLD: f32 = 1.0;

/// SCRFD + ArcFace embedding provider.
///
/// Faces come back in detector order (highest confidence first). Detections
/// without landmarks cannot be aligned and are skipped.
pub struct OnnxEmbedder {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxEmbedder {
    /// Load both models from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self, ProviderError> {
        let detector = FaceDetector::load(&model_dir.join(SCRFD_MODEL_FILE))?;
        let recognizer = FaceRecognizer::load(&model_dir.join(ARCFACE_MODEL_FILE))?;
        Ok(Self { detector, recognizer })
    }
}

impl EmbeddingProvider for OnnxEmbedder {
    fn embed(&mut self, image: &DynamicImage) -> Result<Vec<DetectedFace>, ProviderError> {
        let rgb = image.to_rgb8();
        let boxes = self.detector.detect(&rgb)?;

        let mut faces = Vec::with_capacity(boxes.len());
        for bbox in boxes {
            if bbox.landmarks.is_none() {
                tracing::debug!(confidence = bbox.confidence, "skipping face without landmarks");
                continue;
            }
            let descriptor = self.recognizer.extract(&rgb, &bbox)?;
            faces.push(DetectedFace { bbox, descriptor });
        }
        Ok(faces)
    }
}
