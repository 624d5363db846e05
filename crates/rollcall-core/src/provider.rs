//! Embedding provider seam and face selection policy.

use crate::detector::DetectorError;
use crate::recognizer::RecognizerError;
use crate::types::{BoundingBox, Descriptor};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("{0}")]
    Other(String),
}

/// One detected face and the descriptor extracted from it.
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub descriptor: Descriptor,
}

/// Turns a decoded image into zero or more face descriptors.
///
/// Implementations may hold non-thread-safe inference sessions; callers own
/// the provider exclusively (see the daemon's engine thread).
pub trait EmbeddingProvider: Send {
    fn embed(&mut self, image: &DynamicImage) -> Result<Vec<DetectedFace>, ProviderError>;
}

/// Which face to use when an image contains more than one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacePolicy {
    /// The first face in provider order.
    #[default]
    First,
    /// The face with the largest bounding box area.
    Largest,
    /// The face with the highest detector confidence.
    MostConfident,
}

impl FacePolicy {
    /// Pick one face. Ties keep the earlier face.
    pub fn select<'a>(&self, faces: &'a [DetectedFace]) -> Option<&'a DetectedFace> {
        match self {
            FacePolicy::First => faces.first(),
            FacePolicy::Largest => max_by_strict(faces, |f| f.bbox.area()),
            FacePolicy::MostConfident => max_by_strict(faces, |f| f.bbox.confidence),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FacePolicy::First => "first",
            FacePolicy::Largest => "largest",
            FacePolicy::MostConfident => "most_confident",
        }
    }
}

fn max_by_strict<F>(faces: &[DetectedFace], key: F) -> Option<&DetectedFace>
where
    F: Fn(&DetectedFace) -> f32,
{
    let mut best: Option<(&DetectedFace, f32)> = None;
    for face in faces {
        let k = key(face);
        match best {
            Some((_, best_k)) if k <= best_k => {}
            _ => best = Some((face, k)),
        }
    }
    best.map(|(face, _)| face)
}

impl fmt::Display for FacePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown face policy '{0}': expected first, largest or most_confident")]
pub struct UnknownFacePolicy(pub String);

impl FromStr for FacePolicy {
    type Err = UnknownFacePolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(FacePolicy::First),
            "largest" => Ok(FacePolicy::Largest),
            "most_confident" => Ok(FacePolicy::MostConfident),
            other => Err(UnknownFacePolicy(other.to_string())),
        }
    }
}
