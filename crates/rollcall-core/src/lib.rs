//! rollcall-core: face descriptors, matching, and embedding.
//!
//! Descriptors come from an [`EmbeddingProvider`]; the bundled
//! [`OnnxEmbedder`] runs SCRFD detection and ArcFace recognition on the CPU
//! via ONNX Runtime. Identification is a linear Euclidean scan
//! ([`EuclideanMatcher`]).

pub mod alignment;
pub mod detector;
pub mod embedder;
pub mod matcher;
pub mod provider;
pub mod recognizer;
pub mod search;
pub mod types;

pub use embedder::{OnnxEmbedder, ARCFACE_MIN_THRESHOLD};
pub use matcher::{EuclideanMatcher, MatchResult, Matcher, DEFAULT_MATCH_THRESHOLD};
pub use provider::{DetectedFace, EmbeddingProvider, FacePolicy, ProviderError};
pub use search::SearchFilter;
pub use types::{BoundingBox, Descriptor, DimensionMismatch, InvalidRole, Role, RoleFields, UserRecord};
