//! Embedding engine thread: owns the provider and serves embed requests.

use rollcall_core::{BoundingBox, Descriptor, EmbeddingProvider, FacePolicy, ProviderError};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("embedding provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("no face detected")]
    NoFaceDetected,
    #[error("failed to spawn engine thread: {0}")]
    Spawn(std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// The face chosen from an image, with its descriptor.
#[derive(Debug, Clone)]
pub struct Embedded {
    pub descriptor: Descriptor,
    pub bbox: BoundingBox,
    /// Number of faces the provider found in the image.
    pub faces_found: usize,
}

/// Messages sent from request handlers to the engine thread.
enum EngineRequest {
    Embed {
        image: Vec<u8>,
        reply: oneshot::Sender<Result<Embedded, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
    policy: FacePolicy,
}

impl EngineHandle {
    /// Decode an encoded image, run the provider, and pick one face by policy.
    pub async fn embed(&self, image: Vec<u8>) -> Result<Embedded, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Embed {
                image,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    pub fn policy(&self) -> FacePolicy {
        self.policy
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The provider is owned by that thread for its whole life; inference is
/// serialized through the request channel.
pub fn spawn_engine(
    mut provider: Box<dyn EmbeddingProvider>,
    policy: FacePolicy,
) -> Result<EngineHandle, EngineError> {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(8);

    std::thread::Builder::new()
        .name("rollcall-engine".into())
        .spawn(move || {
            tracing::info!(%policy, "engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Embed { image, reply } => {
                        let result = run_embed(provider.as_mut(), policy, &image);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx, policy })
}

fn run_embed(
    provider: &mut dyn EmbeddingProvider,
    policy: FacePolicy,
    encoded: &[u8],
) -> Result<Embedded, EngineError> {
    let image = image::load_from_memory(encoded)?;
    let faces = provider.embed(&image)?;

    let face = policy.select(&faces).ok_or(EngineError::NoFaceDetected)?;
    tracing::debug!(
        faces = faces.len(),
        confidence = face.bbox.confidence,
        area = face.bbox.area(),
        "face selected"
    );

    Ok(Embedded {
        descriptor: face.descriptor.clone(),
        bbox: face.bbox.clone(),
        faces_found: faces.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{png, FakeProvider};

    #[tokio::test]
    async fn test_embed_single_face() {
        let engine = spawn_engine(Box::new(FakeProvider), FacePolicy::First).unwrap();
        let out = engine.embed(png(&[(20, 10, 5)])).await.unwrap();
        assert_eq!(out.faces_found, 1);
        assert_eq!(out.descriptor, FakeProvider::descriptor_for(20, 10));
    }

    #[tokio::test]
    async fn test_no_face_detected() {
        let engine = spawn_engine(Box::new(FakeProvider), FacePolicy::First).unwrap();
        let err = engine.embed(png(&[(20, 10, 0)])).await.unwrap_err();
        assert!(matches!(err, EngineError::NoFaceDetected));
    }

    #[tokio::test]
    async fn test_undecodable_image() {
        let engine = spawn_engine(Box::new(FakeProvider), FacePolicy::First).unwrap();
        let err = engine.embed(b"definitely not a png".to_vec()).await.unwrap_err();
        assert!(matches!(err, EngineError::Decode(_)));
    }

    #[tokio::test]
    async fn test_policy_applied_to_multiple_faces() {
        // Second face is larger (blue channel drives box size)
        let image = png(&[(10, 0, 5), (30, 0, 40)]);

        let first = spawn_engine(Box::new(FakeProvider), FacePolicy::First).unwrap();
        let out = first.embed(image.clone()).await.unwrap();
        assert_eq!(out.faces_found, 2);
        assert_eq!(out.descriptor, FakeProvider::descriptor_for(10, 0));

        let largest = spawn_engine(Box::new(FakeProvider), FacePolicy::Largest).unwrap();
        let out = largest.embed(image).await.unwrap();
        assert_eq!(out.descriptor, FakeProvider::descriptor_for(30, 0));
        assert_eq!(largest.policy(), FacePolicy::Largest);
    }
}
