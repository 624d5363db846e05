//! Test doubles shared by the daemon's unit tests.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use rollcall_core::{BoundingBox, Descriptor, DetectedFace, EmbeddingProvider, ProviderError};
use std::io::Cursor;

/// Reads faces straight out of pixel values.
///
/// Every pixel in row 0 with a non-zero blue channel is one face: red and
/// green (divided by 100) form its descriptor, blue is its box side length.
pub struct FakeProvider;

impl FakeProvider {
    pub fn descriptor_for(r: u8, g: u8) -> Descriptor {
        Descriptor::new(vec![r as f32 / 100.0, g as f32 / 100.0])
    }
}

impl EmbeddingProvider for FakeProvider {
    fn embed(&mut self, image: &DynamicImage) -> Result<Vec<DetectedFace>, ProviderError> {
        let rgb = image.to_rgb8();
        let faces = (0..rgb.width())
            .filter_map(|x| {
                let Rgb([r, g, b]) = *rgb.get_pixel(x, 0);
                (b != 0).then(|| DetectedFace {
                    bbox: BoundingBox {
                        x: x as f32,
                        y: 0.0,
                        width: b as f32,
                        height: b as f32,
                        confidence: 1.0 - x as f32 * 0.01,
                        landmarks: None,
                    },
                    descriptor: Self::descriptor_for(r, g),
                })
            })
            .collect();
        Ok(faces)
    }
}

/// Provider that always fails, for exercising internal-error paths.
pub struct BrokenProvider;

impl EmbeddingProvider for BrokenProvider {
    fn embed(&mut self, _image: &DynamicImage) -> Result<Vec<DetectedFace>, ProviderError> {
        Err(ProviderError::Other("model session poisoned".into()))
    }
}

/// A one-row PNG with one pixel per `(r, g, b)` entry.
pub fn png(pixels: &[(u8, u8, u8)]) -> Vec<u8> {
    let width = pixels.len().max(1) as u32;
    let mut img = RgbImage::new(width, 1);
    for (x, &(r, g, b)) in pixels.iter().enumerate() {
        img.put_pixel(x as u32, 0, Rgb([r, g, b]));
    }

    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

pub fn data_url(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}
