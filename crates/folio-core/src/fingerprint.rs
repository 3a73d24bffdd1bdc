//! Content fingerprinting: perceptual image hashes and exact text digests.
//!
//! Two fingerprint flavors guard the pipeline against duplicate uploads:
//!
//! - [`ImageFingerprint`]: a 1,024-bit mean-threshold hash of the image,
//!   downsampled to a 32×32 grayscale grid. Tolerant of resolution changes,
//!   recompression, and minor cropping; compared by Hamming distance.
//! - [`TextFingerprint`]: a SHA-256 digest of normalized extracted text.
//!   Exact-match only — normalization absorbs re-OCR casing/spacing noise,
//!   any other difference yields a different digest.
//!
//! The image hash width is fixed at 1,024 bits end-to-end. Storage is
//! lowercase hex; decoding validates the width and comparison refuses
//! mismatched widths rather than re-padding.

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::defaults::{FINGERPRINT_BYTES, FINGERPRINT_GRID, FINGERPRINT_HEX_LEN};
use crate::error::{Error, Result};

/// Perceptual fingerprint of a journal page image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageFingerprint {
    bits: Vec<u8>,
}

impl ImageFingerprint {
    /// Compute the fingerprint for raw image bytes.
    ///
    /// Decodes the image, resizes to the fixed 32×32 grid with a triangle
    /// filter, converts to grayscale, and emits one bit per cell: `1` where
    /// the cell's luminance is at or above the grid mean, in raster order,
    /// most significant bit first within each byte.
    ///
    /// Unreadable input is an [`Error::Unreadable`]; an empty or default
    /// fingerprint is never produced.
    pub fn compute(image_bytes: &[u8]) -> Result<Self> {
        if image_bytes.is_empty() {
            return Err(Error::Unreadable("empty image payload".to_string()));
        }

        let img = image::load_from_memory(image_bytes)
            .map_err(|e| Error::Unreadable(format!("image decode failed: {}", e)))?;

        let grid = img
            .resize_exact(FINGERPRINT_GRID, FINGERPRINT_GRID, FilterType::Triangle)
            .to_luma8();

        let pixels: Vec<f64> = grid.pixels().map(|p| p.0[0] as f64).collect();
        let mean = pixels.iter().sum::<f64>() / pixels.len() as f64;

        let mut bits = vec![0u8; FINGERPRINT_BYTES];
        for (i, &luma) in pixels.iter().enumerate() {
            if luma >= mean {
                bits[i / 8] |= 1 << (7 - (i % 8));
            }
        }

        Ok(Self { bits })
    }

    /// Construct from a raw bit vector. The length must be exactly
    /// [`FINGERPRINT_BYTES`].
    pub fn from_bits(bits: Vec<u8>) -> Result<Self> {
        if bits.len() != FINGERPRINT_BYTES {
            return Err(Error::InvalidInput(format!(
                "image fingerprint must be {} bytes, got {}",
                FINGERPRINT_BYTES,
                bits.len()
            )));
        }
        Ok(Self { bits })
    }

    /// Decode from the stored hex representation, validating the width.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != FINGERPRINT_HEX_LEN {
            return Err(Error::InvalidInput(format!(
                "image fingerprint must be {} hex chars, got {}",
                FINGERPRINT_HEX_LEN,
                s.len()
            )));
        }
        let bits = hex::decode(s)
            .map_err(|e| Error::InvalidInput(format!("invalid fingerprint hex: {}", e)))?;
        Self::from_bits(bits)
    }

    /// Fixed-width lowercase hex encoding for storage.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bits)
    }

    /// Hamming distance to another fingerprint: the count of differing bit
    /// positions over the full bit vector.
    ///
    /// Errors on width mismatch instead of silently comparing truncated or
    /// re-padded vectors.
    pub fn distance(&self, other: &ImageFingerprint) -> Result<u32> {
        if self.bits.len() != other.bits.len() {
            return Err(Error::InvalidInput(format!(
                "cannot compare fingerprints of {} and {} bits",
                self.bits.len() * 8,
                other.bits.len() * 8
            )));
        }
        Ok(self
            .bits
            .iter()
            .zip(other.bits.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum())
    }

    /// Whether two images are duplicates at the given bit-distance threshold.
    pub fn is_near(&self, other: &ImageFingerprint, threshold: u32) -> Result<bool> {
        Ok(self.distance(other)? <= threshold)
    }
}

impl TryFrom<String> for ImageFingerprint {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::from_hex(&s)
    }
}

impl From<ImageFingerprint> for String {
    fn from(fp: ImageFingerprint) -> Self {
        fp.to_hex()
    }
}

impl std::fmt::Display for ImageFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Exact fingerprint of normalized extracted text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TextFingerprint {
    digest: Vec<u8>,
}

/// SHA-256 digest length in bytes.
const TEXT_DIGEST_BYTES: usize = 32;

impl TextFingerprint {
    /// Fingerprint the given text after normalization.
    pub fn of(text: &str) -> Self {
        let normalized = normalize_text(text);
        let digest = Sha256::digest(normalized.as_bytes()).to_vec();
        Self { digest }
    }

    /// Decode from the stored hex representation.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != TEXT_DIGEST_BYTES * 2 {
            return Err(Error::InvalidInput(format!(
                "text fingerprint must be {} hex chars, got {}",
                TEXT_DIGEST_BYTES * 2,
                s.len()
            )));
        }
        let digest = hex::decode(s)
            .map_err(|e| Error::InvalidInput(format!("invalid fingerprint hex: {}", e)))?;
        Ok(Self { digest })
    }

    /// Lowercase hex encoding for storage.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.digest)
    }
}

impl TryFrom<String> for TextFingerprint {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::from_hex(&s)
    }
}

impl From<TextFingerprint> for String {
    fn from(fp: TextFingerprint) -> Self {
        fp.to_hex()
    }
}

impl std::fmt::Display for TextFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Normalize text before exact fingerprinting.
///
/// Trims leading/trailing whitespace, lowercases, and collapses every run of
/// whitespace (including newlines) to a single space, so trivial re-OCR noise
/// does not defeat duplicate detection.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::IMAGE_DISTANCE_THRESHOLD;
    use image::{DynamicImage, RgbImage};
    use std::io::Cursor;

    /// Encode a synthetic gradient image to PNG bytes.
    fn gradient_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            let v = ((x * 255 / width.max(1)) as u8).wrapping_add((y * 31) as u8);
            image::Rgb([v, v / 2, 255 - v])
        });
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageOutputFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_compute_is_deterministic() {
        let bytes = gradient_png(200, 160);
        let a = ImageFingerprint::compute(&bytes).unwrap();
        let b = ImageFingerprint::compute(&bytes).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.distance(&b).unwrap(), 0);
    }

    /// High-contrast pseudo-random pattern whose grid cells sit far from
    /// the luminance mean, so small perturbations cannot cascade.
    fn pattern_png(tweaks: &[(u32, u32)]) -> Vec<u8> {
        let img = RgbImage::from_fn(64, 64, |x, y| {
            if tweaks.contains(&(x, y)) {
                image::Rgb([200, 200, 200])
            } else if (x * 7 + y * 13) % 5 < 2 {
                image::Rgb([0, 0, 0])
            } else {
                image::Rgb([255, 255, 255])
            }
        });
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageOutputFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_compute_tolerates_minor_pixel_variation() {
        // A single lightly-altered pixel stays well inside the duplicate
        // threshold.
        let clean = ImageFingerprint::compute(&pattern_png(&[])).unwrap();
        let noisy = ImageFingerprint::compute(&pattern_png(&[(33, 17)])).unwrap();
        assert!(clean.is_near(&noisy, IMAGE_DISTANCE_THRESHOLD).unwrap());
    }

    #[test]
    fn test_compute_rejects_garbage() {
        let err = ImageFingerprint::compute(b"definitely not an image").unwrap_err();
        assert!(matches!(err, Error::Unreadable(_)));
    }

    #[test]
    fn test_compute_rejects_empty() {
        let err = ImageFingerprint::compute(&[]).unwrap_err();
        assert!(matches!(err, Error::Unreadable(_)));
    }

    #[test]
    fn test_hex_round_trip() {
        let fp = ImageFingerprint::compute(&gradient_png(64, 64)).unwrap();
        let hex = fp.to_hex();
        assert_eq!(hex.len(), FINGERPRINT_HEX_LEN);
        let parsed = ImageFingerprint::from_hex(&hex).unwrap();
        assert_eq!(parsed, fp);
    }

    #[test]
    fn test_from_hex_rejects_wrong_width() {
        assert!(ImageFingerprint::from_hex("abcd").is_err());
        assert!(ImageFingerprint::from_hex(&"0".repeat(FINGERPRINT_HEX_LEN - 2)).is_err());
        assert!(ImageFingerprint::from_hex(&"0".repeat(FINGERPRINT_HEX_LEN + 2)).is_err());
    }

    #[test]
    fn test_from_hex_rejects_non_hex() {
        assert!(ImageFingerprint::from_hex(&"zz".repeat(FINGERPRINT_HEX_LEN / 2)).is_err());
    }

    #[test]
    fn test_distance_symmetry() {
        let mut bits_a = vec![0u8; FINGERPRINT_BYTES];
        let mut bits_b = vec![0u8; FINGERPRINT_BYTES];
        bits_a[0] = 0b1010_0000;
        bits_b[10] = 0b0000_0110;
        let a = ImageFingerprint::from_bits(bits_a).unwrap();
        let b = ImageFingerprint::from_bits(bits_b).unwrap();

        assert_eq!(a.distance(&b).unwrap(), b.distance(&a).unwrap());
        assert_eq!(a.distance(&a).unwrap(), 0);
    }

    #[test]
    fn test_threshold_boundary() {
        // Flip exactly 12 bits: duplicate. Flip 13: not a duplicate.
        let base = ImageFingerprint::from_bits(vec![0u8; FINGERPRINT_BYTES]).unwrap();

        let mut bits = vec![0u8; FINGERPRINT_BYTES];
        for byte in bits.iter_mut().take(12) {
            *byte = 0b1000_0000;
        }
        let at_threshold = ImageFingerprint::from_bits(bits.clone()).unwrap();
        assert_eq!(base.distance(&at_threshold).unwrap(), 12);
        assert!(base
            .is_near(&at_threshold, IMAGE_DISTANCE_THRESHOLD)
            .unwrap());

        bits[12] = 0b1000_0000;
        let past_threshold = ImageFingerprint::from_bits(bits).unwrap();
        assert_eq!(base.distance(&past_threshold).unwrap(), 13);
        assert!(!base
            .is_near(&past_threshold, IMAGE_DISTANCE_THRESHOLD)
            .unwrap());
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Hello\n\nWorld  "), "hello world");
        assert_eq!(normalize_text("HELLO   world"), "hello world");
        assert_eq!(normalize_text("a\tb\r\nc"), "a b c");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_text_fingerprint_ignores_case_and_spacing() {
        let a = TextFingerprint::of("Woke up early.\nWent for a run.");
        let b = TextFingerprint::of("  woke UP early.   went for a run.  ");
        assert_eq!(a, b);
    }

    #[test]
    fn test_text_fingerprint_sensitive_to_content() {
        let a = TextFingerprint::of("Woke up early");
        let b = TextFingerprint::of("Woke up late");
        assert_ne!(a, b);
    }

    #[test]
    fn test_text_fingerprint_hex_round_trip() {
        let fp = TextFingerprint::of("January 5, 2024");
        let hex = fp.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(TextFingerprint::from_hex(&hex).unwrap(), fp);
    }

    #[test]
    fn test_serde_as_hex_string() {
        let fp = TextFingerprint::of("test");
        let json = serde_json::to_string(&fp).unwrap();
        assert_eq!(json, format!("\"{}\"", fp.to_hex()));
        let parsed: TextFingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, fp);
    }
}
