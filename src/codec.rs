//! Transport encoding for images.
//!
//! Images travel as standard, padded base64 strings inside JSON bodies.

use crate::error::DecodeError;
use base64::{Engine, engine::general_purpose::STANDARD};
use image::DynamicImage;
use std::path::Path;

/// Encodes raw image bytes into a transport-safe string.
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    STANDARD.encode(bytes)
}

/// Decodes a transported string back into raw bytes.
///
/// Leading and trailing whitespace is ignored.
pub fn decode(encoded: &str) -> Result<Vec<u8>, DecodeError> {
    Ok(STANDARD.decode(encoded.trim())?)
}

/// Decodes a transported string and parses the bytes as an image.
///
/// The image format is guessed from the content, not from any file name.
pub fn decode_image(encoded: &str) -> Result<DynamicImage, DecodeError> {
    let bytes = decode(encoded)?;
    Ok(image::load_from_memory(&bytes)?)
}

/// Reads a file from disk and encodes its content.
pub fn encode_file(path: impl AsRef<Path>) -> std::io::Result<String> {
    Ok(encode(std::fs::read(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgb, RgbImage};
    use proptest::prelude::*;
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(4, 3, Rgb([200, 10, 10]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageOutputFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(bytes in proptest::collection::vec(any::<u8>(), 0..2048)) {
            prop_assert_eq!(decode(&encode(&bytes)).unwrap(), bytes);
        }
    }

    #[test]
    fn test_encode_is_padded_standard_alphabet() {
        assert_eq!(encode(b"\xfb\xff"), "+/8=");
        assert_eq!(encode(b""), "");
    }

    #[test]
    fn test_decode_ignores_surrounding_whitespace() {
        assert_eq!(decode("  aGVsbG8=\n").unwrap(), b"hello");
    }

    #[test]
    fn test_decode_rejects_malformed_input() {
        let err = decode("not base64!").unwrap_err();
        assert!(matches!(err, DecodeError::Base64(_)));
    }

    #[test]
    fn test_decode_image() {
        let img = decode_image(&encode(png_bytes())).unwrap();
        assert_eq!((img.width(), img.height()), (4, 3));
    }

    #[test]
    fn test_decode_image_rejects_non_image_bytes() {
        let err = decode_image(&encode(b"definitely not a picture")).unwrap_err();
        assert!(matches!(err, DecodeError::Image(_)));
    }

    #[test]
    fn test_encode_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.png");
        let bytes = png_bytes();
        std::fs::write(&path, &bytes).unwrap();

        assert_eq!(decode(&encode_file(&path).unwrap()).unwrap(), bytes);
        assert!(encode_file(dir.path().join("missing.png")).is_err());
    }
}
