//! Image format sniffing from magic bytes.

use mosaic_types::document::ImageFormat;

/// Classify an encoded image by its leading signature.
///
/// Unrecognized input is reported as JPEG, the most common encoding for
/// images extracted from documents.
pub fn sniff_image_format(bytes: &[u8]) -> ImageFormat {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => ImageFormat::Png,
        [0xFF, 0xD8, 0xFF, ..] => ImageFormat::Jpeg,
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => ImageFormat::Webp,
        [b'G', b'I', b'F', b'8', ..] => ImageFormat::Gif,
        _ => ImageFormat::Jpeg,
    }
}
