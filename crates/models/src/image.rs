use crate::error::{Error, ErrorKind};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::str::FromStr;

const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];
const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const GIF87_MAGIC: &[u8; 6] = b"GIF87a";
const GIF89_MAGIC: &[u8; 6] = b"GIF89a";
const RIFF_MAGIC: &[u8; 4] = b"RIFF";
const WEBP_MAGIC: &[u8; 4] = b"WEBP";

/// Supported page image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageFormat {
    /// File extension (without the leading dot) used for page filenames.
    #[inline]
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
            ImageFormat::Gif => "gif",
        }
    }

    /// MIME type of images in this format.
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Gif => "image/gif",
        }
    }

    /// Detect the image format from the leading bytes of the file.
    ///
    /// Returns `None` for anything that isn't a supported image, including
    /// inputs too short to carry a signature.
    #[must_use]
    pub fn from_magic_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&JPEG_MAGIC) {
            return Some(ImageFormat::Jpeg);
        }
        if bytes.starts_with(&PNG_MAGIC) {
            return Some(ImageFormat::Png);
        }
        if bytes.starts_with(GIF87_MAGIC) || bytes.starts_with(GIF89_MAGIC) {
            return Some(ImageFormat::Gif);
        }
        // RIFF container: "RIFF" <u32 size> "WEBP"
        if bytes.len() >= 12 && bytes.starts_with(RIFF_MAGIC) && &bytes[8..12] == WEBP_MAGIC {
            return Some(ImageFormat::Webp);
        }
        None
    }

    /// Detect the image format from a file extension.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref().extension().and_then(|ext| ext.to_str()).and_then(|ext| ext.parse().ok())
    }
}

impl FromStr for ImageFormat {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
            "png" => Ok(ImageFormat::Png),
            "webp" => Ok(ImageFormat::Webp),
            "gif" => Ok(ImageFormat::Gif),
            _ => exn::bail!(ErrorKind::ParseError {
                field: "image format",
                value: s.to_string()
            }),
        }
    }
}

impl Display for ImageFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00], Some(ImageFormat::Jpeg))]
    #[case(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00], Some(ImageFormat::Png))]
    #[case(b"GIF89a....", Some(ImageFormat::Gif))]
    #[case(b"GIF87a", Some(ImageFormat::Gif))]
    #[case(b"RIFF\x10\x00\x00\x00WEBPVP8 ", Some(ImageFormat::Webp))]
    #[case(b"RIFF\x10\x00\x00\x00WAVE", None)]
    #[case(b"<html>", None)]
    #[case(b"", None)]
    fn test_from_magic_bytes(#[case] bytes: &[u8], #[case] expected: Option<ImageFormat>) {
        assert_eq!(ImageFormat::from_magic_bytes(bytes), expected);
    }

    #[rstest]
    #[case(ImageFormat::Jpeg, "jpg", "image/jpeg")]
    #[case(ImageFormat::Webp, "webp", "image/webp")]
    fn test_extension_and_mime_type(#[case] format: ImageFormat, #[case] extension: &str, #[case] mime_type: &str) {
        assert_eq!(format.extension(), extension);
        assert_eq!(format.mime_type(), mime_type);
    }

    #[rstest]
    #[case("series_1/chapter_1.00/page_001.jpg", Some(ImageFormat::Jpeg))]
    #[case("page_002.JPEG", Some(ImageFormat::Jpeg))]
    #[case("page_003.webp", Some(ImageFormat::Webp))]
    #[case("page_004", None)]
    #[case("page_005.bmp", None)]
    fn test_from_path(#[case] path: &str, #[case] expected: Option<ImageFormat>) {
        assert_eq!(ImageFormat::from_path(path), expected);
    }
}
