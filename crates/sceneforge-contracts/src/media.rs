use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::ImageFormat;

use crate::ids::ImageId;

/// Encoded image bytes plus their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64())
    }

    pub fn extension(&self) -> &'static str {
        match self.mime_type.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            "image/bmp" => "bmp",
            _ => "png",
        }
    }
}

/// A raw file handed over by the host before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub path: Option<PathBuf>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            path: None,
            bytes,
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|value| value.to_str())
            .unwrap_or("upload")
            .to_string();
        Ok(Self {
            name,
            path: Some(path.to_path_buf()),
            bytes,
        })
    }
}

/// Where a source image came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageOrigin {
    pub file_name: String,
    pub path: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub id: ImageId,
    pub payload: ImagePayload,
    pub origin: ImageOrigin,
}

/// Decodes an uploaded file into a displayable payload.
///
/// The bytes are kept as uploaded; decoding only proves the file is an image
/// and recovers its format and dimensions.
pub fn decode_upload(file: &UploadFile) -> Result<(ImagePayload, ImageOrigin)> {
    if file.bytes.is_empty() {
        bail!("{} is empty", file.name);
    }
    let format = image::guess_format(&file.bytes)
        .with_context(|| format!("{} is not a recognised image", file.name))?;
    let decoded = image::load_from_memory_with_format(&file.bytes, format)
        .with_context(|| format!("{} failed to decode", file.name))?;
    let payload = ImagePayload::new(file.bytes.clone(), mime_for_format(format));
    let origin = ImageOrigin {
        file_name: file.name.clone(),
        path: file.path.clone(),
        width: decoded.width(),
        height: decoded.height(),
    };
    Ok((payload, origin))
}

fn mime_for_format(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Gif => "image/gif",
        ImageFormat::Bmp => "image/bmp",
        _ => "image/png",
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;

    use image::{Rgb, RgbImage};

    use super::*;

    pub(crate) fn png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        let mut img = RgbImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = Rgb(rgb);
        }
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png)
            .expect("encode test png");
        out.into_inner()
    }

    #[test]
    fn decode_upload_reads_format_and_dimensions() -> anyhow::Result<()> {
        let file = UploadFile::from_bytes("mug.png", png_bytes(4, 3, [10, 20, 30]));
        let (payload, origin) = decode_upload(&file)?;
        assert_eq!(payload.mime_type, "image/png");
        assert_eq!(payload.bytes, file.bytes);
        assert_eq!((origin.width, origin.height), (4, 3));
        assert!(payload.to_data_url().starts_with("data:image/png;base64,"));
        Ok(())
    }

    #[test]
    fn decode_upload_rejects_garbage() {
        let file = UploadFile::from_bytes("notes.txt", b"hello".to_vec());
        assert!(decode_upload(&file).is_err());
        assert!(decode_upload(&UploadFile::from_bytes("empty.png", Vec::new())).is_err());
    }

    #[test]
    fn upload_file_read_keeps_path_and_name() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("shot.png");
        std::fs::write(&path, png_bytes(2, 2, [0, 0, 0]))?;
        let file = UploadFile::read(&path)?;
        assert_eq!(file.name, "shot.png");
        assert_eq!(file.path.as_deref(), Some(path.as_path()));
        Ok(())
    }
}
