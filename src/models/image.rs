use crate::error::{Result, StudioError};

pub const MAX_IMAGES: usize = 5;

/// Image formats accepted by the Gemini API as inline data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    WebP,
    Heic,
    Heif,
}

impl ImageFormat {
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ImageFormat::Jpeg),
            "image/png" => Some(ImageFormat::Png),
            "image/webp" => Some(ImageFormat::WebP),
            "image/heic" => Some(ImageFormat::Heic),
            "image/heif" => Some(ImageFormat::Heif),
            _ => None,
        }
    }

    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(ImageFormat::Jpeg);
        }
        if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(ImageFormat::Png);
        }
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Some(ImageFormat::WebP);
        }
        if data.len() >= 12 && &data[4..8] == b"ftyp" {
            return match &data[8..12] {
                b"heic" | b"heix" | b"hevc" | b"hevx" => Some(ImageFormat::Heic),
                b"mif1" | b"msf1" | b"heif" => Some(ImageFormat::Heif),
                _ => None,
            };
        }
        None
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Heic => "image/heic",
            ImageFormat::Heif => "image/heif",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::WebP => "webp",
            ImageFormat::Heic => "heic",
            ImageFormat::Heif => "heif",
        }
    }
}

/// One uploaded file from a multipart request.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub field_name: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl ImageUpload {
    pub fn new(
        field_name: impl Into<String>,
        filename: impl Into<String>,
        content_type: Option<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            filename: filename.into(),
            content_type,
            data,
        }
    }

    /// Resolves the format from the declared type, sniffing the bytes when the client sent none.
    pub fn format(&self) -> Result<ImageFormat> {
        let declared = self
            .content_type
            .as_deref()
            .map(str::trim)
            .filter(|ct| !ct.is_empty() && !ct.starts_with("application/octet-stream"));

        let format = match declared {
            Some(ct) => ImageFormat::from_mime(ct),
            None => ImageFormat::from_magic_bytes(&self.data),
        };

        format.ok_or_else(|| {
            StudioError::UnsupportedMediaType(format!(
                "file '{}' ({}) is not a JPEG, PNG, WebP, HEIC or HEIF image",
                self.filename,
                declared.unwrap_or("unknown type")
            ))
        })
    }
}

/// An image that passed validation, ready to be sent upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePart {
    pub filename: String,
    pub format: ImageFormat,
    pub data: Vec<u8>,
}

/// Validated, ordered set of 1 to 5 uploaded images.
#[derive(Debug, Clone)]
pub struct ImageUploadSet {
    images: Vec<ImagePart>,
}

impl ImageUploadSet {
    pub fn new(uploads: Vec<ImageUpload>) -> Result<Self> {
        if uploads.is_empty() {
            return Err(StudioError::ValidationError(
                "At least one image must be provided".into(),
            ));
        }
        if uploads.len() > MAX_IMAGES {
            return Err(StudioError::ValidationError(format!(
                "Between 1 and {} images must be provided, got {}",
                MAX_IMAGES,
                uploads.len()
            )));
        }

        let mut images = Vec::with_capacity(uploads.len());
        for upload in uploads {
            if upload.data.is_empty() {
                return Err(StudioError::ValidationError(format!(
                    "File '{}' is empty",
                    upload.filename
                )));
            }
            let format = upload.format()?;
            images.push(ImagePart {
                filename: upload.filename,
                format,
                data: upload.data,
            });
        }

        Ok(Self { images })
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn images(&self) -> &[ImagePart] {
        &self.images
    }
}

/// Image bytes returned by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl GeneratedImage {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }

    pub fn extension(&self) -> &'static str {
        ImageFormat::from_mime(&self.mime_type)
            .or_else(|| ImageFormat::from_magic_bytes(&self.data))
            .map(|f| f.extension())
            .unwrap_or("bin")
    }
}
