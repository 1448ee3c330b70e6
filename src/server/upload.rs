use std::collections::HashMap;

use actix_multipart::{Field, Multipart};
use futures::{StreamExt, TryStreamExt};

use crate::{
    error::{Result, StudioError},
    models::{ImageUpload, MAX_IMAGES},
};

/// Text fields are small; anything larger is a client mistake.
const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;
const MAX_TEXT_FIELDS: usize = 16;

/// A multipart body split into file parts and text fields.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub images: Vec<ImageUpload>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Orders images by their field name's position in `roles`; other fields keep upload order after them.
    pub fn arrange_by_roles(&mut self, roles: &[&str]) {
        if roles.is_empty() {
            return;
        }
        self.images.sort_by_key(|image| {
            roles
                .iter()
                .position(|role| *role == image.field_name)
                .unwrap_or(roles.len())
        });
    }
}

/// Reads the whole form, failing before buffering the file or text field that would exceed a limit.
pub async fn read_form(mut payload: Multipart, max_file_bytes: usize) -> Result<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(mut field) = payload.try_next().await? {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(String::from);

        match filename {
            Some(filename) => {
                if form.images.len() >= MAX_IMAGES && !filename.is_empty() {
                    return Err(StudioError::ValidationError(format!(
                        "Between 1 and {} images must be provided, got more",
                        MAX_IMAGES
                    )));
                }
                let content_type = field.content_type().map(|mime| mime.to_string());
                let data = read_field(&mut field, max_file_bytes, &filename).await?;
                // Browsers send an empty, unnamed part for an untouched file input.
                if filename.is_empty() && data.is_empty() {
                    continue;
                }
                log::debug!(
                    "Received file '{}' ({} bytes, {:?}) in field '{}'",
                    filename,
                    data.len(),
                    content_type,
                    name
                );
                form.images
                    .push(ImageUpload::new(name, filename, content_type, data));
            }
            None => {
                if form.fields.len() >= MAX_TEXT_FIELDS {
                    return Err(StudioError::ValidationError(format!(
                        "At most {} text fields are accepted",
                        MAX_TEXT_FIELDS
                    )));
                }
                let data = read_field(&mut field, MAX_TEXT_FIELD_BYTES, &name).await?;
                let value = String::from_utf8(data).map_err(|_| {
                    StudioError::ValidationError(format!("Field '{}' is not valid UTF-8", name))
                })?;
                form.fields.insert(name, value);
            }
        }
    }

    Ok(form)
}

async fn read_field(field: &mut Field, limit: usize, label: &str) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk?;
        if data.len() + chunk.len() > limit {
            return Err(StudioError::ValidationError(format!(
                "'{}' exceeds the maximum size of {} bytes",
                label, limit
            )));
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(field: &str, name: &str) -> ImageUpload {
        ImageUpload::new(field, name, Some("image/png".into()), vec![1])
    }

    #[test]
    fn test_arrange_by_roles() {
        let mut form = UploadForm {
            images: vec![
                image("clothing_image", "shirt.png"),
                image("person_image", "man.png"),
            ],
            fields: HashMap::new(),
        };
        form.arrange_by_roles(&["person_image", "clothing_image"]);
        assert_eq!(form.images[0].filename, "man.png");
        assert_eq!(form.images[1].filename, "shirt.png");
    }

    #[test]
    fn test_arrange_keeps_upload_order_for_unnamed_roles() {
        let mut form = UploadForm {
            images: vec![image("images", "a.png"), image("images", "b.png")],
            fields: HashMap::new(),
        };
        form.arrange_by_roles(&["person_image", "clothing_image"]);
        assert_eq!(form.images[0].filename, "a.png");
        assert_eq!(form.images[1].filename, "b.png");
    }

    #[test]
    fn test_field_trims_blank_values() {
        let mut fields = HashMap::new();
        fields.insert("prompt".to_string(), "   ".to_string());
        fields.insert("output_dir".to_string(), " out ".to_string());
        let form = UploadForm {
            images: Vec::new(),
            fields,
        };
        assert_eq!(form.field("prompt"), None);
        assert_eq!(form.field("output_dir"), Some("out"));
    }
}
