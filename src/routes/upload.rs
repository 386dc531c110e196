use std::collections::HashMap;

use axum::extract::Multipart;

use crate::error::AppResult;
use crate::services::storage::{extension_for, object_key};
use crate::services::transcode::MediaFile;
use crate::state::AppState;

#[derive(Debug)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn into_media(self) -> MediaFile {
        MediaFile {
            ext: extension_for(self.file_name.as_deref(), &self.content_type),
            content_type: self.content_type,
            bytes: self.bytes,
        }
    }
}

/// A drained multipart body: text fields by name, files in arrival order.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: Vec<UploadedFile>,
}

impl MultipartForm {
    pub fn field(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }

    pub fn take_files(&mut self, name: &str) -> Vec<UploadedFile> {
        let (matching, rest) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|f| f.field == name);
        self.files = rest;
        matching
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        let position = self.files.iter().position(|f| f.field == name)?;
        Some(self.files.remove(position))
    }
}

pub async fn read_multipart(mut multipart: Multipart) -> AppResult<MultipartForm> {
    let mut form = MultipartForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);

        match file_name {
            Some(file_name) => {
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| {
                        mime_guess::from_path(&file_name)
                            .first_or_octet_stream()
                            .to_string()
                    });
                let bytes = field.bytes().await?;
                if bytes.is_empty() {
                    continue;
                }
                form.files.push(UploadedFile {
                    field: name,
                    file_name: Some(file_name),
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            None => {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }
    }
    Ok(form)
}

/// Store a media file under `folder` and return its public URL.
pub async fn store_media(state: &AppState, folder: &str, file: MediaFile) -> AppResult<String> {
    let key = object_key(folder, &file.ext);
    let url = state.media.put(&key, &file.content_type, file.bytes).await?;
    tracing::debug!("Stored {} ({})", key, file.content_type);
    Ok(url)
}
