//! Multipart form-data handling for file uploads.
//!
//! [`read_multipart`] drains an axum [`Multipart`] body into regular form
//! fields and uploaded files. A file input submitted without choosing a file
//! (empty filename, empty body) is dropped rather than reported as a file.

use std::collections::HashMap;

use axum::extract::Multipart;

use crate::error::{CmsError, CmsResult};

/// An uploaded file from a multipart form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// The original filename as provided by the client.
    pub name: String,
    /// The MIME content type of the file.
    pub content_type: String,
    /// The raw file content.
    pub content: Vec<u8>,
}

impl UploadedFile {
    /// The size of the file content in bytes.
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

/// The result of reading a multipart form-data body.
#[derive(Debug, Clone, Default)]
pub struct MultipartData {
    /// Regular form fields: name -> list of values.
    pub fields: HashMap<String, Vec<String>>,
    /// Uploaded files by field name.
    pub files: HashMap<String, UploadedFile>,
}

impl MultipartData {
    /// Returns the last value of each field, the shape forms validate.
    pub fn form_data(&self) -> HashMap<String, String> {
        self.fields
            .iter()
            .filter_map(|(name, values)| values.last().map(|v| (name.clone(), v.clone())))
            .collect()
    }

    /// Takes an uploaded file out of the data.
    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}

/// Reads every part of a multipart body.
///
/// # Errors
///
/// Returns [`CmsError::BadRequest`] for malformed bodies.
pub async fn read_multipart(mut multipart: Multipart) -> CmsResult<MultipartData> {
    let mut data = MultipartData::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CmsError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if let Some(file_name) = field.file_name().map(str::to_string) {
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let content = field
                .bytes()
                .await
                .map_err(|e| CmsError::BadRequest(format!("Failed to read upload: {e}")))?;
            if file_name.is_empty() && content.is_empty() {
                continue;
            }
            tracing::debug!(field = %name, file = %file_name, size = content.len(), "received upload");
            data.files.insert(
                name,
                UploadedFile {
                    name: file_name,
                    content_type,
                    content: content.to_vec(),
                },
            );
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| CmsError::BadRequest(format!("Failed to read form field: {e}")))?;
            data.fields.entry(name).or_default().push(value);
        }
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::Request;

    const BOUNDARY: &str = "XyZ";

    fn request(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .header("Content-Type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_read_fields_and_files() {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"title\"\r\n\r\n\
             Logo\r\n\
             --{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"image\"; filename=\"logo.txt\"\r\n\
             Content-Type: text/plain\r\n\r\n\
             hello\r\n\
             --{BOUNDARY}--\r\n"
        );
        let multipart = Multipart::from_request(request(body), &()).await.unwrap();
        let mut data = read_multipart(multipart).await.unwrap();
        assert_eq!(data.form_data()["title"], "Logo");
        let file = data.take_file("image").unwrap();
        assert_eq!(file.name, "logo.txt");
        assert_eq!(file.content_type, "text/plain");
        assert_eq!(file.size(), 5);
        assert!(data.take_file("image").is_none());
    }

    #[tokio::test]
    async fn test_empty_file_input_is_dropped() {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"image\"; filename=\"\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             \r\n\
             --{BOUNDARY}--\r\n"
        );
        let multipart = Multipart::from_request(request(body), &()).await.unwrap();
        let data = read_multipart(multipart).await.unwrap();
        assert!(data.files.is_empty());
    }
}
