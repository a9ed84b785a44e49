//! Request building blocks: method, payload and per-call options.

use reqwest::multipart::{Form, Part};
use serde_json::Value;

use super::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Request body. The shape decides the encoding.
#[derive(Debug, Clone)]
pub enum Payload {
    Json(Value),
    Multipart(MultipartBody),
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<MultipartBody> for Payload {
    fn from(body: MultipartBody) -> Self {
        Payload::Multipart(body)
    }
}

#[derive(Debug, Clone)]
enum PartData {
    Text(String),
    File {
        file_name: String,
        mime: Option<String>,
        bytes: Vec<u8>,
    },
}

/// A multipart form, kept as plain data until send time so it can be
/// inspected and cloned.
#[derive(Debug, Clone, Default)]
pub struct MultipartBody {
    parts: Vec<(String, PartData)>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.parts.push((name.to_string(), PartData::Text(value.into())));
        self
    }

    pub fn file(self, name: &str, file_name: &str, bytes: Vec<u8>) -> Self {
        let mime = guess_image_mime(file_name).map(str::to_string);
        self.push_file(name, file_name, mime, bytes)
    }

    pub fn file_with_mime(self, name: &str, file_name: &str, mime: &str, bytes: Vec<u8>) -> Self {
        self.push_file(name, file_name, Some(mime.to_string()), bytes)
    }

    fn push_file(mut self, name: &str, file_name: &str, mime: Option<String>, bytes: Vec<u8>) -> Self {
        self.parts.push((
            name.to_string(),
            PartData::File {
                file_name: file_name.to_string(),
                mime,
                bytes,
            },
        ));
        self
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.parts.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn text_value(&self, name: &str) -> Option<&str> {
        self.parts.iter().find_map(|(n, part)| match part {
            PartData::Text(value) if n == name => Some(value.as_str()),
            _ => None,
        })
    }

    pub(crate) fn into_form(self) -> Result<Form, ApiError> {
        let mut form = Form::new();
        for (name, data) in self.parts {
            form = match data {
                PartData::Text(value) => form.text(name, value),
                PartData::File {
                    file_name,
                    mime,
                    bytes,
                } => {
                    let mut part = Part::bytes(bytes).file_name(file_name);
                    if let Some(mime) = mime {
                        part = part.mime_str(&mime).map_err(|e| {
                            ApiError::InvalidRequest(format!("Invalid MIME type {}: {}", mime, e))
                        })?;
                    }
                    form.part(name, part)
                }
            };
        }
        Ok(form)
    }
}

fn guess_image_mime(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

/// Per-call options: query parameters and extra headers.
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl RequestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_string(), value.into()));
        self
    }
}
