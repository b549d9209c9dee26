//! Request types for the API client.
//!
//! - [`HttpMethod`]: the verbs the client issues
//! - [`RequestBody`]: a JSON or multipart body, kept in a cloneable form so it
//!   can be resent on retry or after an offline period
//! - [`MultipartForm`]: an owned description of a `multipart/form-data` body
//! - [`RequestOptions`]: per-call header, query and timeout overrides
//! - [`RequestConfig`]: the outgoing request as seen by request interceptors

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::clients::errors::ApiError;

/// HTTP methods supported by the API client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// HTTP GET method for retrieving resources.
    Get,
    /// HTTP POST method for creating resources.
    Post,
    /// HTTP PUT method for replacing resources.
    Put,
    /// HTTP PATCH method for partial updates.
    Patch,
    /// HTTP DELETE method for removing resources.
    Delete,
}

impl HttpMethod {
    /// Returns the uppercase method name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Returns `true` for methods that send a request body.
    #[must_use]
    pub const fn has_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Self::GET,
            HttpMethod::Post => Self::POST,
            HttpMethod::Put => Self::PUT,
            HttpMethod::Patch => Self::PATCH,
            HttpMethod::Delete => Self::DELETE,
        }
    }
}

/// One part of a [`MultipartForm`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormPart {
    /// A plain text field.
    Text {
        /// Field name.
        name: String,
        /// Field value.
        value: String,
    },
    /// A file field.
    File {
        /// Field name.
        name: String,
        /// File name reported to the server.
        file_name: String,
        /// MIME type, if known.
        mime_type: Option<String>,
        /// File contents.
        bytes: Vec<u8>,
    },
}

/// An owned `multipart/form-data` body.
///
/// `reqwest::multipart::Form` is consumed when sent, so the client keeps this
/// description instead and builds a fresh form for every attempt.
///
/// # Example
///
/// ```rust
/// use scm_api::MultipartForm;
///
/// let form = MultipartForm::new()
///     .text("warehouse", "WH-01")
///     .file("file", "stock.csv", b"sku,qty\nA1,5\n".to_vec());
///
/// assert_eq!(form.parts().len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MultipartForm {
    parts: Vec<FormPart>,
}

impl MultipartForm {
    /// Creates an empty form.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a text field.
    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Adds a file field with no explicit MIME type.
    #[must_use]
    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            file_name: file_name.into(),
            mime_type: None,
            bytes,
        });
        self
    }

    /// Adds a file field with an explicit MIME type.
    #[must_use]
    pub fn file_with_mime(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            file_name: file_name.into(),
            mime_type: Some(mime_type.into()),
            bytes,
        });
        self
    }

    /// Returns the parts of this form in insertion order.
    #[must_use]
    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    /// Builds the reqwest form for one send attempt.
    pub(crate) fn to_form(&self) -> Result<reqwest::multipart::Form, reqwest::Error> {
        let mut form = reqwest::multipart::Form::new();
        for part in &self.parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
                FormPart::File {
                    name,
                    file_name,
                    mime_type,
                    bytes,
                } => {
                    let mut file = reqwest::multipart::Part::bytes(bytes.clone())
                        .file_name(file_name.clone());
                    if let Some(mime) = mime_type {
                        file = file.mime_str(mime)?;
                    }
                    form.part(name.clone(), file)
                }
            };
        }
        Ok(form)
    }

    /// Stable description used in request signatures. File parts are
    /// identified by a content digest so distinct uploads never collide.
    fn describe(&self) -> String {
        let fields: Vec<String> = self
            .parts
            .iter()
            .map(|part| match part {
                FormPart::Text { name, value } => format!("{name}={value}"),
                FormPart::File {
                    name,
                    file_name,
                    mime_type,
                    bytes,
                } => format!(
                    "{name}=@{file_name};type={};sha256={}",
                    mime_type.as_deref().unwrap_or("-"),
                    hex::encode(Sha256::digest(bytes))
                ),
            })
            .collect();
        format!("multipart[{}]", fields.join("&"))
    }
}

/// A request body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestBody {
    /// A JSON document, already encoded.
    Json(String),
    /// A multipart form; no `Content-Type` is forced so the boundary is set
    /// by the transport.
    Multipart(MultipartForm),
}

impl RequestBody {
    /// Encodes a serializable value as a JSON body.
    ///
    /// # Errors
    ///
    /// Returns a `REQUEST_ERROR` [`ApiError`] if the value cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ApiError> {
        serde_json::to_string(value)
            .map(Self::Json)
            .map_err(|e| ApiError::request(format!("Failed to serialize request body: {e}")))
    }

    /// Returns `true` for multipart bodies.
    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart(_))
    }

    pub(crate) fn signature_fragment(&self) -> String {
        match self {
            Self::Json(text) => text.clone(),
            Self::Multipart(form) => form.describe(),
        }
    }
}

/// Per-call overrides layered on top of the client defaults.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use scm_api::RequestOptions;
///
/// let options = RequestOptions::new()
///     .header("X-Warehouse", "WH-01")
///     .query_param("page", "2")
///     .timeout(Duration::from_secs(5));
///
/// assert_eq!(options.query.get("page"), Some(&"2".to_string()));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Extra headers; these override client defaults with the same name.
    pub headers: HashMap<String, String>,
    /// Query parameters, appended to the URL in key order.
    pub query: BTreeMap<String, String>,
    /// Timeout for this call instead of the configured one.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a single header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Adds a single query parameter.
    #[must_use]
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Sets the timeout for this call.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Removes any `Content-Type` header, whatever its casing.
    pub(crate) fn strip_content_type(&mut self) {
        self.headers
            .retain(|name, _| !name.eq_ignore_ascii_case("content-type"));
    }
}

/// The outgoing request as passed through the request interceptor chain.
///
/// Header lookups and updates are case-insensitive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestConfig {
    /// HTTP method.
    pub method: HttpMethod,
    /// Fully-qualified URL including the query string.
    pub url: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Request body, present only for POST/PUT/PATCH.
    pub body: Option<RequestBody>,
    /// Timeout after which the request is aborted.
    pub timeout: Duration,
}

impl RequestConfig {
    /// Returns the value of a header, ignoring case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Sets a header, replacing any existing header with the same name.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove_header(&name);
        self.headers.insert(name, value.into());
    }

    /// Removes a header, ignoring case, and returns its value.
    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        let key = self
            .headers
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .cloned()?;
        self.headers.remove(&key)
    }
}

/// A call as submitted by a public verb, before URL resolution.
#[derive(Clone, Debug)]
pub(crate) struct Submission {
    pub(crate) method: HttpMethod,
    pub(crate) path: String,
    pub(crate) body: Option<RequestBody>,
    pub(crate) options: RequestOptions,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config_with_headers(headers: &[(&str, &str)]) -> RequestConfig {
        RequestConfig {
            method: HttpMethod::Get,
            url: "http://localhost/api/x".to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            body: None,
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_http_method_display() {
        assert_eq!(HttpMethod::Get.to_string(), "GET");
        assert_eq!(HttpMethod::Post.to_string(), "POST");
        assert_eq!(HttpMethod::Put.to_string(), "PUT");
        assert_eq!(HttpMethod::Patch.to_string(), "PATCH");
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_only_write_methods_carry_a_body() {
        assert!(!HttpMethod::Get.has_body());
        assert!(!HttpMethod::Delete.has_body());
        assert!(HttpMethod::Post.has_body());
        assert!(HttpMethod::Put.has_body());
        assert!(HttpMethod::Patch.has_body());
    }

    #[test]
    fn test_json_body_is_encoded_once() {
        let body = RequestBody::json(&json!({"sku": "A1"})).unwrap();
        assert_eq!(body, RequestBody::Json(r#"{"sku":"A1"}"#.to_string()));
        assert!(!body.is_multipart());
    }

    #[test]
    fn test_multipart_signature_is_stable() {
        let form = MultipartForm::new()
            .text("warehouse", "WH-01")
            .file("file", "stock.csv", vec![1, 2, 3]);
        let body = RequestBody::Multipart(form.clone());

        assert!(body.is_multipart());
        assert_eq!(
            body.signature_fragment(),
            "multipart[warehouse=WH-01&file=@stock.csv;type=-;\
             sha256=039058c6f2c0cb492c533b0a4d14ef77cc0f78abccced5287d84a1a2011cfb81]"
        );
        assert_eq!(
            body.signature_fragment(),
            RequestBody::Multipart(form).signature_fragment()
        );
    }

    #[test]
    fn test_multipart_signature_depends_on_file_contents() {
        let upload = |bytes: &[u8]| {
            RequestBody::Multipart(MultipartForm::new().file("file", "stock.csv", bytes.to_vec()))
                .signature_fragment()
        };

        assert_ne!(upload(b"AAA"), upload(b"BBB"));
        assert_eq!(upload(b"AAA"), upload(b"AAA"));
    }

    #[test]
    fn test_multipart_form_builds_reqwest_form() {
        let form = MultipartForm::new()
            .text("warehouse", "WH-01")
            .file_with_mime("file", "stock.csv", "text/csv", b"a,b".to_vec());
        assert!(form.to_form().is_ok());

        let bad = MultipartForm::new().file_with_mime("file", "x", "not a mime", vec![]);
        assert!(bad.to_form().is_err());
    }

    #[test]
    fn test_request_config_headers_are_case_insensitive() {
        let mut config = config_with_headers(&[("Content-Type", "application/json")]);

        assert_eq!(config.header("content-type"), Some("application/json"));

        config.set_header("CONTENT-TYPE", "text/csv");
        assert_eq!(config.headers.len(), 1);
        assert_eq!(config.header("Content-Type"), Some("text/csv"));

        assert_eq!(config.remove_header("content-type"), Some("text/csv".to_string()));
        assert!(config.headers.is_empty());
    }

    #[test]
    fn test_strip_content_type_removes_any_casing() {
        let mut options = RequestOptions::new()
            .header("content-type", "application/json")
            .header("X-Upload-Batch", "7");
        options.strip_content_type();

        assert_eq!(options.headers.len(), 1);
        assert!(options.headers.contains_key("X-Upload-Batch"));
    }
}
