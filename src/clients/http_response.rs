//! Response payloads returned by the API client.
//!
//! Successful responses are decoded according to their `Content-Type`:
//! JSON media types become [`Payload::Json`], everything else is kept as
//! raw text in [`Payload::Text`].

use serde::de::DeserializeOwned;

/// A parsed response body.
///
/// # Example
///
/// ```rust
/// use scm_api::Payload;
///
/// let payload = Payload::parse(Some("application/json; charset=utf-8"), r#"{"onHand": 12}"#).unwrap();
/// assert_eq!(payload.as_json().unwrap()["onHand"], 12);
///
/// let payload = Payload::parse(Some("text/csv"), "sku,qty").unwrap();
/// assert_eq!(payload.as_text(), Some("sku,qty"));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// A decoded JSON document. Empty JSON bodies decode to `null`.
    Json(serde_json::Value),
    /// A non-JSON body, returned verbatim.
    Text(String),
}

impl Payload {
    /// Parses a response body according to its `Content-Type` header value.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if a JSON content type carries a malformed body.
    pub fn parse(content_type: Option<&str>, body: &str) -> Result<Self, serde_json::Error> {
        if !content_type.is_some_and(is_json_content_type) {
            return Ok(Self::Text(body.to_string()));
        }
        if body.trim().is_empty() {
            return Ok(Self::Json(serde_json::Value::Null));
        }
        serde_json::from_str(body).map(Self::Json)
    }

    /// Returns the JSON document, if this is a JSON payload.
    #[must_use]
    pub const fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    /// Returns the raw text, if this is a text payload.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Json(_) => None,
            Self::Text(text) => Some(text),
        }
    }

    /// Converts the payload into a JSON value; text becomes a JSON string.
    #[must_use]
    pub fn into_value(self) -> serde_json::Value {
        match self {
            Self::Json(value) => value,
            Self::Text(text) => serde_json::Value::String(text),
        }
    }

    /// Deserializes the payload into `T`.
    ///
    /// # Errors
    ///
    /// Returns the serde error if the payload does not match `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match self {
            Self::Json(value) => T::deserialize(value),
            Self::Text(text) => T::deserialize(serde_json::Value::String(text.clone())),
        }
    }
}

/// Returns `true` for `application/json` and `*+json` media types.
#[must_use]
pub fn is_json_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct StockLevel {
        sku: String,
        qty: u32,
    }

    #[test]
    fn test_json_content_type_detection() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("Application/JSON; charset=utf-8"));
        assert!(is_json_content_type("application/problem+json"));
        assert!(!is_json_content_type("text/plain"));
        assert!(!is_json_content_type("text/json+html"));
    }

    #[test]
    fn test_parse_json_body() {
        let payload = Payload::parse(Some("application/json"), r#"{"sku":"A1","qty":5}"#).unwrap();
        assert_eq!(payload, Payload::Json(json!({"sku": "A1", "qty": 5})));
    }

    #[test]
    fn test_parse_text_body_never_fails() {
        let payload = Payload::parse(Some("text/plain"), "{not json").unwrap();
        assert_eq!(payload, Payload::Text("{not json".to_string()));

        let payload = Payload::parse(None, "plain").unwrap();
        assert_eq!(payload.as_text(), Some("plain"));
    }

    #[test]
    fn test_parse_empty_json_body_is_null() {
        let payload = Payload::parse(Some("application/json"), "").unwrap();
        assert_eq!(payload, Payload::Json(serde_json::Value::Null));
    }

    #[test]
    fn test_parse_malformed_json_is_an_error() {
        assert!(Payload::parse(Some("application/json"), "{oops").is_err());
    }

    #[test]
    fn test_deserialize_into_typed_value() {
        let payload = Payload::Json(json!({"sku": "A1", "qty": 5}));
        let level: StockLevel = payload.deserialize().unwrap();
        assert_eq!(
            level,
            StockLevel {
                sku: "A1".to_string(),
                qty: 5
            }
        );

        let text = Payload::Text("hello".to_string());
        let value: String = text.deserialize().unwrap();
        assert_eq!(value, "hello");
        assert_eq!(text.into_value(), json!("hello"));
    }
}
