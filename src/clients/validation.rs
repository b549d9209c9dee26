//! Opt-in response validation.
//!
//! A [`ResponseSchema`] checks a JSON value and produces a typed result.
//! [`ApiClient::validate_response`](crate::ApiClient::validate_response) turns
//! schema violations into a `VALIDATION_ERROR`.

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A single schema violation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaViolation {
    /// Location of the offending value (`$` for the document root).
    pub path: String,
    /// What was wrong with it.
    pub message: String,
}

impl SchemaViolation {
    /// Creates a violation.
    #[must_use]
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// A check applied to a parsed response.
pub trait ResponseSchema {
    /// The validated, typed result.
    type Output;

    /// Validates `value`.
    ///
    /// # Errors
    ///
    /// Returns every violation found.
    fn validate(&self, value: &serde_json::Value) -> Result<Self::Output, Vec<SchemaViolation>>;
}

/// Validates by deserializing into `T`.
///
/// # Example
///
/// ```rust
/// use serde::Deserialize;
/// use scm_api::clients::{ResponseSchema, SerdeSchema};
///
/// #[derive(Deserialize)]
/// struct PurchaseOrder { id: u64 }
///
/// let schema = SerdeSchema::<PurchaseOrder>::new();
/// assert!(schema.validate(&serde_json::json!({"id": 7})).is_ok());
/// assert!(schema.validate(&serde_json::json!({"id": "seven"})).is_err());
/// ```
pub struct SerdeSchema<T>(PhantomData<fn() -> T>);

impl<T> SerdeSchema<T> {
    /// Creates the schema.
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for SerdeSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SerdeSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SerdeSchema<{}>", std::any::type_name::<T>())
    }
}

impl<T: DeserializeOwned> ResponseSchema for SerdeSchema<T> {
    type Output = T;

    fn validate(&self, value: &serde_json::Value) -> Result<T, Vec<SchemaViolation>> {
        T::deserialize(value).map_err(|e| vec![SchemaViolation::new("$", e.to_string())])
    }
}

/// A schema backed by a closure. See [`schema_fn`].
pub struct FnSchema<F>(F);

/// Wraps a validation closure as a [`ResponseSchema`].
///
/// # Example
///
/// ```rust
/// use scm_api::clients::{schema_fn, ResponseSchema, SchemaViolation};
///
/// let non_empty = schema_fn(|value: &serde_json::Value| {
///     value
///         .as_array()
///         .filter(|rows| !rows.is_empty())
///         .map(Vec::len)
///         .ok_or_else(|| vec![SchemaViolation::new("$", "expected a non-empty array")])
/// });
///
/// assert_eq!(non_empty.validate(&serde_json::json!([1, 2])), Ok(2));
/// assert!(non_empty.validate(&serde_json::json!([])).is_err());
/// ```
pub const fn schema_fn<F, T>(f: F) -> FnSchema<F>
where
    F: Fn(&serde_json::Value) -> Result<T, Vec<SchemaViolation>>,
{
    FnSchema(f)
}

impl<F, T> ResponseSchema for FnSchema<F>
where
    F: Fn(&serde_json::Value) -> Result<T, Vec<SchemaViolation>>,
{
    type Output = T;

    fn validate(&self, value: &serde_json::Value) -> Result<T, Vec<SchemaViolation>> {
        (self.0)(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct InventoryRow {
        sku: String,
        on_hand: i64,
    }

    #[test]
    fn test_serde_schema_accepts_matching_document() {
        let schema = SerdeSchema::<Vec<InventoryRow>>::new();
        let rows = schema
            .validate(&json!([{"sku": "A1", "on_hand": 3}]))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].on_hand, 3);
    }

    #[test]
    fn test_serde_schema_reports_violation() {
        let schema = SerdeSchema::<InventoryRow>::new();
        let violations = schema.validate(&json!({"sku": "A1"})).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "$");
        assert!(violations[0].message.contains("on_hand"));
    }

    #[test]
    fn test_fn_schema_collects_multiple_violations() {
        let schema = schema_fn(|value: &serde_json::Value| {
            let mut violations = Vec::new();
            if value.get("sku").is_none() {
                violations.push(SchemaViolation::new("$.sku", "required"));
            }
            if value.get("on_hand").is_none() {
                violations.push(SchemaViolation::new("$.on_hand", "required"));
            }
            if violations.is_empty() {
                Ok(())
            } else {
                Err(violations)
            }
        });

        let violations = schema.validate(&json!({})).unwrap_err();
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[1].to_string(), "$.on_hand: required");
    }
}
