//! `$jsonSchema` evaluation
//!
//! Covers the keywords the catalog emits: `bsonType`, `required`,
//! `properties`, `enum`, `minimum`, `maximum` and `pattern`. Range keywords
//! only constrain numbers and `pattern` only constrains strings, so a value of
//! the wrong type is reported once, by `bsonType`.

use bson::{Bson, Document};
use regex::Regex;
use std::fmt;

use crate::types::{ProvisionError, Result};

/// Keywords that carry no constraint
const ANNOTATIONS: [&str; 2] = ["title", "description"];

/// A single reason a document was rejected
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Dotted path of the offending value (`$root` for the document itself)
    pub path: String,
    pub reason: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

/// Check a document against a `{ $jsonSchema: ... }` validator.
///
/// Returns the list of violations (empty when the document conforms).
/// A validator using keywords outside the supported subset is an error
/// rather than being silently ignored.
pub fn validate_document(validator: &Document, document: &Document) -> Result<Vec<Violation>> {
    let mut violations = Vec::new();
    for (operator, schema) in validator {
        match (operator.as_str(), schema) {
            ("$jsonSchema", Bson::Document(schema)) => {
                check_object(schema, document, "", &mut violations)?;
            }
            _ => {
                return Err(ProvisionError::UnsupportedValidator(format!(
                    "query operator '{}'",
                    operator
                )))
            }
        }
    }
    Ok(violations)
}

fn join_path(parent: &str, field: &str) -> String {
    if parent.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", parent, field)
    }
}

fn check_object(
    schema: &Document,
    document: &Document,
    path: &str,
    violations: &mut Vec<Violation>,
) -> Result<()> {
    let display_path = if path.is_empty() { "$root" } else { path };

    for (keyword, value) in schema {
        match keyword.as_str() {
            "bsonType" => {
                if !type_matches(value, "object")? {
                    violations.push(Violation {
                        path: display_path.to_string(),
                        reason: format!("expected bsonType {}, found object", type_list(value)),
                    });
                }
            }
            "required" => {
                let Bson::Array(required) = value else {
                    return Err(unsupported("required must be an array"));
                };
                for field in required {
                    let Bson::String(field) = field else {
                        return Err(unsupported("required entries must be strings"));
                    };
                    if !document.contains_key(field) {
                        violations.push(Violation {
                            path: join_path(path, field),
                            reason: "required field is missing".to_string(),
                        });
                    }
                }
            }
            "properties" => {
                let Bson::Document(properties) = value else {
                    return Err(unsupported("properties must be a document"));
                };
                for (field, property) in properties {
                    let Bson::Document(property) = property else {
                        return Err(unsupported("property schemas must be documents"));
                    };
                    if let Some(value) = document.get(field) {
                        check_value(property, value, &join_path(path, field), violations)?;
                    }
                }
            }
            other if ANNOTATIONS.contains(&other) => {}
            other => return Err(unsupported(&format!("keyword '{}'", other))),
        }
    }
    Ok(())
}

fn check_value(
    schema: &Document,
    value: &Bson,
    path: &str,
    violations: &mut Vec<Violation>,
) -> Result<()> {
    // Nested objects are checked with the object keywords as well
    if let Bson::Document(nested) = value {
        let object_keywords = ["required", "properties"];
        if schema.keys().any(|k| object_keywords.contains(&k.as_str())) {
            let nested_schema: Document = schema
                .iter()
                .filter(|(k, _)| object_keywords.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            check_object(&nested_schema, nested, path, violations)?;
        }
    }

    let mut reject = |reason: String| {
        violations.push(Violation {
            path: path.to_string(),
            reason,
        })
    };

    for (keyword, constraint) in schema {
        match keyword.as_str() {
            "bsonType" => {
                if !type_matches(constraint, type_name(value))? {
                    reject(format!(
                        "expected bsonType {}, found {}",
                        type_list(constraint),
                        type_name(value)
                    ));
                }
            }
            "enum" => {
                let Bson::Array(allowed) = constraint else {
                    return Err(unsupported("enum must be an array"));
                };
                if !allowed.iter().any(|candidate| values_equal(candidate, value)) {
                    reject(format!("{} is not one of the allowed values", value));
                }
            }
            "minimum" => {
                let bound = numeric(constraint).ok_or_else(|| unsupported("minimum must be numeric"))?;
                if let Some(actual) = numeric(value) {
                    if actual < bound {
                        reject(format!("{} is below minimum {}", value, constraint));
                    }
                }
            }
            "maximum" => {
                let bound = numeric(constraint).ok_or_else(|| unsupported("maximum must be numeric"))?;
                if let Some(actual) = numeric(value) {
                    if actual > bound {
                        reject(format!("{} is above maximum {}", value, constraint));
                    }
                }
            }
            "pattern" => {
                let Bson::String(pattern) = constraint else {
                    return Err(unsupported("pattern must be a string"));
                };
                let regex = Regex::new(pattern)
                    .map_err(|e| unsupported(&format!("pattern '{}': {}", pattern, e)))?;
                if let Bson::String(text) = value {
                    if !regex.is_match(text) {
                        reject(format!("'{}' does not match pattern {}", text, pattern));
                    }
                }
            }
            "required" | "properties" => {}
            other if ANNOTATIONS.contains(&other) => {}
            other => return Err(unsupported(&format!("keyword '{}'", other))),
        }
    }
    Ok(())
}

/// Compare two values the way the server does: numbers by value across
/// int, long and double, documents regardless of field order.
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        (Bson::Document(a), Bson::Document(b)) => documents_equal(a, b),
        (Bson::Array(a), Bson::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        _ => match (numeric(a), numeric(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
    }
}

/// Field-by-field [`values_equal`] over two documents
pub fn documents_equal(a: &Document, b: &Document) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|(key, value)| b.get(key).is_some_and(|other| values_equal(value, other)))
}

fn unsupported(detail: &str) -> ProvisionError {
    ProvisionError::UnsupportedValidator(detail.to_string())
}

/// Server-side alias for the type of a value
pub fn type_name(value: &Bson) -> &'static str {
    match value {
        Bson::Double(_) => "double",
        Bson::String(_) => "string",
        Bson::Array(_) => "array",
        Bson::Document(_) => "object",
        Bson::Boolean(_) => "bool",
        Bson::Null => "null",
        Bson::RegularExpression(_) => "regex",
        Bson::JavaScriptCode(_) => "javascript",
        Bson::JavaScriptCodeWithScope(_) => "javascriptWithScope",
        Bson::Int32(_) => "int",
        Bson::Int64(_) => "long",
        Bson::Timestamp(_) => "timestamp",
        Bson::Binary(_) => "binData",
        Bson::ObjectId(_) => "objectId",
        Bson::DateTime(_) => "date",
        Bson::Symbol(_) => "symbol",
        Bson::Decimal128(_) => "decimal",
        Bson::Undefined => "undefined",
        Bson::MaxKey => "maxKey",
        Bson::MinKey => "minKey",
        Bson::DbPointer(_) => "dbPointer",
    }
}

fn alias_matches(alias: &str, actual: &str) -> bool {
    match alias {
        "number" => matches!(actual, "int" | "long" | "double" | "decimal"),
        other => other == actual,
    }
}

/// `bsonType` may be a single alias or an array of aliases
fn type_matches(constraint: &Bson, actual: &str) -> Result<bool> {
    match constraint {
        Bson::String(alias) => Ok(alias_matches(alias, actual)),
        Bson::Array(aliases) => {
            let mut matched = false;
            for alias in aliases {
                let Bson::String(alias) = alias else {
                    return Err(unsupported("bsonType entries must be strings"));
                };
                matched |= alias_matches(alias, actual);
            }
            Ok(matched)
        }
        _ => Err(unsupported("bsonType must be a string or array")),
    }
}

fn type_list(constraint: &Bson) -> String {
    match constraint {
        Bson::String(alias) => alias.clone(),
        other => other.to_string(),
    }
}

/// Numeric value for range comparison. Decimal128 values are not compared.
fn numeric(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, DateTime};

    fn validator() -> Document {
        doc! {
            "$jsonSchema": {
                "bsonType": "object",
                "required": ["name", "score"],
                "properties": {
                    "name": { "bsonType": "string", "pattern": "^[a-z]+$" },
                    "score": { "bsonType": "number", "minimum": 0, "maximum": 100 },
                    "level": { "bsonType": "int", "enum": [1, 2, 3] },
                    "at": { "bsonType": "date" },
                    "meta": {
                        "bsonType": "object",
                        "required": ["source"],
                        "properties": { "source": { "bsonType": "string" } }
                    }
                }
            }
        }
    }

    #[test]
    fn test_conforming_document() {
        let document = doc! { "name": "alpha", "score": 42.5, "level": 2, "at": DateTime::now() };
        assert!(validate_document(&validator(), &document).unwrap().is_empty());
    }

    #[test]
    fn test_missing_required_field() {
        let violations = validate_document(&validator(), &doc! { "name": "alpha" }).unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "score");
        assert_eq!(violations[0].reason, "required field is missing");
    }

    #[test]
    fn test_number_alias_accepts_all_numeric_types() {
        for score in [Bson::Int32(5), Bson::Int64(5), Bson::Double(5.0)] {
            let document = doc! { "name": "alpha", "score": score };
            assert!(validate_document(&validator(), &document).unwrap().is_empty());
        }
        let document = doc! { "name": "alpha", "score": "5" };
        let violations = validate_document(&validator(), &document).unwrap();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].reason.contains("expected bsonType number"));
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        for score in [0, 100] {
            let document = doc! { "name": "alpha", "score": score };
            assert!(validate_document(&validator(), &document).unwrap().is_empty());
        }
        for score in [-1, 101] {
            let document = doc! { "name": "alpha", "score": score };
            assert_eq!(validate_document(&validator(), &document).unwrap().len(), 1);
        }
    }

    #[test]
    fn test_enum_and_pattern() {
        let document = doc! { "name": "Alpha", "score": 1, "level": 4 };
        let violations = validate_document(&validator(), &document).unwrap();
        let paths: Vec<_> = violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["name", "level"]);
    }

    #[test]
    fn test_int_alias_rejects_double() {
        // 2.0 is in the enum by value; only the type is wrong
        let document = doc! { "name": "alpha", "score": 1, "level": 2.0 };
        let violations = validate_document(&validator(), &document).unwrap();
        assert_eq!(violations.len(), 1, "{:?}", violations);
        assert_eq!(violations[0].reason, "expected bsonType int, found double");
    }

    #[test]
    fn test_enum_compares_numbers_by_value() {
        let validator = doc! {
            "$jsonSchema": { "properties": { "tier": { "enum": [1, 2, 3] } } }
        };
        for tier in [Bson::Int64(2), Bson::Double(3.0)] {
            let document = doc! { "tier": tier };
            assert!(validate_document(&validator, &document).unwrap().is_empty());
        }
        let document = doc! { "tier": 2.5 };
        assert_eq!(validate_document(&validator, &document).unwrap().len(), 1);
    }

    #[test]
    fn test_values_equal_across_numeric_types() {
        assert!(values_equal(&Bson::Int32(18), &Bson::Double(18.0)));
        assert!(values_equal(&Bson::Int64(100), &Bson::Int32(100)));
        assert!(!values_equal(&Bson::Int32(18), &Bson::Double(18.5)));
        assert!(!values_equal(&Bson::Int32(1), &Bson::String("1".into())));
    }

    #[test]
    fn test_documents_equal_ignores_order_and_numeric_width() {
        let stored = doc! { "maximum": 100.0, "bsonType": "int", "minimum": 18.0 };
        let declared = doc! { "bsonType": "int", "minimum": 18, "maximum": 100 };
        assert!(documents_equal(&stored, &declared));
        assert!(!documents_equal(&stored, &doc! { "bsonType": "int", "minimum": 18 }));
    }

    #[test]
    fn test_null_is_not_a_string() {
        let document = doc! { "name": Bson::Null, "score": 1 };
        let violations = validate_document(&validator(), &document).unwrap();
        assert_eq!(violations[0].reason, "expected bsonType string, found null");
    }

    #[test]
    fn test_nested_object_keywords() {
        let document = doc! { "name": "alpha", "score": 1, "meta": { "origin": "x" } };
        let violations = validate_document(&validator(), &document).unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "meta.source");
    }

    #[test]
    fn test_unknown_keyword_is_an_error() {
        let validator = doc! { "$jsonSchema": { "bsonType": "object", "additionalProperties": false } };
        let err = validate_document(&validator, &doc! {}).unwrap_err();
        assert!(matches!(err, ProvisionError::UnsupportedValidator(_)));
    }

    #[test]
    fn test_query_operator_validators_are_rejected() {
        let validator = doc! { "age": { "$gte": 18 } };
        assert!(validate_document(&validator, &doc! {}).is_err());
    }
}
