//! Annotation key validation.
//!
//! Keys must be Kubernetes qualified names: an optional lowercase DNS
//! subdomain prefix followed by `/`, then a name of at most 63 characters.
//! Diagnostic texts match the API server's wording so that events read the
//! same as a rejected write would.

use crate::annotations::Annotations;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Event reason used for every diagnostic produced by key validation.
pub const ANNOTATION_VALIDATION_FAILURE: &str = "AnnotationValidationFailure";

const QUALIFIED_NAME_FMT: &str = "([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9]";
const QUALIFIED_NAME_ERR_MSG: &str = "must consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character";
const QUALIFIED_NAME_MAX_LENGTH: usize = 63;

const DNS1123_SUBDOMAIN_FMT: &str =
    r"[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*";
const DNS1123_SUBDOMAIN_ERR_MSG: &str = "a lowercase RFC 1123 subdomain must consist of lower case alphanumeric characters, '-' or '.', and must start and end with an alphanumeric character";
const DNS1123_SUBDOMAIN_MAX_LENGTH: usize = 253;

static QUALIFIED_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{QUALIFIED_NAME_FMT}$")).expect("Invalid qualified name regex")
});

static DNS1123_SUBDOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{DNS1123_SUBDOMAIN_FMT}$")).expect("Invalid DNS-1123 subdomain regex")
});

fn regex_error(message: &str, format: &str, examples: &[&str]) -> String {
    if examples.is_empty() {
        return format!("{message} (regex used for validation is '{format}')");
    }
    let examples = examples
        .iter()
        .map(|example| format!("'{example}', "))
        .collect::<Vec<_>>()
        .join(" or ");
    format!("{message} (e.g. {examples}regex used for validation is '{format}')")
}

fn empty_error() -> String {
    "must be non-empty".to_string()
}

fn max_len_error(length: usize) -> String {
    format!("must be no more than {length} characters")
}

fn qualified_name_regex_error() -> String {
    regex_error(
        QUALIFIED_NAME_ERR_MSG,
        QUALIFIED_NAME_FMT,
        &["MyName", "my.name", "123-abc"],
    )
}

fn validate_dns1123_subdomain(value: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if value.len() > DNS1123_SUBDOMAIN_MAX_LENGTH {
        errors.push(max_len_error(DNS1123_SUBDOMAIN_MAX_LENGTH));
    }
    if !DNS1123_SUBDOMAIN_RE.is_match(value) {
        errors.push(regex_error(
            DNS1123_SUBDOMAIN_ERR_MSG,
            DNS1123_SUBDOMAIN_FMT,
            &["example.com"],
        ));
    }
    errors
}

/// Checks one key against the qualified-name rules.
///
/// Returns an empty list when the key is acceptable.
pub fn validate_key(key: &str) -> Vec<String> {
    let mut errors = Vec::new();
    let parts: Vec<&str> = key.split('/').collect();

    let name = match parts.as_slice() {
        [name] => *name,
        [prefix, name] => {
            if prefix.is_empty() {
                errors.push(format!("prefix part {}", empty_error()));
            } else {
                errors.extend(
                    validate_dns1123_subdomain(prefix)
                        .into_iter()
                        .map(|message| format!("prefix part {message}")),
                );
            }
            *name
        }
        _ => {
            errors.push(format!(
                "a qualified name {} with an optional DNS subdomain prefix and '/' (e.g. 'example.com/MyName')",
                qualified_name_regex_error()
            ));
            return errors;
        }
    };

    if name.is_empty() {
        errors.push(format!("name part {}", empty_error()));
    } else if name.len() > QUALIFIED_NAME_MAX_LENGTH {
        errors.push(format!(
            "name part {}",
            max_len_error(QUALIFIED_NAME_MAX_LENGTH)
        ));
    }
    if !QUALIFIED_NAME_RE.is_match(name) {
        errors.push(format!("name part {}", qualified_name_regex_error()));
    }

    errors
}

/// Diagnostics for a single rejected key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub key: String,
    pub errors: Vec<String>,
}

impl ValidationError {
    pub fn new(key: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            key: key.into(),
            errors,
        }
    }

    /// Human-readable message used as the per-object event text.
    pub fn message(&self) -> String {
        if self.errors.is_empty() {
            return format!(
                "validation error at key {:?} with no specific error details",
                self.key
            );
        }
        format!(
            "Validation error at key {:?}: [{}]",
            self.key,
            self.errors.join(", ")
        )
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for ValidationError {}

/// All keys rejected during one validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    pub items: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Aggregate message used as the scope event text.
    pub fn message(&self) -> String {
        if self.items.is_empty() {
            return "No validation errors".to_string();
        }
        self.joined()
    }

    fn joined(&self) -> String {
        self.items
            .iter()
            .map(ValidationError::message)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.items.is_empty() {
            return f.write_str("no validation errors");
        }
        write!(f, "errors: {}", self.joined())
    }
}

impl std::error::Error for ValidationErrors {}

/// Removes every key that is not a qualified name.
///
/// Returns the filtered set together with the diagnostics for the removed
/// keys, in key order. `None` means every key passed.
pub fn validate_annotations(
    annotations: &Annotations,
) -> (Annotations, Option<ValidationErrors>) {
    let mut accepted = annotations.clone();
    let mut items = Vec::new();

    for key in annotations.keys() {
        let errors = validate_key(key);
        if !errors.is_empty() {
            accepted.remove(key);
            items.push(ValidationError::new(key.clone(), errors));
        }
    }

    if items.is_empty() {
        (accepted, None)
    } else {
        (accepted, Some(ValidationErrors { items }))
    }
}
