//! Field-level validation errors, modeled after Kubernetes' `field.Error`.

use crate::ObjectRef;
use std::fmt;

pub type ErrorList = Vec<Error>;

/// A path to a field within a Kubernetes object, e.g.
/// `metadata.annotations[nginx.ingress.kubernetes.io/canary-weight]`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path(Vec<Segment>);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Segment {
    Child(String),
    Index(usize),
    Key(String),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorType {
    Invalid,
    Required,
    NotSupported,
    Internal,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error(
    "{}{field}: {error_type}{}{}",
    Object(.object.as_ref()),
    BadValue(.bad_value.as_deref()),
    Detail(.detail)
)]
pub struct Error {
    pub error_type: ErrorType,
    pub field: Path,
    pub bad_value: Option<String>,
    pub detail: String,
    pub object: Option<ObjectRef>,
}

/// Returns an error indicating an invalid field value.
pub fn invalid(field: Path, value: impl ToString, detail: impl Into<String>) -> Error {
    Error::new(ErrorType::Invalid, field, Some(value.to_string()), detail)
}

/// Returns an error indicating a missing required field.
pub fn required(field: Path, detail: impl Into<String>) -> Error {
    Error::new(ErrorType::Required, field, None, detail)
}

/// Returns an error indicating a value outside of the supported set.
pub fn not_supported(field: Path, value: impl ToString, supported: &[&str]) -> Error {
    let detail = format!(
        "supported values: {}",
        supported
            .iter()
            .map(|v| format!("{v:?}"))
            .collect::<Vec<_>>()
            .join(", ")
    );
    Error::new(ErrorType::NotSupported, field, Some(value.to_string()), detail)
}

/// Returns an error for a failure unrelated to user input.
pub fn internal(field: Path, error: impl fmt::Display) -> Error {
    Error::new(ErrorType::Internal, field, None, error.to_string())
}

// === impl Path ===

impl Path {
    pub fn new(name: impl Into<String>) -> Self {
        Self(vec![Segment::Child(name.into())])
    }

    pub fn child(&self, name: impl Into<String>) -> Self {
        self.with(Segment::Child(name.into()))
    }

    pub fn index(&self, idx: usize) -> Self {
        self.with(Segment::Index(idx))
    }

    pub fn key(&self, key: impl Into<String>) -> Self {
        self.with(Segment::Key(key.into()))
    }

    fn with(&self, segment: Segment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Child(name) if i == 0 => f.write_str(name)?,
                Segment::Child(name) => write!(f, ".{name}")?,
                Segment::Index(idx) => write!(f, "[{idx}]")?,
                Segment::Key(key) => write!(f, "[{key}]")?,
            }
        }
        Ok(())
    }
}

// === impl ErrorType ===

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Invalid => "Invalid value",
            Self::Required => "Required value",
            Self::NotSupported => "Unsupported value",
            Self::Internal => "Internal error",
        })
    }
}

// === impl Error ===

impl Error {
    fn new(
        error_type: ErrorType,
        field: Path,
        bad_value: Option<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            error_type,
            field,
            bad_value,
            detail: detail.into(),
            object: None,
        }
    }

    /// Attributes the error to an object.
    pub fn with_object(mut self, object: ObjectRef) -> Self {
        self.object = Some(object);
        self
    }
}

struct Object<'a>(Option<&'a ObjectRef>);

impl fmt::Display for Object<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(object) => write!(f, "{object}: "),
            None => Ok(()),
        }
    }
}

struct BadValue<'a>(Option<&'a str>);

impl fmt::Display for BadValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, ": {value:?}"),
            None => Ok(()),
        }
    }
}

struct Detail<'a>(&'a str);

impl fmt::Display for Detail<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        write!(f, ": {}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_kubernetes_field_paths() {
        let path = Path::new("spec")
            .child("rules")
            .index(0)
            .child("http")
            .child("paths")
            .index(2);
        assert_eq!(path.to_string(), "spec.rules[0].http.paths[2]");

        let path = Path::new("metadata")
            .child("annotations")
            .key("nginx.ingress.kubernetes.io/canary-weight");
        assert_eq!(
            path.to_string(),
            "metadata.annotations[nginx.ingress.kubernetes.io/canary-weight]"
        );
    }

    #[test]
    fn renders_errors_with_object() {
        let error = invalid(
            Path::new("metadata").child("annotations").key("x"),
            "abc",
            "must be an integer",
        )
        .with_object(ObjectRef {
            kind: "Ingress".to_string(),
            namespace: Some("default".to_string()),
            name: "web".to_string(),
        });
        assert_eq!(
            error.to_string(),
            r#"Ingress default/web: metadata.annotations[x]: Invalid value: "abc": must be an integer"#
        );

        let error = required(Path::new("spec").child("backend"), "");
        assert_eq!(error.to_string(), "spec.backend: Required value");
    }

    #[test]
    fn renders_unsupported_values() {
        let error = not_supported(Path::new("affinity"), "ip", &["cookie"]);
        assert_eq!(
            error.to_string(),
            r#"affinity: Unsupported value: "ip": supported values: "cookie""#
        );
    }
}
