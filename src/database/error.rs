use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use serde_json::{json, Value};
use warp::{http::StatusCode, reject};

pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or rejected input, reported per field when possible
    Validation,
    /// Bad credentials while obtaining a token
    Authentication,
    /// Missing or invalid credentials on a protected resource
    Authorization,
    /// The resource doesn't exist or isn't owned by the caller
    NotFound,
    Internal,
}

impl ErrorKind {
    pub fn new(self, info: &str) -> Error {
        Error {
            kind: self,
            info: Some(info.to_string()),
            fields: FieldErrors::new(),
        }
    }

    pub fn default(self) -> Error {
        Error {
            kind: self,
            info: None,
            fields: FieldErrors::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Authentication => StatusCode::BAD_REQUEST,
            ErrorKind::Authorization => StatusCode::UNAUTHORIZED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn default_info(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "Invalid input.",
            ErrorKind::Authentication => "Unable to authenticate with provided credentials.",
            ErrorKind::Authorization => "Authentication credentials were not provided.",
            ErrorKind::NotFound => "Not found.",
            ErrorKind::Internal => "Internal server error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub info: Option<String>,
    pub fields: FieldErrors,
}

impl Error {
    pub fn validation(fields: FieldErrors) -> Self {
        Self {
            kind: ErrorKind::Validation,
            info: None,
            fields,
        }
    }

    pub fn field(key: &str, message: &str) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(key.to_string(), vec![message.to_string()]);
        Self::validation(fields)
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    pub fn info(&self) -> &str {
        self.info
            .as_deref()
            .unwrap_or_else(|| self.kind.default_info())
    }

    /// Response body as seen by the client
    pub fn body(&self) -> Value {
        match self.kind {
            ErrorKind::Validation if !self.fields.is_empty() => json!(self.fields),
            ErrorKind::Authentication => json!({ "non_field_errors": [self.info()] }),
            ErrorKind::NotFound => json!({ "detail": ErrorKind::NotFound.default_info() }),
            ErrorKind::Internal => json!({ "detail": ErrorKind::Internal.default_info() }),
            _ => json!({ "detail": self.info() }),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.info())?;
        for (key, messages) in &self.fields {
            write!(f, " [{key}: {}]", messages.join(" "))?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}
impl reject::Reject for Error {}

pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Database(e) => Self::new(format!("{e}")),
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(format!("{e}")),
            sqlx::Error::RowNotFound => Self::new(format!("RowNotFound")),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(format!("{e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::AnyDriverError(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new(format!("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(format!("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(format!("Worker crashed")),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            _ => Self::new(format!("Unknown error")),
        }
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        log::error!("Query failed: {}", value.info);
        ErrorKind::Internal.new(&value.info)
    }
}

#[derive(Debug)]
pub struct TypeError {
    info: String,
}

impl TypeError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl From<TypeError> for Error {
    fn from(value: TypeError) -> Self {
        ErrorKind::Validation.new(&value.info)
    }
}

impl Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.info)
    }
}

impl std::error::Error for TypeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_failures_render_as_non_field_errors() {
        let error = ErrorKind::Authentication.default();

        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            error.body(),
            json!({ "non_field_errors": ["Unable to authenticate with provided credentials."] })
        );
    }

    #[test]
    fn not_found_never_leaks_info() {
        let error = ErrorKind::NotFound.new("recipe 4 belongs to user 2");

        assert_eq!(error.status(), StatusCode::NOT_FOUND);
        assert_eq!(error.body(), json!({ "detail": "Not found." }));
    }

    #[test]
    fn validation_prefers_field_map() {
        let error = Error::field("name", "This field may not be blank.");
        assert_eq!(
            error.body(),
            json!({ "name": ["This field may not be blank."] })
        );

        let error: Error = TypeError::new("Invalid id list").into();
        assert_eq!(error.body(), json!({ "detail": "Invalid id list" }));
    }

    #[test]
    fn internal_errors_hide_the_cause() {
        let error: Error = QueryError::new("relation \"tags\" does not exist".to_owned()).into();

        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.body(), json!({ "detail": "Internal server error" }));
    }
}
