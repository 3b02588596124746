use serde::Serialize;
use thiserror::Error;

/// Text fragments that only appear in errors raised by Azure DevOps itself.
const DOMAIN_MARKERS: &[&str] = &[
    "AzureDevOpsServiceError",
    "Microsoft.TeamFoundation",
    "Microsoft.VisualStudio.Services",
];

pub const CONNECTION_MESSAGE: &str = "Failed to connect to Azure DevOps.";
pub const INVALID_REASON_MESSAGE: &str =
    "The reason provided is not supported for this state change.";
pub const SERVER_MESSAGE: &str = "An internal server error occurred.";

#[derive(Debug, Error)]
pub enum AdoError {
    /// Malformed or missing caller input.
    #[error("{0}")]
    Validation(String),

    /// The backend could not be reached.
    #[error("Failed to connect to Azure DevOps: {0}")]
    Connection(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("{context}: {source}")]
    Backend {
        context: String,
        #[source]
        source: Box<AdoError>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AdoError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn backend(context: impl Into<String>, source: AdoError) -> Self {
        Self::Backend {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// The service error at the root of this error, if Azure DevOps rejected the request.
    pub fn service(&self) -> Option<&ServiceError> {
        match self {
            AdoError::Service(service) => Some(service),
            AdoError::Backend { source, .. } => source.service(),
            _ => None,
        }
    }
}

/// Type key Azure DevOps reports for work item rule violations.
pub const RULE_VALIDATION: &str = "RuleValidationException";

/// A request the Azure DevOps service received and rejected.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ServiceError {
    pub status: u16,
    pub type_key: Option<String>,
    pub message: String,
}

impl ServiceError {
    /// A rule violation on `System.Reason`, reported either as free text or as
    /// a TF401320 rule error.
    pub fn is_invalid_reason(&self) -> bool {
        is_invalid_reason(&self.message)
            || (self.type_key.as_deref() == Some(RULE_VALIDATION)
                && self.message.contains("Rule Error for field Reason"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCategory {
    #[serde(rename = "Validation Error")]
    Validation,
    #[serde(rename = "Connection Error")]
    Connection,
    #[serde(rename = "Invalid Reason")]
    InvalidReason,
    #[serde(rename = "Azure DevOps Error")]
    AzureDevOps,
    #[serde(rename = "Server Error")]
    Server,
}

/// Structured failure returned to the caller in place of a raw error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResult {
    pub error: ErrorCategory,
    pub message: String,
}

impl ErrorResult {
    fn new(error: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
        }
    }

    pub fn server() -> Self {
        Self::new(ErrorCategory::Server, SERVER_MESSAGE)
    }

    fn invalid_reason() -> Self {
        Self::new(ErrorCategory::InvalidReason, INVALID_REASON_MESSAGE)
    }

    fn domain(message: &str) -> Self {
        if is_invalid_reason(message) {
            Self::invalid_reason()
        } else {
            Self::new(ErrorCategory::AzureDevOps, message)
        }
    }

    /// Map an error onto the caller-facing taxonomy.
    ///
    /// Validation and connection failures come first, then failures reported by
    /// Azure DevOps itself, and anything left over is opaque to the caller.
    pub fn classify(err: &AdoError) -> Self {
        match err {
            AdoError::Validation(message) => Self::new(ErrorCategory::Validation, message),
            AdoError::Connection(_) => Self::new(ErrorCategory::Connection, CONNECTION_MESSAGE),
            AdoError::Service(service) if service.is_invalid_reason() => Self::invalid_reason(),
            AdoError::Service(service) => Self::domain(&service.message),
            AdoError::Backend { source, .. } => {
                let inner = Self::classify(source);
                match inner.error {
                    ErrorCategory::AzureDevOps => Self::domain(&err.to_string()),
                    _ => inner,
                }
            }
            AdoError::Other(other) => {
                let text = format!("{other:#}");
                if is_backend_domain(&text) {
                    Self::domain(&text)
                } else {
                    Self::server()
                }
            }
        }
    }
}

pub fn is_backend_domain(text: &str) -> bool {
    DOMAIN_MARKERS.iter().any(|marker| text.contains(marker))
}

pub fn is_invalid_reason(text: &str) -> bool {
    text.find("Reason")
        .is_some_and(|at| text[at..].contains("not in the list of supported values"))
}
