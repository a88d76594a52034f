use http::uri::InvalidUri;
use std::fmt;
use std::time::Duration;
use tower::BoxError;

/// Coarse classification of a failed remote call. Callers use it to decide
/// whether a failure can be ignored or must stop the run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    ResourceExists,
    ResourceNotFound,
    PermissionDenied,
    TransientNetworkError,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::ResourceExists => "resource exists",
            ErrorKind::ResourceNotFound => "resource not found",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::TransientNetworkError => "transient network error",
            ErrorKind::Other => "other",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub enum Error {
    ArnParseError(String),
    UriParseError(InvalidUri),
    RequestBuildError(http::Error),
    HttpError(hyper_util::client::legacy::Error),
    HttpResponseError(hyper::Error),
    HttpResponseErrorParse(BoxError),
    Timeout(Duration),
    SignatureError(String),
    SerdeError(serde_json::Error),
    XmlError(String),
    MissingField(&'static str),
    AwsError {
        status: u16,
        code: String,
        message: String,
    },
    ClusterNotFound(String),
    ClusterIncomplete {
        identifier: String,
        missing: &'static str,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::HttpError(_) | Error::HttpResponseError(_) | Error::Timeout(_) => {
                ErrorKind::TransientNetworkError
            }
            Error::ClusterNotFound(_) => ErrorKind::ResourceNotFound,
            Error::AwsError { status, code, .. } => classify_aws_error(*status, code),
            _ => ErrorKind::Other,
        }
    }

    /// The provider supplied message, or the display form for local failures.
    pub fn message(&self) -> String {
        match self {
            Error::AwsError { message, .. } if !message.is_empty() => message.clone(),
            e => e.to_string(),
        }
    }
}

fn classify_aws_error(status: u16, code: &str) -> ErrorKind {
    match code {
        "EntityAlreadyExists" | "ClusterAlreadyExists" => return ErrorKind::ResourceExists,
        "NoSuchEntity" | "ClusterNotFound" => return ErrorKind::ResourceNotFound,
        "AccessDenied"
        | "AccessDeniedException"
        | "UnauthorizedOperation"
        | "InvalidClientTokenId"
        | "SignatureDoesNotMatch"
        | "ExpiredToken"
        | "UnrecognizedClientException" => return ErrorKind::PermissionDenied,
        "Throttling" | "ThrottlingException" | "ServiceFailure" | "ServiceUnavailable"
        | "RequestLimitExceeded" => return ErrorKind::TransientNetworkError,
        _ => {}
    }

    match status {
        401 | 403 => ErrorKind::PermissionDenied,
        404 => ErrorKind::ResourceNotFound,
        409 => ErrorKind::ResourceExists,
        429 | 500..=599 => ErrorKind::TransientNetworkError,
        _ => ErrorKind::Other,
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::RequestBuildError(e) => write!(f, "HTTP request build error: {}", e),
            Error::SignatureError(msg) => write!(f, "AWS signature error: {}", msg),
            Error::SerdeError(e) => write!(f, "Serialization error: {}", e),
            Error::XmlError(msg) => write!(f, "Unable to parse XML response: {}", msg),
            Error::MissingField(field) => write!(f, "Response was missing field: {}", field),
            Error::AwsError {
                status,
                code,
                message,
            } => write!(f, "AWS error [{} {}]: {}", status, code, message),
            Error::ArnParseError(arn) => write!(f, "Invalid ARN: {}", arn),
            Error::HttpError(e) => write!(f, "HTTP error: {}", e),
            Error::HttpResponseError(e) => write!(f, "Failed to parse HTTP response: {}", e),
            Error::HttpResponseErrorParse(e) => write!(f, "Failed to parse HTTP response: {}", e),
            Error::Timeout(d) => write!(f, "Request timed out after {}s", d.as_secs_f64()),
            Error::UriParseError(e) => write!(f, "Unable to parse endpoint url: {}", e),
            Error::ClusterNotFound(id) => write!(f, "Cluster not found: {}", id),
            Error::ClusterIncomplete {
                identifier,
                missing,
            } => write!(f, "Cluster {} has no {}", identifier, missing),
        }
    }
}

impl std::error::Error for Error {}

impl From<InvalidUri> for Error {
    fn from(err: InvalidUri) -> Self {
        Error::UriParseError(err)
    }
}

impl From<BoxError> for Error {
    fn from(err: BoxError) -> Self {
        Error::HttpResponseErrorParse(err)
    }
}

impl From<hyper_util::client::legacy::Error> for Error {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        Error::HttpError(err)
    }
}

impl From<hyper::Error> for Error {
    fn from(err: hyper::Error) -> Self {
        Error::HttpResponseError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerdeError(err)
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::XmlError(err.to_string())
    }
}
