/// All possible transport errors
#[derive(Debug)]
pub enum Error {
    /// Invalid or incomplete transport configuration
    Config(String),
    /// Invalid email address at the message boundary
    Address(String),
    /// Transport-level HTTP failure (connect, timeout, TLS)
    Http(String),
    /// The provider returned an error payload
    Api {
        code: i64,
        name: String,
        message: String,
    },
    /// The provider accepted the call but rejected a recipient
    Rejected { email: String, reason: String },
    /// Malformed provider response
    Json(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            Error::Config(ref msg) => write!(f, "Config: {}", msg),
            Error::Address(ref msg) => write!(f, "Address: {}", msg),
            Error::Http(ref msg) => write!(f, "Http: {}", msg),
            Error::Api {
                code,
                ref name,
                ref message,
            } => write!(f, "Api: {} ({}): {}", name, code, message),
            Error::Rejected {
                ref email,
                ref reason,
            } => write!(f, "Rejected: {}: {}", email, reason),
            Error::Json(ref msg) => write!(f, "Json: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::Http(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
