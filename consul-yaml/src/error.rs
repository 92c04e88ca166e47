use thiserror::Error;

/// Errors that can occur while registering, initializing or logging in with
/// an auth-login backend
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("auth login {field:?} is already registered")]
    AlreadyRegistered { field: String },

    #[error("auth login {field:?} is not registered")]
    NotRegistered { field: String },

    #[error("auth login already initialized")]
    AlreadyInitialized,

    #[error("auth login not initialized")]
    NotInitialized,

    #[error("configuration missing field {field:?}")]
    MissingBlock { field: String },

    #[error("expected exactly one {field:?} block, found {count}")]
    InvalidBlock { field: String, count: usize },

    #[error("required fields are unset: {}", .fields.join(", "))]
    MissingRequiredFields { fields: Vec<String> },

    #[error("at least one field is required: {}", .fields.join(", "))]
    AtLeastOneRequired { fields: Vec<String> },

    #[error("params are missing: {}", .fields.join(", "))]
    MissingParams { fields: Vec<String> },

    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error("failed to resolve AWS credentials: {message}")]
    Credentials { message: String },

    #[error("failed to sign AWS request: {message}")]
    Signing { message: String },

    #[error("ACL login with auth method {auth_method:?} failed with status {status}: {body}")]
    AclLogin {
        auth_method: String,
        status: u16,
        body: String,
    },

    #[error("Serialization/deserialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },

    #[error("YAML error: {source}")]
    Yaml {
        #[from]
        source: serde_yaml::Error,
    },

    #[error("HTTP client error: {source}")]
    Http {
        #[from]
        source: hyper::Error,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AuthError {
    pub fn already_registered(field: impl Into<String>) -> Self {
        Self::AlreadyRegistered {
            field: field.into(),
        }
    }

    pub fn not_registered(field: impl Into<String>) -> Self {
        Self::NotRegistered {
            field: field.into(),
        }
    }

    pub fn missing_block(field: impl Into<String>) -> Self {
        Self::MissingBlock {
            field: field.into(),
        }
    }

    pub fn invalid_block(field: impl Into<String>, count: usize) -> Self {
        Self::InvalidBlock {
            field: field.into(),
            count,
        }
    }

    pub fn missing_required_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::MissingRequiredFields {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn credentials(message: impl Into<String>) -> Self {
        Self::Credentials {
            message: message.into(),
        }
    }

    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
