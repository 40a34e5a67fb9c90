use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogueError {
    #[error("package `{0}` was not found in any catalogue tier")]
    NotFound(String),
    #[error("unknown region `{0}`")]
    UnknownRegion(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "The requested package does not exist.",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. } | Self::NotFound { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. } | Self::NotFound { correlation_id, .. } => {
                correlation_id
            }
        }
    }
}

impl CatalogueError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        match self {
            Self::NotFound(id) => {
                InterfaceError::NotFound { message: format!("package `{id}` not found"), correlation_id }
            }
            error @ Self::UnknownRegion(_) => {
                InterfaceError::BadRequest { message: error.to_string(), correlation_id }
            }
        }
    }
}
