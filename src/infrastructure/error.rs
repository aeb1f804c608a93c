use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Settings store error: {0}")]
    Settings(String),
    #[error("Credential store error: {0}")]
    Credential(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("mite api error: http {status}; {message}")]
    MiteApi { status: u16, message: String },
    #[error("Host error: {0}")]
    Host(String),
}

impl InfraError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::MiteApi { status: 401 | 403, .. })
    }
}
