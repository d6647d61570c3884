use thiserror::Error;

/// Unified error type for Tally.
#[derive(Error, Debug)]
pub enum TallyError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Internal: {0}")]
    Internal(String),
}

impl TallyError {
    /// Map to HTTP status code.
    pub fn status_code(&self) -> u16 {
        match self {
            TallyError::BadRequest(_) => 400,
            _ => 500,
        }
    }

    /// JSON error body.
    pub fn to_json_body(&self) -> Vec<u8> {
        let status = self.status_code();
        let msg = self.to_string().replace('"', "'");
        format!(r#"{{"error":"{}","status":{}}}"#, msg, status).into_bytes()
    }
}
