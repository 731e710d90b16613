use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Invalid {kind} handle: {id}")]
    InvalidHandle { kind: &'static str, id: u32 },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub fn invalid_buffer(id: u32) -> Self {
        Self::InvalidHandle { kind: "buffer", id }
    }

    pub fn invalid_voice(id: u32) -> Self {
        Self::InvalidHandle { kind: "voice", id }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
