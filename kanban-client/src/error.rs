use kanban_core::types::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server rejected the command. `message` is the server-supplied text
    /// when one was present in the error body.
    #[error("{message}")]
    Server { status: u16, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("No board is open")]
    NoBoard,
}
