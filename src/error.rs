use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(String),

    #[error("insufficient stock for {name}: requested {requested}, available {available}")]
    InsufficientStock {
        name: String,
        requested: u32,
        available: u32,
    },

    #[error("{0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unauthorized")]
    Unauthorized,
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

/// Every workflow failure surfaces to the client as the uniform
/// `{"success": false, "message": "..."}` body.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InsufficientStock { .. } => StatusCode::CONFLICT,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Storage(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "success": false, "message": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message_names_product() {
        let err = Error::InsufficientStock {
            name: "Whole Wheat Bread".into(),
            requested: 5,
            available: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("Whole Wheat Bread"));
        assert!(msg.contains('5') && msg.contains('3'));
    }
}
