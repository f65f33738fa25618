use crate::errors::ApiError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use validator::Validate;

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ApiError> {
    input.validate().map_err(|e| ApiError::ValidationError {
        message: format!("Validation failed: {}", e),
        error_code: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 1))]
        name: String,
    }

    #[test]
    fn invalid_input_maps_to_validation_error() {
        let result = validate_input(&Sample {
            name: String::new(),
        });
        assert!(matches!(
            result,
            Err(ApiError::ValidationError { .. })
        ));
    }

    #[test]
    fn valid_input_passes() {
        assert!(validate_input(&Sample {
            name: "ok".to_string()
        })
        .is_ok());
    }
}
