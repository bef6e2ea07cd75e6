//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, OrderError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Authentication missing or malformed.
    Unauthorized(String),
    /// Domain logic error.
    Domain(DomainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::Order(order_err) => match order_err {
            OrderError::MedicineNotFound { .. } | OrderError::OrderNotFound { .. } => {
                (StatusCode::NOT_FOUND, err.to_string())
            }
            OrderError::InvalidQuantity { .. }
            | OrderError::EmptyOrder
            | OrderError::MedicineUnavailable { .. }
            | OrderError::InsufficientStock { .. }
            | OrderError::InvalidTransition { .. }
            | OrderError::CannotCancelShipped { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
            OrderError::Forbidden { .. } => (StatusCode::FORBIDDEN, err.to_string()),
        },
        DomainError::Store(store_err) => {
            tracing::error!(error = %store_err, "store error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{MedicineId, OrderId, OrderStatus};

    fn status_of(err: OrderError) -> StatusCode {
        domain_error_to_response(DomainError::Order(err)).0
    }

    #[test]
    fn not_found_maps_to_404() {
        assert_eq!(
            status_of(OrderError::MedicineNotFound {
                medicine_id: MedicineId::new()
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(OrderError::OrderNotFound {
                order_id: OrderId::new()
            }),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn validation_failures_map_to_400() {
        for err in [
            OrderError::InvalidQuantity { quantity: 0 },
            OrderError::EmptyOrder,
            OrderError::MedicineUnavailable {
                name: "X".to_string(),
            },
            OrderError::InsufficientStock {
                name: "X".to_string(),
                available: 1,
                requested: 2,
            },
            OrderError::InvalidTransition {
                from: OrderStatus::Shipped,
                to: OrderStatus::Placed,
            },
            OrderError::CannotCancelShipped {
                status: OrderStatus::Shipped,
            },
        ] {
            assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn forbidden_maps_to_403() {
        assert_eq!(
            status_of(OrderError::Forbidden { reason: "no" }),
            StatusCode::FORBIDDEN
        );
    }
}
