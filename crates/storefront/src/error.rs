//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`; nothing is allowed to panic out of a handler.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::cart::CartError;
use crate::currency::CurrencyError;
use crate::providers::ProviderError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Exchange-rate lookup failed with no cached value to fall back on.
    #[error("Currency error: {0}")]
    Currency(#[from] CurrencyError),

    /// Listing provider fetch failed.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Cart persistence failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server-side failures to Sentry
        if matches!(
            self,
            Self::Currency(_) | Self::Provider(_) | Self::Cart(_) | Self::Internal(_)
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Currency(_) => StatusCode::BAD_GATEWAY,
            Self::Provider(err) => match err {
                ProviderError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::Cart(err) => match err {
                CartError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Don't expose upstream details to clients
        let message = match &self {
            Self::Currency(_) => "Exchange rate service unavailable".to_string(),
            Self::Provider(err) => match err {
                ProviderError::NotFound(_) => self.to_string(),
                _ => "Product service unavailable".to_string(),
            },
            Self::Cart(err) => match err {
                CartError::Invalid(inner) => inner.to_string(),
                _ => "Internal server error".to_string(),
            },
            Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    use laced_core::CartLineError;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("air-max".to_string());
        assert_eq!(err.to_string(), "Not found: air-max");

        let err = AppError::BadRequest("invalid page".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid page");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Currency(CurrencyError::Api(503))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Provider(ProviderError::NotFound(
                "nope".to_string()
            ))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Provider(ProviderError::Api {
                status: 500,
                message: "boom".to_string(),
            })),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Cart(CartError::Invalid(
                CartLineError::ZeroQuantity {
                    product_id: "p1".to_string(),
                    size: "42".to_string(),
                }
            ))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_upstream_details_are_not_exposed() {
        let response = AppError::Provider(ProviderError::Api {
            status: 500,
            message: "secret internal detail".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
