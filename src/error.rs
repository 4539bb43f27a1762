use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::models::ticket::Action;

/// Ways a `/ticketRequests` call can be refused.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Incorrect username or password")]
    Unauthorized,

    #[error("psaTicketNumber is required for {0} requests")]
    MissingTicketNumber(Action),

    #[error("Customer not found or invalid.")]
    CustomerNotFound,

    #[error("Ticket Update Failed")]
    UpdateFailed,

    #[error("Ticket {0} not found")]
    TicketNotFound(i64),

    /// The helpdesk could not be reached or answered with a fault.
    #[error("helpdesk request failed: {0:#}")]
    Helpdesk(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::MissingTicketNumber(_) | Self::CustomerNotFound | Self::UpdateFailed => {
                StatusCode::BAD_REQUEST
            }
            Self::TicketNotFound(_) => StatusCode::NOT_FOUND,
            Self::Helpdesk(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Remote faults are logged in full but not echoed to the caller.
        let detail = match &self {
            Self::Helpdesk(e) => {
                error!("helpdesk request failed: {:#}", e);
                "Helpdesk request failed".to_string()
            }
            other => other.to_string(),
        };

        let mut response = (status, Json(json!({ "detail": detail }))).into_response();
        if matches!(self, Self::Unauthorized) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Basic"));
        }
        response
    }
}
