use crate::transport::TransportError;
use thiserror::Error;

// Errors surfaced by the API client, the poller and the booking flow
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Operation {operation_id} still pending after {attempts} polls")]
    PollAttemptsExhausted { operation_id: String, attempts: u32 },

    #[error("Operation {operation_id} still pending after {elapsed_ms}ms")]
    PollTimeout {
        operation_id: String,
        elapsed_ms: u64,
    },

    #[error("Polling cancelled for operation {operation_id}")]
    PollCancelled { operation_id: String },

    #[error("Reservation for search {search_id} failed")]
    ReservationFailed { search_id: String },

    #[error("No offer from provider '{0}' in search results")]
    NoMatchingOffer(String),
}

impl ApiError {
    pub fn protocol(context: &str, error: impl std::fmt::Display) -> Self {
        ApiError::Protocol(format!("{}: {}", context, error))
    }

    // True when the error ended a poll loop without a terminal server answer
    pub fn is_poll_abort(&self) -> bool {
        matches!(
            self,
            ApiError::PollAttemptsExhausted { .. }
                | ApiError::PollTimeout { .. }
                | ApiError::PollCancelled { .. }
        )
    }
}
