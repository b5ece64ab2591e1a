// Client library for the transfer booking API

pub mod api;
pub mod booking_flow;
pub mod config;
pub mod error;
pub mod models;
pub mod poller;
pub mod transport;

// Re-export key types for convenience
pub use api::{BookingApi, ClientStats, TransferApiClient};
pub use booking_flow::{
    cheapest_offer, BookingCycleReport, BookingFlow, CheapestOffer, FailedCancellation,
    PassengerDetails,
};
pub use config::{ClientConfig, ConfigError, PollConfig};
pub use error::ApiError;
pub use models::{Reservation, ReservationRequest, SearchRequest, SearchResult, TripMode};
pub use poller::{AsyncOperationPoller, PollResult};
pub use transport::{HttpTransport, Transport, TransportError};
pub use tokio_util::sync::CancellationToken;
