// Transfer booking API client.
// Each operation is a single HTTP call; the `wait_for_*` helpers add the polling.

use crate::config::{ClientConfig, ConfigError};
use crate::error::ApiError;
use crate::models::{
    Reservation, ReservationPollResponse, ReservationRequest, ReservationStatus, SearchCreated,
    SearchPollResponse, SearchRequest, SearchResult,
};
use crate::poller::{AsyncOperationPoller, PollResult};
use crate::transport::{HttpTransport, Transport, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const SEARCH_ENDPOINT: &str = "search/";
pub const RESERVATION_ENDPOINT: &str = "reservations/";

// Counters kept by the client across all operations
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClientStats {
    pub requests_sent: usize,
    pub requests_failed: usize,
    pub polls_issued: usize,
    pub pending_polls: usize,
    pub operations_completed: usize,
    pub operations_failed: usize,
}

#[async_trait]
pub trait BookingApi: Send + Sync {
    // Starts a search and returns its id
    async fn search(&self, request: &SearchRequest) -> Result<String, ApiError>;

    // One poll of a search; pending while the API reports more results coming
    async fn search_poll(&self, search_id: &str) -> Result<PollResult<Vec<SearchResult>>, ApiError>;

    async fn create_reservation(&self, request: &ReservationRequest) -> Result<(), ApiError>;

    // One poll of the reservations made from `search_id`
    async fn reservations_poll(
        &self,
        search_id: &str,
    ) -> Result<PollResult<Vec<Reservation>>, ApiError>;

    async fn cancel_reservation(&self, reservation_id: &str) -> Result<Value, ApiError>;

    fn poller(&self) -> &AsyncOperationPoller;

    async fn wait_for_search_results(
        &self,
        search_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>, ApiError> {
        self.poller()
            .poll_with_cancellation(
                search_id,
                |id| async move { self.search_poll(&id).await },
                cancel,
            )
            .await
    }

    async fn wait_for_reservations(
        &self,
        search_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Reservation>, ApiError> {
        self.poller()
            .poll_with_cancellation(
                search_id,
                |id| async move { self.reservations_poll(&id).await },
                cancel,
            )
            .await
    }
}

pub struct TransferApiClient<T: Transport = HttpTransport> {
    transport: T,
    poller: AsyncOperationPoller,
    stats: Arc<Mutex<ClientStats>>,
}

impl TransferApiClient<HttpTransport> {
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(transport, AsyncOperationPoller::new(config.poll)))
    }
}

impl<T: Transport> TransferApiClient<T> {
    pub fn with_transport(transport: T, poller: AsyncOperationPoller) -> Self {
        Self {
            transport,
            poller,
            stats: Arc::new(Mutex::new(ClientStats::default())),
        }
    }

    pub fn stats(&self) -> ClientStats {
        self.stats.lock().clone()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn record_request<V>(&self, result: &Result<V, TransportError>) {
        let mut stats = self.stats.lock();
        stats.requests_sent += 1;
        if result.is_err() {
            stats.requests_failed += 1;
        }
    }

    // A poll whose answer is a terminal failure reported by the server
    fn record_failed_poll(&self) {
        let mut stats = self.stats.lock();
        stats.polls_issued += 1;
        stats.operations_failed += 1;
    }

    fn record_poll<P>(&self, result: &PollResult<P>) {
        let mut stats = self.stats.lock();
        stats.polls_issued += 1;
        if result.is_pending() {
            stats.pending_polls += 1;
        } else {
            stats.operations_completed += 1;
        }
    }

    async fn get(&self, path: &str) -> Result<Value, ApiError> {
        let result = self.transport.get(path).await;
        self.record_request(&result);
        Ok(result?)
    }

    async fn post<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::protocol("request body", e))?;
        let result = self.transport.post(path, &body).await;
        self.record_request(&result);
        Ok(result?)
    }

    async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        let result = self.transport.delete(path).await;
        self.record_request(&result);
        Ok(result?)
    }
}

// Missing or mistyped fields in a response are protocol errors
fn decode<R: DeserializeOwned>(context: &str, value: Value) -> Result<R, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::protocol(context, e))
}

#[async_trait]
impl<T: Transport> BookingApi for TransferApiClient<T> {
    async fn search(&self, request: &SearchRequest) -> Result<String, ApiError> {
        let response = self.post(SEARCH_ENDPOINT, request).await?;
        let created: SearchCreated = decode("search response", response)?;
        info!(search_id = %created.search_id, "search started");
        Ok(created.search_id)
    }

    async fn search_poll(&self, search_id: &str) -> Result<PollResult<Vec<SearchResult>>, ApiError> {
        let path = format!("{}{}/poll/", SEARCH_ENDPOINT, search_id);
        let response: SearchPollResponse = decode("search poll", self.get(&path).await?)?;

        let result = if response.more_coming {
            PollResult::Pending
        } else {
            let results = response.results.ok_or_else(|| {
                ApiError::Protocol(format!(
                    "search poll for {} finished without results",
                    search_id
                ))
            })?;
            PollResult::Ready(results)
        };
        self.record_poll(&result);
        Ok(result)
    }

    async fn create_reservation(&self, request: &ReservationRequest) -> Result<(), ApiError> {
        self.post(RESERVATION_ENDPOINT, request).await?;
        info!(
            search_id = %request.search_id,
            result_id = %request.result_id,
            "reservation requested"
        );
        Ok(())
    }

    async fn reservations_poll(
        &self,
        search_id: &str,
    ) -> Result<PollResult<Vec<Reservation>>, ApiError> {
        let path = format!("{}{}/poll/", RESERVATION_ENDPOINT, search_id);
        let response: ReservationPollResponse =
            decode("reservation poll", self.get(&path).await?)?;

        let result = match response.status {
            ReservationStatus::Pending => PollResult::Pending,
            ReservationStatus::Failed => {
                warn!(search_id, "reservation failed");
                self.record_failed_poll();
                return Err(ApiError::ReservationFailed {
                    search_id: search_id.to_string(),
                });
            }
            ReservationStatus::Completed | ReservationStatus::Other => {
                let reservations = response.reservations.ok_or_else(|| {
                    ApiError::Protocol(format!(
                        "reservation poll for {} finished without reservations",
                        search_id
                    ))
                })?;
                PollResult::Ready(reservations)
            }
        };
        self.record_poll(&result);
        Ok(result)
    }

    async fn cancel_reservation(&self, reservation_id: &str) -> Result<Value, ApiError> {
        let path = format!("{}{}", RESERVATION_ENDPOINT, reservation_id);
        let response = self.delete(&path).await?;
        info!(reservation_id, "reservation cancelled");
        Ok(response)
    }

    fn poller(&self) -> &AsyncOperationPoller {
        &self.poller
    }
}
