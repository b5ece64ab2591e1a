// End-to-end booking cycle: search, pick the cheapest offer of one provider,
// reserve it, wait for confirmation, then cancel what was booked.

use crate::api::BookingApi;
use crate::error::ApiError;
use crate::models::{ReservationRequest, SearchRequest, SearchResult};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const DEFAULT_PROVIDER: &str = "Dummy External Provider";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheapestOffer {
    pub result_id: String,
    pub price: f64,
}

// Passenger and flight data attached to a reservation
#[derive(Debug, Clone)]
pub struct PassengerDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub country_code_name: String,
    pub airline: String,
    pub flight_number: u32,
}

impl PassengerDetails {
    fn reservation_for(&self, search_id: &str, result_id: &str) -> ReservationRequest {
        ReservationRequest {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            phone_number: self.phone_number.clone(),
            country_code_name: self.country_code_name.clone(),
            search_id: search_id.to_string(),
            result_id: result_id.to_string(),
            airline: self.airline.clone(),
            flight_number: self.flight_number,
        }
    }
}

// A reservation the API refused to cancel; it is still live on the server
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedCancellation {
    pub reservation_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingCycleReport {
    pub search_id: String,
    pub result_id: String,
    pub price: f64,
    pub reservation_ids: Vec<String>,
    pub cancellations: Vec<Value>,
    pub failed_cancellations: Vec<FailedCancellation>,
}

impl BookingCycleReport {
    pub fn fully_cancelled(&self) -> bool {
        self.failed_cancellations.is_empty()
    }
}

/// Finds the lowest-priced step offered by `provider_name` across all results.
///
/// Ties keep the first offer seen. Returns `None` when the provider does not
/// appear in any step.
pub fn cheapest_offer(results: &[SearchResult], provider_name: &str) -> Option<CheapestOffer> {
    let mut cheapest: Option<CheapestOffer> = None;

    for result in results {
        for step in &result.steps {
            if step.details.provider_name != provider_name {
                continue;
            }
            let price = step.details.amount();
            let is_cheaper = match &cheapest {
                Some(current) => price < current.price,
                None => true,
            };
            if is_cheaper {
                cheapest = Some(CheapestOffer {
                    result_id: result.result_id.clone(),
                    price,
                });
            }
        }
    }

    cheapest
}

pub struct BookingFlow<'a, A: BookingApi> {
    api: &'a A,
    provider_name: String,
}

impl<'a, A: BookingApi> BookingFlow<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self {
            api,
            provider_name: DEFAULT_PROVIDER.to_string(),
        }
    }

    pub fn with_provider(mut self, provider_name: impl Into<String>) -> Self {
        self.provider_name = provider_name.into();
        self
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub async fn run(
        &self,
        search: &SearchRequest,
        passenger: &PassengerDetails,
        cancel: &CancellationToken,
    ) -> Result<BookingCycleReport, ApiError> {
        let search_id = self.api.search(search).await?;
        let results = self.api.wait_for_search_results(&search_id, cancel).await?;
        info!(search_id = %search_id, results = results.len(), "search complete");

        let offer = cheapest_offer(&results, &self.provider_name)
            .ok_or_else(|| ApiError::NoMatchingOffer(self.provider_name.clone()))?;
        info!(
            result_id = %offer.result_id,
            price = offer.price,
            provider = %self.provider_name,
            "selected cheapest offer"
        );

        let reservation = passenger.reservation_for(&search_id, &offer.result_id);
        self.api.create_reservation(&reservation).await?;
        let reservations = match self.api.wait_for_reservations(&search_id, cancel).await {
            Ok(reservations) => reservations,
            Err(e) => {
                warn!(
                    search_id = %search_id,
                    error = %e,
                    "reservation requested but never confirmed; it may still be live"
                );
                return Err(e);
            }
        };

        // Every reservation gets a cancel attempt, even after an earlier one failed
        let mut reservation_ids = Vec::with_capacity(reservations.len());
        let mut cancellations = Vec::with_capacity(reservations.len());
        let mut failed_cancellations = Vec::new();
        for reservation in reservations {
            match self.api.cancel_reservation(&reservation.id).await {
                Ok(response) => cancellations.push(response),
                Err(e) => {
                    warn!(reservation_id = %reservation.id, error = %e, "cancellation failed");
                    failed_cancellations.push(FailedCancellation {
                        reservation_id: reservation.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
            reservation_ids.push(reservation.id);
        }

        Ok(BookingCycleReport {
            search_id,
            result_id: offer.result_id,
            price: offer.price,
            reservation_ids,
            cancellations,
            failed_cancellations,
        })
    }
}
