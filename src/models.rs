// Wire types of the transfer booking API
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripMode {
    OneWay,
    RoundTrip,
}

impl Default for TripMode {
    fn default() -> Self {
        TripMode::OneWay
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub start_address: String,
    pub end_address: String,
    pub mode: TripMode,
    #[serde(with = "pickup_datetime_format")]
    pub pickup_datetime: NaiveDateTime,
    pub num_passengers: u32,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchCreated {
    pub search_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchPollResponse {
    pub more_coming: bool,
    #[serde(default)]
    pub results: Option<Vec<SearchResult>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub result_id: String,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub details: StepDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDetails {
    pub provider_name: String,
    pub price: StepPrice,
}

impl StepDetails {
    pub fn amount(&self) -> f64 {
        self.price.price.value
    }
}

// The API nests the quoted amount as `price.price.value`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepPrice {
    pub price: PriceValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceValue {
    #[serde(deserialize_with = "deserialize_amount")]
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub country_code_name: String,
    pub search_id: String,
    pub result_id: String,
    pub airline: String,
    pub flight_number: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Completed,
    Failed,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReservationPollResponse {
    pub status: ReservationStatus,
    #[serde(default)]
    pub reservations: Option<Vec<Reservation>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: String,
    #[serde(default)]
    pub confirmation_number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

// Amounts arrive either as JSON numbers or as decimal strings ("45.00")
fn deserialize_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAmount {
        Number(f64),
        Text(String),
    }

    match RawAmount::deserialize(deserializer)? {
        RawAmount::Number(value) => Ok(value),
        RawAmount::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid amount '{}': {}", text, e))),
    }
}

mod pickup_datetime_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M";

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

pub use pickup_datetime_format::FORMAT as PICKUP_DATETIME_FORMAT;

pub fn parse_pickup_datetime(raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw, PICKUP_DATETIME_FORMAT)
}
