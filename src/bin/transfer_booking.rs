// Runs one search -> reserve -> confirm -> cancel cycle against the booking API
use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use rand::Rng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use transfer_booking_client::config::{
    DEFAULT_BASE_URL, ENV_API_KEY, ENV_BASE_URL, ENV_POLL_INTERVAL_MS, ENV_POLL_MAX_ATTEMPTS,
    ENV_POLL_TIMEOUT_MS, ENV_REQUEST_TIMEOUT_MS,
};
use transfer_booking_client::models::parse_pickup_datetime;
use transfer_booking_client::{
    BookingFlow, CancellationToken, ClientConfig, PassengerDetails, PollConfig, SearchRequest,
    TransferApiClient, TripMode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    OneWay,
    RoundTrip,
}

impl From<ModeArg> for TripMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::OneWay => TripMode::OneWay,
            ModeArg::RoundTrip => TripMode::RoundTrip,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "transfer-booking", about = "Book and cancel a transfer through the booking API")]
struct Args {
    #[arg(long, env = ENV_API_KEY, hide_env_values = true)]
    api_key: String,

    #[arg(long, env = ENV_BASE_URL, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    #[arg(long, env = ENV_REQUEST_TIMEOUT_MS, default_value_t = 30_000)]
    request_timeout_ms: u64,

    #[arg(
        long,
        env = "TRANSFER_START_ADDRESS",
        default_value = "44 Tehama Street, San Francisco, CA, USA"
    )]
    start_address: String,

    #[arg(long, env = "TRANSFER_END_ADDRESS", default_value = "SFO")]
    end_address: String,

    #[arg(long, env = "TRANSFER_MODE", value_enum, default_value_t = ModeArg::OneWay)]
    mode: ModeArg,

    /// Pickup time as "YYYY-MM-DD HH:MM"
    #[arg(long, env = "TRANSFER_PICKUP", default_value = "2023-12-01 15:30")]
    pickup: String,

    #[arg(long, env = "TRANSFER_PASSENGERS", default_value_t = 2)]
    passengers: u32,

    #[arg(long, env = "TRANSFER_CURRENCY", default_value = "USD")]
    currency: String,

    #[arg(long, env = "TRANSFER_CAMPAIGN")]
    campaign: Option<String>,

    #[arg(
        long,
        env = "TRANSFER_PROVIDER",
        default_value = transfer_booking_client::booking_flow::DEFAULT_PROVIDER
    )]
    provider: String,

    #[arg(long, env = "TRANSFER_FIRST_NAME", default_value = "Dummy First")]
    first_name: String,

    #[arg(long, env = "TRANSFER_LAST_NAME", default_value = "Dummy Last")]
    last_name: String,

    #[arg(long, env = "TRANSFER_EMAIL", default_value = "Dummy@email.com")]
    email: String,

    #[arg(long, env = "TRANSFER_PHONE_NUMBER", default_value = "17575771111")]
    phone_number: String,

    #[arg(long, env = "TRANSFER_COUNTRY_CODE", default_value = "US")]
    country_code: String,

    #[arg(long, env = "TRANSFER_AIRLINE", default_value = "AA")]
    airline: String,

    /// Random flight number in 1..=1000 when omitted
    #[arg(long, env = "TRANSFER_FLIGHT_NUMBER")]
    flight_number: Option<u32>,

    #[arg(long, env = ENV_POLL_INTERVAL_MS, default_value_t = 1000)]
    poll_interval_ms: u64,

    #[arg(long, env = ENV_POLL_MAX_ATTEMPTS)]
    max_polls: Option<u32>,

    #[arg(long, env = ENV_POLL_TIMEOUT_MS, default_value_t = 300_000)]
    poll_timeout_ms: u64,
}

impl Args {
    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.api_key.clone())
            .with_base_url(self.base_url.clone())
            .with_poll(PollConfig {
                interval_ms: self.poll_interval_ms,
                max_attempts: self.max_polls,
                timeout_ms: Some(self.poll_timeout_ms),
            });
        config.timeout_ms = self.request_timeout_ms;
        config
    }

    fn search_request(&self) -> Result<SearchRequest> {
        Ok(SearchRequest {
            start_address: self.start_address.clone(),
            end_address: self.end_address.clone(),
            mode: self.mode.into(),
            pickup_datetime: parse_pickup_datetime(&self.pickup)
                .with_context(|| format!("invalid pickup time '{}'", self.pickup))?,
            num_passengers: self.passengers,
            currency: self.currency.clone(),
            campaign: self.campaign.clone(),
        })
    }

    fn passenger(&self) -> PassengerDetails {
        PassengerDetails {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            phone_number: self.phone_number.clone(),
            country_code_name: self.country_code.clone(),
            airline: self.airline.clone(),
            flight_number: self
                .flight_number
                .unwrap_or_else(|| rand::thread_rng().gen_range(1..=1000)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let client =
        TransferApiClient::new(args.client_config()).context("failed to build API client")?;
    let search = args.search_request()?;
    let passenger = args.passenger();

    // Ctrl-C aborts whichever poll loop is running
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let report = BookingFlow::new(&client)
        .with_provider(args.provider.clone())
        .run(&search, &passenger, &cancel)
        .await
        .context("booking cycle failed")?;

    for reservation_id in &report.reservation_ids {
        println!("Reservation ID: {}", reservation_id);
    }
    println!("{}", serde_json::to_string_pretty(&report)?);

    let stats = client.stats();
    info!(
        requests = stats.requests_sent,
        polls = stats.polls_issued,
        "booking cycle finished"
    );

    if !report.fully_cancelled() {
        for failed in &report.failed_cancellations {
            warn!(reservation_id = %failed.reservation_id, "reservation left live");
        }
        bail!(
            "{} reservation(s) could not be cancelled",
            report.failed_cancellations.len()
        );
    }
    Ok(())
}
