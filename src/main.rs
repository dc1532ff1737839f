use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use hotel_search_cache::{model::DEFAULT_CITY, ClientConfig, Hotel, HotelApiClient, HotelStore, SearchQuery};

const ENV_CITY: &str = "HOTEL_SEARCH_CITY";
const ENV_KEYWORD: &str = "HOTEL_SEARCH_KEYWORD";
const ENV_BATCH_SIZE: &str = "HOTEL_BATCH_SIZE";
const DEFAULT_BATCH_SIZE: usize = 6;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListingOut<'a> {
    id: i64,
    name_zh: &'a str,
    city: &'a str,
    star: u8,
    rating: f64,
    min_price: u32,
    nearby: Vec<String>,
}

impl<'a> From<&'a Hotel> for ListingOut<'a> {
    fn from(hotel: &'a Hotel) -> Self {
        Self {
            id: hotel.id.0,
            name_zh: &hotel.name_zh,
            city: &hotel.city,
            star: hotel.star,
            rating: hotel.rating,
            min_price: hotel.display_min_price(),
            nearby: hotel.nearby(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = ClientConfig::from_env().context("reading client configuration")?;
    let client = HotelApiClient::new(config).context("building hotel service client")?;
    let store = HotelStore::new(Arc::new(client));

    let query = SearchQuery {
        city: std::env::var(ENV_CITY).unwrap_or_else(|_| DEFAULT_CITY.to_string()),
        keyword: std::env::var(ENV_KEYWORD).unwrap_or_default(),
        ..Default::default()
    };
    let batch_size = match std::env::var(ENV_BATCH_SIZE) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .with_context(|| format!("{} must be a number, got {:?}", ENV_BATCH_SIZE, raw))?,
        Err(_) => DEFAULT_BATCH_SIZE,
    };

    store.reset_loaded_for(&query);
    while store.has_more_for(&query) {
        let batch = store.load_next_batch(&query, batch_size).await;
        tracing::info!(loaded = batch.len(), "batch loaded");
        if batch.is_empty() {
            break;
        }
    }

    let hotels = store.loaded_search(&query);
    let listing: Vec<ListingOut> = hotels.iter().map(ListingOut::from).collect();
    println!("{}", serde_json::to_string_pretty(&listing)?);

    tracing::info!(
        key = %query.key(),
        hotels = listing.len(),
        stats = ?store.stats(),
        "search finished"
    );

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
