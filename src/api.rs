// Remote hotel search client
// One paginated search call and one detail call, each tried against a ranked list of endpoints

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    config::{ClientConfig, ClientError},
    decode::{decode_detail, decode_page, DecodeError},
    filter,
    model::{Hotel, HotelId, SearchQuery, SortPolicy},
};

pub use crate::decode::RemotePage;

// Failure of a single candidate endpoint. Never leaves this module.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("API error: code {code} - {message}")]
    ApiResponseError { code: i64, message: String },

    #[error("Decode error: {0}")]
    Decode(DecodeError),
}

impl From<DecodeError> for ApiError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::ErrorCode { code, message } => ApiError::ApiResponseError { code, message },
            other => ApiError::Decode(other),
        }
    }
}

/// Every candidate failed. Carries no cause on purpose: callers only fall back.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("hotel service unavailable")]
pub struct Unavailable;

// Seam between the store and whatever serves hotel pages
#[async_trait]
pub trait HotelBackend: Send + Sync + 'static {
    async fn fetch_page(
        &self,
        query: &SearchQuery,
        page: u32,
        page_size: u32,
    ) -> Result<RemotePage, Unavailable>;

    async fn fetch_detail(&self, id: HotelId) -> Result<Hotel, Unavailable>;
}

/// Server sort token, if the service knows the policy.
pub fn remote_sort_token(policy: SortPolicy) -> Option<&'static str> {
    match policy {
        SortPolicy::RatingDesc => Some("rating_desc"),
        SortPolicy::PriceAsc => Some("price_asc"),
        SortPolicy::PriceDesc => Some("price_desc"),
        SortPolicy::Smart | SortPolicy::StarDesc => None,
    }
}

pub fn search_params(query: &SearchQuery, page: u32, page_size: u32) -> Vec<(&'static str, String)> {
    fn join<T: ToString>(values: impl IntoIterator<Item = T>) -> String {
        values
            .into_iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    let mut params = vec![
        ("city", query.city.clone()),
        ("checkIn", query.check_in.format("%Y-%m-%d").to_string()),
        ("checkOut", query.check_out.format("%Y-%m-%d").to_string()),
    ];
    if !query.star_filters.is_empty() {
        params.push(("star", join(&query.star_filters)));
    }
    params.push(("maxPrice", query.max_price.to_string()));
    if !query.keyword.trim().is_empty() {
        params.push(("keyword", query.keyword.trim().to_string()));
    }
    if !query.quick_tags.is_empty() {
        params.push(("tags", join(&query.quick_tags)));
    }
    params.push(("page", page.to_string()));
    params.push(("pageSize", page_size.to_string()));
    if let Some(sort) = remote_sort_token(query.sort) {
        params.push(("sort", sort.to_string()));
    }
    params
}

pub struct HotelApiClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HotelApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        if config.base_urls.is_empty() {
            return Err(ClientError::ConfigError(
                "at least one base url is required".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ClientError::InitError(e.to_string()))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn get_body(&self, url: &str, params: &[(&'static str, String)]) -> Result<String, ApiError> {
        // Error statuses still carry a {code, message} body, so read it either way
        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .query(params)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        response.text().await.map_err(|e| self.classify(e))
    }

    fn classify(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout(self.config.timeout_ms)
        } else {
            ApiError::NetworkError(err.to_string())
        }
    }

    // First candidate with a well formed, success coded response wins
    async fn first_success<T, D>(
        &self,
        op: &'static str,
        path: &str,
        params: &[(&'static str, String)],
        decode: D,
    ) -> Result<T, Unavailable>
    where
        T: Send,
        D: Fn(&str) -> Result<T, DecodeError> + Send + Sync,
    {
        for (rank, base) in self.config.base_urls.iter().enumerate() {
            let url = format!("{}{}", base.trim_end_matches('/'), path);

            let attempt = match self.get_body(&url, params).await {
                Ok(body) => decode(&body).map_err(ApiError::from),
                Err(err) => Err(err),
            };

            match attempt {
                Ok(value) => {
                    debug!(op, rank, url = %url, "hotel service answered");
                    return Ok(value);
                }
                Err(err) => {
                    debug!(op, rank, url = %url, error = %err, "hotel service candidate failed");
                }
            }
        }

        warn!(
            op,
            candidates = self.config.base_urls.len(),
            "all hotel service candidates failed"
        );
        Err(Unavailable)
    }
}

#[async_trait]
impl HotelBackend for HotelApiClient {
    async fn fetch_page(
        &self,
        query: &SearchQuery,
        page: u32,
        page_size: u32,
    ) -> Result<RemotePage, Unavailable> {
        let params = search_params(query, page, page_size);
        let mut result = self
            .first_success("search", "/hotels", &params, |body| decode_page(body, page))
            .await?;

        // Without a server token the order is only fixed within this page
        if remote_sort_token(query.sort).is_none() {
            filter::sort_hotels(&mut result.records, query.sort);
        }

        Ok(result)
    }

    async fn fetch_detail(&self, id: HotelId) -> Result<Hotel, Unavailable> {
        let path = format!("/hotels/{}", id);
        self.first_success("detail", &path, &[], |body| decode_detail(body, id))
            .await
    }
}

// In-process backend for tests and benchmarks
pub mod mock_server {
    use super::*;
    use parking_lot::RwLock;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

    #[derive(Debug, Clone, Copy)]
    pub enum ServerMode {
        Normal,
        CompleteOutage,
    }

    pub struct MockServer {
        mode: AtomicU8,
        page_requests: AtomicUsize,
        detail_requests: AtomicUsize,
        fail_next_requests: AtomicUsize,
        delay_ms: AtomicUsize,
        hotels: RwLock<Vec<Hotel>>,
        details: RwLock<HashMap<HotelId, Hotel>>,
        total_pages_override: RwLock<Option<u32>>,
    }

    impl Default for MockServer {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockServer {
        pub fn new() -> Self {
            Self {
                mode: AtomicU8::new(0),
                page_requests: AtomicUsize::new(0),
                detail_requests: AtomicUsize::new(0),
                fail_next_requests: AtomicUsize::new(0),
                delay_ms: AtomicUsize::new(0),
                hotels: RwLock::new(Vec::new()),
                details: RwLock::new(HashMap::new()),
                total_pages_override: RwLock::new(None),
            }
        }

        /// A server that never answers.
        pub fn offline() -> Self {
            let server = Self::new();
            server.set_mode(ServerMode::CompleteOutage);
            server
        }

        pub fn set_mode(&self, mode: ServerMode) {
            let mode_value = match mode {
                ServerMode::Normal => 0,
                ServerMode::CompleteOutage => 1,
            };
            self.mode.store(mode_value, Ordering::SeqCst);
        }

        pub fn set_delay(&self, delay_ms: usize) {
            self.delay_ms.store(delay_ms, Ordering::SeqCst);
        }

        pub fn fail_next_requests(&self, count: usize) {
            self.fail_next_requests.store(count, Ordering::SeqCst);
        }

        /// Reports this total on every page instead of the computed one.
        pub fn set_total_pages_override(&self, total: Option<u32>) {
            *self.total_pages_override.write() = total;
        }

        /// Adds a listed hotel. Its detail record defaults to the same data.
        pub fn add_hotel(&self, hotel: Hotel) {
            self.details.write().entry(hotel.id).or_insert_with(|| hotel.clone());
            self.hotels.write().push(hotel);
        }

        pub fn add_detail(&self, hotel: Hotel) {
            self.details.write().insert(hotel.id, hotel);
        }

        pub fn page_requests(&self) -> usize {
            self.page_requests.load(Ordering::SeqCst)
        }

        pub fn detail_requests(&self) -> usize {
            self.detail_requests.load(Ordering::SeqCst)
        }

        async fn simulate(&self) -> Result<(), Unavailable> {
            let delay = self.delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay as u64)).await;
            }

            if self.mode.load(Ordering::SeqCst) == 1 {
                return Err(Unavailable);
            }

            let fail_count = self.fail_next_requests.load(Ordering::SeqCst);
            if fail_count > 0 {
                self.fail_next_requests.store(fail_count - 1, Ordering::SeqCst);
                return Err(Unavailable);
            }

            Ok(())
        }
    }

    #[async_trait]
    impl HotelBackend for MockServer {
        async fn fetch_page(
            &self,
            query: &SearchQuery,
            page: u32,
            page_size: u32,
        ) -> Result<RemotePage, Unavailable> {
            self.page_requests.fetch_add(1, Ordering::SeqCst);
            self.simulate().await?;

            // Server side filtering, listing order as stored
            let matching: Vec<Hotel> = self
                .hotels
                .read()
                .iter()
                .filter(|hotel| filter::matches(hotel, query))
                .cloned()
                .collect();

            let size = page_size.max(1) as usize;
            let computed_total = ((matching.len() + size - 1) / size) as u32;
            let total_pages = self.total_pages_override.read().unwrap_or(computed_total);

            let from = (page.max(1) as usize - 1) * size;
            let records = matching.into_iter().skip(from).take(size).collect();

            Ok(RemotePage {
                records,
                page,
                total_pages,
            })
        }

        async fn fetch_detail(&self, id: HotelId) -> Result<Hotel, Unavailable> {
            self.detail_requests.fetch_add(1, Ordering::SeqCst);
            self.simulate().await?;
            self.details.read().get(&id).cloned().ok_or(Unavailable)
        }
    }
}
