// Static fallback catalog
// Embedded hotel records that answer queries with no network at all

use std::sync::Arc;

use tracing::error;

use crate::{
    decode::{decode_hotel_list, DecodeError},
    filter,
    model::{Hotel, HotelId, SearchQuery},
};

// Same shape as the service's detail records, decoded with the same rules
pub const EMBEDDED_CATALOG_JSON: &str = include_str!("../data/fallback_hotels.json");

/// Immutable list of fully populated hotels. Cloning shares the records.
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    hotels: Arc<[Hotel]>,
}

impl Default for StaticCatalog {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl StaticCatalog {
    pub fn new(hotels: Vec<Hotel>) -> Self {
        Self {
            hotels: hotels.into(),
        }
    }

    /// The catalog compiled into the crate.
    pub fn embedded() -> Self {
        Self::from_json(EMBEDDED_CATALOG_JSON).unwrap_or_else(|err| {
            error!(error = %err, "embedded fallback catalog is unreadable, starting empty");
            Self::default()
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, DecodeError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
        if !value.is_array() {
            return Err(DecodeError::InvalidJson("catalog must be a JSON array".to_string()));
        }
        Ok(Self::new(decode_hotel_list(&value)))
    }

    pub fn hotels(&self) -> &[Hotel] {
        &self.hotels
    }

    pub fn len(&self) -> usize {
        self.hotels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hotels.is_empty()
    }

    pub fn find(&self, id: HotelId) -> Option<&Hotel> {
        self.hotels.iter().find(|hotel| hotel.id == id)
    }

    /// Matching records in the query's sort order.
    pub fn matching(&self, query: &SearchQuery) -> Vec<Hotel> {
        filter::filter_and_sort(self.hotels.iter(), query)
    }

    pub fn count_matching(&self, query: &SearchQuery) -> usize {
        self.hotels
            .iter()
            .filter(|hotel| filter::matches(hotel, query))
            .count()
    }
}
