// Domain model for the hotel search data-access layer
// Hotels, their room types, search queries and the canonical key that scopes paging state

use std::{collections::BTreeSet, fmt};

use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CITY: &str = "上海";
pub const DEFAULT_MAX_PRICE: u32 = 2000;

const BANNER_PLACEHOLDER: &str = "酒店实拍";
const STANDARD_ROOM_NAME: &str = "标准房";

// Free-text nearby fields are split on these. Approximate on purpose.
const NEARBY_SEPARATORS: [char; 6] = ['、', ',', '，', ';', '；', '|'];

/// Stable identity of a hotel across every cache tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HotelId(pub i64);

impl HotelId {
    /// Placeholder for records whose id could not be read.
    pub const UNKNOWN: HotelId = HotelId(-1);

    pub fn is_known(&self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for HotelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Breakfast {
    #[serde(rename = "none")]
    NotIncluded,
    Single,
    Double,
}

impl Breakfast {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Breakfast::NotIncluded),
            "single" => Some(Breakfast::Single),
            "double" => Some(Breakfast::Double),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomType {
    pub id: i64,
    pub name: String,
    pub bed_type: String,
    pub max_guests: u32,
    pub area: Option<u32>,
    pub price: u32,
    pub original_price: Option<u32>,
    pub breakfast: Option<Breakfast>,
    pub images: Vec<String>,
    pub discount_desc: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotel {
    pub id: HotelId,
    pub name_zh: String,
    pub name_en: String,
    pub address: String,
    pub city: String,
    pub star: u8,
    pub open_date: Option<String>,
    pub images: Vec<String>,
    pub facilities: Vec<String>,
    pub tags: Vec<String>,
    pub nearby_attractions: String,
    pub nearby_transport: String,
    pub description: String,
    pub rating: f64,
    pub rooms: Vec<RoomType>,
    pub min_price: Option<u32>,
    pub max_price: Option<u32>,
}

impl Hotel {
    /// Tokens parsed out of the nearby attraction and transport strings.
    pub fn nearby(&self) -> Vec<String> {
        [&self.nearby_attractions, &self.nearby_transport]
            .into_iter()
            .flat_map(|raw| raw.split(&NEARBY_SEPARATORS[..]))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Rooms to display. A hotel known only by its summary gets one synthesized standard room.
    pub fn room_types(&self) -> Vec<RoomType> {
        if !self.rooms.is_empty() {
            return self.rooms.clone();
        }

        self.min_price
            .map(|price| RoomType {
                id: -1,
                name: STANDARD_ROOM_NAME.to_string(),
                max_guests: 2,
                price,
                ..Default::default()
            })
            .into_iter()
            .collect()
    }

    pub fn display_min_price(&self) -> u32 {
        self.min_price
            .or_else(|| self.rooms.iter().map(|room| room.price).min())
            .unwrap_or(0)
    }

    pub fn open_year(&self) -> i32 {
        self.open_date
            .as_deref()
            .and_then(|date| date.get(..4))
            .and_then(|year| year.parse().ok())
            .unwrap_or(0)
    }

    pub fn discounts(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for room in self.room_types() {
            if let Some(desc) = room.discount_desc.filter(|d| !d.trim().is_empty()) {
                if !seen.contains(&desc) {
                    seen.push(desc);
                }
            }
        }
        seen
    }

    /// One title per image, taken from the file stem of its path.
    pub fn banner_titles(&self) -> Vec<String> {
        if self.images.is_empty() {
            return vec![BANNER_PLACEHOLDER.to_string()];
        }

        self.images
            .iter()
            .map(|path| {
                let file = path.rsplit('/').next().unwrap_or(path.as_str());
                let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);
                if stem.trim().is_empty() {
                    BANNER_PLACEHOLDER.to_string()
                } else {
                    stem.to_string()
                }
            })
            .collect()
    }
}

/// Merges `newer` over `older`, two records sharing an id.
///
/// Every field is taken from `newer` except the price bounds, tags, images and description:
/// for those an empty value in `newer` keeps whatever `older` already knew.
pub fn merge_hotel(older: &Hotel, newer: Hotel) -> Hotel {
    let mut merged = newer;

    if merged.min_price.is_none() {
        merged.min_price = older.min_price;
    }
    if merged.max_price.is_none() {
        merged.max_price = older.max_price;
    }
    if merged.tags.is_empty() {
        merged.tags = older.tags.clone();
    }
    if merged.images.is_empty() {
        merged.images = older.images.clone();
    }
    if merged.description.trim().is_empty() {
        merged.description = older.description.clone();
    }

    merged
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortPolicy {
    #[default]
    Smart,
    RatingDesc,
    StarDesc,
    PriceAsc,
    PriceDesc,
}

impl SortPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            SortPolicy::Smart => "SMART",
            SortPolicy::RatingDesc => "RATING_DESC",
            SortPolicy::StarDesc => "STAR_DESC",
            SortPolicy::PriceAsc => "PRICE_ASC",
            SortPolicy::PriceDesc => "PRICE_DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub city: String,
    pub keyword: String,
    pub nearby_filters: BTreeSet<String>,
    pub star_filters: BTreeSet<u8>,
    pub max_price: u32,
    pub quick_tags: BTreeSet<String>,
    pub sort: SortPolicy,
    // Sent to the server and part of the key, never used for matching
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl Default for SearchQuery {
    fn default() -> Self {
        let today = Local::now().date_naive();
        Self {
            city: DEFAULT_CITY.to_string(),
            keyword: String::new(),
            nearby_filters: BTreeSet::new(),
            star_filters: BTreeSet::new(),
            max_price: DEFAULT_MAX_PRICE,
            quick_tags: BTreeSet::new(),
            sort: SortPolicy::default(),
            check_in: today,
            check_out: today + Duration::days(1),
        }
    }
}

impl SearchQuery {
    pub fn for_city(city: &str) -> Self {
        Self {
            city: city.to_string(),
            ..Default::default()
        }
    }

    pub fn key(&self) -> QueryKey {
        QueryKey::from(self)
    }
}

/// Canonical identity of a query. Filter sets are rendered sorted, so insertion order never
/// changes the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(String);

impl QueryKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&SearchQuery> for QueryKey {
    fn from(query: &SearchQuery) -> Self {
        fn join<T: ToString>(values: impl IntoIterator<Item = T>) -> String {
            values
                .into_iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(",")
        }

        let parts = [
            query.city.trim().to_string(),
            query.keyword.trim().to_lowercase(),
            join(&query.nearby_filters),
            join(&query.star_filters),
            query.max_price.to_string(),
            join(&query.quick_tags),
            query.sort.name().to_string(),
            query.check_in.format("%Y-%m-%d").to_string(),
            query.check_out.format("%Y-%m-%d").to_string(),
        ];

        QueryKey(parts.join("|"))
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
