// Main library file for the hotel search data-access layer

// Leaf to root: model and filter, then decoding and the remote client, then the store
pub mod api;
pub mod catalog;
pub mod config;
pub mod decode;
pub mod filter;
pub mod model;
pub mod store;

// Re-export key types for convenience
pub use api::{ApiError, HotelApiClient, HotelBackend, RemotePage, Unavailable};
pub use catalog::StaticCatalog;
pub use config::{ClientConfig, ClientError};
pub use decode::DecodeError;
pub use model::{merge_hotel, Breakfast, Hotel, HotelId, QueryKey, RoomType, SearchQuery, SortPolicy};
pub use store::{HotelStore, StoreStats};
