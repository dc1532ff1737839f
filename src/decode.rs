// Lenient decoding of hotel service responses
// Absent or malformed fields degrade to empty values; one bad field never drops the record

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::model::{Breakfast, Hotel, HotelId, RoomType};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("JSON parse error: {0}")]
    InvalidJson(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Service returned code {code}: {message}")]
    ErrorCode { code: i64, message: String },
}

/// One page of search results as reported by the service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemotePage {
    pub records: Vec<Hotel>,
    pub page: u32,
    pub total_pages: u32,
}

/// Parses the `{code, data}` envelope and hands back `data`. Anything but `code == 0` fails.
pub fn parse_envelope(body: &str) -> Result<Value, DecodeError> {
    let mut root: Value =
        serde_json::from_str(body).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;

    let code = root.get("code").and_then(lenient_i64).unwrap_or(-1);
    if code != 0 {
        return Err(DecodeError::ErrorCode {
            code,
            message: root
                .as_object()
                .map(|obj| string_field(obj, "message"))
                .unwrap_or_default(),
        });
    }

    match root.get_mut("data").map(Value::take) {
        Some(data @ Value::Object(_)) => Ok(data),
        _ => Err(DecodeError::MissingField("data")),
    }
}

pub fn decode_page(body: &str, requested_page: u32) -> Result<RemotePage, DecodeError> {
    let data = parse_envelope(body)?;

    let records = match data.get("list") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_object)
            .map(decode_hotel_summary)
            .filter(|hotel| {
                if !hotel.id.is_known() {
                    debug!(name = %hotel.name_zh, "dropping listed hotel without usable id");
                }
                hotel.id.is_known()
            })
            .collect(),
        _ => Vec::new(),
    };

    let pagination = data.get("pagination").and_then(Value::as_object);
    let page = pagination
        .and_then(|p| p.get("page"))
        .and_then(lenient_u32)
        .filter(|page| *page >= 1)
        .unwrap_or(requested_page);
    let total_pages = pagination
        .and_then(|p| p.get("totalPages"))
        .and_then(lenient_u32)
        .unwrap_or(page);

    Ok(RemotePage {
        records,
        page,
        total_pages,
    })
}

pub fn decode_detail(body: &str, requested_id: HotelId) -> Result<Hotel, DecodeError> {
    let data = parse_envelope(body)?;
    let obj = data.as_object().ok_or(DecodeError::MissingField("data"))?;

    let mut hotel = decode_hotel_detail(obj);
    if !hotel.id.is_known() {
        hotel.id = requested_id;
    }
    Ok(hotel)
}

/// List entries carry only the summary fields.
pub fn decode_hotel_summary(obj: &Map<String, Value>) -> Hotel {
    Hotel {
        id: id_field(obj, "id").map_or(HotelId::UNKNOWN, HotelId),
        name_zh: string_field(obj, "nameZh"),
        name_en: string_field(obj, "nameEn"),
        address: string_field(obj, "address"),
        city: string_field(obj, "city"),
        star: star_field(obj),
        images: string_list(obj, "images"),
        tags: string_list(obj, "tags"),
        rating: float_field(obj, "rating"),
        min_price: price_field(obj, "minPrice"),
        max_price: price_field(obj, "maxPrice"),
        ..Default::default()
    }
}

/// A full record with rooms. Price bounds come from the rooms when there are any.
pub fn decode_hotel_detail(obj: &Map<String, Value>) -> Hotel {
    let rooms: Vec<RoomType> = match obj.get("rooms") {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).map(decode_room).collect(),
        _ => Vec::new(),
    };

    let min_price = rooms
        .iter()
        .map(|room| room.price)
        .min()
        .or_else(|| price_field(obj, "minPrice"));
    let max_price = rooms
        .iter()
        .map(|room| room.price)
        .max()
        .or_else(|| price_field(obj, "maxPrice"));

    Hotel {
        id: id_field(obj, "id").map_or(HotelId::UNKNOWN, HotelId),
        name_zh: string_field(obj, "nameZh"),
        name_en: string_field(obj, "nameEn"),
        address: string_field(obj, "address"),
        city: string_field(obj, "city"),
        star: star_field(obj),
        open_date: opt_string_field(obj, "openDate"),
        images: string_list(obj, "images"),
        facilities: string_list(obj, "facilities"),
        tags: string_list(obj, "tags"),
        nearby_attractions: string_field(obj, "nearbyAttractions"),
        nearby_transport: string_field(obj, "nearbyTransport"),
        description: string_field(obj, "description"),
        rating: float_field(obj, "rating"),
        rooms,
        min_price,
        max_price,
    }
}

/// Decodes an array of full records, skipping anything that is not an object.
pub fn decode_hotel_list(value: &Value) -> Vec<Hotel> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(decode_hotel_detail)
                .collect()
        })
        .unwrap_or_default()
}

fn decode_room(obj: &Map<String, Value>) -> RoomType {
    RoomType {
        id: id_field(obj, "id").unwrap_or(-1),
        name: string_field(obj, "name"),
        bed_type: string_field(obj, "bedType"),
        max_guests: obj
            .get("maxGuests")
            .and_then(lenient_u32)
            .filter(|guests| *guests >= 1)
            .unwrap_or(2),
        area: price_field(obj, "area"),
        price: price_field(obj, "price").unwrap_or(0),
        original_price: price_field(obj, "originalPrice"),
        breakfast: opt_string_field(obj, "breakfast").and_then(|raw| Breakfast::parse(&raw)),
        images: string_list(obj, "images"),
        discount_desc: opt_string_field(obj, "discountDesc"),
    }
}

fn lenient_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn lenient_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        }
        _ => None,
    }
}

fn lenient_u32(value: &Value) -> Option<u32> {
    lenient_i64(value).and_then(|v| u32::try_from(v).ok())
}

fn id_field(obj: &Map<String, Value>, key: &str) -> Option<i64> {
    obj.get(key).and_then(lenient_i64).filter(|id| *id >= 0)
}

// Prices arrive as integers, floats or decimal strings ("898.00")
fn price_field(obj: &Map<String, Value>, key: &str) -> Option<u32> {
    obj.get(key)
        .and_then(lenient_f64)
        .filter(|v| *v >= 0.0)
        .map(|v| v.min(f64::from(u32::MAX)) as u32)
}

fn star_field(obj: &Map<String, Value>) -> u8 {
    obj.get("star")
        .and_then(lenient_i64)
        .filter(|star| (1..=5).contains(star))
        .map_or(0, |star| star as u8)
}

fn float_field(obj: &Map<String, Value>, key: &str) -> f64 {
    obj.get(key).and_then(lenient_f64).unwrap_or(0.0)
}

fn string_field(obj: &Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn opt_string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    Some(string_field(obj, key)).filter(|s| !s.trim().is_empty())
}

fn string_list(obj: &Map<String, Value>, key: &str) -> Vec<String> {
    match obj.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.trim().is_empty())
            .collect(),
        _ => Vec::new(),
    }
}
