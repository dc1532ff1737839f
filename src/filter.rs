// Filter and sort evaluation over hotels
// Pure functions: every read path of the store replays these over already materialized records

use std::cmp::Reverse;

use crate::model::{Hotel, SearchQuery, SortPolicy};

pub fn matches(hotel: &Hotel, query: &SearchQuery) -> bool {
    let city = query.city.trim();
    let city_ok = city.is_empty() || hotel.city.contains(city);

    let keyword = query.keyword.trim().to_lowercase();
    let keyword_ok = keyword.is_empty()
        || hotel.name_zh.to_lowercase().contains(&keyword)
        || hotel.name_en.to_lowercase().contains(&keyword)
        || hotel.address.to_lowercase().contains(&keyword);

    // Hotels without nearby tokens are never excluded by the nearby filter
    let nearby_ok = query.nearby_filters.is_empty() || {
        let tokens: Vec<String> = hotel.nearby().iter().map(|t| t.to_lowercase()).collect();
        tokens.is_empty()
            || query.nearby_filters.iter().any(|filter| {
                let filter = filter.to_lowercase();
                tokens.iter().any(|token| token.contains(&filter))
            })
    };

    let star_ok = query.star_filters.is_empty() || query.star_filters.contains(&hotel.star);

    let price_ok = hotel.display_min_price() <= query.max_price;

    let tag_ok = query.quick_tags.is_empty() || hotel.tags.iter().any(|tag| query.quick_tags.contains(tag));

    city_ok && keyword_ok && nearby_ok && star_ok && price_ok && tag_ok
}

/// Sorts in place. Every policy is a stable sort, so ties keep their collection order.
pub fn sort_hotels(hotels: &mut [Hotel], policy: SortPolicy) {
    match policy {
        SortPolicy::Smart => hotels.sort_by(|a, b| smart_score(b).total_cmp(&smart_score(a))),
        SortPolicy::RatingDesc => hotels.sort_by(|a, b| b.rating.total_cmp(&a.rating)),
        SortPolicy::StarDesc => hotels.sort_by(|a, b| {
            b.star
                .cmp(&a.star)
                .then_with(|| b.rating.total_cmp(&a.rating))
        }),
        SortPolicy::PriceAsc => hotels.sort_by_key(|h| h.display_min_price()),
        SortPolicy::PriceDesc => hotels.sort_by_key(|h| Reverse(h.display_min_price())),
    }
}

fn smart_score(hotel: &Hotel) -> f64 {
    hotel.rating * 10.0 + f64::from(hotel.star)
}

pub fn filter_and_sort<'a, I>(hotels: I, query: &SearchQuery) -> Vec<Hotel>
where
    I: IntoIterator<Item = &'a Hotel>,
{
    let mut filtered: Vec<Hotel> = hotels
        .into_iter()
        .filter(|hotel| matches(hotel, query))
        .cloned()
        .collect();
    sort_hotels(&mut filtered, query.sort);
    filtered
}
