use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hotel_search_cache::{
    api::mock_server::MockServer, Hotel, HotelId, HotelStore, SearchQuery, SortPolicy, StaticCatalog,
};
use rand::{seq::SliceRandom, thread_rng, Rng};
use std::sync::Arc;

const CITIES: [&str; 4] = ["上海", "北京", "成都", "杭州"];
const TAGS: [&str; 5] = ["亲子", "商务", "近地铁", "江景", "免费停车"];

fn random_catalog(size: usize) -> StaticCatalog {
    let mut rng = thread_rng();
    let hotels = (0..size)
        .map(|i| Hotel {
            id: HotelId(i as i64 + 1),
            name_zh: format!("基准酒店{}", i),
            name_en: format!("Bench Hotel {}", i),
            city: CITIES.choose(&mut rng).unwrap_or(&"上海").to_string(),
            star: rng.gen_range(1..=5),
            rating: rng.gen_range(30..=50) as f64 / 10.0,
            tags: TAGS
                .choose_multiple(&mut rng, 2)
                .map(|t| t.to_string())
                .collect(),
            nearby_attractions: "外滩、南京路, 人民广场".to_string(),
            min_price: Some(rng.gen_range(150..3000)),
            ..Default::default()
        })
        .collect();
    StaticCatalog::new(hotels)
}

// Filter and sort over the whole catalog, per sort policy
pub fn catalog_search_benchmark(c: &mut Criterion) {
    let catalog = random_catalog(2000);
    let mut group = c.benchmark_group("catalog_search");

    for policy in [SortPolicy::Smart, SortPolicy::PriceAsc, SortPolicy::StarDesc] {
        let query = SearchQuery {
            sort: policy,
            ..SearchQuery::for_city("上海")
        };
        group.bench_with_input(BenchmarkId::from_parameter(policy.name()), &query, |b, query| {
            b.iter(|| black_box(catalog.matching(query)))
        });
    }

    group.finish();
}

// Offline store paging through the catalog until the first empty batch
pub fn fallback_paging_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("fallback_paging");

    for batch_size in [6usize, 20, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), &batch_size, |b, &batch_size| {
            b.iter(|| {
                let store = HotelStore::with_catalog(Arc::new(MockServer::offline()), random_catalog(500));
                let query = SearchQuery::for_city("上海");
                store.reset_loaded_for(&query);

                let mut loaded = 0;
                tokio_test::block_on(async {
                    while store.has_more_for(&query) {
                        loaded += store.load_next_batch(&query, batch_size).await.len();
                    }
                });
                black_box(loaded)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, catalog_search_benchmark, fallback_paging_benchmark);
criterion_main!(benches);
