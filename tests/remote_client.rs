// HotelApiClient against a bare HTTP/1.1 responder on a local socket

use std::{net::SocketAddr, sync::Arc, time::Duration};

use chrono::NaiveDate;
use parking_lot::Mutex;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

use hotel_search_cache::{
    ClientConfig, HotelApiClient, HotelBackend, HotelId, SearchQuery, SortPolicy, Unavailable,
};

type Requests = Arc<Mutex<Vec<String>>>;

// Answers every request with `handler(path)` and records the raw request head
async fn spawn_responder<F>(handler: F) -> (String, Requests)
where
    F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests: Requests = Arc::new(Mutex::new(Vec::new()));
    let seen = requests.clone();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let seen = seen.clone();
            let handler = handler.clone();

            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }

                let head = String::from_utf8_lossy(&buf).to_string();
                let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                seen.lock().push(head);

                let (status, body) = handler(&path);
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    if status == 200 { "OK" } else { "Error" },
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{}/api/v1", addr), requests)
}

// A port nothing listens on
async fn dead_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/api/v1", addr)
}

fn client(base_urls: Vec<String>, timeout_ms: u64) -> HotelApiClient {
    HotelApiClient::new(ClientConfig {
        base_urls,
        timeout_ms,
        ..Default::default()
    })
    .unwrap()
}

fn query() -> SearchQuery {
    SearchQuery {
        star_filters: [5, 4].into_iter().collect(),
        sort: SortPolicy::PriceAsc,
        check_in: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        check_out: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
        ..SearchQuery::for_city("上海")
    }
}

const PAGE_BODY: &str = r#"{
    "code": 0,
    "message": "success",
    "data": {
        "list": [
            {"id": 31, "nameZh": "滨江酒店", "city": "上海", "star": 4, "rating": 4.2, "minPrice": "520.00"},
            {"id": 32, "nameZh": "静安酒店", "city": "上海", "star": 5, "rating": 4.9, "minPrice": 980}
        ],
        "pagination": {"page": 2, "pageSize": 10, "total": 12, "totalPages": 2}
    }
}"#;

#[tokio::test]
async fn test_search_skips_unreachable_candidate() {
    let (live, requests) = spawn_responder(|_| (200, PAGE_BODY.to_string())).await;
    let client = client(vec![dead_base_url().await, live], 2000);

    let page = client.fetch_page(&query(), 2, 10).await.unwrap();
    assert_eq!(page.page, 2);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.records.len(), 2);
    assert_eq!(page.records[0].min_price, Some(520));

    let requests = requests.lock();
    assert_eq!(requests.len(), 1);
    let head = &requests[0];
    assert!(head.starts_with("GET /api/v1/hotels?"), "{}", head);
    assert!(head.contains("city=%E4%B8%8A%E6%B5%B7"));
    assert!(head.contains("checkIn=2025-06-01"));
    assert!(head.contains("checkOut=2025-06-02"));
    assert!(head.contains("star=4%2C5"));
    assert!(head.contains("maxPrice=2000"));
    assert!(head.contains("page=2"));
    assert!(head.contains("pageSize=10"));
    assert!(head.contains("sort=price_asc"));
    assert!(!head.contains("keyword="));
    assert!(!head.contains("tags="));
    assert!(head.to_lowercase().contains("accept: application/json"));
}

#[tokio::test]
async fn test_error_code_moves_to_next_candidate() {
    let (broken, broken_requests) = spawn_responder(|_| {
        (500, r#"{"code": 500, "message": "服务器内部错误"}"#.to_string())
    })
    .await;
    let (healthy, _) = spawn_responder(|_| (200, PAGE_BODY.to_string())).await;

    let client = client(vec![broken.clone(), healthy], 2000);
    assert_eq!(client.fetch_page(&query(), 2, 10).await.unwrap().records.len(), 2);
    assert_eq!(broken_requests.lock().len(), 1);

    // Success status but a failure code is still a failure
    let (lying, _) = spawn_responder(|_| (200, r#"{"code": 1001, "data": {}}"#.to_string())).await;
    let client = self::client(vec![broken, lying], 2000);
    assert_eq!(client.fetch_page(&query(), 1, 10).await, Err(Unavailable));
}

#[tokio::test]
async fn test_all_candidates_down_is_unavailable() {
    let client = client(vec![dead_base_url().await, dead_base_url().await], 500);
    assert_eq!(client.fetch_page(&query(), 1, 6).await, Err(Unavailable));
    assert_eq!(client.fetch_detail(HotelId(1)).await, Err(Unavailable));
}

#[tokio::test]
async fn test_slow_candidate_times_out() {
    // Accepts connections and never answers
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let client = client(vec![format!("http://{}/api/v1", addr)], 200);
    let started = std::time::Instant::now();
    assert_eq!(client.fetch_page(&query(), 1, 6).await, Err(Unavailable));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_smart_sort_is_applied_to_the_page() {
    let (live, requests) = spawn_responder(|_| (200, PAGE_BODY.to_string())).await;
    let client = client(vec![live], 2000);
    let smart = SearchQuery {
        sort: SortPolicy::Smart,
        ..query()
    };

    let page = client.fetch_page(&smart, 2, 10).await.unwrap();
    let ids: Vec<i64> = page.records.iter().map(|h| h.id.0).collect();
    assert_eq!(ids, vec![32, 31]);
    assert!(!requests.lock()[0].contains("sort="));
}

#[tokio::test]
async fn test_detail_adopts_requested_id() {
    let (live, requests) = spawn_responder(|path| {
        if path == "/api/v1/hotels/7" {
            (
                200,
                r#"{"code": 0, "data": {"nameZh": "外滩酒店", "star": "5",
                    "rooms": [{"id": 1, "price": 1200}, {"id": 2, "price": "899.5"}]}}"#
                    .to_string(),
            )
        } else {
            (404, r#"{"code": 404, "message": "not found"}"#.to_string())
        }
    })
    .await;
    let client = client(vec![live], 2000);

    let hotel = client.fetch_detail(HotelId(7)).await.unwrap();
    assert_eq!(hotel.id, HotelId(7));
    assert_eq!(hotel.star, 5);
    assert_eq!(hotel.min_price, Some(899));
    assert_eq!(hotel.max_price, Some(1200));

    assert_eq!(client.fetch_detail(HotelId(8)).await, Err(Unavailable));
    assert_eq!(requests.lock().len(), 2);
}
