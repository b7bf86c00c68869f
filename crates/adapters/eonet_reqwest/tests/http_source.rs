use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Json;
use axum::Router;
use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use geosync_adapter_eonet::{EonetConfig, EonetSource};
use geosync_app::CancellationToken;
use geosync_app::fetch_engine::PaginatedFetcher;
use geosync_app::ports::{EventSource, PageRequest};
use geosync_domain::error::FetchError;
use geosync_domain::filter::FilterState;
use geosync_domain::query::{EventQuery, EventStatus};
use serde_json::{Value, json};

type Responder = fn(&str, Option<&str>) -> Response;

#[derive(Clone)]
struct Mock {
    addr: SocketAddr,
    respond: Responder,
    queries: Arc<Mutex<Vec<Option<String>>>>,
}

async fn events(State(mock): State<Mock>, RawQuery(query): RawQuery) -> Response {
    mock.queries.lock().unwrap().push(query.clone());
    (mock.respond)(&format!("http://{}", mock.addr), query.as_deref())
}

/// Serve `respond` on an ephemeral port; returns the events URL and the
/// recorded query strings.
async fn serve(respond: Responder) -> (String, Arc<Mutex<Vec<Option<String>>>>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let queries = Arc::new(Mutex::new(Vec::new()));
    let mock = Mock {
        addr,
        respond,
        queries: Arc::clone(&queries),
    };
    let app = Router::new().route("/events", get(events)).with_state(mock);
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    (format!("http://{addr}/events"), queries)
}

fn source(base_url: String) -> EonetSource {
    EonetSource::new(&EonetConfig {
        base_url,
        timeout_secs: 5,
        ..EonetConfig::default()
    })
    .unwrap()
}

fn query(categories: &[&str]) -> EventQuery {
    FilterState {
        start: "2024-01-01".parse().unwrap(),
        end: "2024-12-31".parse().unwrap(),
        categories: categories.iter().map(ToString::to_string).collect(),
        viewport_only: false,
        status: EventStatus::All,
        limit: None,
    }
    .canonicalize(None)
    .unwrap()
    .query
}

fn event(id: &str) -> Value {
    json!({
        "id": id,
        "title": format!("Event {id}"),
        "categories": [{ "id": "wildfires", "title": "Wildfires" }],
        "geometry": [{
            "date": "2024-06-01T00:00:00Z",
            "type": "Point",
            "coordinates": [-120.0, 38.0]
        }]
    })
}

fn two_pages_via_links(origin: &str, query: Option<&str>) -> Response {
    if query == Some("page=2") {
        Json(json!({ "events": [event("b1")] })).into_response()
    } else {
        Json(json!({
            "events": [event("a1"), event("a2")],
            "links": { "next": format!("{origin}/events?page=2") }
        }))
        .into_response()
    }
}

#[tokio::test]
async fn should_follow_links_next_across_pages() {
    let (base_url, queries) = serve(two_pages_via_links).await;
    let fetcher = PaginatedFetcher::new(source(base_url));

    let outcome = fetcher
        .fetch(&query(&["wildfires"]), &CancellationToken::new())
        .await
        .unwrap();

    let ids: Vec<_> = outcome.events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["a1", "a2", "b1"]);
    assert_eq!(outcome.pages, 2);

    let queries = queries.lock().unwrap().clone();
    assert_eq!(queries.len(), 2);
    let first = queries[0].as_deref().unwrap();
    assert!(first.contains("status=all"));
    assert!(first.contains("category=wildfires"));
    assert!(first.contains("limit=100"));
    assert!(!first.contains("bbox="));
    assert_eq!(queries[1].as_deref(), Some("page=2"));
}

fn next_in_link_object(origin: &str, query: Option<&str>) -> Response {
    if query == Some("cursor=xyz") {
        Json(json!({ "events": [event("b1")], "link": "ignored-self-url" })).into_response()
    } else {
        Json(json!({
            "events": [event("a1")],
            "link": { "next": format!("{origin}/events?cursor=xyz") }
        }))
        .into_response()
    }
}

#[tokio::test]
async fn should_follow_link_next_and_ignore_plain_link() {
    let (base_url, queries) = serve(next_in_link_object).await;
    let source = source(base_url);

    let first = source
        .fetch_page(PageRequest::First(query(&["wildfires"])))
        .await
        .unwrap();
    let next = first.next.clone().unwrap();
    let second = source.fetch_page(PageRequest::Next(next)).await.unwrap();

    assert_eq!(first.events[0].id, "a1");
    assert_eq!(second.events[0].id, "b1");
    assert_eq!(second.next, None);
    assert_eq!(queries.lock().unwrap()[1].as_deref(), Some("cursor=xyz"));
}

fn server_error(_: &str, _: Option<&str>) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
}

#[tokio::test]
async fn should_map_error_status_to_remote_fetch_error() {
    let (base_url, _) = serve(server_error).await;

    let result = source(base_url)
        .fetch_page(PageRequest::First(query(&["floods"])))
        .await;

    assert_eq!(result, Err(FetchError::RemoteFetch { status: 500 }));
}

fn malformed_body(_: &str, _: Option<&str>) -> Response {
    (StatusCode::OK, "not json").into_response()
}

#[tokio::test]
async fn should_map_malformed_body_to_transport_error() {
    let (base_url, _) = serve(malformed_body).await;

    let result = source(base_url)
        .fetch_page(PageRequest::First(query(&["floods"])))
        .await;

    assert!(matches!(result, Err(FetchError::Transport { .. })));
}

#[tokio::test]
async fn should_map_unreachable_host_to_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = source(format!("http://{addr}/events"))
        .fetch_page(PageRequest::First(query(&["floods"])))
        .await;

    assert!(matches!(result, Err(FetchError::Transport { .. })));
}

#[tokio::test]
async fn should_map_unparseable_next_link_to_transport_error() {
    let result = source("http://127.0.0.1:9/events".to_string())
        .fetch_page(PageRequest::Next("::not a url::".to_string()))
        .await;

    assert!(matches!(result, Err(FetchError::Transport { .. })));
}
