//! Subscription service integration tests.
//!
//! Drives the full stack (service -> cache -> client -> HTTP) against an
//! axum server on an ephemeral port, counting requests server-side.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use orgbill_api_client::{ApiClient, Auth};
use orgbill_core::models::PlanId;
use orgbill_core::AppError;
use orgbill_services::cache::{QueryOptions, QueryOutcome};
use orgbill_services::subscription::SubscriptionService;

fn subscription_payload(plan: &str) -> serde_json::Value {
    serde_json::json!({
        "billing_cycle_anchor": 1_700_000_000_i64,
        "current_period_start": 1_700_000_000_i64,
        "current_period_end": 1_702_592_000_i64,
        "next_invoice_at": 1_702_592_000_i64,
        "usage_billing_enabled": false,
        "plan": {"id": plan, "name": "Pro", "price": 25.0},
        "addons": [],
        "usage_fees": [],
        "payment_method_type": "none"
    })
}

#[derive(Clone)]
struct ServerState {
    requests: Arc<AtomicUsize>,
}

async fn slow_subscription(
    State(state): State<ServerState>,
    Path(_slug): Path<String>,
) -> impl IntoResponse {
    state.requests.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    Json(subscription_payload("pro"))
}

async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    addr
}

async fn spawn_counted_server() -> (SocketAddr, Arc<AtomicUsize>) {
    let requests = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route(
            "/organizations/{slug}/billing/subscription",
            get(slow_subscription),
        )
        .with_state(ServerState {
            requests: requests.clone(),
        });
    (spawn_server(router).await, requests)
}

fn service_for(addr: SocketAddr) -> SubscriptionService {
    let client = ApiClient::new(format!("http://{}", addr), Auth::Anonymous, 10).expect("client");
    SubscriptionService::new(client, 16, Duration::from_secs(60), 0)
}

#[tokio::test]
async fn concurrent_consumers_share_one_request() {
    let (addr, requests) = spawn_counted_server().await;
    let service = service_for(addr);
    let options = QueryOptions::default();

    let a = {
        let service = service.clone();
        let options = options.clone();
        tokio::spawn(async move {
            service
                .query_org_subscription(Some("acme"), &options)
                .await
        })
    };
    let b = {
        let service = service.clone();
        let options = options.clone();
        tokio::spawn(async move {
            service
                .query_org_subscription(Some("acme"), &options)
                .await
        })
    };

    let sub_a = a.await.unwrap().unwrap().ready().expect("ready");
    let sub_b = b.await.unwrap().unwrap().ready().expect("ready");

    assert_eq!(requests.load(Ordering::SeqCst), 1);
    assert_eq!(sub_a, sub_b);
    assert_eq!(sub_a.plan.id, PlanId::Pro);
}

#[tokio::test]
async fn repeated_queries_hit_the_cache() {
    let (addr, requests) = spawn_counted_server().await;
    let service = service_for(addr);
    let options = QueryOptions::default();

    for _ in 0..3 {
        let outcome = service
            .query_org_subscription(Some("acme"), &options)
            .await
            .unwrap();
        assert!(outcome.ready().is_some());
    }

    assert_eq!(requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_slug_disables_the_query() {
    let (addr, requests) = spawn_counted_server().await;
    let service = service_for(addr);

    let outcome = service
        .query_org_subscription(None, &QueryOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome, QueryOutcome::Disabled);
    assert_eq!(requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn caller_flag_disables_the_query() {
    let (addr, requests) = spawn_counted_server().await;
    let service = service_for(addr);
    let options = QueryOptions {
        enabled: false,
        ..QueryOptions::default()
    };

    let outcome = service
        .query_org_subscription(Some("acme"), &options)
        .await
        .unwrap();

    assert_eq!(outcome, QueryOutcome::Disabled);
    assert_eq!(requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn prefetch_without_slug_is_a_noop() {
    let (addr, requests) = spawn_counted_server().await;
    let service = service_for(addr);

    let trigger = service.prefetch_org_subscription(None);
    assert!(trigger.trigger().is_none());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn prefetch_warms_the_cache_for_later_queries() {
    let (addr, requests) = spawn_counted_server().await;
    let service = service_for(addr);

    let trigger = service.prefetch_org_subscription(Some("acme"));
    trigger.trigger().expect("warming task").await.unwrap();
    assert_eq!(requests.load(Ordering::SeqCst), 1);

    // Warmed entry serves both direct reads and queries.
    assert!(service.cached_org_subscription("acme").is_some());
    let outcome = service
        .query_org_subscription(Some("acme"), &QueryOptions::default())
        .await
        .unwrap();
    assert!(outcome.ready().is_some());
    assert_eq!(requests.load(Ordering::SeqCst), 1);

    // Re-triggering reuses the same fresh entry.
    trigger.trigger().expect("warming task").await.unwrap();
    assert_eq!(requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn invalidate_refetches_on_next_query() {
    let (addr, requests) = spawn_counted_server().await;
    let service = service_for(addr);
    let options = QueryOptions::default();

    service
        .query_org_subscription(Some("acme"), &options)
        .await
        .unwrap();
    service.invalidate_org_subscription("acme");
    service
        .query_org_subscription(Some("acme"), &options)
        .await
        .unwrap();

    assert_eq!(requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn server_error_reaches_the_caller_unwrapped() {
    let error_payload = serde_json::json!({"error": {"code": "org_suspended"}});
    let body = error_payload.clone();
    let router = Router::new().route(
        "/organizations/{slug}/billing/subscription",
        get(move || {
            let body = body.clone();
            async move { (StatusCode::FORBIDDEN, Json(body)) }
        }),
    );
    let addr = spawn_server(router).await;
    let service = service_for(addr);

    let err = service
        .query_org_subscription(Some("acme"), &QueryOptions::default())
        .await
        .unwrap_err();

    match &*err {
        AppError::Request { status, body } => {
            assert_eq!(*status, 403);
            assert_eq!(*body, error_payload);
        }
        other => panic!("expected Request error, got {:?}", other),
    }
}

#[tokio::test]
async fn distinct_slugs_fetch_independently() {
    let (addr, requests) = spawn_counted_server().await;
    let service = service_for(addr);
    let options = QueryOptions::default();

    service
        .query_org_subscription(Some("acme"), &options)
        .await
        .unwrap();
    service
        .query_org_subscription(Some("globex"), &options)
        .await
        .unwrap();

    assert_eq!(requests.load(Ordering::SeqCst), 2);
}
