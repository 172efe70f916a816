//! End-to-end: feast-client against a live feast-server on a loopback port

use std::sync::Arc;
use std::time::Duration;

use feast_client::{
    AddItemRequest, CartApi, CartCache, CartSession, ClientConfig, ClientError, HttpClient,
    QuantitySynchronizer, RegisterRequest,
};
use feast_server::api::build_app;
use feast_server::auth::{JwtConfig, JwtService};
use feast_server::carts::CartStorage;
use feast_server::catalog::StaticCatalog;
use feast_server::{Config, ServerState};
use rust_decimal::Decimal;
use shared::CartsResponse;
use tokio::net::TcpListener;

async fn spawn_server() -> String {
    let mut config = Config::with_overrides("./target/test-data", 0).unwrap();
    config.jwt = JwtConfig::with_generated_secret();
    let storage = CartStorage::open_in_memory().unwrap();
    let jwt = Arc::new(JwtService::with_config(config.jwt.clone()));
    let state = ServerState::new(config, storage, Arc::new(StaticCatalog::open()), jwt);
    let app = build_app(&state).with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Register + login, returning an authenticated client
async fn signed_in(base_url: &str, email: &str) -> HttpClient {
    let config = ClientConfig::new(base_url).with_timeout(5);
    let anonymous = HttpClient::new(&config).unwrap();
    anonymous
        .register(&RegisterRequest {
            name: "Tester".into(),
            email: email.into(),
            password: "correct-horse".into(),
            phone_number: None,
        })
        .await
        .unwrap();
    let login = anonymous.login(email, "correct-horse").await.unwrap();
    assert_eq!(login.user.email, email);
    anonymous.with_token(login.token)
}

fn dish(id: &str, price: &str, quantity: u32) -> AddItemRequest {
    AddItemRequest {
        menu_item_id: id.into(),
        name: format!("Dish {id}"),
        price: price.parse().unwrap(),
        quantity,
    }
}

#[tokio::test]
async fn session_flow_against_live_server() {
    let base_url = spawn_server().await;
    let http = signed_in(&base_url, "ana@example.com").await;
    assert_eq!(http.me().await.unwrap().user.email, "ana@example.com");

    let api: Arc<dyn CartApi> = Arc::new(http.clone());
    let session = CartSession::new(api.clone(), CartCache::new());

    session.add_item("R1", dish("D1", "9.50", 1)).await.unwrap();
    let cart = session.add_item("R1", dish("D1", "9.50", 2)).await.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 3);
    let item_id = cart.items[0].id.clone();

    session.add_item("R2", dish("D7", "4", 1)).await.unwrap();
    session.refresh().await.unwrap();
    assert_eq!(session.cache().snapshot().carts.len(), 2);

    let sync = QuantitySynchronizer::new(api, session.cache().clone(), Duration::from_millis(50));
    sync.increase("R1", &item_id).unwrap();
    sync.increase("R1", &item_id).unwrap();
    assert_eq!(session.cache().item_quantity("R1", &item_id), Some(5));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(sync.pending_count(), 0);

    let server_cart = http
        .list_carts()
        .await
        .unwrap()
        .into_iter()
        .find(|c| c.restaurant_id() == "R1")
        .unwrap();
    assert_eq!(server_cart.items[0].quantity, 5);
    assert_eq!(server_cart.total_price, Decimal::new(4750, 2));

    let done = session.checkout("R1").await.unwrap();
    assert!(!done.is_active());
    assert!(session.cache().cart_for("R1").is_none());

    let history = http.cart_history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, done.id);

    // checked-out cart addressed by id is a conflict
    let err = http.checkout(&done.id).await.unwrap_err();
    assert!(matches!(err, ClientError::Conflict(_)), "{err:?}");

    let r2 = session.cache().cart_for("R2").unwrap();
    let cart = http.remove_item_anywhere(&r2.items[0].id).await.unwrap();
    assert!(cart.items.is_empty());
}

#[tokio::test]
async fn error_statuses_map_to_client_errors() {
    let base_url = spawn_server().await;

    let anonymous = HttpClient::new(&ClientConfig::new(&base_url)).unwrap();
    let err = anonymous.list_carts().await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized), "{err:?}");

    let http = signed_in(&base_url, "ben@example.com").await;
    let err = http.update_quantity("R404", "nope", 2).await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound(_)), "{err:?}");

    let err = http.add_item("R1", &dish("D1", "1", 0)).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)), "{err:?}");

    let err = http.login("ben@example.com", "wrong-password").await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized), "{err:?}");

    // a success body of the wrong shape
    let err = http.get::<CartsResponse>("/health").await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidResponse(_)), "{err:?}");
}
