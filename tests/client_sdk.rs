#![cfg(feature = "reqwest")]

use chrono::Duration;
use pastebin::{
    client::{ClientError, PasteClient},
    config::Config,
    handlers::AppState,
    routes,
    services::PasteService,
    store::MemoryStore,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

async fn spawn_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let config = Config {
        base_url: base_url.clone(),
        rate_limit_enabled: false,
        ..Config::default()
    };
    let store = Arc::new(MemoryStore::new(Duration::hours(72)));
    let service = Arc::new(PasteService::new(
        store,
        config.deny_list.clone(),
        &config.base_url,
    ));
    let app = routes::router(AppState::new(service, config));

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    base_url
}

#[tokio::test]
async fn create_and_get_through_the_client() {
    let base_url = spawn_server().await;
    let client = PasteClient::new(&base_url);

    let url = client.create(b"hello world").await.unwrap();
    assert!(url.starts_with(&base_url));
    assert_eq!(client.get(&url).await.unwrap(), b"hello world");

    let id = url.rsplit('/').next().unwrap();
    assert_eq!(client.get(id).await.unwrap(), b"hello world");
}

#[tokio::test]
async fn secure_pastes_have_long_ids() {
    let base_url = spawn_server().await;
    let client = PasteClient::new(&base_url);

    let url = client.create_secure(b"shh").await.unwrap();
    assert_eq!(url.rsplit('/').next().unwrap().len(), 32);
}

#[tokio::test]
async fn server_rejections_map_to_client_errors() {
    let base_url = spawn_server().await;
    let client = PasteClient::new(&base_url);

    assert!(matches!(
        client.get("zzzzzzz").await,
        Err(ClientError::NotFound)
    ));

    let phrase = Config::default().deny_list[0].clone();
    assert!(matches!(
        client.create(phrase.as_bytes()).await,
        Err(ClientError::Blacklisted)
    ));
}
