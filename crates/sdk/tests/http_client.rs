//! SDK against a live node router and a stand-in pinning service.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use drive_registry::{ContentRegistry, RegistryClient, RegistryConfig, RegistryError};
use drive_rpc::{build_router, AppState};
use drive_sdk::{
    AdapterError, ContentPinner, GalleryAdapter, GalleryView, HttpRegistryClient, MemoryPinner,
    PinataPinner, UploadFile,
};
use drive_types::Address;
use ed25519_dalek::SigningKey;
use serde_json::{json, Value};

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn spawn_node(config: RegistryConfig) -> String {
    let registry = Arc::new(ContentRegistry::in_memory(config));
    let addr = serve(build_router(Arc::new(AppState::new(registry, "sdk-test")))).await;
    format!("http://{addr}/")
}

fn client(url: &str, seed: u8) -> HttpRegistryClient {
    HttpRegistryClient::new(url)
        .unwrap()
        .with_signing_key(SigningKey::from_bytes(&[seed; 32]))
}

#[tokio::test]
async fn remote_registry_round_trip() {
    let url = spawn_node(RegistryConfig::default()).await;
    let owner = client(&url, 0xAA);
    let viewer = client(&url, 0xBB);
    let owner_addr = owner.caller().unwrap();
    let viewer_addr = viewer.caller().unwrap();

    let receipt = owner.publish("storage://hash1").await.unwrap();
    assert_eq!(receipt.owner, owner_addr);
    assert_eq!(receipt.index, 0);

    let err = viewer.list(&owner_addr).await.unwrap_err();
    assert_eq!(
        err,
        RegistryError::PermissionDenied {
            owner: owner_addr,
            caller: viewer_addr,
        }
    );

    let grant = owner.grant_access(&viewer_addr).await.unwrap();
    assert!(grant.inserted);
    owner.publish("storage://hash2").await.unwrap();

    let listed: Vec<String> = viewer
        .list(&owner_addr)
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.into_string())
        .collect();
    assert_eq!(listed, vec!["storage://hash1", "storage://hash2"]);
    assert_eq!(owner.grantees().await.unwrap(), vec![viewer_addr]);
}

#[tokio::test]
async fn remote_errors_keep_their_kind() {
    let url = spawn_node(RegistryConfig {
        max_entries_per_owner: Some(1),
        ..Default::default()
    })
    .await;
    let me = client(&url, 3);

    assert!(matches!(
        me.publish("   ").await,
        Err(RegistryError::InvalidInput(_))
    ));
    me.publish("ipfs://one").await.unwrap();
    assert_eq!(
        me.publish("ipfs://two").await.unwrap_err(),
        RegistryError::QuotaExceeded {
            owner: me.caller().unwrap(),
            limit: 1,
        }
    );
}

#[tokio::test]
async fn unreachable_node_is_retryable() {
    // Bind and drop to get a port nobody listens on.
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let me = client(&format!("http://{addr}/"), 1);

    let err = me.list(&Address::from_bytes([2; 32])).await.unwrap_err();
    assert!(err.is_retryable(), "got {err:?}");

    let adapter = GalleryAdapter::new(Arc::new(me), Arc::new(MemoryPinner::new()));
    assert!(matches!(
        adapter.view(None).await.unwrap(),
        GalleryView::Retry { .. }
    ));
}

#[tokio::test]
async fn adapter_over_http() {
    let url = spawn_node(RegistryConfig::default()).await;
    let owner = client(&url, 0x10);
    let owner_addr = owner.caller().unwrap();
    let adapter = GalleryAdapter::new(Arc::new(owner), Arc::new(MemoryPinner::new()))
        .with_gateway("https://gw.example");

    let outcome = adapter
        .upload(UploadFile::new("a.jpg", "image/jpeg", vec![1, 2, 3]))
        .await
        .unwrap();
    let view = adapter.view(None).await.unwrap();
    assert_eq!(
        view,
        GalleryView::Images {
            owner: owner_addr,
            uris: vec![outcome.content],
        }
    );
}

fn fake_pinata(response: Value, status: StatusCode) -> Router {
    Router::new().route(
        "/pinning/pinFileToIPFS",
        post(move |headers: HeaderMap| {
            let response = response.clone();
            async move {
                let authorized = headers.get("pinata_api_key").is_some_and(|v| v == "key")
                    && headers
                        .get("pinata_secret_api_key")
                        .is_some_and(|v| v == "secret");
                if !authorized {
                    return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad keys"})));
                }
                (status, Json(response))
            }
        }),
    )
}

#[tokio::test]
async fn pinata_pinner_returns_ipfs_uri() {
    let addr = serve(fake_pinata(json!({"IpfsHash": "QmTestHash"}), StatusCode::OK)).await;
    let pinner = PinataPinner::with_endpoint(format!("http://{addr}"), "key", "secret").unwrap();

    let uri = pinner
        .pin(&UploadFile::new("cat.png", "image/png", b"pixels".to_vec()))
        .await
        .unwrap();
    assert_eq!(uri, "ipfs://QmTestHash");
}

#[tokio::test]
async fn pinata_without_hash_is_invalid_input() {
    let addr = serve(fake_pinata(json!({"PinSize": 10}), StatusCode::OK)).await;
    let pinner = PinataPinner::with_endpoint(format!("http://{addr}"), "key", "secret").unwrap();

    let err = pinner
        .pin(&UploadFile::new("cat.png", "image/png", b"pixels".to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::InvalidInput(_)));
}

#[tokio::test]
async fn pinata_rejection_surfaces_status() {
    let addr = serve(fake_pinata(json!({}), StatusCode::OK)).await;
    let pinner = PinataPinner::with_endpoint(format!("http://{addr}"), "key", "wrong").unwrap();

    let err = pinner
        .pin(&UploadFile::new("cat.png", "image/png", b"pixels".to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::Pinning { status: 401, .. }));
}
