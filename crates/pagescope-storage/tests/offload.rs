//! Integration tests for `BlobOffloader` against a `wiremock` media host.

use std::sync::Arc;

use bytes::Bytes;
use pagescope_scraper::MediaClient;
use pagescope_storage::{
    page_avatar_key, post_media_key, BlobOffloader, MediaOffloader, MemoryBlobStore, StorageError,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BLOB_BASE: &str = "https://media.example.com";

fn offloader(store: &Arc<MemoryBlobStore>, max_retries: u32) -> BlobOffloader {
    let media = MediaClient::new(5, "pagescope-test/0.1", max_retries, 0)
        .expect("failed to build media client");
    BlobOffloader::new(media, Arc::clone(store) as Arc<dyn pagescope_storage::BlobStore>)
}

#[tokio::test]
async fn offload_copies_bytes_and_content_type_to_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cdn/avatar.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "image/jpeg")
                .set_body_bytes(b"jpeg-bytes".to_vec()),
        )
        .mount(&server)
        .await;

    let store = Arc::new(MemoryBlobStore::new(BLOB_BASE));
    let key = page_avatar_key("acme").unwrap();
    let url = offloader(&store, 0)
        .offload(&format!("{}/cdn/avatar.jpg", server.uri()), &key)
        .await
        .expect("offload should succeed");

    assert_eq!(url, "https://media.example.com/pages/acme/profile.jpg");
    let blob = store.get(&key).expect("blob stored");
    assert_eq!(blob.data, Bytes::from_static(b"jpeg-bytes"));
    assert_eq!(blob.content_type, "image/jpeg");
}

#[tokio::test]
async fn offload_is_idempotent_per_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cdn/m0.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"m0".to_vec()))
        .expect(2)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryBlobStore::new(BLOB_BASE));
    let offloader = offloader(&store, 0);
    let key = post_media_key("acme", "p-1", 0).unwrap();
    let source = format!("{}/cdn/m0.jpg", server.uri());

    let first = offloader.offload(&source, &key).await.unwrap();
    let second = offloader.offload(&source, &key).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(store.keys(), vec![key.clone()]);
    assert_eq!(
        store.get(&key).unwrap().content_type,
        "application/octet-stream"
    );
}

#[tokio::test]
async fn offload_retries_transient_fetch_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cdn/flaky.jpg"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cdn/flaky.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryBlobStore::new(BLOB_BASE));
    let result = offloader(&store, 2)
        .offload(
            &format!("{}/cdn/flaky.jpg", server.uri()),
            "pages/acme/posts/p-1/media_0.jpg",
        )
        .await;

    assert!(result.is_ok(), "expected success after one 503: {result:?}");
}

#[tokio::test]
async fn offload_surfaces_missing_source_as_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cdn/gone.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryBlobStore::new(BLOB_BASE));
    let result = offloader(&store, 3)
        .offload(
            &format!("{}/cdn/gone.jpg", server.uri()),
            "pages/acme/profile.jpg",
        )
        .await;

    assert!(matches!(result, Err(StorageError::Fetch(_))));
    assert!(store.keys().is_empty());
}

#[tokio::test]
async fn offload_rejects_invalid_key_before_fetching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryBlobStore::new(BLOB_BASE));
    let result = offloader(&store, 0)
        .offload(&format!("{}/cdn/a.jpg", server.uri()), "../outside.jpg")
        .await;

    assert!(matches!(result, Err(StorageError::InvalidKey { .. })));
}
