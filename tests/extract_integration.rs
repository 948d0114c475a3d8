//! Integration tests for both extraction strategies.
//!
//! The direct strategy fetches watch pages from wiremock. The browser
//! strategy talks to a wiremock server impersonating a WebDriver endpoint,
//! which also serves the media file whose size is probed.

use std::time::Duration;

use serde_json::{Value, json};
use tempfile::TempDir;
use tikfetch_core::extract::browser::selectors;
use tikfetch_core::extract::{
    BrowserExtractor, DelayGate, DirectExtractor, ExtractError, Extractor, Locator,
    WebDriverBrowser, split_outcomes,
};
use tikfetch_core::{DuplicateCheck, Session, SessionKind, Video};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::socket_guard::{
    should_skip_socket_bound_test, socket_skip_return, start_mock_server_or_skip,
};
use support::{BASE_ID, layout_in};

macro_rules! require_mock_server {
    () => {{
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return socket_skip_return();
        };
        mock_server
    }};
}

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

// ==================== Direct strategy ====================

fn watch_page(data: &Value) -> String {
    format!(
        r#"<!doctype html><html><body><script id="__UNIVERSAL_DATA_FOR_REHYDRATION__" type="application/json">{data}</script></body></html>"#
    )
}

fn page_data(username: &str, variants: Value) -> Value {
    json!({
        "__DEFAULT_SCOPE__": {
            "webapp.video-detail": {
                "itemInfo": {
                    "itemStruct": {
                        "author": { "uniqueId": username },
                        "video": { "bitrateInfo": variants }
                    }
                }
            }
        }
    })
}

fn variant(width: u64, height: u64, bitrate: u64, size: &str, url: &str) -> Value {
    json!({
        "Bitrate": bitrate,
        "PlayAddr": {
            "Width": width,
            "Height": height,
            "DataSize": size,
            "UrlList": ["https://cdn.example/watermarked", url]
        }
    })
}

async fn mount_page(server: &MockServer, id: u64, html: String) {
    Mock::given(method("GET"))
        .and(path(format!("/@alice/video/{id}")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(html),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_direct_batch_isolates_structure_mismatch() {
    let server = require_mock_server!();
    let ids = [BASE_ID + 1, BASE_ID + 2, BASE_ID + 3];

    mount_page(
        &server,
        ids[0],
        watch_page(&page_data(
            "alice",
            json!([
                variant(720, 1280, 900_000, "1000", "https://cdn.example/720p"),
                variant(1080, 1920, 800_000, "2000", "https://cdn.example/1080p"),
            ]),
        )),
    )
    .await;
    // Page layout changed: no bitrateInfo.
    let mut broken = page_data("alice", json!([]));
    broken["__DEFAULT_SCOPE__"]["webapp.video-detail"]["itemInfo"]["itemStruct"]["video"] =
        json!({});
    mount_page(&server, ids[1], watch_page(&broken)).await;
    mount_page(
        &server,
        ids[2],
        watch_page(&page_data(
            "alice",
            json!([variant(1080, 1920, 500_000, "3000", "https://cdn.example/third")]),
        )),
    )
    .await;

    let tmp = TempDir::new().unwrap();
    let videos = ids
        .iter()
        .map(|id| Video::new(format!("{}/@alice/video/{id}", server.uri()), *id))
        .collect::<Vec<_>>();

    let session = Session::open(SessionKind::Blocking, None).await.unwrap();
    let Session::Blocking(client) = &session else {
        panic!("expected a blocking session");
    };
    let extractor = DirectExtractor::new(
        client.clone(),
        layout_in(tmp.path(), DuplicateCheck::Lazy),
        DelayGate::disabled(),
    );
    let outcomes = extractor.process_batch(videos).await;
    drop(extractor);
    session.close().await;

    assert_eq!(outcomes.len(), 3);
    let first = outcomes[0].as_ref().unwrap();
    assert_eq!(first.id(), ids[0]);
    assert_eq!(first.download_address(), Some("https://cdn.example/1080p"));
    assert_eq!(first.byte_size(), 2000);
    assert_eq!(first.username(), Some("alice"));
    assert_eq!(
        first.output_path().unwrap(),
        tmp.path().join("alice").join(format!("{}.mp4", ids[0]))
    );

    let failure = outcomes[1].as_ref().unwrap_err();
    assert_eq!(failure.video.id(), ids[1]);
    match &failure.error {
        ExtractError::StructureMismatch { path, .. } => assert!(path.ends_with("bitrateInfo")),
        other => panic!("expected StructureMismatch, got {other:?}"),
    }

    assert_eq!(outcomes[2].as_ref().unwrap().byte_size(), 3000);

    let (extracted, failed) = split_outcomes(outcomes);
    assert_eq!(extracted.len(), 2);
    assert_eq!(failed.len(), 1);
}

#[tokio::test]
async fn test_direct_page_without_embedded_data() {
    let server = require_mock_server!();
    mount_page(&server, BASE_ID, "<html><body>captcha</body></html>".to_string()).await;

    let tmp = TempDir::new().unwrap();
    let session = Session::open(SessionKind::Blocking, None).await.unwrap();
    let Session::Blocking(client) = &session else {
        panic!("expected a blocking session");
    };
    let extractor = DirectExtractor::new(
        client.clone(),
        layout_in(tmp.path(), DuplicateCheck::Lazy),
        DelayGate::disabled(),
    );
    let mut outcomes = extractor
        .process_batch(vec![Video::new(
            format!("{}/@alice/video/{BASE_ID}", server.uri()),
            BASE_ID,
        )])
        .await;
    drop(extractor);
    session.close().await;

    let failure = outcomes.pop().unwrap().unwrap_err();
    assert!(matches!(failure.error, ExtractError::SourceDataMissing { .. }));
}

// ==================== Browser strategy over WebDriver ====================

fn value(v: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "value": v }))
}

fn element_refs(ids: &[&str]) -> Value {
    Value::Array(ids.iter().map(|id| json!({ ELEMENT_KEY: id })).collect())
}

async fn mount_elements(server: &MockServer, locator: &Locator, ids: &[&str]) {
    Mock::given(method("POST"))
        .and(path("/session/s1/elements"))
        .and(body_partial_json(
            json!({ "using": locator.strategy(), "value": locator.value() }),
        ))
        .respond_with(value(element_refs(ids)))
        .mount(server)
        .await;
}

async fn mount_element_get(server: &MockServer, suffix: &str, v: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/session/s1/element/{suffix}")))
        .respond_with(value(v))
        .mount(server)
        .await;
}

async fn mount_webdriver_basics(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(value(json!({ "ready": true, "message": "ready" })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(value(json!({ "sessionId": "s1", "capabilities": {} })))
        .mount(server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/session/s1"))
        .respond_with(value(Value::Null))
        .expect(1)
        .mount(server)
        .await;
    // Any other element lookup finds nothing.
    Mock::given(method("POST"))
        .and(path("/session/s1/elements"))
        .respond_with(value(json!([])))
        .with_priority(10)
        .mount(server)
        .await;
    // Navigation, clear, send keys and click all succeed.
    Mock::given(method("POST"))
        .respond_with(value(Value::Null))
        .with_priority(20)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_browser_extractor_reads_link_and_username() {
    let server = require_mock_server!();
    mount_webdriver_basics(&server).await;

    mount_elements(&server, &selectors::LINK_INPUT, &["input"]).await;
    mount_elements(&server, &selectors::SUBMIT_BUTTON, &["submit"]).await;
    mount_elements(&server, &selectors::DOWNLOAD_LINK, &["link"]).await;
    mount_elements(&server, &selectors::HEADINGS, &["h1", "h2", "h3"]).await;
    mount_element_get(&server, "link/displayed", json!(true)).await;
    let media_url = format!("{}/media/original.mp4", server.uri());
    mount_element_get(&server, "link/attribute/href", json!(media_url)).await;
    mount_element_get(&server, "h1/text", json!("Original quality")).await;
    mount_element_get(&server, "h2/text", json!("1080p")).await;
    mount_element_get(&server, "h3/text", json!(" @bob ")).await;

    Mock::given(method("GET"))
        .and(path("/media/original.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![9u8; 2048]))
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let session = Session::open(SessionKind::Async, None).await.unwrap();
    let Session::Async(client) = &session else {
        panic!("expected an async session");
    };
    let mut extractor = BrowserExtractor::new(
        WebDriverBrowser::attach(server.uri(), tmp.path().join("profile")),
        client.clone(),
        layout_in(tmp.path(), DuplicateCheck::Strict),
        DelayGate::disabled(),
    )
    .with_result_timeout(Duration::from_secs(5));

    extractor.initialize().await.unwrap();
    let id = BASE_ID + 9;
    let mut outcomes = extractor
        .process_batch(vec![Video::new(
            format!("https://vt.tiktok.com/ZS{id}/"),
            id,
        )])
        .await;
    extractor.cleanup().await;
    session.close().await;

    let video = outcomes.pop().unwrap().unwrap();
    assert_eq!(video.download_address(), Some(media_url.as_str()));
    assert_eq!(video.byte_size(), 2048);
    assert_eq!(video.username(), Some("bob"));
    assert_eq!(
        video.output_path().unwrap(),
        tmp.path().join("bob").join(format!("{id}.mp4"))
    );
}

#[tokio::test]
async fn test_browser_ignores_error_text_in_page_wrapper() {
    let server = require_mock_server!();
    mount_webdriver_basics(&server).await;

    // Any div containing "error" anywhere, scripts included, matches the
    // outermost page wrapper.
    let wrapper = Locator::XPath("//div[contains(translate(., 'ERROR', 'error'), 'error')]");
    mount_elements(&server, &wrapper, &["wrapper"]).await;
    mount_element_get(&server, "wrapper/displayed", json!(true)).await;

    mount_elements(&server, &selectors::LINK_INPUT, &["input"]).await;
    mount_elements(&server, &selectors::SUBMIT_BUTTON, &["submit"]).await;
    mount_elements(&server, &selectors::DOWNLOAD_LINK, &["link"]).await;
    mount_elements(&server, &selectors::HEADINGS, &["h1", "h2", "h3"]).await;
    mount_element_get(&server, "link/displayed", json!(true)).await;
    let media_url = format!("{}/media/wrapped.mp4", server.uri());
    mount_element_get(&server, "link/attribute/href", json!(media_url)).await;
    mount_element_get(&server, "h1/text", json!("Original quality")).await;
    mount_element_get(&server, "h2/text", json!("720p")).await;
    mount_element_get(&server, "h3/text", json!("dana")).await;
    Mock::given(method("GET"))
        .and(path("/media/wrapped.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 512]))
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let mut extractor = BrowserExtractor::new(
        WebDriverBrowser::attach(server.uri(), tmp.path().join("profile")),
        reqwest::Client::new(),
        layout_in(tmp.path(), DuplicateCheck::Lazy),
        DelayGate::disabled(),
    )
    .with_result_timeout(Duration::from_secs(5));

    extractor.initialize().await.unwrap();
    let id = BASE_ID + 11;
    let mut outcomes = extractor
        .process_batch(vec![Video::new(id.to_string(), id)])
        .await;
    extractor.cleanup().await;

    let video = outcomes.pop().unwrap().unwrap();
    assert_eq!(video.download_address(), Some(media_url.as_str()));
    assert_eq!(video.username(), Some("dana"));
}

#[tokio::test]
async fn test_browser_parse_error_banner_fails_item() {
    let server = require_mock_server!();
    mount_webdriver_basics(&server).await;
    mount_elements(&server, &selectors::LINK_INPUT, &["input"]).await;
    mount_elements(&server, &selectors::SUBMIT_BUTTON, &["submit"]).await;
    mount_elements(&server, &selectors::PARSE_ERROR, &["banner"]).await;
    mount_element_get(&server, "banner/displayed", json!(true)).await;

    let tmp = TempDir::new().unwrap();
    let mut extractor = BrowserExtractor::new(
        WebDriverBrowser::attach(server.uri(), tmp.path().join("profile")),
        reqwest::Client::new(),
        layout_in(tmp.path(), DuplicateCheck::Lazy),
        DelayGate::disabled(),
    )
    .with_result_timeout(Duration::from_secs(5));

    extractor.initialize().await.unwrap();
    let mut outcomes = extractor
        .process_batch(vec![Video::new(BASE_ID.to_string(), BASE_ID)])
        .await;
    extractor.cleanup().await;

    let failure = outcomes.pop().unwrap().unwrap_err();
    assert!(matches!(failure.error, ExtractError::UrlParsingFailure { .. }));
}

#[tokio::test]
async fn test_missing_chrome_is_reported_as_runtime_dependency() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(value(json!({ "ready": true })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "value": {
                "error": "session not created",
                "message": "session not created: unknown error: cannot find Chrome binary"
            }
        })))
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let mut extractor = BrowserExtractor::new(
        WebDriverBrowser::attach(server.uri(), tmp.path()),
        reqwest::Client::new(),
        layout_in(tmp.path(), DuplicateCheck::Lazy),
        DelayGate::disabled(),
    );

    let error = extractor.initialize().await.unwrap_err();
    extractor.cleanup().await;
    assert!(matches!(
        &error,
        ExtractError::MissingRuntimeDependency { dependency } if dependency == "Google Chrome"
    ));
    assert!(error.is_fatal());
}

#[tokio::test]
async fn test_missing_driver_program_is_reported_as_runtime_dependency() {
    if should_skip_socket_bound_test() {
        return;
    }
    let tmp = TempDir::new().unwrap();
    let mut extractor = BrowserExtractor::new(
        WebDriverBrowser::new(tmp.path()).with_driver_program(tmp.path().join("no-such-driver")),
        reqwest::Client::new(),
        layout_in(tmp.path(), DuplicateCheck::Lazy),
        DelayGate::disabled(),
    );

    let error = extractor.initialize().await.unwrap_err();
    extractor.cleanup().await;
    assert!(matches!(error, ExtractError::MissingRuntimeDependency { .. }));
}
