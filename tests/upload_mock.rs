#![cfg(feature = "mock")]

use std::{
    io::Write,
    sync::{Arc, Mutex},
    time::Duration,
};

use serde_json::json;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;
use twttr::{
    Client, Config, Credentials, Error, MediaCategory, MetricsCallbacks, Method, MockTransport,
    RawResponse, ResolvedRequest, UploadParams, UploadSegmentMetrics,
};

const UPLOAD_URL: &str = "https://upload.twitter.com/1.1/media/upload.json";

fn media_file(ext: &str, bytes: &[u8]) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(&format!(".{ext}"))
        .tempfile()
        .expect("tempfile");
    file.write_all(bytes).expect("write media");
    file.flush().expect("flush media");
    file
}

fn client_with(mock: &MockTransport, chunk_size: usize) -> Client {
    Client::new(Config {
        credentials: Some(Credentials::user("ck", "cs", "at", "ats")),
        transport: Some(Arc::new(mock.clone())),
        chunk_size: Some(chunk_size),
        ..Default::default()
    })
    .expect("client creation should succeed")
}

fn field<'a>(request: &'a ResolvedRequest, name: &str) -> &'a str {
    request
        .form_field(name)
        .unwrap_or_else(|| panic!("missing form field {name}"))
}

fn init_ok(mock: MockTransport) -> MockTransport {
    mock.with_json(
        202,
        json!({ "media_id": 710511363345354753u64, "media_id_string": "710511363345354753" }),
    )
}

fn appended(mock: MockTransport, count: usize) -> MockTransport {
    (0..count).fold(mock, |m, _| m.with_response(RawResponse::new(204, "")))
}

#[tokio::test]
async fn uploads_in_sequential_segments() {
    let file = media_file("png", b"0123456789");
    let mock = appended(init_ok(MockTransport::new()), 3).with_json(
        201,
        json!({ "media_id_string": "710511363345354753", "size": 10 }),
    );

    let result = client_with(&mock, 4)
        .upload(UploadParams::new(file.path()), false)
        .await
        .expect("upload should succeed");
    assert_eq!(result["size"], 10);

    let requests = mock.requests();
    assert_eq!(requests.len(), 5);
    assert!(requests.iter().all(|r| r.url == UPLOAD_URL));
    assert!(requests.iter().all(|r| r.method == Method::Post));

    let init = &requests[0];
    assert_eq!(field(init, "command"), "INIT");
    assert_eq!(field(init, "total_bytes"), "10");
    assert_eq!(field(init, "media_type"), "image/png");
    assert_eq!(field(init, "media_category"), "tweet_image");
    assert_eq!(field(init, "shared"), "false");
    assert!(init.form_field("additional_owners").is_none());

    let appends = &requests[1..4];
    let indices: Vec<&str> = appends.iter().map(|r| field(r, "segment_index")).collect();
    assert_eq!(indices, vec!["0", "1", "2"]);
    let media: Vec<&str> = appends.iter().map(|r| field(r, "media")).collect();
    assert_eq!(media, vec!["MDEyMw==", "NDU2Nw==", "ODk="]);
    assert!(appends
        .iter()
        .all(|r| field(r, "media_id") == "710511363345354753"));

    assert_eq!(field(&requests[4], "command"), "FINALIZE");
}

#[tokio::test]
async fn init_carries_owners_sharing_and_explicit_category() {
    let file = media_file("mp4", &[0u8; 16]);
    let mock = appended(init_ok(MockTransport::new()), 1)
        .with_json(201, json!({ "media_id_string": "710511363345354753" }));

    let params = UploadParams::new(file.path())
        .with_category(MediaCategory::DmVideo)
        .with_additional_owner("783214")
        .with_additional_owner("6253282")
        .shared(true);
    client_with(&mock, 1024)
        .upload(params, false)
        .await
        .expect("upload should succeed");

    let init = &mock.requests()[0];
    assert_eq!(field(init, "media_type"), "video/mp4");
    assert_eq!(field(init, "media_category"), "dm_video");
    assert_eq!(field(init, "additional_owners"), "783214,6253282");
    assert_eq!(field(init, "shared"), "true");
}

#[tokio::test]
async fn empty_file_skips_append() {
    let file = media_file("gif", b"");
    let mock = init_ok(MockTransport::new())
        .with_json(201, json!({ "media_id_string": "710511363345354753" }));

    client_with(&mock, 4)
        .upload(UploadParams::new(file.path()), false)
        .await
        .expect("upload should succeed");

    let commands: Vec<String> = mock
        .requests()
        .iter()
        .map(|r| field(r, "command").to_string())
        .collect();
    assert_eq!(commands, vec!["INIT", "FINALIZE"]);
}

#[tokio::test(start_paused = true)]
async fn polls_status_until_processing_succeeds() {
    let file = media_file("mp4", &[1u8; 8]);
    let mock = appended(init_ok(MockTransport::new()), 1)
        .with_json(
            201,
            json!({
                "media_id_string": "710511363345354753",
                "processing_info": { "state": "pending", "check_after_secs": 5 }
            }),
        )
        .with_json(
            200,
            json!({
                "media_id_string": "710511363345354753",
                "processing_info": { "state": "in_progress", "check_after_secs": 0, "progress_percent": 50 }
            }),
        )
        .with_json(
            200,
            json!({
                "media_id_string": "710511363345354753",
                "processing_info": { "state": "succeeded", "progress_percent": 100 }
            }),
        );

    let started = tokio::time::Instant::now();
    let result = client_with(&mock, 1024)
        .upload(UploadParams::new(file.path()), false)
        .await
        .expect("upload should succeed");
    assert_eq!(result["processing_info"]["state"], "succeeded");
    assert!(started.elapsed() >= Duration::from_secs(6));

    let requests = mock.requests();
    assert_eq!(requests.len(), 5);
    for status in &requests[3..] {
        assert_eq!(status.method, Method::Get);
        assert!(status.url.starts_with(UPLOAD_URL));
        assert!(status.url.contains("command=STATUS"));
        assert!(status.url.contains("media_id=710511363345354753"));
    }
}

#[tokio::test(start_paused = true)]
async fn failed_processing_returns_payload() {
    let file = media_file("mp4", &[1u8; 8]);
    let mock = appended(init_ok(MockTransport::new()), 1)
        .with_json(
            201,
            json!({
                "media_id_string": "710511363345354753",
                "processing_info": { "state": "in_progress", "check_after_secs": 1 }
            }),
        )
        .with_json(
            200,
            json!({
                "media_id_string": "710511363345354753",
                "processing_info": {
                    "state": "failed",
                    "error": { "code": 1, "name": "InvalidMedia", "message": "Unsupported video format" }
                }
            }),
        );

    let err = client_with(&mock, 1024)
        .upload(UploadParams::new(file.path()), false)
        .await
        .expect_err("processing should fail");
    match err {
        Error::Processing { payload } => {
            assert_eq!(payload["processing_info"]["error"]["name"], "InvalidMedia");
        }
        other => panic!("expected processing error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn pending_then_failed_polls_status_exactly_once() {
    let file = media_file("mp4", &[1u8; 8]);
    let mock = appended(init_ok(MockTransport::new()), 1)
        .with_json(
            201,
            json!({
                "media_id_string": "710511363345354753",
                "processing_info": { "state": "pending", "check_after_secs": 2 }
            }),
        )
        .with_json(
            200,
            json!({
                "media_id_string": "710511363345354753",
                "processing_info": { "state": "failed", "error": { "code": 3, "name": "InvalidMedia" } }
            }),
        );

    let started = tokio::time::Instant::now();
    let err = client_with(&mock, 1024)
        .upload(UploadParams::new(file.path()), false)
        .await
        .expect_err("processing should fail");
    assert!(matches!(err, Error::Processing { .. }));
    assert!(started.elapsed() >= Duration::from_secs(2));

    let requests = mock.requests();
    assert_eq!(requests.len(), 4);
    let statuses: Vec<&ResolvedRequest> = requests
        .iter()
        .filter(|r| r.method == Method::Get && r.url.contains("command=STATUS"))
        .collect();
    assert_eq!(statuses.len(), 1);
    assert_eq!(requests[3].method, Method::Get);
}

#[tokio::test]
async fn failed_state_with_fractional_fields_is_not_success() {
    let file = media_file("mp4", &[1u8; 8]);
    let mock = appended(init_ok(MockTransport::new()), 1).with_json(
        201,
        json!({
            "media_id_string": "710511363345354753",
            "processing_info": {
                "state": "failed",
                "check_after_secs": 1.5,
                "error": { "code": 1, "name": "InvalidMedia", "message": "Unsupported video format" }
            }
        }),
    );

    let err = client_with(&mock, 1024)
        .upload(UploadParams::new(file.path()), false)
        .await
        .expect_err("failed state must reject");
    match err {
        Error::Processing { payload } => assert_eq!(payload["processing_info"]["state"], "failed"),
        other => panic!("expected processing error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn pending_with_fractional_progress_still_polls() {
    let file = media_file("mp4", &[1u8; 8]);
    let mock = appended(init_ok(MockTransport::new()), 1)
        .with_json(
            201,
            json!({
                "media_id_string": "710511363345354753",
                "processing_info": { "state": "pending", "check_after_secs": 5, "progress_percent": 12.5 }
            }),
        )
        .with_json(
            200,
            json!({
                "media_id_string": "710511363345354753",
                "processing_info": { "state": "failed" }
            }),
        );

    let err = client_with(&mock, 1024)
        .upload(UploadParams::new(file.path()), false)
        .await
        .expect_err("queued failure must be read");
    assert!(matches!(err, Error::Processing { .. }));
    assert_eq!(mock.requests().len(), 4);
    assert_eq!(mock.remaining(), 0);
}

#[tokio::test]
async fn processing_info_without_state_is_a_protocol_error() {
    let file = media_file("mp4", &[1u8; 8]);
    let mock = appended(init_ok(MockTransport::new()), 1).with_json(
        201,
        json!({
            "media_id_string": "710511363345354753",
            "processing_info": { "check_after_secs": 5 }
        }),
    );

    let err = client_with(&mock, 1024)
        .upload(UploadParams::new(file.path()), false)
        .await
        .expect_err("stateless processing_info must not succeed");
    assert!(matches!(err, Error::Protocol(_)));
    assert_eq!(mock.requests().len(), 3);
}

#[tokio::test]
async fn oversize_media_fails_before_any_request() {
    let file = media_file("gif", &vec![0u8; 15 * 1024 * 1024 + 1]);
    let mock = MockTransport::new();

    let err = client_with(&mock, 1024)
        .upload(UploadParams::new(file.path()), false)
        .await
        .expect_err("oversize gif should fail");
    match err {
        Error::Validation(validation) => assert_eq!(validation.message, "Media is over size limit"),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn init_without_media_id_is_a_protocol_error() {
    let file = media_file("png", b"abc");
    let mock = MockTransport::new().with_json(202, json!({ "expires_after_secs": 86400 }));

    let err = client_with(&mock, 1024)
        .upload(UploadParams::new(file.path()), false)
        .await
        .expect_err("missing media id should fail");
    assert!(matches!(err, Error::Protocol(_)));
    assert_eq!(mock.requests().len(), 1);
}

#[tokio::test]
async fn append_failure_stops_the_upload() {
    let file = media_file("png", b"0123456789");
    let mock = init_ok(MockTransport::new())
        .with_response(RawResponse::new(204, ""))
        .with_json(
            400,
            json!({ "errors": [{ "code": 324, "message": "Segments do not add up to provided total file size." }] }),
        );

    let err = client_with(&mock, 4)
        .upload(UploadParams::new(file.path()), false)
        .await
        .expect_err("append failure should stop the upload");
    match err {
        Error::Api(api) => assert_eq!(api.code, Some(324)),
        other => panic!("expected api error, got {other:?}"),
    }
    assert_eq!(mock.requests().len(), 3);
    assert_eq!(mock.remaining(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_status_polling() {
    let file = media_file("mp4", &[1u8; 8]);
    let mock = appended(init_ok(MockTransport::new()), 1).with_json(
        201,
        json!({
            "media_id_string": "710511363345354753",
            "processing_info": { "state": "pending", "check_after_secs": 30 }
        }),
    );
    let client = client_with(&mock, 1024);
    let token = CancellationToken::new();

    let (result, ()) = tokio::join!(
        client.upload_with_cancel(UploadParams::new(file.path()), false, token.clone()),
        async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            token.cancel();
        }
    );

    assert!(matches!(result, Err(Error::Cancelled)));
    // INIT, APPEND, FINALIZE; no STATUS was sent.
    assert_eq!(mock.requests().len(), 3);
}

#[tokio::test]
async fn segment_metrics_are_reported() {
    let file = media_file("jpg", b"abcdefghij");
    let mock = appended(init_ok(MockTransport::new()), 2)
        .with_json(201, json!({ "media_id_string": "710511363345354753" }));

    let seen: Arc<Mutex<Vec<UploadSegmentMetrics>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let client = Client::new(Config {
        credentials: Some(Credentials::user("ck", "cs", "at", "ats")),
        transport: Some(Arc::new(mock.clone())),
        chunk_size: Some(6),
        metrics: Some(MetricsCallbacks {
            http_request: None,
            upload_segment: Some(Arc::new(move |m| sink.lock().unwrap().push(m))),
        }),
        ..Default::default()
    })
    .expect("client creation should succeed");

    client
        .upload(UploadParams::new(file.path()), false)
        .await
        .expect("upload should succeed");

    let seen = seen.lock().unwrap();
    let summary: Vec<(u32, usize)> = seen.iter().map(|m| (m.segment_index, m.bytes)).collect();
    assert_eq!(summary, vec![(0, 6), (1, 4)]);
    assert!(seen.iter().all(|m| m.category == MediaCategory::TweetImage));
}
