//! Integration tests for the download pipeline.
//!
//! These tests drive export parsing, the worker and the engine together
//! against a mock HTTP server, and check what ends up on disk: media files,
//! expanded archives, the ledger and the error log.

use std::io::Write;
use std::sync::Arc;

use memories_core::ledger::{ERROR_LOG_FILE, LEDGER_FILE, now_timestamp};
use memories_core::{
    AssetId, DownloadEngine, DownloadRecord, DownloadTask, ErrorLog, FetchWorker, HttpClient,
    Ledger, NoopWriter, RunSummary, parse_export,
};
use tempfile::TempDir;
use wiremock::matchers::{body_string, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ==================== Helper Functions ====================

/// Builds a minimal export page with one table row and link per entry.
fn export_html(entries: &[(&str, &str, bool)]) -> String {
    let mut rows =
        String::from("<tr><th>Date</th><th>Media Type</th><th>Location</th><th></th></tr>");
    for (date, url, is_get) in entries {
        rows.push_str(&format!(
            "<tr><td>{date}</td><td>Image</td><td>Latitude, Longitude: 52.5, 13.4</td>\
             <td><a href=\"#\" onclick=\"downloadMemories('{url}', this, {is_get}); return false;\">Download</a></td></tr>"
        ));
    }
    format!(
        "<html><head><title>Memories</title></head><body>\
         <div class=\"leftpanel\"></div>\
         <div class=\"rightpanel\"><table><tbody>{rows}</tbody></table></div>\
         </body></html>"
    )
}

fn memory_url(server: &MockServer, mid: &str) -> String {
    format!("{}/dmd/memories?uid=u1&mid={mid}&ts=1700000000", server.uri())
}

/// Opens the stores under `dir` the way a fresh process would.
async fn open_worker(dir: &TempDir) -> Arc<FetchWorker> {
    let ledger = Ledger::load(dir.path().join(LEDGER_FILE)).await.unwrap();
    let errors = ErrorLog::load(dir.path().join(ERROR_LOG_FILE)).await.unwrap();
    Arc::new(FetchWorker::new(
        HttpClient::new(),
        dir.path().join("out"),
        Arc::new(ledger),
        Arc::new(errors),
        Arc::new(NoopWriter),
    ))
}

async fn run(dir: &TempDir, tasks: Vec<DownloadTask>, concurrency: usize) -> RunSummary {
    let worker = open_worker(dir).await;
    DownloadEngine::new(concurrency)
        .unwrap()
        .run(worker, tasks)
        .await
        .unwrap()
}

fn zip_bytes() -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("clip-main.mp4", options).unwrap();
        writer.write_all(b"main video").unwrap();
        writer.start_file("clip-overlay.png", options).unwrap();
        writer.write_all(b"overlay").unwrap();
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

fn jpeg() -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "image/jpeg")
        .set_body_bytes(b"jpeg bytes".to_vec())
}

// ==================== Tests ====================

/// An export row becomes a date-prefixed file and a persisted ledger entry.
#[tokio::test]
async fn test_export_to_disk_names_file_by_date_and_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dmd/memories"))
        .and(query_param("mid", "abc123"))
        .respond_with(jpeg())
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let url = memory_url(&server, "abc123");
    let index = parse_export(&export_html(&[("2023-05-01 10:00:00 UTC", &url, true)]));
    assert_eq!(index.links.len(), 1);

    let summary = run(&dir, index.tasks(), 2).await;
    assert_eq!(summary.downloaded, 1);
    assert_eq!(summary.failed, 0);

    let file = dir.path().join("out").join("20230501_100000_abc123.jpg");
    assert_eq!(std::fs::read(&file).unwrap(), b"jpeg bytes");

    let ledger = Ledger::load(dir.path().join(LEDGER_FILE)).await.unwrap();
    let record = ledger.get(&AssetId::from_raw("abc123")).await.unwrap();
    assert_eq!(record.filename, "20230501_100000_abc123.jpg");
    assert_eq!(record.url, url);
    assert_eq!(record.date.as_deref(), Some("2023-05-01 10:00:00 UTC"));
    assert_eq!(record.content_type.as_deref(), Some("image/jpeg"));
    assert!(!record.metadata_written);
}

/// A second run against the same ledger makes no requests at all.
#[tokio::test]
async fn test_rerun_skips_ledgered_assets_without_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(jpeg())
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let tasks = vec![
        DownloadTask::new(memory_url(&server, "one"), true, None, 0),
        DownloadTask::new(memory_url(&server, "two"), true, None, 1),
    ];

    let first = run(&dir, tasks.clone(), 2).await;
    assert_eq!(first.downloaded, 2);

    let second = run(&dir, tasks, 2).await;
    assert_eq!(second.downloaded, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(second.failed, 0);
}

/// One failing asset does not stop the others, and is retried next run.
#[tokio::test]
async fn test_failure_is_isolated_and_retried_on_next_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("mid", "bad"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(jpeg())
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let tasks = vec![
        DownloadTask::new(memory_url(&server, "good"), true, None, 0),
        DownloadTask::new(memory_url(&server, "bad"), true, None, 1),
    ];

    let first = run(&dir, tasks.clone(), 2).await;
    assert_eq!(first.downloaded, 1);
    assert_eq!(first.failed, 1);

    let ledger = Ledger::load(dir.path().join(LEDGER_FILE)).await.unwrap();
    assert!(ledger.contains(&AssetId::from_raw("good")).await);
    assert!(!ledger.contains(&AssetId::from_raw("bad")).await);

    let errors = ErrorLog::load(dir.path().join(ERROR_LOG_FILE)).await.unwrap();
    let failure = errors.get(&AssetId::from_raw("bad")).await.unwrap();
    assert_eq!(failure.index, 1);
    assert!(failure.error.contains("500"), "{}", failure.error);

    let second = run(&dir, tasks, 2).await;
    assert_eq!(second.skipped, 1);
    assert_eq!(second.downloaded, 1);
    assert_eq!(second.failed, 0);
}

/// Zip downloads are expanded into a folder and the archive removed.
#[tokio::test]
async fn test_zip_download_is_expanded_and_archive_removed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/zip")
                .set_body_bytes(zip_bytes()),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let task = DownloadTask::new(
        memory_url(&server, "zipped"),
        true,
        Some("2022-12-24 18:30:00 UTC".to_string()),
        0,
    );
    let summary = run(&dir, vec![task], 1).await;
    assert_eq!(summary.downloaded, 1);

    let out = dir.path().join("out");
    let folder = out.join("20221224_183000_zipped");
    assert!(!out.join("20221224_183000_zipped.zip").exists());
    assert!(folder.is_dir());
    assert_eq!(std::fs::read(folder.join("clip-main.mp4")).unwrap(), b"main video");
    assert!(folder.join("clip-overlay.png").exists());

    let ledger = Ledger::load(dir.path().join(LEDGER_FILE)).await.unwrap();
    let record = ledger.get(&AssetId::from_raw("zipped")).await.unwrap();
    assert_eq!(record.filename, "20221224_183000_zipped.zip");
}

/// POST assets send the query string as the form body.
#[tokio::test]
async fn test_post_asset_sends_query_as_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/dmd/memories"))
        .and(body_string("uid=u1&mid=posted&ts=1700000000"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "video/mp4")
                .set_body_bytes(b"video".to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let task = DownloadTask::new(memory_url(&server, "posted"), false, None, 0);
    let summary = run(&dir, vec![task], 1).await;
    assert_eq!(summary.downloaded, 1);
    assert!(dir.path().join("out").join("posted.mp4").exists());
}

/// Many concurrent completions all survive in the persisted ledger.
#[tokio::test]
async fn test_concurrent_downloads_all_persisted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(jpeg())
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let tasks: Vec<DownloadTask> = (0..25)
        .map(|i| DownloadTask::new(memory_url(&server, &format!("m{i}")), true, None, i))
        .collect();

    let summary = run(&dir, tasks, 8).await;
    assert_eq!(summary.downloaded, 25);

    let ledger = Ledger::load(dir.path().join(LEDGER_FILE)).await.unwrap();
    assert_eq!(ledger.len().await, 25);
    for record in ledger.snapshot().await.values() {
        assert!(dir.path().join("out").join(&record.filename).is_file());
    }
}

/// A partial run followed by a full run fetches every asset exactly once.
#[tokio::test]
async fn test_partial_run_then_full_run_fetches_each_asset_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(jpeg())
        .expect(6)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let tasks: Vec<DownloadTask> = (0..6)
        .map(|i| DownloadTask::new(memory_url(&server, &format!("p{i}")), true, None, i))
        .collect();

    let first = run(&dir, tasks[..3].to_vec(), 2).await;
    assert_eq!(first.downloaded, 3);
    let ledger = Ledger::load(dir.path().join(LEDGER_FILE)).await.unwrap();
    for record in ledger.snapshot().await.values() {
        assert!(dir.path().join("out").join(&record.filename).is_file());
    }

    let second = run(&dir, tasks, 3).await;
    assert_eq!(second.skipped, 3);
    assert_eq!(second.downloaded, 3);

    let ledger = Ledger::load(dir.path().join(LEDGER_FILE)).await.unwrap();
    assert_eq!(ledger.len().await, 6);
}

/// Concurrent upsert + persist calls never lose or tear a record.
#[tokio::test]
async fn test_concurrent_upsert_and_persist_keeps_every_record() {
    let dir = TempDir::new().unwrap();
    let ledger = Arc::new(Ledger::empty(dir.path().join(LEDGER_FILE)));

    let mut handles = Vec::new();
    for i in 0..32 {
        let ledger = Arc::clone(&ledger);
        handles.push(tokio::spawn(async move {
            let record = DownloadRecord {
                filename: format!("id{i}.jpg"),
                url: format!("https://example.com/?mid=id{i}"),
                date: None,
                content_type: Some("image/jpeg".to_string()),
                metadata_written: false,
                timestamp: now_timestamp(),
            };
            ledger
                .upsert_and_persist(AssetId::from_raw(format!("id{i}")), record)
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let reloaded = Ledger::load(dir.path().join(LEDGER_FILE)).await.unwrap();
    assert_eq!(reloaded.len().await, 32);
}

/// Identifiers do not depend on anything but the URL.
#[test]
fn test_asset_id_is_stable_for_urls_without_mid() {
    let url = "https://example.com/media/file?token=xyz";
    assert_eq!(AssetId::resolve(url), AssetId::resolve(url));
    assert_eq!(AssetId::resolve(url).as_str().len(), 64);
    assert_ne!(AssetId::resolve(url), AssetId::resolve("https://example.com/other"));
}
