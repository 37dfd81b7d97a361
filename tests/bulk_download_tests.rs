//! 批量下载集成测试
//!
//! 使用脚本化的 HTTP 替身验证汇总、并发上限、幂等性和进度通知

use async_trait::async_trait;
use bldb_dl::tools::io_traits::{HttpClient, HttpResponse};
use bldb_dl::{
    BulkDownloader, DownloadError, DownloadJobConfig, DownloadProgress, DownloadSummary,
    ResourceLocator,
};
use bytes::Bytes;
use futures::stream::{self, Iter};
use reqwest::StatusCode;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::tempdir;

const BASE: &str = "http://x/";

// ==================== HTTP 替身 ====================

#[derive(Clone)]
enum Route {
    /// 始终返回这个 body
    Ok(&'static [u8]),
    /// 始终返回这个状态码
    Status(StatusCode),
    /// 前 n 次连接失败，之后返回 body
    Flaky(usize, &'static [u8]),
}

#[derive(Default)]
struct FakeSite {
    routes: HashMap<String, Route>,
    hits: Mutex<HashMap<String, usize>>,
    latency: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeSite {
    fn new(latency: Duration) -> Self {
        Self {
            latency,
            ..Default::default()
        }
    }

    fn route(mut self, identifier: &str, route: Route) -> Self {
        self.routes.insert(format!("{}{}", BASE, identifier), route);
        self
    }

    fn hits(&self, identifier: &str) -> usize {
        let url = format!("{}{}", BASE, identifier);
        self.hits.lock().unwrap().get(&url).copied().unwrap_or(0)
    }

    fn total_hits(&self) -> usize {
        self.hits.lock().unwrap().values().sum()
    }
}

struct FakeResponse {
    status: StatusCode,
    body: Bytes,
}

impl HttpResponse for FakeResponse {
    type BytesStream = Iter<std::vec::IntoIter<Result<Bytes, anyhow::Error>>>;

    fn status(&self) -> StatusCode {
        self.status
    }

    fn bytes_stream(self) -> Self::BytesStream {
        stream::iter(vec![Ok(self.body)])
    }
}

/// 共享同一个站点状态的客户端
#[derive(Clone)]
struct FakeClient(Arc<FakeSite>);

#[async_trait]
impl HttpClient for FakeClient {
    type Response = FakeResponse;

    async fn get(&self, url: &str) -> anyhow::Result<FakeResponse> {
        let site = &self.0;
        let hit = {
            let mut hits = site.hits.lock().unwrap();
            let count = hits.entry(url.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        let now = site.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        site.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(site.latency).await;
        site.in_flight.fetch_sub(1, Ordering::SeqCst);

        match site.routes.get(url) {
            Some(Route::Ok(body)) => Ok(FakeResponse {
                status: StatusCode::OK,
                body: Bytes::from_static(*body),
            }),
            Some(Route::Status(status)) => Ok(FakeResponse {
                status: *status,
                body: Bytes::new(),
            }),
            Some(Route::Flaky(failures, body)) => {
                if hit <= *failures {
                    anyhow::bail!("connection reset")
                }
                Ok(FakeResponse {
                    status: StatusCode::OK,
                    body: Bytes::from_static(*body),
                })
            }
            None => anyhow::bail!("no route for {}", url),
        }
    }
}

// ==================== 辅助函数 ====================

fn locators(ids: &[&str]) -> Vec<ResourceLocator> {
    ids.iter().map(|id| ResourceLocator::new(BASE, *id)).collect()
}

fn config(dir: &Path, workers: usize, attempts: u32) -> DownloadJobConfig {
    DownloadJobConfig::builder(dir)
        .concurrency(|c| c.worker_count(workers))
        .retry(|r| r.max_attempts(attempts))
        .build()
        .unwrap()
}

fn numbered(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{}{}.fasta", prefix, i)).collect()
}

fn site_with(ids: &[String], latency: Duration) -> FakeSite {
    ids.iter()
        .fold(FakeSite::new(latency), |site, id| site.route(id, Route::Ok(b">seq\nMKT\n")))
}

// ==================== 汇总测试 ====================

#[tokio::test]
async fn test_three_locators_one_failing() {
    let dir = tempdir().unwrap();
    let site = Arc::new(
        FakeSite::default()
            .route("a.fasta", Route::Ok(b">a\nAAA\n"))
            .route("b.fasta", Route::Status(StatusCode::INTERNAL_SERVER_ERROR))
            .route("c.fasta", Route::Ok(b">c\nCCC\n")),
    );

    let downloader = BulkDownloader::new(FakeClient(Arc::clone(&site)), config(dir.path(), 2, 1));
    let summary = downloader
        .download_all(locators(&["a.fasta", "b.fasta", "c.fasta"]))
        .await
        .unwrap();

    assert_eq!(
        summary,
        DownloadSummary {
            total: 3,
            succeeded: 2,
            failed_locators: vec!["b".to_string()],
        }
    );
    assert!(dir.path().join("a.fasta").exists());
    assert!(dir.path().join("c.fasta").exists());
    assert!(!dir.path().join("b.fasta").exists());
    assert_eq!(site.hits("b.fasta"), 1);
}

#[tokio::test]
async fn test_succeeded_plus_failed_equals_total() {
    let dir = tempdir().unwrap();
    let mut site = FakeSite::default();
    let ids = numbered("p", 25);
    for (i, id) in ids.iter().enumerate() {
        let route = match i % 5 {
            0 => Route::Status(StatusCode::NOT_FOUND),
            1 => Route::Flaky(1, b">p"),
            2 => Route::Flaky(5, b">p"),
            _ => Route::Ok(b">p"),
        };
        site = site.route(id, route);
    }
    let site = Arc::new(site);
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

    let downloader = BulkDownloader::new(FakeClient(Arc::clone(&site)), config(dir.path(), 4, 2));
    let summary = downloader.download_all(locators(&id_refs)).await.unwrap();

    assert_eq!(summary.total, 25);
    assert_eq!(summary.succeeded + summary.failed(), summary.total);
    // i % 5 == 0 和 i % 5 == 2 的资源在 2 次尝试内无法成功
    assert_eq!(summary.failed(), 10);

    let failed: HashSet<&str> = summary.failed_locators.iter().map(String::as_str).collect();
    assert!(failed.contains("p0"));
    assert!(failed.contains("p2"));
    assert!(!failed.contains("p1"));

    // 每个失败的资源恰好尝试了 max_attempts 次
    assert_eq!(site.hits("p0.fasta"), 2);
    assert_eq!(site.hits("p2.fasta"), 2);
    assert_eq!(site.hits("p1.fasta"), 2);
    assert_eq!(site.hits("p3.fasta"), 1);
}

#[tokio::test]
async fn test_empty_input_makes_no_requests() {
    let dir = tempdir().unwrap();
    let site = Arc::new(FakeSite::default());

    let downloader = BulkDownloader::new(FakeClient(Arc::clone(&site)), config(dir.path(), 8, 3));
    let summary = downloader.download_all(Vec::new()).await.unwrap();

    assert_eq!(summary.total, 0);
    assert_eq!(summary.succeeded, 0);
    assert!(summary.failed_locators.is_empty());
    assert_eq!(site.total_hits(), 0);
}

// ==================== 并发测试 ====================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_peak_requests_bounded_by_concurrency() {
    let dir = tempdir().unwrap();
    let ids = numbered("s", 24);
    let site = Arc::new(site_with(&ids, Duration::from_millis(15)));
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

    let downloader = BulkDownloader::new(FakeClient(Arc::clone(&site)), config(dir.path(), 3, 1));
    let summary = downloader.download_all(locators(&id_refs)).await.unwrap();

    assert!(summary.is_complete_success());
    assert!(site.peak.load(Ordering::SeqCst) <= 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_more_workers_finish_sooner() {
    let ids = numbered("t", 8);
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

    let run = |workers: usize| {
        let site = Arc::new(site_with(&ids, Duration::from_millis(50)));
        let locators = locators(&id_refs);
        async move {
            let dir = tempdir().unwrap();
            let downloader = BulkDownloader::new(FakeClient(site), config(dir.path(), workers, 1));
            let start = Instant::now();
            let summary = downloader.download_all(locators).await.unwrap();
            assert_eq!(summary.succeeded, 8);
            start.elapsed()
        }
    };

    let sequential = run(1).await;
    let parallel = run(4).await;

    assert!(sequential >= Duration::from_millis(400));
    assert!(parallel * 2 < sequential, "{:?} vs {:?}", parallel, sequential);
}

// ==================== 幂等性测试 ====================

#[tokio::test]
async fn test_second_run_produces_identical_files() {
    let dir = tempdir().unwrap();
    let ids = ["x.fasta", "y.fasta"];
    let site = Arc::new(
        FakeSite::default()
            .route("x.fasta", Route::Ok(b">x\nMKTAYIAK\n"))
            .route("y.fasta", Route::Ok(b">y\nMSIQHFRV\n")),
    );
    let downloader = BulkDownloader::new(FakeClient(Arc::clone(&site)), config(dir.path(), 2, 1));

    downloader.download_all(locators(&ids)).await.unwrap();
    let first: Vec<Vec<u8>> = ids
        .iter()
        .map(|id| std::fs::read(dir.path().join(id)).unwrap())
        .collect();

    let summary = downloader.download_all(locators(&ids)).await.unwrap();
    let second: Vec<Vec<u8>> = ids
        .iter()
        .map(|id| std::fs::read(dir.path().join(id)).unwrap())
        .collect();

    assert!(summary.is_complete_success());
    assert_eq!(first, second);

    let mut entries: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    entries.sort();
    assert_eq!(entries, vec!["x.fasta", "y.fasta"]);
}

// ==================== 进度测试 ====================

#[tokio::test]
async fn test_progress_counts_up_to_total_once() {
    let dir = tempdir().unwrap();
    let ids = numbered("r", 10);
    let site = Arc::new(
        site_with(&ids, Duration::from_millis(2))
            .route("r4.fasta", Route::Status(StatusCode::NOT_FOUND)),
    );
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

    let downloader = BulkDownloader::new(FakeClient(site), config(dir.path(), 3, 1));
    let mut handle = downloader.start(locators(&id_refs)).await.unwrap();

    let mut completed = Vec::new();
    let mut final_summary = None;
    while let Some(progress) = handle.progress_receiver().recv().await {
        match progress {
            DownloadProgress::Started { total, worker_count } => {
                assert_eq!(total, 10);
                assert_eq!(worker_count, 3);
            }
            DownloadProgress::ItemCompleted { completed: n, .. } => completed.push(n),
            DownloadProgress::Completed { summary, .. } => final_summary = Some(summary),
        }
    }
    let summary = handle.wait().await.unwrap();

    assert_eq!(completed, (1..=10).collect::<Vec<_>>());
    assert_eq!(completed.iter().filter(|&&n| n == 10).count(), 1);
    assert_eq!(final_summary, Some(summary.clone()));
    assert_eq!(summary.failed_locators, vec!["r4".to_string()]);
}

// ==================== 配置错误测试 ====================

#[tokio::test]
async fn test_destination_is_a_file() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"").unwrap();
    let site = Arc::new(FakeSite::default().route("a.fasta", Route::Ok(b">a")));

    let downloader = BulkDownloader::new(FakeClient(Arc::clone(&site)), config(&blocker, 2, 1));
    let result = downloader.download_all(locators(&["a.fasta"])).await;

    assert!(matches!(result, Err(DownloadError::Config(_))));
    assert_eq!(site.total_hits(), 0);
}

#[tokio::test]
async fn test_zero_workers_rejected_at_build() {
    let result = DownloadJobConfig::builder("out")
        .concurrency(|c| c.worker_count(0))
        .build();
    assert!(result.is_err());
}

#[tokio::test]
async fn test_missing_destination_is_created() {
    let dir = tempdir().unwrap();
    let nested = dir.path().join("a").join("b");
    let site = Arc::new(FakeSite::default().route("a.fasta", Route::Ok(b">a")));

    let downloader = BulkDownloader::new(FakeClient(site), config(&nested, 1, 1));
    let summary = downloader.download_all(locators(&["a.fasta"])).await.unwrap();

    assert_eq!(summary.succeeded, 1);
    assert!(nested.join("a.fasta").exists());
}

// ==================== 同名文件测试 ====================

fn staging_leftovers(dir: &Path) -> Vec<String> {
    let mut leftovers = Vec::new();
    for entry in std::fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        if entry.file_type().unwrap().is_dir() {
            leftovers.extend(staging_leftovers(&entry.path()));
        } else if entry.file_name().to_string_lossy().ends_with(".part") {
            leftovers.push(entry.path().display().to_string());
        }
    }
    leftovers
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_basename_in_different_directories() {
    let x_body: &'static [u8] = Box::leak(vec![b'x'; 64 * 1024].into_boxed_slice());
    let y_body: &'static [u8] = Box::leak(vec![b'y'; 64 * 1024].into_boxed_slice());

    for _ in 0..20 {
        let dir = tempdir().unwrap();
        let site = Arc::new(
            FakeSite::new(Duration::from_millis(2))
                .route("x/a.fasta", Route::Ok(x_body))
                .route("y/a.fasta", Route::Ok(y_body)),
        );

        let downloader = BulkDownloader::new(FakeClient(site), config(dir.path(), 2, 1));
        let summary = downloader
            .download_all(locators(&["x/a.fasta", "y/a.fasta"]))
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 2, "失败: {}", summary.failed_joined());
        assert_eq!(std::fs::read(dir.path().join("x/a.fasta")).unwrap(), x_body);
        assert_eq!(std::fs::read(dir.path().join("y/a.fasta")).unwrap(), y_body);
        assert!(!dir.path().join("a.fasta").exists());
        assert!(staging_leftovers(dir.path()).is_empty());
    }
}

#[tokio::test]
async fn test_colliding_identifiers_rejected_without_requests() {
    let dir = tempdir().unwrap();
    let site = Arc::new(FakeSite::default().route("a.fasta", Route::Ok(b">a")));

    let downloader = BulkDownloader::new(FakeClient(Arc::clone(&site)), config(dir.path(), 2, 1));
    let result = downloader
        .download_all(locators(&["a.fasta", "b.fasta", "a.fasta"]))
        .await;

    match result {
        Err(DownloadError::DuplicateDestination { first, second, .. }) => {
            assert_eq!(first, "a.fasta");
            assert_eq!(second, "a.fasta");
        }
        other => panic!("意外的结果: {:?}", other),
    }
    assert_eq!(site.total_hits(), 0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
