use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::classifier;
use crate::http::{self, ClientConfig};
use crate::model::{Candidate, Finding, Response, ScanRequest, ScanState, WildcardFingerprint};
use crate::recursion;

pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;
pub type ResultCallback = Arc<dyn Fn(&Finding) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);
const PROGRESS_COUNT_STEP: u64 = 50;

pub struct Callbacks {
    pub on_progress: Option<ProgressCallback>,
    pub on_result: Option<ResultCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl Default for Callbacks {
    fn default() -> Self {
        Self {
            on_progress: None,
            on_result: None,
            on_error: None,
        }
    }
}

struct ProgressThrottle {
    last_fired: std::sync::Mutex<Instant>,
    completed_since: AtomicU64,
}

impl ProgressThrottle {
    fn new() -> Self {
        Self {
            last_fired: std::sync::Mutex::new(Instant::now()),
            completed_since: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> bool {
        let count = self.completed_since.fetch_add(1, Ordering::Relaxed) + 1;
        if count >= PROGRESS_COUNT_STEP {
            let mut last = self.last_fired.lock().unwrap();
            self.completed_since.store(0, Ordering::Relaxed);
            *last = Instant::now();
            return true;
        }
        let mut last = self.last_fired.lock().unwrap();
        if last.elapsed() >= PROGRESS_INTERVAL {
            self.completed_since.store(0, Ordering::Relaxed);
            *last = Instant::now();
            return true;
        }
        false
    }
}

// each worker checks cancellation, sleeps req.delay, issues the request,
// classifies it, and appends a deduped finding; callbacks run outside any lock
#[allow(clippy::too_many_arguments)]
pub async fn scan_root(
    client: reqwest::Client,
    client_cfg: ClientConfig,
    req: Arc<ScanRequest>,
    state: Arc<ScanState>,
    fingerprint: Arc<WildcardFingerprint>,
    root_url: String,
    depth: usize,
    candidates: Vec<Candidate>,
    callbacks: Arc<Callbacks>,
) {
    if candidates.is_empty() {
        return;
    }
    let total = candidates.len() as u64;
    let completed = Arc::new(AtomicU64::new(0));
    let thread_count = req.thread_count.max(1);
    let (tx, rx) = mpsc::channel::<Candidate>(2 * thread_count);
    let rx = Arc::new(tokio::sync::Mutex::new(rx));
    let throttle = Arc::new(ProgressThrottle::new());

    let mut workers = Vec::with_capacity(thread_count);
    for _ in 0..thread_count {
        let client = client.clone();
        let client_cfg = client_cfg.clone();
        let req = Arc::clone(&req);
        let state = Arc::clone(&state);
        let fingerprint = Arc::clone(&fingerprint);
        let root_url = root_url.clone();
        let rx = Arc::clone(&rx);
        let throttle = Arc::clone(&throttle);
        let callbacks = Arc::clone(&callbacks);
        let completed = Arc::clone(&completed);

        workers.push(tokio::spawn(async move {
            loop {
                if state.is_cancelled() {
                    break;
                }
                let candidate = {
                    let mut guard = rx.lock().await;
                    guard.recv().await
                };
                let Some(candidate) = candidate else { break };

                if state.is_cancelled() {
                    break;
                }
                if !req.delay.is_zero() {
                    tokio::time::sleep(req.delay).await;
                }

                let url = format!("{}/{}", root_url.trim_end_matches('/'), candidate.path);
                if !state.mark_visited(&url) {
                    continue;
                }

                let resp: Response = http::fetch(
                    &client,
                    &client_cfg,
                    &url,
                    reqwest::Method::GET,
                    &req.headers,
                    &state.cancelled,
                )
                .await;

                state.total_requests.fetch_add(1, Ordering::Relaxed);

                if let Some(err) = &resp.error {
                    state.errors.fetch_add(1, Ordering::Relaxed);
                    if let Some(cb) = &callbacks.on_error {
                        cb(&url, &err.to_string());
                    }
                } else if let Some(finding) =
                    classifier::classify(&req, &fingerprint, &root_url, depth, &candidate, &resp)
                {
                    if state.push_finding(finding.clone()) {
                        recursion::maybe_enqueue_root(
                            &state,
                            &finding,
                            req.recursive,
                            req.recursion_depth,
                        );
                        if let Some(cb) = &callbacks.on_result {
                            cb(&finding);
                        }
                    }
                }

                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if throttle.tick() {
                    if let Some(cb) = &callbacks.on_progress {
                        cb(done, total);
                    }
                }
            }
        }));
    }

    for candidate in candidates {
        if state.is_cancelled() {
            break;
        }
        if tx.send(candidate).await.is_err() {
            break;
        }
    }
    drop(tx);

    for worker in workers {
        let _ = worker.await;
    }
}
