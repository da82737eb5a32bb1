use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::time::Instant;

use crate::candidates::{self, CandidatesError};
use crate::engine::{self, Callbacks, ErrorCallback, ProgressCallback, ResultCallback};
use crate::http::{self, ClientBuildError, ClientConfig};
use crate::model::{ScanRequest, ScanResponse, ScanState, Statistics, WildcardFingerprint};
use crate::recursion;
use crate::wildcard;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid scan request: {0}")]
    InvalidRequest(String),

    #[error("wordlist could not be read: {0}")]
    WordlistUnreadable(#[from] CandidatesError),

    #[error("failed to build HTTP client: {0}")]
    HttpClientBuild(#[from] ClientBuildError),

    #[error("internal error: {0}")]
    Internal(String),
}

fn validate(req: &ScanRequest) -> Result<(), SessionError> {
    if req.base_url.trim().is_empty() {
        return Err(SessionError::InvalidRequest("base_url must not be empty".into()));
    }
    if reqwest::Url::parse(&req.base_url).is_err() {
        return Err(SessionError::InvalidRequest(format!(
            "base_url '{}' is not a valid URL",
            req.base_url
        )));
    }
    if req.thread_count == 0 {
        return Err(SessionError::InvalidRequest("thread_count must be >= 1".into()));
    }
    if req.timeout.is_zero() {
        return Err(SessionError::InvalidRequest("timeout must be > 0".into()));
    }
    if req.wordlist.is_empty() && req.additional_wordlists.iter().all(|w| w.is_empty()) {
        return Err(SessionError::InvalidRequest(
            "at least one non-empty wordlist is required".into(),
        ));
    }
    Ok(())
}

pub struct Session {
    req: Arc<ScanRequest>,
    state: Arc<ScanState>,
    on_progress: Option<ProgressCallback>,
    on_result: Option<ResultCallback>,
    on_error: Option<ErrorCallback>,
}

impl Session {
    pub fn new(req: ScanRequest) -> Result<Self, SessionError> {
        validate(&req)?;
        Ok(Self {
            req: Arc::new(req),
            state: Arc::new(ScanState::new()),
            on_progress: None,
            on_result: None,
            on_error: None,
        })
    }

    pub fn set_progress_callback(&mut self, cb: ProgressCallback) {
        self.on_progress = Some(cb);
    }

    pub fn set_result_callback(&mut self, cb: ResultCallback) {
        self.on_result = Some(cb);
    }

    pub fn set_error_callback(&mut self, cb: ErrorCallback) {
        self.on_error = Some(cb);
    }

    // idempotent; safe to call concurrently with execute, including from a callback
    pub fn stop(&self) {
        self.state.cancel();
    }

    pub async fn execute(&self) -> Result<ScanResponse, SessionError> {
        let start = Instant::now();
        let start_time = Utc::now().to_rfc3339();

        let wordlist_words = self.req.wordlist.clone();
        let extra_words = self.req.additional_wordlists.clone();

        let client_cfg = ClientConfig {
            user_agent: self.req.user_agent.clone(),
            random_user_agent: self.req.random_user_agent,
            headers: self.req.headers.clone(),
            proxy: self.req.proxy.clone(),
            follow_redirects: self.req.follow_redirects,
            timeout: self.req.timeout,
            max_retries: self.req.max_retries,
        };
        let client = http::build_client(&client_cfg)?;

        let callbacks = Arc::new(Callbacks {
            on_progress: self.on_progress.clone(),
            on_result: self.on_result.clone(),
            on_error: self.on_error.clone(),
        });

        recursion::seed(&self.state, &self.req.base_url);

        while let Some(root) = recursion::next_root(&self.state) {
            if self.state.is_cancelled() {
                break;
            }

            let fingerprint = if self.req.detect_wildcards {
                probe_wildcard(&client, &client_cfg, &self.req, &self.state, &root.url).await
            } else {
                wildcard::disabled_fingerprint()
            };
            self.state
                .fingerprints
                .lock()
                .unwrap()
                .insert(root.url.clone(), fingerprint.clone());

            let mut candidates = candidates::generate_candidates(
                &wordlist_words,
                &extra_words,
                &self.req.extensions,
                self.req.force_extensions,
            );

            if self.req.crawl {
                let extracted = crawl_root(&client, &client_cfg, &self.state, &root.url).await;
                let existing: std::collections::HashSet<String> =
                    candidates.iter().map(|c| c.path.clone()).collect();
                for candidate in extracted {
                    if !existing.contains(&candidate.path) {
                        candidates.push(candidate);
                    }
                }
            }

            engine::scan_root(
                client.clone(),
                client_cfg.clone(),
                Arc::clone(&self.req),
                Arc::clone(&self.state),
                Arc::new(fingerprint),
                root.url.clone(),
                root.depth,
                candidates,
                Arc::clone(&callbacks),
            )
            .await;
        }

        let total_requests = self.state.total_requests.load(std::sync::atomic::Ordering::Relaxed);
        let found_paths = self.state.found_paths.load(std::sync::atomic::Ordering::Relaxed);
        let errors = self.state.errors.load(std::sync::atomic::Ordering::Relaxed);
        let duration_seconds = start.elapsed().as_secs_f64();
        let statistics = Statistics {
            total_requests,
            found_paths,
            errors,
            start_time,
            end_time: Utc::now().to_rfc3339(),
            duration_seconds,
            requests_per_second: if duration_seconds > 0.0 {
                total_requests as f64 / duration_seconds
            } else {
                0.0
            },
        };

        let findings = self.state.findings.lock().unwrap().clone();
        Ok(ScanResponse {
            target_url: self.req.base_url.clone(),
            findings,
            statistics,
        })
    }
}

// probe requests never follow redirects, so a soft-redirect wildcard is
// captured faithfully in the fingerprint
async fn probe_wildcard(
    client: &reqwest::Client,
    client_cfg: &ClientConfig,
    req: &ScanRequest,
    state: &ScanState,
    root_url: &str,
) -> WildcardFingerprint {
    let mut probe_cfg = client_cfg.clone();
    probe_cfg.follow_redirects = false;

    let tokens = wildcard::probe_paths();
    let mut probe_targets = tokens.clone();
    probe_targets.extend(wildcard::probe_extension_paths(&tokens, &req.extensions));

    let mut responses = Vec::new();
    for path in probe_targets {
        let url = format!("{}/{}", root_url.trim_end_matches('/'), path);
        let resp = http::fetch(
            client,
            &probe_cfg,
            &url,
            reqwest::Method::GET,
            &req.headers,
            &state.cancelled,
        )
        .await;
        state.total_requests.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        responses.push((path, resp));
    }
    wildcard::build_fingerprint(&responses)
}

// extracted candidates are merged into the root's regular batch by the
// caller; this request itself doesn't count against total_requests
async fn crawl_root(
    client: &reqwest::Client,
    client_cfg: &ClientConfig,
    state: &ScanState,
    root_url: &str,
) -> Vec<crate::model::Candidate> {
    let resp = http::fetch(
        client,
        client_cfg,
        root_url,
        reqwest::Method::GET,
        &std::collections::HashMap::new(),
        &state.cancelled,
    )
    .await;
    if resp.error.is_some() || resp.body_sample.is_empty() {
        return Vec::new();
    }
    let body = String::from_utf8_lossy(&resp.body_sample);
    candidates::extract_from_html(&body)
}
