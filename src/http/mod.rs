use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::Rng;
use reqwest::{header, redirect, Proxy};
use thiserror::Error;
use tokio::time::Instant;

use crate::model::{HttpError, Response};

// used when random_user_agent is set; the chosen string is disclosed via
// the diagnostic log line rather than a new Finding field
const USER_AGENT_POOL: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (compatible; Dirsearch-MCP/1.0)",
];

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; Dirsearch-MCP/1.0)";

const BACKOFF_BASE: Duration = Duration::from_millis(100);
const BACKOFF_CAP: Duration = Duration::from_secs(2);
const MAX_REDIRECT_HOPS: usize = 5;

#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("failed to setup proxy '{proxy}': {source}")]
    Proxy {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to build HTTP client: {source}")]
    Build {
        #[source]
        source: reqwest::Error,
    },
}

// the subset of ScanRequest the client needs, copied out so this module
// doesn't depend on the rest of the scan request shape
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub user_agent: Option<String>,
    pub random_user_agent: bool,
    pub headers: HashMap<String, String>,
    pub proxy: Option<String>,
    pub follow_redirects: bool,
    pub timeout: Duration,
    pub max_retries: u32,
}

// redirects are always handled manually via Policy::none() so 3xx stays
// observable; the "follow up to 5 hops" behavior lives in fetch() itself
pub fn build_client(cfg: &ClientConfig) -> Result<reqwest::Client, ClientBuildError> {
    let mut default_headers = header::HeaderMap::new();
    if !cfg.random_user_agent {
        let ua = cfg.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
        if let Ok(value) = header::HeaderValue::from_str(ua) {
            default_headers.insert(header::USER_AGENT, value);
        }
    }
    default_headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static("*/*"),
    );
    for (name, value) in cfg.headers.iter() {
        if let (Ok(name), Ok(value)) = (
            header::HeaderName::from_bytes(name.as_bytes()),
            header::HeaderValue::from_str(value),
        ) {
            default_headers.insert(name, value);
        }
    }

    let mut builder = reqwest::Client::builder()
        .default_headers(default_headers)
        .redirect(redirect::Policy::none())
        .timeout(cfg.timeout)
        .danger_accept_invalid_certs(false);

    if let Some(proxy) = cfg.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
        let proxy = Proxy::all(proxy).map_err(|e| ClientBuildError::Proxy {
            proxy: proxy.to_string(),
            source: e,
        })?;
        builder = builder.proxy(proxy);
    }

    builder.build().map_err(|e| ClientBuildError::Build { source: e })
}

fn pick_user_agent(cfg: &ClientConfig) -> Option<String> {
    if !cfg.random_user_agent {
        return None;
    }
    let idx = rand::thread_rng().gen_range(0..USER_AGENT_POOL.len());
    Some(USER_AGENT_POOL[idx].to_string())
}

fn classify_transport_error(err: &reqwest::Error) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout
    } else if err.is_connect() {
        HttpError::ConnectFailed
    } else if err.to_string().to_lowercase().contains("tls")
        || err.to_string().to_lowercase().contains("certificate")
    {
        HttpError::TlsFailed
    } else {
        HttpError::Other(err.to_string())
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let exp = BACKOFF_BASE.saturating_mul(1u32 << attempt.min(8));
    let capped = exp.min(BACKOFF_CAP);
    let jitter_frac = rand::thread_rng().gen_range(-0.25..=0.25_f64);
    let millis = (capped.as_millis() as f64) * (1.0 + jitter_frac);
    Duration::from_millis(millis.max(0.0) as u64)
}

fn is_retryable_status(status: u16) -> bool {
    (500..600).contains(&status)
}

async fn single_attempt(
    client: &reqwest::Client,
    method: reqwest::Method,
    url: &str,
    extra_headers: &HashMap<String, String>,
    ua_override: Option<&str>,
) -> Result<(reqwest::StatusCode, header::HeaderMap, Vec<u8>, Option<String>), HttpError> {
    let mut req = client.request(method, url);
    if let Some(ua) = ua_override {
        req = req.header(header::USER_AGENT, ua);
    }
    for (name, value) in extra_headers {
        req = req.header(name.as_str(), value.as_str());
    }
    let started = Instant::now();
    let resp = req.send().await.map_err(|e| classify_transport_error(&e))?;
    let status = resp.status();
    let headers = resp.headers().clone();
    let redirect_target = headers
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let body = resp
        .bytes()
        .await
        .map(|b| b.to_vec())
        .unwrap_or_default();
    let _ = started;
    Ok((status, headers, body, redirect_target))
}

// checks cancelled immediately before every I/O call so in-flight
// requests abort promptly once the session stops
pub async fn fetch(
    client: &reqwest::Client,
    cfg: &ClientConfig,
    url: &str,
    method: reqwest::Method,
    extra_headers: &HashMap<String, String>,
    cancelled: &AtomicBool,
) -> Response {
    let started = Instant::now();

    if cancelled.load(Ordering::Relaxed) {
        return Response {
            final_url: url.to_string(),
            status: 0,
            body_len: 0,
            content_type: String::new(),
            response_time_ms: started.elapsed().as_millis(),
            redirect_target: None,
            error: Some(HttpError::Cancelled),
            body_sample: Vec::new(),
        };
    }

    let ua_override = pick_user_agent(cfg);
    let mut current_url = url.to_string();
    let mut hops = 0usize;
    let mut last_error: Option<HttpError> = None;

    loop {
        let mut attempt = 0u32;
        let outcome = loop {
            if cancelled.load(Ordering::Relaxed) {
                return Response {
                    final_url: current_url,
                    status: 0,
                    body_len: 0,
                    content_type: String::new(),
                    response_time_ms: started.elapsed().as_millis(),
                    redirect_target: None,
                    error: Some(HttpError::Cancelled),
                    body_sample: Vec::new(),
                };
            }
            match single_attempt(
                client,
                method.clone(),
                &current_url,
                extra_headers,
                ua_override.as_deref(),
            )
            .await
            {
                Ok(ok) => break Ok(ok),
                Err(HttpError::Cancelled) => {
                    return Response {
                        final_url: current_url,
                        status: 0,
                        body_len: 0,
                        content_type: String::new(),
                        response_time_ms: started.elapsed().as_millis(),
                        redirect_target: None,
                        error: Some(HttpError::Cancelled),
                        body_sample: Vec::new(),
                    }
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt >= cfg.max_retries {
                        break Err(());
                    }
                    attempt += 1;
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
            }
        };

        let (status, headers, body, redirect_target) = match outcome {
            Ok(v) => v,
            Err(()) => {
                return Response {
                    final_url: current_url,
                    status: 0,
                    body_len: 0,
                    content_type: String::new(),
                    response_time_ms: started.elapsed().as_millis(),
                    redirect_target: None,
                    error: last_error,
                    body_sample: Vec::new(),
                };
            }
        };

        let status_code = status.as_u16();

        // 4xx is returned immediately, never retried.
        if is_retryable_status(status_code) {
            // Already retried inside single_attempt's caller loop via the
            // status not being a transport error; retry here explicitly for
            // 5xx since single_attempt treats them as success.
            let mut attempt = 0u32;
            let mut retried_status = status_code;
            let mut retried_headers = headers.clone();
            let mut retried_body = body.clone();
            let mut retried_redirect = redirect_target.clone();
            while is_retryable_status(retried_status) && attempt < cfg.max_retries {
                if cancelled.load(Ordering::Relaxed) {
                    return Response {
                        final_url: current_url,
                        status: 0,
                        body_len: 0,
                        content_type: String::new(),
                        response_time_ms: started.elapsed().as_millis(),
                        redirect_target: None,
                        error: Some(HttpError::Cancelled),
                        body_sample: Vec::new(),
                    };
                }
                attempt += 1;
                tokio::time::sleep(backoff_delay(attempt)).await;
                match single_attempt(
                    client,
                    method.clone(),
                    &current_url,
                    extra_headers,
                    ua_override.as_deref(),
                )
                .await
                {
                    Ok((s, h, b, r)) => {
                        retried_status = s.as_u16();
                        retried_headers = h;
                        retried_body = b;
                        retried_redirect = r;
                    }
                    Err(HttpError::Cancelled) => {
                        return Response {
                            final_url: current_url,
                            status: 0,
                            body_len: 0,
                            content_type: String::new(),
                            response_time_ms: started.elapsed().as_millis(),
                            redirect_target: None,
                            error: Some(HttpError::Cancelled),
                            body_sample: Vec::new(),
                        }
                    }
                    Err(_) => break,
                }
            }
            return finish_response(
                current_url,
                retried_status,
                &retried_headers,
                retried_body,
                retried_redirect,
                started,
                None,
            );
        }

        if (300..400).contains(&status_code) {
            if !cfg.follow_redirects {
                return finish_response(
                    current_url,
                    status_code,
                    &headers,
                    body,
                    redirect_target,
                    started,
                    None,
                );
            }
            hops += 1;
            if hops > MAX_REDIRECT_HOPS {
                return finish_response(
                    current_url,
                    status_code,
                    &headers,
                    body,
                    redirect_target,
                    started,
                    Some(HttpError::Other("ERR_REDIRECT_LOOP".to_string())),
                );
            }
            if let Some(target) = redirect_target {
                current_url = resolve_redirect(&current_url, &target);
                continue;
            }
            return finish_response(current_url, status_code, &headers, body, None, started, None);
        }

        return finish_response(
            current_url,
            status_code,
            &headers,
            body,
            redirect_target,
            started,
            None,
        );
    }
}

fn resolve_redirect(base: &str, target: &str) -> String {
    reqwest::Url::parse(base)
        .and_then(|b| b.join(target))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| target.to_string())
}

fn finish_response(
    final_url: String,
    status: u16,
    headers: &header::HeaderMap,
    body: Vec<u8>,
    redirect_target: Option<String>,
    started: Instant,
    error_tag: Option<HttpError>,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    Response {
        final_url,
        status,
        body_len: body.len(),
        content_type,
        response_time_ms: started.elapsed().as_millis(),
        redirect_target,
        error: error_tag,
        body_sample: body,
    }
}
