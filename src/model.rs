use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// where a candidate path string came from
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateOrigin {
    Raw,
    WithExtension { ext: String },
    ExtractedFromContent,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub path: String,
    pub origin: CandidateOrigin,
}

impl Candidate {
    pub fn raw(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            origin: CandidateOrigin::Raw,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScanRoot {
    pub url: String,
    pub depth: usize,
}

// tagged HTTP failure, surfaced only once the retry budget is exhausted
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpError {
    ConnectFailed,
    Timeout,
    TlsFailed,
    Cancelled,
    Other(String),
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpError::ConnectFailed => write!(f, "connect failed"),
            HttpError::Timeout => write!(f, "timed out"),
            HttpError::TlsFailed => write!(f, "tls handshake failed"),
            HttpError::Cancelled => write!(f, "cancelled"),
            HttpError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

// normalized output of a single HTTP attempt
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Response {
    pub final_url: String,
    pub status: u16,
    pub body_len: usize,
    pub content_type: String,
    pub response_time_ms: u128,
    pub redirect_target: Option<String>,
    pub error: Option<HttpError>,
    // used only for wildcard fingerprinting, never surfaced on a Finding
    #[serde(skip)]
    pub body_sample: Vec<u8>,
}

impl Response {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Finding {
    pub url: String,
    pub path: String,
    pub status: u16,
    pub size: usize,
    pub content_type: String,
    pub is_directory: bool,
    pub redirect_target: Option<String>,
    pub depth: usize,
    pub response_time_ms: u128,
}

impl Finding {
    pub fn key(&self) -> (String, u16) {
        (self.url.clone(), self.status)
    }
}

// decides whether a later response is just the wildcard. kept as a tagged
// variant rather than a closure so it stays Send + Sync and testable.
#[derive(Clone, Debug, Default)]
pub enum WildcardFingerprint {
    #[default]
    NoneDetected,
    Composite(Vec<WildcardProbeRecord>),
}

#[derive(Clone, Debug)]
pub struct WildcardProbeRecord {
    pub status: u16,
    pub size: usize,
    pub redirect_target: Option<String>,
    pub body_hash: Option<[u8; 32]>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Statistics {
    pub total_requests: u64,
    pub found_paths: u64,
    pub errors: u64,
    pub start_time: String,
    pub end_time: String,
    pub duration_seconds: f64,
    pub requests_per_second: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanResponse {
    pub target_url: String,
    pub findings: Vec<Finding>,
    pub statistics: Statistics,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanRequest {
    pub base_url: String,
    pub wordlist: Vec<String>,
    pub additional_wordlists: Vec<Vec<String>>,
    pub extensions: Vec<String>,
    pub force_extensions: bool,
    pub thread_count: usize,
    pub timeout: Duration,
    pub delay: Duration,
    pub user_agent: Option<String>,
    pub follow_redirects: bool,
    pub headers: HashMap<String, String>,
    pub proxy: Option<String>,
    pub max_retries: u32,
    pub exclude_status: HashSet<u16>,
    pub include_status: HashSet<u16>,
    pub recursive: bool,
    pub recursion_depth: usize,
    pub detect_wildcards: bool,
    pub crawl: bool,
    pub random_user_agent: bool,
    pub infer_dir_from_403: bool,
}

impl Default for ScanRequest {
    fn default() -> Self {
        let mut exclude_status = HashSet::new();
        exclude_status.insert(404);
        Self {
            base_url: String::new(),
            wordlist: Vec::new(),
            additional_wordlists: Vec::new(),
            extensions: Vec::new(),
            force_extensions: false,
            thread_count: 10,
            timeout: Duration::from_secs(10),
            delay: Duration::from_millis(0),
            user_agent: None,
            follow_redirects: false,
            headers: HashMap::new(),
            proxy: None,
            max_retries: 3,
            exclude_status,
            include_status: HashSet::new(),
            recursive: false,
            recursion_depth: 0,
            detect_wildcards: true,
            crawl: false,
            random_user_agent: false,
            infer_dir_from_403: false,
        }
    }
}

// mutated by many workers; short critical sections, callbacks always
// invoked outside the lock
pub struct ScanState {
    pub visited: Mutex<HashSet<String>>,
    pub findings: Mutex<Vec<Finding>>,
    found_keys: Mutex<HashSet<(String, u16)>>,
    pub fingerprints: Mutex<HashMap<String, WildcardFingerprint>>,
    pub pending_roots: Mutex<VecDeque<ScanRoot>>,
    pub visited_roots: Mutex<HashSet<String>>,
    pub total_requests: AtomicU64,
    pub found_paths: AtomicU64,
    pub errors: AtomicU64,
    pub cancelled: AtomicBool,
}

impl ScanState {
    pub fn new() -> Self {
        Self {
            visited: Mutex::new(HashSet::new()),
            findings: Mutex::new(Vec::new()),
            found_keys: Mutex::new(HashSet::new()),
            fingerprints: Mutex::new(HashMap::new()),
            pending_roots: Mutex::new(VecDeque::new()),
            visited_roots: Mutex::new(HashSet::new()),
            total_requests: AtomicU64::new(0),
            found_paths: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn mark_visited(&self, url: &str) -> bool {
        self.visited.lock().unwrap().insert(url.to_string())
    }

    // appends a finding iff its (url, status) key hasn't been recorded yet
    pub fn push_finding(&self, finding: Finding) -> bool {
        let key = finding.key();
        {
            let mut keys = self.found_keys.lock().unwrap();
            if !keys.insert(key) {
                return false;
            }
        }
        self.findings.lock().unwrap().push(finding);
        self.found_paths
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(std::sync::atomic::Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.cancelled
            .store(true, std::sync::atomic::Ordering::Relaxed);
    }
}

impl Default for ScanState {
    fn default() -> Self {
        Self::new()
    }
}

// groups findings by path segment into a tree; pure, no I/O
#[derive(Clone, Debug, Default, Serialize)]
pub struct DirectoryTree {
    pub name: String,
    pub finding: Option<Finding>,
    pub children: Vec<DirectoryTree>,
}

pub fn build_directory_tree(findings: &[Finding]) -> DirectoryTree {
    let mut root = DirectoryTree {
        name: "/".to_string(),
        finding: None,
        children: Vec::new(),
    };
    for finding in findings {
        let segments: Vec<&str> = finding.path.split('/').filter(|s| !s.is_empty()).collect();
        insert_segments(&mut root, &segments, finding);
    }
    root
}

fn insert_segments(node: &mut DirectoryTree, segments: &[&str], finding: &Finding) {
    let Some((head, rest)) = segments.split_first() else {
        node.finding = Some(finding.clone());
        return;
    };
    let child = match node.children.iter_mut().find(|c| c.name == *head) {
        Some(child) => child,
        None => {
            node.children.push(DirectoryTree {
                name: head.to_string(),
                finding: None,
                children: Vec::new(),
            });
            node.children.last_mut().unwrap()
        }
    };
    insert_segments(child, rest, finding);
}
