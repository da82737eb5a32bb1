use std::collections::HashSet;

use regex::Regex;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::model::{Candidate, CandidateOrigin};

#[derive(Debug, Error)]
pub enum CandidatesError {
    #[error("failed to open wordlist '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read wordlist '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// comment lines (first non-whitespace char is '#') and blank lines are skipped
pub async fn load_wordlist_file(path: &str) -> Result<Vec<String>, CandidatesError> {
    let handle = File::open(path)
        .await
        .map_err(|e| CandidatesError::Open {
            path: path.to_string(),
            source: e,
        })?;
    let mut lines = BufReader::new(handle).lines();
    let mut out = Vec::new();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim_end();
                let trimmed = line.trim_start();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    continue;
                }
                out.push(trimmed.to_string());
            }
            Ok(None) => break,
            Err(e) => {
                return Err(CandidatesError::Read {
                    path: path.to_string(),
                    source: e,
                })
            }
        }
    }
    Ok(out)
}

// strips a leading slash; rejects words with a ".." segment
fn normalize_word(word: &str) -> Option<String> {
    let stripped = word.strip_prefix('/').unwrap_or(word);
    if stripped.split('/').any(|seg| seg == "..") {
        return None;
    }
    Some(stripped.to_string())
}

pub fn expand_words(
    words: &[String],
    extensions: &[String],
    force_extensions: bool,
) -> Vec<Candidate> {
    let mut out = Vec::with_capacity(words.len() * (1 + extensions.len()));
    for word in words {
        let Some(word) = normalize_word(word) else {
            continue;
        };
        if word.is_empty() {
            continue;
        }
        out.push(Candidate::raw(word.clone()));

        let has_dot = word.contains('.');
        if !extensions.is_empty() && (!has_dot || force_extensions) {
            for ext in extensions {
                let ext = ext.trim().trim_start_matches('.');
                if ext.is_empty() {
                    continue;
                }
                out.push(Candidate {
                    path: format!("{word}.{ext}"),
                    origin: CandidateOrigin::WithExtension {
                        ext: ext.to_string(),
                    },
                });
            }
        }
    }
    out
}

// merges wordlists, removing duplicate words across sources while
// preserving first-seen order, then expands into candidates
pub fn generate_candidates(
    primary: &[String],
    additional: &[Vec<String>],
    extensions: &[String],
    force_extensions: bool,
) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for word in primary.iter().chain(additional.iter().flatten()) {
        if seen.insert(word.clone()) {
            merged.push(word.clone());
        }
    }
    expand_words(&merged, extensions, force_extensions)
}

// scrapes href=""/src="" attribute values, keeping only relative targets
pub fn extract_from_html(body: &str) -> Vec<Candidate> {
    static PATTERN: &str = r#"(?:href|src)\s*=\s*["']([^"'#][^"']*)["']"#;
    let re = match Regex::new(PATTERN) {
        Ok(re) => re,
        Err(_) => return Vec::new(),
    };
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for cap in re.captures_iter(body) {
        let raw = cap[1].trim();
        if raw.is_empty()
            || raw.starts_with("http://")
            || raw.starts_with("https://")
            || raw.starts_with("//")
            || raw.starts_with("data:")
            || raw.starts_with("javascript:")
            || raw.starts_with("mailto:")
        {
            continue;
        }
        let Some(path) = normalize_word(raw) else {
            continue;
        };
        if path.is_empty() || !seen.insert(path.clone()) {
            continue;
        }
        out.push(Candidate {
            path,
            origin: CandidateOrigin::ExtractedFromContent,
        });
    }
    out
}
