use rand::Rng;
use sha2::{Digest, Sha256};

use crate::model::{Response, WildcardFingerprint, WildcardProbeRecord};

const PROBE_COUNT: usize = 3;
const TOKEN_LEN: usize = 12;
const HASH_SAMPLE_BYTES: usize = 64 * 1024;

fn random_token() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..TOKEN_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

pub fn probe_paths() -> Vec<String> {
    (0..PROBE_COUNT).map(|_| random_token()).collect()
}

// extension variants of tokens[0], for up to two representative extensions
pub fn probe_extension_paths(tokens: &[String], extensions: &[String]) -> Vec<String> {
    let Some(token) = tokens.first() else {
        return Vec::new();
    };
    extensions
        .iter()
        .take(2)
        .map(|ext| format!("{token}.{}", ext.trim().trim_start_matches('.')))
        .collect()
}

// strips any literal occurrence of the requested path before hashing, so
// two responses that merely echo back the path still normalize to the
// same hash. only the first 64 KiB is hashed.
fn normalized_body_hash(body: &[u8], probe_path: &str) -> [u8; 32] {
    let sample = &body[..body.len().min(HASH_SAMPLE_BYTES)];
    let text = String::from_utf8_lossy(sample);
    let stripped = text.replace(probe_path, "");
    let mut hasher = Sha256::new();
    hasher.update(stripped.as_bytes());
    hasher.finalize().into()
}

// body hashes are only computed when responses are similar enough to be
// worth comparing (status 200, sizes within 2x of each other)
pub fn build_fingerprint(
    responses: &[(String, Response)],
) -> WildcardFingerprint {
    if responses.is_empty() {
        return WildcardFingerprint::NoneDetected;
    }

    let sizes: Vec<usize> = responses.iter().map(|(_, r)| r.body_len).collect();
    let min_size = *sizes.iter().min().unwrap_or(&0);
    let max_size = *sizes.iter().max().unwrap_or(&0);
    let similar_enough = min_size == 0 || max_size <= min_size.saturating_mul(2);

    let records = responses
        .iter()
        .map(|(probe_path, resp)| {
            let hash_eligible =
                similar_enough && resp.status == 200 && !resp.body_sample.is_empty();
            WildcardProbeRecord {
                status: resp.status,
                size: resp.body_len,
                redirect_target: resp.redirect_target.clone(),
                body_hash: hash_eligible
                    .then(|| normalized_body_hash(&resp.body_sample, probe_path)),
            }
        })
        .collect();

    WildcardFingerprint::Composite(records)
}

const SIZE_TOLERANCE_BYTES: usize = 64;

// same status as a probe record, and either a matching redirect target, a
// body size within 64 bytes of the probe's, or (when both sides have one)
// the same normalized body hash. candidate_path strips the same way the
// probe side does, so a server that echoes the requested path back still
// normalizes to the same hash on both sides.
pub fn matches(fingerprint: &WildcardFingerprint, candidate_path: &str, candidate: &Response) -> bool {
    let WildcardFingerprint::Composite(records) = fingerprint else {
        return false;
    };
    if records.is_empty() {
        return false;
    }

    records.iter().any(|record| {
        if record.status != candidate.status {
            return false;
        }
        if record.redirect_target == candidate.redirect_target && record.redirect_target.is_some() {
            return true;
        }
        let size_close = record.size.abs_diff(candidate.body_len) <= SIZE_TOLERANCE_BYTES;
        if size_close {
            return true;
        }
        match (&record.body_hash, candidate.body_sample.is_empty()) {
            (Some(hash), false) => {
                let candidate_hash = normalized_body_hash(&candidate.body_sample, candidate_path);
                *hash == candidate_hash
            }
            _ => false,
        }
    })
}

pub fn disabled_fingerprint() -> WildcardFingerprint {
    WildcardFingerprint::NoneDetected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HttpError;

    fn resp(status: u16, body: &str, redirect: Option<&str>) -> Response {
        Response {
            final_url: "http://x.tld/probe".to_string(),
            status,
            body_len: body.len(),
            content_type: "text/html".to_string(),
            response_time_ms: 1,
            redirect_target: redirect.map(|s| s.to_string()),
            error: None::<HttpError>,
            body_sample: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn probe_paths_are_distinct_and_right_length() {
        let paths = probe_paths();
        assert_eq!(paths.len(), PROBE_COUNT);
        for p in &paths {
            assert_eq!(p.len(), TOKEN_LEN);
        }
        assert_ne!(paths[0], paths[1]);
    }

    #[test]
    fn matching_body_after_stripping_probe_path_is_wildcard() {
        let responses = vec![
            ("abc123456789".to_string(), resp(200, "Not found: abc123456789", None)),
            ("xyz987654321".to_string(), resp(200, "Not found: xyz987654321", None)),
        ];
        let fp = build_fingerprint(&responses);
        let candidate = resp(200, "Not found: qqq000000000", None);
        assert!(matches(&fp, "qqq000000000", &candidate));
    }

    #[test]
    fn different_status_does_not_match() {
        let responses = vec![("abc".to_string(), resp(200, "soft 404 page", None))];
        let fp = build_fingerprint(&responses);
        let candidate = resp(404, "real not found", None);
        assert!(!matches(&fp, "nope", &candidate));
    }

    #[test]
    fn extension_probes_cap_at_two_representative_extensions() {
        let tokens = vec!["abc123456789".to_string()];
        let exts = vec!["php".to_string(), "bak".to_string(), "html".to_string()];
        let probes = probe_extension_paths(&tokens, &exts);
        assert_eq!(probes, vec!["abc123456789.php", "abc123456789.bak"]);
    }

    #[test]
    fn disabled_fingerprint_never_matches() {
        let fp = disabled_fingerprint();
        let candidate = resp(200, "anything", None);
        assert!(!matches(&fp, "anything", &candidate));
    }

    #[test]
    fn redirect_target_used_when_bodies_too_dissimilar_to_hash() {
        let responses = vec![
            ("abc".to_string(), resp(200, &"x".repeat(1000), Some("http://x.tld/login"))),
            ("def".to_string(), resp(200, "tiny", Some("http://x.tld/login"))),
        ];
        let fp = build_fingerprint(&responses);
        let candidate = resp(200, "short", Some("http://x.tld/login"));
        assert!(matches(&fp, "short", &candidate));
    }
}
