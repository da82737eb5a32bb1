use std::collections::HashSet;

use thiserror::Error;

use crate::model::{Candidate, Finding, HttpError, Response, ScanRequest, WildcardFingerprint};
use crate::wildcard;

#[derive(Debug, Error)]
#[error("invalid status code '{0}'")]
pub struct ParseStatusSetError(String);

// parses a comma-separated list of status codes, e.g. "404,500,502"
pub fn parse_status_set(csv: &str) -> Result<HashSet<u16>, ParseStatusSetError> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u16>().map_err(|_| ParseStatusSetError(s.to_string())))
        .collect()
}

// include_status supersedes exclude_status entirely when non-empty
pub fn status_allowed(status: u16, req: &ScanRequest) -> bool {
    if !req.include_status.is_empty() {
        return req.include_status.contains(&status);
    }
    !req.exclude_status.contains(&status)
}

// a 301/302 redirecting to url + "/", a url already ending in "/", or a
// 200 text/html response for a path with no file extension
fn infer_is_directory(url: &str, path: &str, resp: &Response, infer_from_403: bool) -> bool {
    if url.ends_with('/') {
        return true;
    }
    if matches!(resp.status, 301 | 302) {
        if let Some(target) = &resp.redirect_target {
            let with_slash = format!("{url}/");
            if target == &with_slash || target.ends_with(&format!("{path}/")) {
                return true;
            }
        }
    }
    if resp.status == 200
        && resp.content_type.starts_with("text/html")
        && !path.rsplit('/').next().unwrap_or(path).contains('.')
    {
        return true;
    }
    if infer_from_403 && resp.status == 403 && !path.rsplit('/').next().unwrap_or(path).contains('.') {
        return true;
    }
    false
}

pub fn classify(
    req: &ScanRequest,
    fingerprint: &WildcardFingerprint,
    root_url: &str,
    depth: usize,
    candidate: &Candidate,
    resp: &Response,
) -> Option<Finding> {
    if matches!(resp.error, Some(HttpError::Cancelled)) || resp.status == 0 {
        return None;
    }
    if !status_allowed(resp.status, req) {
        return None;
    }
    if req.detect_wildcards && wildcard::matches(fingerprint, &candidate.path, resp) {
        return None;
    }

    let url = format!("{}/{}", root_url.trim_end_matches('/'), candidate.path);
    let is_directory = infer_is_directory(&url, &candidate.path, resp, req.infer_dir_from_403);

    Some(Finding {
        url,
        path: candidate.path.clone(),
        status: resp.status,
        size: resp.body_len,
        content_type: resp.content_type.clone(),
        is_directory,
        redirect_target: resp.redirect_target.clone(),
        depth,
        response_time_ms: resp.response_time_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CandidateOrigin;

    fn base_request() -> ScanRequest {
        ScanRequest {
            detect_wildcards: false,
            ..ScanRequest::default()
        }
    }

    fn ok_response(status: u16, content_type: &str, redirect: Option<&str>) -> Response {
        Response {
            final_url: "http://x.tld/admin".to_string(),
            status,
            body_len: 42,
            content_type: content_type.to_string(),
            response_time_ms: 5,
            redirect_target: redirect.map(|s| s.to_string()),
            error: None,
            body_sample: Vec::new(),
        }
    }

    #[test]
    fn include_status_supersedes_exclude() {
        let mut req = base_request();
        req.exclude_status.insert(200);
        req.include_status.insert(200);
        assert!(status_allowed(200, &req));
    }

    #[test]
    fn default_excludes_404() {
        let req = base_request();
        assert!(!status_allowed(404, &req));
        assert!(status_allowed(200, &req));
    }

    #[test]
    fn directory_inferred_from_redirect_with_trailing_slash() {
        let req = base_request();
        let candidate = Candidate {
            path: "docs".to_string(),
            origin: CandidateOrigin::Raw,
        };
        let resp = ok_response(301, "text/html", Some("http://x.tld/docs/"));
        let finding = classify(&req, &WildcardFingerprint::NoneDetected, "http://x.tld", 0, &candidate, &resp)
            .expect("should classify");
        assert!(finding.is_directory);
    }

    #[test]
    fn html_with_no_extension_is_directory() {
        let req = base_request();
        let candidate = Candidate {
            path: "admin".to_string(),
            origin: CandidateOrigin::Raw,
        };
        let resp = ok_response(200, "text/html; charset=utf-8", None);
        let finding = classify(&req, &WildcardFingerprint::NoneDetected, "http://x.tld", 0, &candidate, &resp)
            .expect("should classify");
        assert!(finding.is_directory);
    }

    #[test]
    fn file_with_extension_is_not_directory() {
        let req = base_request();
        let candidate = Candidate {
            path: "config.php".to_string(),
            origin: CandidateOrigin::WithExtension { ext: "php".to_string() },
        };
        let resp = ok_response(200, "text/html", None);
        let finding = classify(&req, &WildcardFingerprint::NoneDetected, "http://x.tld", 0, &candidate, &resp)
            .expect("should classify");
        assert!(!finding.is_directory);
    }

    #[test]
    fn parse_status_set_reads_csv() {
        let set = parse_status_set("404, 500,502").unwrap();
        assert_eq!(set, HashSet::from([404, 500, 502]));
    }

    #[test]
    fn parse_status_set_rejects_garbage() {
        assert!(parse_status_set("404,nope").is_err());
    }

    #[test]
    fn wildcard_match_drops_finding() {
        let mut req = base_request();
        req.detect_wildcards = true;
        let candidate = Candidate::raw("randomguess123");
        let resp = ok_response(200, "text/html", None);
        let fp = crate::wildcard::build_fingerprint(&[("randomguess123".to_string(), resp.clone())]);
        let result = classify(&req, &fp, "http://x.tld", 0, &candidate, &resp);
        assert!(result.is_none());
    }
}
