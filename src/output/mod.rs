use crate::model::ScanResponse;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn infer_format_from_path(path: &str) -> Option<OutputFormat> {
    let lower = path.trim().to_lowercase();
    if lower.ends_with(".json") {
        return Some(OutputFormat::Json);
    }
    if lower.ends_with(".txt") {
        return Some(OutputFormat::Text);
    }
    None
}

// one line per finding: STATUS  SIZE  URL, plus "-> target" for redirects
pub fn render_text(response: &ScanResponse) -> Vec<u8> {
    let mut out = String::new();
    for finding in &response.findings {
        out.push_str(&format!(
            "{:<3} {:>10}  {}",
            finding.status, finding.size, finding.url
        ));
        if let Some(target) = &finding.redirect_target {
            out.push_str(&format!(" -> {target}"));
        }
        out.push('\n');
    }
    out.push_str(&format!(
        "\n-- {} requests, {} found, {} errors in {:.2}s ({:.1} req/s)\n",
        response.statistics.total_requests,
        response.statistics.found_paths,
        response.statistics.errors,
        response.statistics.duration_seconds,
        response.statistics.requests_per_second,
    ));
    out.into_bytes()
}

pub fn render_json(response: &ScanResponse) -> Vec<u8> {
    serde_json::to_vec_pretty(response).unwrap_or_else(|_| b"{}\n".to_vec())
}

pub fn render(response: &ScanResponse, format: OutputFormat) -> Vec<u8> {
    match format {
        OutputFormat::Text => render_text(response),
        OutputFormat::Json => render_json(response),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Statistics;

    fn sample_response() -> ScanResponse {
        ScanResponse {
            target_url: "http://x.tld".to_string(),
            findings: Vec::new(),
            statistics: Statistics {
                total_requests: 3,
                found_paths: 1,
                errors: 0,
                start_time: "2026-01-01T00:00:00Z".to_string(),
                end_time: "2026-01-01T00:00:01Z".to_string(),
                duration_seconds: 1.0,
                requests_per_second: 3.0,
            },
        }
    }

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!(OutputFormat::parse("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("txt"), Some(OutputFormat::Text));
        assert_eq!(OutputFormat::parse("xml"), None);
    }

    #[test]
    fn format_inferred_from_extension() {
        assert_eq!(infer_format_from_path("out.json"), Some(OutputFormat::Json));
        assert_eq!(infer_format_from_path("out.csv"), None);
    }

    #[test]
    fn json_output_round_trips_statistics() {
        let bytes = render_json(&sample_response());
        let parsed: ScanResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.statistics.total_requests, 3);
    }

    #[test]
    fn text_output_includes_summary_line() {
        let bytes = render_text(&sample_response());
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("3 requests"));
    }
}
