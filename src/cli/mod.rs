pub mod args;

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

use crate::classifier;
use crate::config::ConfigFile;
use crate::model::ScanRequest;

pub use args::CliArgs;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("missing target URL: pass -u/--url or set 'url' in the config file")]
    MissingUrl,

    #[error("missing wordlist: pass -w/--wordlist or set 'wordlist' in the config file")]
    MissingWordlist,

    #[error("invalid --header '{0}': expected 'Key: Value'")]
    InvalidHeader(String),

    #[error("invalid status set: {0}")]
    InvalidStatusSet(#[from] classifier::ParseStatusSetError),
}

fn parse_header(raw: &str) -> Result<(String, String), CliError> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| CliError::InvalidHeader(raw.to_string()))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// cli flags win over config file values, which win over ScanRequest defaults;
// boolean flags are additive, a cli false never overrides a config true
pub fn into_scan_request(args: &CliArgs, config: &ConfigFile) -> Result<ScanRequest, CliError> {
    let mut req = ScanRequest::default();

    req.base_url = args
        .url
        .clone()
        .or_else(|| config.url.clone())
        .ok_or(CliError::MissingUrl)?;

    if args.wordlist.is_none() && config.wordlist.is_none() {
        return Err(CliError::MissingWordlist);
    }

    if let Some(extensions) = args.extensions.clone().or_else(|| config.extensions.clone()) {
        req.extensions = split_csv(&extensions);
    }
    req.force_extensions = args.force_extensions || config.force_extensions.unwrap_or(false);

    if let Some(threads) = args.threads.or(config.threads) {
        req.thread_count = threads.max(1);
    }
    if let Some(secs) = args.timeout.or(config.timeout) {
        req.timeout = Duration::from_secs(secs.max(1));
    }
    if let Some(millis) = args.delay.or(config.delay) {
        req.delay = Duration::from_millis(millis);
    }

    req.user_agent = args.user_agent.clone().or_else(|| config.user_agent.clone());
    req.random_user_agent = args.random_agent || config.random_agent.unwrap_or(false);

    let mut headers = HashMap::new();
    for raw in config.headers.iter().flatten() {
        let (name, value) = parse_header(raw)?;
        headers.insert(name, value);
    }
    for raw in &args.header {
        let (name, value) = parse_header(raw)?;
        headers.insert(name, value);
    }
    req.headers = headers;

    req.proxy = args.proxy.clone().or_else(|| config.proxy.clone());
    req.follow_redirects = args.follow_redirects || config.follow_redirects.unwrap_or(req.follow_redirects);
    if let Some(retries) = args.retries.or(config.retries) {
        req.max_retries = retries;
    }

    if let Some(raw) = args
        .exclude_status
        .clone()
        .or_else(|| config.exclude_status.clone())
    {
        req.exclude_status = classifier::parse_status_set(&raw)?;
    }
    if let Some(raw) = args
        .include_status
        .clone()
        .or_else(|| config.include_status.clone())
    {
        req.include_status = classifier::parse_status_set(&raw)?;
    }

    req.recursive = args.recursive || config.recursive.unwrap_or(false);
    if let Some(depth) = args.recursion_depth.or(config.recursion_depth) {
        req.recursion_depth = depth;
    }
    req.detect_wildcards = if args.no_wildcard_detection {
        false
    } else {
        config.detect_wildcards.unwrap_or(true)
    };
    req.crawl = args.crawl || config.crawl.unwrap_or(false);
    req.infer_dir_from_403 = args.infer_dir_from_403 || config.infer_dir_from_403.unwrap_or(false);

    Ok(req)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_args() -> CliArgs {
        CliArgs {
            verbose: 0,
            no_color: false,
            url: None,
            wordlist: None,
            additional_wordlist: Vec::new(),
            config: None,
            extensions: None,
            force_extensions: false,
            threads: None,
            timeout: None,
            delay: None,
            user_agent: None,
            random_agent: false,
            header: Vec::new(),
            proxy: None,
            follow_redirects: false,
            retries: None,
            exclude_status: None,
            include_status: None,
            recursive: false,
            recursion_depth: None,
            no_wildcard_detection: false,
            crawl: false,
            infer_dir_from_403: false,
            output: None,
            output_format: None,
        }
    }

    #[test]
    fn cli_url_overrides_config() {
        let mut args = default_args();
        args.url = Some("https://cli.tld".to_string());
        args.wordlist = Some("w.txt".to_string());
        let mut config = ConfigFile::default();
        config.url = Some("https://config.tld".to_string());
        let req = into_scan_request(&args, &config).unwrap();
        assert_eq!(req.base_url, "https://cli.tld");
    }

    #[test]
    fn config_supplies_url_when_cli_omits_it() {
        let args = {
            let mut a = default_args();
            a.wordlist = Some("w.txt".to_string());
            a
        };
        let mut config = ConfigFile::default();
        config.url = Some("https://config.tld".to_string());
        let req = into_scan_request(&args, &config).unwrap();
        assert_eq!(req.base_url, "https://config.tld");
    }

    #[test]
    fn missing_url_is_an_error() {
        let mut args = default_args();
        args.wordlist = Some("w.txt".to_string());
        let config = ConfigFile::default();
        assert!(matches!(
            into_scan_request(&args, &config),
            Err(CliError::MissingUrl)
        ));
    }

    #[test]
    fn missing_wordlist_is_an_error() {
        let mut args = default_args();
        args.url = Some("https://x.tld".to_string());
        let config = ConfigFile::default();
        assert!(matches!(
            into_scan_request(&args, &config),
            Err(CliError::MissingWordlist)
        ));
    }

    #[test]
    fn cli_headers_override_config_headers_of_same_name() {
        let mut args = default_args();
        args.url = Some("https://x.tld".to_string());
        args.wordlist = Some("w.txt".to_string());
        args.header = vec!["X-Test: cli-value".to_string()];
        let mut config = ConfigFile::default();
        config.headers = Some(vec!["X-Test: config-value".to_string()]);
        let req = into_scan_request(&args, &config).unwrap();
        assert_eq!(req.headers.get("X-Test").unwrap(), "cli-value");
    }

    #[test]
    fn exclude_status_parses_csv() {
        let mut args = default_args();
        args.url = Some("https://x.tld".to_string());
        args.wordlist = Some("w.txt".to_string());
        args.exclude_status = Some("404,500".to_string());
        let config = ConfigFile::default();
        let req = into_scan_request(&args, &config).unwrap();
        assert_eq!(req.exclude_status, std::collections::HashSet::from([404, 500]));
    }
}
