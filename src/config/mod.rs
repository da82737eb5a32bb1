use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ConfigFile {
    pub url: Option<String>,
    pub wordlist: Option<String>,
    pub additional_wordlists: Option<Vec<String>>,
    pub extensions: Option<String>,
    pub force_extensions: Option<bool>,
    pub threads: Option<usize>,
    pub timeout: Option<u64>,
    pub delay: Option<u64>,
    pub user_agent: Option<String>,
    pub random_agent: Option<bool>,
    pub headers: Option<Vec<String>>,
    pub proxy: Option<String>,
    pub follow_redirects: Option<bool>,
    pub retries: Option<u32>,
    pub exclude_status: Option<String>,
    pub include_status: Option<String>,
    pub recursive: Option<bool>,
    pub recursion_depth: Option<usize>,
    pub detect_wildcards: Option<bool>,
    pub crawl: Option<bool>,
    pub infer_dir_from_403: Option<bool>,
    pub output: Option<String>,
    pub output_format: Option<String>,
    pub no_color: Option<bool>,
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
        .or_else(|| {
            let drive = env::var_os("HOMEDRIVE")?;
            let path = env::var_os("HOMEPATH")?;
            Some(PathBuf::from(drive).join(path))
        })
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(home_dir()?.join(".dirscour").join("config.yml"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn expand_tilde_string(path: &str) -> String {
    expand_tilde(path).to_string_lossy().to_string()
}

// when allow_missing is set, a missing file yields an empty config rather
// than an error; the default config path is optional, an explicit --config is not
pub fn load_config(path: &PathBuf, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_yaml::from_str::<ConfigFile>(&contents)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

fn default_config_yaml() -> String {
    r#"# dirscour config
#
# Location (default):
#   ~/.dirscour/config.yml
#
# CLI flags always override values set here.

# Target (required, unless passed via -u)
# url: https://example.com/

# Input
# wordlist: ./wordlists/common.txt
# additional_wordlists:
#   - ./wordlists/extra.txt
# extensions: php,bak,html
force_extensions: false

# Performance
threads: 10
timeout: 10
delay: 0

# HTTP
# user_agent: "Mozilla/5.0 (compatible; Dirsearch-MCP/1.0)"
random_agent: false
# headers:
#   - "Authorization: Bearer <token>"
# proxy: http://127.0.0.1:8080
follow_redirects: false
retries: 3

# Filters
exclude_status: "404"
# include_status: "200,301,302"

# Scan
recursive: false
recursion_depth: 0
detect_wildcards: true
crawl: false
infer_dir_from_403: false

# Output
# output: ./results.json
output_format: text
no_color: false
"#
    .to_string()
}

pub fn ensure_default_config_file(path: &PathBuf) -> Result<(), String> {
    if path.exists() {
        return Ok(());
    }
    let parent = path
        .parent()
        .ok_or_else(|| format!("invalid config path '{}'", path.display()))?;
    std::fs::create_dir_all(parent).map_err(|e| {
        format!(
            "failed to create config directory '{}': {e}",
            parent.display()
        )
    })?;
    std::fs::write(path, default_config_yaml())
        .map_err(|e| format!("failed to write config file '{}': {e}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_tilde_prefixes_home() {
        std::env::set_var("HOME", "/home/tester");
        let expanded = expand_tilde_string("~/wordlists/common.txt");
        assert_eq!(expanded, "/home/tester/wordlists/common.txt");
    }

    #[test]
    fn non_tilde_paths_pass_through() {
        assert_eq!(expand_tilde_string("./relative.txt"), "./relative.txt");
    }

    #[test]
    fn missing_config_is_ok_when_allowed() {
        let cfg = load_config(&PathBuf::from("/nonexistent/dirscour-test/config.yml"), true).unwrap();
        assert!(cfg.url.is_none());
    }

    #[test]
    fn missing_config_errors_when_required() {
        assert!(load_config(&PathBuf::from("/nonexistent/dirscour-test/config.yml"), false).is_err());
    }
}
