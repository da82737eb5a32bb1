use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "dirscour",
    version,
    about = "Concurrent web directory and file enumeration engine",
    long_about = "dirscour brute-forces a target's paths from a wordlist, detects wildcard/soft-404 responses, and optionally recurses into discovered directories.\n\nExamples:\n  dirscour -u https://target.tld/ -w wordlist.txt\n  dirscour -u https://target.tld/ -w wordlist.txt -x php,bak -t 50 -r\n  dirscour -u https://target.tld/ --config ~/.dirscour/config.yml"
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        help_heading = "Output",
        help = "Increase verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        long = "no-color",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'u',
        long = "url",
        value_name = "URL",
        help_heading = "Input",
        help = "Target base URL."
    )]
    pub url: Option<String>,

    #[arg(
        short = 'w',
        long = "wordlist",
        value_name = "FILE",
        help_heading = "Input",
        help = "Primary wordlist file (one path per line)."
    )]
    pub wordlist: Option<String>,

    #[arg(
        short = 'W',
        long = "additional-wordlist",
        value_name = "FILE",
        action = ArgAction::Append,
        help_heading = "Input",
        help = "Additional wordlist file (repeatable)."
    )]
    pub additional_wordlist: Vec<String>,

    #[arg(
        short = 'C',
        long = "config",
        value_name = "FILE",
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.dirscour/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        short = 'x',
        long = "extensions",
        visible_alias = "ext",
        value_name = "EXTENSIONS",
        help_heading = "Bruteforce",
        help = "Extension list separated by commas (e.g. php,bak)."
    )]
    pub extensions: Option<String>,

    #[arg(
        short = 'f',
        long = "force-extensions",
        help_heading = "Bruteforce",
        help = "Append extensions even to words that already contain a dot."
    )]
    pub force_extensions: bool,

    #[arg(
        short = 't',
        long = "threads",
        value_name = "N",
        help_heading = "Performance",
        help = "Number of concurrent workers."
    )]
    pub threads: Option<usize>,

    #[arg(
        short = 'T',
        long = "timeout",
        value_name = "SECONDS",
        help_heading = "HTTP",
        help = "Per-request timeout in seconds."
    )]
    pub timeout: Option<u64>,

    #[arg(
        long = "delay",
        value_name = "MILLIS",
        help_heading = "Performance",
        help = "Delay between requests issued by a single worker, in milliseconds."
    )]
    pub delay: Option<u64>,

    #[arg(
        short = 'A',
        long = "user-agent",
        value_name = "UA",
        help_heading = "HTTP",
        help = "Custom User-Agent header."
    )]
    pub user_agent: Option<String>,

    #[arg(
        long = "random-agent",
        help_heading = "HTTP",
        help = "Pick a random User-Agent per request from a built-in pool."
    )]
    pub random_agent: bool,

    #[arg(
        short = 'H',
        long = "header",
        value_name = "'Key: Value'",
        action = ArgAction::Append,
        help_heading = "HTTP",
        help = "Add a header to all requests (repeatable)."
    )]
    pub header: Vec<String>,

    #[arg(
        short = 'p',
        long = "proxy",
        value_name = "URL",
        help_heading = "HTTP",
        help = "HTTP proxy URL (e.g. http://127.0.0.1:8080)."
    )]
    pub proxy: Option<String>,

    #[arg(
        long = "follow-redirects",
        help_heading = "HTTP",
        help = "Follow HTTP redirects (up to 5 hops)."
    )]
    pub follow_redirects: bool,

    #[arg(
        long = "retries",
        value_name = "N",
        help_heading = "HTTP",
        help = "Max retries for transient failures / 5xx responses."
    )]
    pub retries: Option<u32>,

    #[arg(
        short = 'X',
        long = "exclude-status",
        visible_alias = "blacklist-status",
        value_name = "CODES",
        help_heading = "Filters",
        help = "Comma-separated status codes to exclude (default: 404)."
    )]
    pub exclude_status: Option<String>,

    #[arg(
        short = 'S',
        long = "include-status",
        visible_alias = "whitelist-status",
        value_name = "CODES",
        help_heading = "Filters",
        help = "Comma-separated status codes to include; supersedes --exclude-status."
    )]
    pub include_status: Option<String>,

    #[arg(
        short = 'r',
        long = "recursive",
        help_heading = "Scan",
        help = "Recurse into discovered directories."
    )]
    pub recursive: bool,

    #[arg(
        short = 'R',
        long = "recursion-depth",
        value_name = "N",
        help_heading = "Scan",
        help = "Maximum recursion depth (0 = unlimited, capped at 8)."
    )]
    pub recursion_depth: Option<usize>,

    #[arg(
        long = "no-wildcard-detection",
        help_heading = "Scan",
        help = "Disable wildcard/soft-404 detection."
    )]
    pub no_wildcard_detection: bool,

    #[arg(
        long = "crawl",
        help_heading = "Scan",
        help = "Extract additional candidate paths from HTML responses."
    )]
    pub crawl: bool,

    #[arg(
        long = "infer-dir-from-403",
        help_heading = "Scan",
        help = "Also treat extensionless 403 responses as directories."
    )]
    pub infer_dir_from_403: bool,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Write results to a file instead of stdout."
    )]
    pub output: Option<String>,

    #[arg(
        long = "output-format",
        value_name = "FORMAT",
        help_heading = "Output",
        help = "Output format: text or json (default: text)."
    )]
    pub output_format: Option<String>,
}
