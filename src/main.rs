use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use dirscour::candidates;
use dirscour::cli::{self, CliArgs};
use dirscour::config::{self, ConfigFile};
use dirscour::log::Logger;
use dirscour::output::{self, OutputFormat};
use dirscour::session::Session;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    let logger = Logger::new(args.verbose, !args.no_color);

    match run(args, logger).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            logger.error(&err);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CliArgs, logger: Logger) -> Result<(), String> {
    let config = load_config(&args, &logger)?;
    let mut req = cli::into_scan_request(&args, &config).map_err(|e| e.to_string())?;

    let wordlist_path = args
        .wordlist
        .clone()
        .or_else(|| config.wordlist.clone())
        .expect("validated by into_scan_request");
    req.wordlist = candidates::load_wordlist_file(&config::expand_tilde_string(&wordlist_path))
        .await
        .map_err(|e| e.to_string())?;

    let mut additional_paths = args.additional_wordlist.clone();
    additional_paths.extend(config.additional_wordlists.clone().unwrap_or_default());
    for path in additional_paths {
        let words = candidates::load_wordlist_file(&config::expand_tilde_string(&path))
            .await
            .map_err(|e| e.to_string())?;
        req.additional_wordlists.push(words);
    }

    logger.info(&format!(
        "scanning {} ({} words, {} threads)",
        req.base_url,
        req.wordlist.len(),
        req.thread_count
    ));

    let mut session = Session::new(req).map_err(|e| e.to_string())?;

    let progress_logger = logger;
    session.set_progress_callback(Arc::new(move |completed, found| {
        progress_logger.debug(&format!("{completed} requests sent, {found} found so far"));
    }));
    let result_logger = logger;
    session.set_result_callback(Arc::new(move |finding| {
        result_logger.found(&format!("{} [{}] {} bytes", finding.url, finding.status, finding.size));
    }));
    let error_logger = logger;
    session.set_error_callback(Arc::new(move |url, message| {
        error_logger.warn(&format!("{url}: {message}"));
    }));

    let response = session.execute().await.map_err(|e| e.to_string())?;

    let format = args
        .output_format
        .as_deref()
        .and_then(OutputFormat::parse)
        .or_else(|| config.output_format.as_deref().and_then(OutputFormat::parse))
        .or_else(|| {
            args.output
                .as_deref()
                .and_then(output::infer_format_from_path)
        })
        .unwrap_or(OutputFormat::Text);

    let rendered = output::render(&response, format);

    match args.output.clone().or_else(|| config.output.clone()) {
        Some(path) => {
            tokio::fs::write(config::expand_tilde_string(&path), rendered)
                .await
                .map_err(|e| format!("failed to write output file '{path}': {e}"))?;
            logger.info(&format!("wrote results to {path}"));
        }
        None => {
            use tokio::io::AsyncWriteExt;
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(&rendered)
                .await
                .map_err(|e| e.to_string())?;
        }
    }

    Ok(())
}

fn load_config(args: &CliArgs, logger: &Logger) -> Result<ConfigFile, String> {
    match &args.config {
        Some(path) => config::load_config(&config::expand_tilde(path), false),
        None => {
            let Some(default_path) = config::default_config_path() else {
                return Ok(ConfigFile::default());
            };
            if let Err(e) = config::ensure_default_config_file(&default_path) {
                logger.debug(&format!("could not scaffold default config: {e}"));
            }
            config::load_config(&default_path, true)
        }
    }
}
