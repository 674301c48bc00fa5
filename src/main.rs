use clap::Parser;
use comic_capture::browser::BrowserManager;
use comic_capture::capture::CaptureSession;
use comic_capture::config::{Config, DEFAULT_CONFIG_PATH};
use comic_capture::helpers::{normalize_filename, transform_url};
use comic_capture::prompt::{Prefilled, Prompter};
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config as LogConfig, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::error::Error;
use std::path::{Path, PathBuf};

const LOG_CONFIG_PATH: &str = "log4rs.yml";

/// Save a comic reader page as a PDF, one page per image.
///
/// Anything not given on the command line is asked for interactively.
#[derive(Debug, Parser)]
#[command(name = "comic-capture", version)]
struct Args {
    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Link to the comic issue
    #[arg(long)]
    url: Option<String>,

    /// Output PDF name (".pdf" is appended when missing)
    #[arg(long)]
    output: Option<String>,

    /// Image quality: lq or hq
    #[arg(long)]
    quality: Option<String>,
}

fn init_logging() -> Result<(), Box<dyn Error>> {
    if Path::new(LOG_CONFIG_PATH).exists() {
        log4rs::init_file(LOG_CONFIG_PATH, Default::default())
            .map_err(|e| format!("Invalid {}: {}", LOG_CONFIG_PATH, e))?;
        return Ok(());
    }

    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d(%H:%M:%S)} {h({l})} {t} - {m}{n}")))
        .build();
    let config = LogConfig::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info))?;
    log4rs::init_config(config)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging()?;

    let cfg = Config::load_from(&args.config);

    let stdin = std::io::stdin();
    let mut prompter = Prompter::new(stdin.lock(), std::io::stdout());
    let request = prompter.collect(Prefilled {
        url: args.url,
        filename: args.output,
        quality: args.quality,
    })?;

    let url = transform_url(&request.url, request.quality)?;
    let output = cfg.output_path(&normalize_filename(&request.filename));

    log::info!("Capture settings:");
    log::info!("  Selector: {}", cfg.capture.image_selector);
    log::info!("  Poll interval: {}ms", cfg.capture.poll_interval_ms);
    log::info!("  Timeout: {:?}", cfg.capture.capture_timeout());
    log::info!("  Settle policy: {:?}", cfg.capture.settle_policy);

    let manager = BrowserManager::new(cfg.browser.clone())?;
    let page = manager
        .new_page()?
        .with_body_retries(cfg.capture.body_retry_attempts, cfg.capture.body_retry_delay());

    let report = CaptureSession::new(page, cfg.capture.clone()).run(&url, &output)?;
    println!(
        "Comics {} saved, pages: {}",
        report.path.display(),
        report.pages
    );

    Ok(())
}
