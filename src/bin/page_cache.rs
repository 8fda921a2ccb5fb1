use page_cache::beautify::BeautifyOptions;
use page_cache::browser::{BrowserConfig, ChromeRenderer};
use page_cache::cache::{CacheConfig, SnapshotCache};
use clap::Parser;
use clap::error::ErrorKind;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Renders a webpage in a headless browser and caches its HTML
/// under a short hash of the URL
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// URL of the webpage to fetch
    url: String,

    /// Re-indent markup and scripts before caching
    #[arg(long, env = "PAGE_CACHE_BEAUTIFY")]
    beautify: bool,

    /// Directory holding the cached pages
    #[arg(long, env = "PAGE_CACHE_DIR", default_value = ".urlCache/")]
    cache_dir: PathBuf,

    /// Chrome/Chromium binary, auto-detected if not given
    #[arg(long, env = "PAGE_CACHE_CHROME")]
    chrome_path: Option<PathBuf>,

    /// Navigation timeout in seconds
    #[arg(long, env = "PAGE_CACHE_TIMEOUT", default_value_t = 30)]
    timeout: u64,
}

impl Args {

    fn cache_config(&self) -> CacheConfig {
        let config = CacheConfig::in_dir(&self.cache_dir);
        if self.beautify {
            config.with_beautify(BeautifyOptions::default())
        } else {
            config
        }
    }

    fn browser_config(&self) -> BrowserConfig {
        BrowserConfig {
            chrome_path: self.chrome_path.clone(),
            timeout: Duration::from_secs(self.timeout),
            ..BrowserConfig::default()
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            println!("{}", e);
            return ExitCode::from(1);
        }
    };

    init_logging();

    let renderer = ChromeRenderer::new(args.browser_config());
    let cache = SnapshotCache::new(args.cache_config());

    match page_cache::fetch_page_source(&renderer, &cache, &args.url) {
        Ok(path) => {
            println!("Page source written to {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
