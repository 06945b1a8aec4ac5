use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{Local, Utc};
use engine_logging::{engine_debug, engine_info, engine_warn};
use url::Url;
use web2md_engine::{
    decode_html, write_bundle, BundleRequest, BundleSummary, EngineEvent, Extractor, Fetcher,
    MainContentExtractor, Pipeline, ProgressSink, ReqwestFetcher,
};

use crate::config::Config;

/// Raw page bytes plus where they came from.
struct Page {
    bytes: Vec<u8>,
    content_type: Option<String>,
    source_url: String,
}

/// Logs materialization progress; per-chunk download events go to debug.
struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::Progress(progress) => {
                engine_info!("Media {}/{}", progress.completed, progress.total);
            }
            EngineEvent::Downloading { url, bytes } => {
                engine_debug!("{} bytes received from {}", bytes, url);
            }
        }
    }
}

pub async fn run(input: &str, base_url: Option<&str>, config: &Config) -> Result<BundleSummary> {
    let page = load_page(input, config).await?;
    let decoded = decode_html(&page.bytes, page.content_type.as_deref())
        .with_context(|| format!("failed to decode {input}"))?;
    engine_info!(
        "Decoded {} as {}{}",
        page.source_url,
        decoded.encoding_label,
        if decoded.lossy { " (lossy)" } else { "" }
    );

    let extractor = match &config.selector {
        Some(css) => MainContentExtractor::with_selector(css)?,
        None => MainContentExtractor::new(),
    };
    let extracted = extractor.extract(&decoded.html);
    let base = base_url.unwrap_or(&page.source_url);

    let pipeline = Pipeline::new(config.pipeline_settings())?;
    let output = pipeline
        .run_with_progress(&extracted.document, base, Arc::new(LogProgressSink))
        .await;

    let stats = &output.statistics;
    engine_info!(
        "Media: {} total, {} downloaded, {} failed, {} bytes",
        stats.total,
        stats.successful,
        stats.failed,
        stats.total_bytes
    );
    for failed in output.media_results.iter().filter(|result| !result.is_success()) {
        if let Some(failure) = &failed.failure {
            engine_warn!("Kept remote link {}: {}", failed.source_url, failure);
        }
    }

    let bundle_dir = bundle_dir(&config.out_dir);
    let created_utc = Utc::now().to_rfc3339();
    let request = BundleRequest {
        source_url: &page.source_url,
        metadata: &extracted.metadata,
        created_utc: &created_utc,
        output: &output,
    };
    let summary = write_bundle(&bundle_dir, &request)
        .with_context(|| format!("failed to write bundle into {}", bundle_dir.display()))?;
    Ok(summary)
}

fn bundle_dir(out_dir: &Path) -> PathBuf {
    out_dir.join(Local::now().format("%Y%m%d_%H%M%S").to_string())
}

async fn load_page(input: &str, config: &Config) -> Result<Page> {
    if let Ok(url) = Url::parse(input) {
        if matches!(url.scheme(), "http" | "https") {
            return fetch_page(url.as_str(), config).await;
        }
    }
    read_page(Path::new(input))
}

async fn fetch_page(url: &str, config: &Config) -> Result<Page> {
    let fetcher = ReqwestFetcher::new(config.fetch_settings())?;
    let output = fetcher
        .fetch(url, &LogProgressSink)
        .await
        .with_context(|| format!("failed to fetch {url}"))?;
    Ok(Page {
        bytes: output.bytes.to_vec(),
        content_type: output.metadata.content_type,
        source_url: output.metadata.final_url,
    })
}

fn read_page(path: &Path) -> Result<Page> {
    let absolute = fs::canonicalize(path)
        .with_context(|| format!("failed to locate input file {}", path.display()))?;
    let bytes = fs::read(&absolute)
        .with_context(|| format!("failed to read input file {}", absolute.display()))?;
    let source_url = Url::from_file_path(&absolute)
        .map_err(|()| anyhow!("cannot express {} as a file url", absolute.display()))?;
    Ok(Page {
        bytes,
        content_type: None,
        source_url: source_url.into(),
    })
}
