use std::path::{Path, PathBuf};

use engine_logging::{engine_info, engine_warn};
use serde_json::{json, Value};

use crate::extract::PageMetadata;
use crate::filename::deterministic_filename;
use crate::frontmatter::{build_markdown_document, FrontMatter};
use crate::persist::{AtomicFileWriter, PersistError};
use crate::pipeline::PipelineOutput;
use crate::{ContentStatistics, MediaResult, MediaStatistics};

pub const MEDIA_DIR: &str = "media";
pub const METADATA_FILENAME: &str = "metadata.json";

#[derive(Debug, Clone)]
pub struct BundleRequest<'a> {
    pub source_url: &'a str,
    pub metadata: &'a PageMetadata,
    pub created_utc: &'a str,
    pub output: &'a PipelineOutput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSummary {
    pub markdown_path: PathBuf,
    pub metadata_path: PathBuf,
    pub media_written: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

/// Point `](source_url)` targets of successfully materialized media at
/// `{media_dir}/{local_filename}`; covers both image and link syntax.
pub fn rewrite_media_links(markdown: &str, results: &[MediaResult], media_dir: &str) -> String {
    let mut rewritten = markdown.to_string();
    for result in results.iter().filter(|result| result.is_success()) {
        let Some(filename) = &result.local_filename else {
            continue;
        };
        rewritten = rewritten.replace(
            &format!("]({})", result.source_url),
            &format!("]({media_dir}/{filename})"),
        );
    }
    rewritten
}

/// Write the Markdown document, the media payloads and `metadata.json` into `dir`.
pub fn write_bundle(dir: &Path, request: &BundleRequest<'_>) -> Result<BundleSummary, BundleError> {
    let writer = AtomicFileWriter::new(dir.to_path_buf());
    let output = request.output;

    let mut media_written = 0;
    for result in &output.media_results {
        let (Some(filename), Some(payload)) = (&result.local_filename, &result.payload) else {
            continue;
        };
        match writer.write(&format!("{MEDIA_DIR}/{filename}"), payload) {
            Ok(_) => media_written += 1,
            // Only a bad name is skipped; disk failures abort the bundle.
            Err(PersistError::InvalidName(name)) => {
                engine_warn!("Skipping media file with unusable name {:?}", name);
            }
            Err(err) => return Err(err.into()),
        }
    }

    let body = rewrite_media_links(&output.markdown, &output.media_results, MEDIA_DIR);
    let front_matter = FrontMatter::from_metadata(request.metadata, request.source_url, request.created_utc);
    let document = build_markdown_document(&front_matter, &body);
    let markdown_name = deterministic_filename(request.metadata.title.as_deref(), request.source_url);
    let markdown_path = writer.write(&markdown_name, &document)?;

    let manifest = build_manifest(request);
    let metadata_path = writer.write(METADATA_FILENAME, manifest.to_string())?;

    engine_info!(
        "Wrote bundle {:?} with {} media files",
        markdown_path,
        media_written
    );

    Ok(BundleSummary {
        markdown_path,
        metadata_path,
        media_written,
    })
}

fn build_manifest(request: &BundleRequest<'_>) -> Value {
    let metadata = request.metadata;
    let output = request.output;
    json!({
        "version": "1.0",
        "timestamp": request.created_utc,
        "source": {
            "url": request.source_url,
            "title": metadata.title,
            "author": metadata.author,
            "publishDate": metadata.published,
            "description": metadata.description,
            "keywords": metadata.keywords,
            "language": metadata.language,
        },
        "content": {
            "statistics": content_json(&output.content),
        },
        "statistics": statistics_json(&output.statistics),
        "media": {
            "total": output.media_results.len(),
            "files": output.media_results.iter().map(media_json).collect::<Vec<_>>(),
        },
        "conversion": {
            "tool": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

fn content_json(stats: &ContentStatistics) -> Value {
    json!({
        "characters": stats.characters,
        "words": stats.words,
        "paragraphs": stats.paragraphs,
        "headings": stats.headings,
        "links": stats.links,
        "images": stats.images,
        "codeBlocks": stats.code_blocks,
        "tables": stats.tables,
        "lists": stats.lists,
    })
}

fn statistics_json(stats: &MediaStatistics) -> Value {
    let by_kind: serde_json::Map<String, Value> = stats
        .by_kind
        .iter()
        .map(|(kind, count)| (kind.as_str().to_string(), json!(count)))
        .collect();
    json!({
        "total": stats.total,
        "successful": stats.successful,
        "failed": stats.failed,
        "totalBytes": stats.total_bytes,
        "byKind": by_kind,
    })
}

fn media_json(result: &MediaResult) -> Value {
    json!({
        "url": result.source_url,
        "kind": result.kind.as_str(),
        "alt": result.alt_text,
        "localFilename": result.local_filename,
        "size": result.byte_size,
        "type": result.mime_type,
        "error": result.failure.as_ref().map(|failure| failure.to_string()),
    })
}
