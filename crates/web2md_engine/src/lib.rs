//! web2md engine: HTML tree to Markdown rendering and media materialization.
mod bundle;
mod decode;
mod dom;
mod extract;
mod fetch;
mod filename;
mod frontmatter;
mod materialize;
mod persist;
mod pipeline;
mod render;
mod types;

pub use bundle::{
    rewrite_media_links, write_bundle, BundleError, BundleRequest, BundleSummary, MEDIA_DIR,
    METADATA_FILENAME,
};
pub use decode::{decode_html, DecodeError, DecodedHtml};
pub use dom::{ContentStatistics, Document, Element, NodeData, NodeId, Tag};
pub use extract::{ExtractError, ExtractedContent, Extractor, MainContentExtractor, PageMetadata};
pub use fetch::{
    FetchSettings, Fetcher, NullProgressSink, ProgressSink, ReqwestFetcher, DEFAULT_MAX_BYTES,
};
pub use filename::{derive_media_filename, deterministic_filename, extension_for_mime};
pub use frontmatter::{build_markdown_document, FrontMatter};
pub use materialize::{
    MaterializeSettings, MediaMaterializer, MediaStatistics, DEFAULT_MAX_CONCURRENT,
};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use pipeline::{Pipeline, PipelineError, PipelineOutput, PipelineSettings};
pub use render::{
    clean_markdown, resolve_url, ConversionContext, MarkdownRenderer, Rendering, MAX_RENDER_DEPTH,
};
pub use types::{
    EngineEvent, FailureKind, FetchError, FetchMetadata, FetchOutput, MediaKind, MediaProgress,
    MediaReference, MediaResult,
};
