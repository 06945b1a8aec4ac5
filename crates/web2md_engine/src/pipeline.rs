use std::sync::Arc;

use engine_logging::engine_info;

use crate::dom::{ContentStatistics, Document};
use crate::fetch::{FetchSettings, Fetcher, NullProgressSink, ProgressSink, ReqwestFetcher};
use crate::materialize::{MaterializeSettings, MediaMaterializer, MediaStatistics};
use crate::render::MarkdownRenderer;
use crate::{FetchError, MediaResult};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub fetch: FetchSettings,
    pub materialize: MaterializeSettings,
    /// When false the media references are discovered but nothing is fetched.
    pub download_media: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            fetch: FetchSettings::default(),
            materialize: MaterializeSettings::default(),
            download_media: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineOutput {
    pub markdown: String,
    pub media_results: Vec<MediaResult>,
    pub statistics: MediaStatistics,
    pub content: ContentStatistics,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to build http client: {0}")]
    Client(#[from] FetchError),
}

/// Render a document, then materialize the media it references.
pub struct Pipeline {
    renderer: MarkdownRenderer,
    materializer: MediaMaterializer,
    download_media: bool,
}

impl Pipeline {
    pub fn new(settings: PipelineSettings) -> Result<Self, PipelineError> {
        let fetcher = Arc::new(ReqwestFetcher::new(settings.fetch.clone())?);
        Ok(Self::with_fetcher(settings, fetcher))
    }

    pub fn with_fetcher(settings: PipelineSettings, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            renderer: MarkdownRenderer::new(),
            materializer: MediaMaterializer::new(fetcher, settings.materialize),
            download_media: settings.download_media,
        }
    }

    pub async fn run(&self, document: &Document, base_url: &str) -> PipelineOutput {
        self.run_with_progress(document, base_url, Arc::new(NullProgressSink))
            .await
    }

    pub async fn run_with_progress(
        &self,
        document: &Document,
        base_url: &str,
        sink: Arc<dyn ProgressSink>,
    ) -> PipelineOutput {
        let rendering = self.renderer.render(document, base_url);
        engine_info!(
            "Rendered {} bytes of markdown with {} media references",
            rendering.markdown.len(),
            rendering.media.len()
        );

        let media_results = if self.download_media {
            self.materializer
                .materialize_with_progress(rendering.media, sink)
                .await
        } else {
            Vec::new()
        };
        let statistics = MediaStatistics::from_results(&media_results);

        PipelineOutput {
            markdown: rendering.markdown,
            media_results,
            statistics,
            content: document.content_statistics(),
        }
    }
}
