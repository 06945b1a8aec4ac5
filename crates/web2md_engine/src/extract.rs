use engine_logging::{engine_info, engine_warn};
use scraper::{ElementRef, Html, Selector};

use crate::dom::Document;

/// Selectors tried in order when looking for the main content.
const MAIN_CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role=\"main\"]",
    ".main-content",
    "#main-content",
    ".post-content",
    ".article-content",
    ".entry-content",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub published: Option<String>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    pub metadata: PageMetadata,
    pub document: Document,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("invalid css selector {selector:?}: {message}")]
    InvalidSelector { selector: String, message: String },
}

pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str) -> ExtractedContent;
}

/// Picks the first main-content container, falling back to `<body>` and then
/// the whole document, and reads the usual page metadata.
///
/// A user-chosen selector, when set, is tried before the built-in list.
#[derive(Debug, Clone, Default)]
pub struct MainContentExtractor {
    chosen: Option<ChosenSelector>,
}

#[derive(Debug, Clone)]
struct ChosenSelector {
    css: String,
    selector: Selector,
}

impl MainContentExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_selector(css: &str) -> Result<Self, ExtractError> {
        let selector = Selector::parse(css).map_err(|err| ExtractError::InvalidSelector {
            selector: css.to_string(),
            message: err.to_string(),
        })?;
        Ok(Self {
            chosen: Some(ChosenSelector {
                css: css.to_string(),
                selector,
            }),
        })
    }

    fn chosen_root<'a>(&self, page: &'a Html) -> Option<ElementRef<'a>> {
        let chosen = self.chosen.as_ref()?;
        match page.select(&chosen.selector).next() {
            Some(element) => {
                engine_info!("Converting the first element matching {:?}", chosen.css);
                Some(element)
            }
            None => {
                engine_warn!(
                    "No element matches {:?}; detecting the main content instead",
                    chosen.css
                );
                None
            }
        }
    }
}

impl Extractor for MainContentExtractor {
    fn extract(&self, html: &str) -> ExtractedContent {
        let page = Html::parse_document(html);
        let root = self
            .chosen_root(&page)
            .or_else(|| {
                MAIN_CONTENT_SELECTORS
                    .iter()
                    .find_map(|selector| select_first(&page, selector))
            })
            .or_else(|| select_first(&page, "body"))
            .unwrap_or_else(|| page.root_element());

        ExtractedContent {
            metadata: read_metadata(&page),
            document: Document::from_element(root),
        }
    }
}

fn select_first<'a>(page: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    page.select(&selector).next()
}

fn element_text(page: &Html, selector: &str) -> Option<String> {
    select_first(page, selector)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

fn attribute(page: &Html, selector: &str, name: &str) -> Option<String> {
    select_first(page, selector)
        .and_then(|element| element.value().attr(name))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_metadata(page: &Html) -> PageMetadata {
    let title = element_text(page, "h1")
        .or_else(|| attribute(page, "meta[property=\"og:title\"]", "content"))
        .or_else(|| element_text(page, "title"));
    let author = attribute(page, "meta[name=\"author\"]", "content")
        .or_else(|| attribute(page, "meta[property=\"article:author\"]", "content"))
        .or_else(|| element_text(page, ".author, .byline, [rel=\"author\"]"));
    let published = attribute(page, "meta[property=\"article:published_time\"]", "content")
        .or_else(|| attribute(page, "time[datetime]", "datetime"));
    let description = attribute(page, "meta[name=\"description\"]", "content")
        .or_else(|| attribute(page, "meta[property=\"og:description\"]", "content"));
    let keywords = attribute(page, "meta[name=\"keywords\"]", "content")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|keyword| !keyword.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let language = page
        .root_element()
        .value()
        .attr("lang")
        .map(str::to_string);

    PageMetadata {
        title,
        author,
        published,
        description,
        keywords,
        language,
    }
}
