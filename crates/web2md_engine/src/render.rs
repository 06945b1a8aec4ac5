//! Tree transducer: walks a [`Document`] and emits Markdown plus the media
//! references discovered along the way.
//!
//! Every element is dispatched on its [`Tag`]; tags without a rule render their
//! children and drop the wrapper. Per-node state travels down the recursion in a
//! [`ConversionContext`] value, and media references are collected into an
//! accumulator owned by the current call, so a renderer holds no per-run state
//! and can be shared freely.

use std::cell::Cell;

use engine_logging::engine_warn;
use url::Url;

use crate::dom::{Document, NodeData, NodeId, Tag};
use crate::types::{MediaKind, MediaReference};

/// Element nesting rendered with full rules; deeper subtrees collapse to text.
pub const MAX_RENDER_DEPTH: usize = 128;

/// Formatting state derived for each node from its parent's context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionContext {
    pub preserve_whitespace: bool,
    pub trim_start: bool,
    pub trim_end: bool,
    pub is_first: bool,
    pub is_last: bool,
    pub in_preformatted: bool,
}

impl ConversionContext {
    /// Context for child `index` of `count`; edge trimming only reaches edge children.
    fn child(self, index: usize, count: usize) -> Self {
        let is_first = index == 0;
        let is_last = index + 1 == count;
        Self {
            is_first,
            is_last,
            trim_start: self.trim_start && is_first,
            trim_end: self.trim_end && is_last,
            ..self
        }
    }

    fn block(self) -> Self {
        Self {
            trim_start: true,
            trim_end: true,
            ..self
        }
    }

    fn preformatted(self) -> Self {
        Self {
            preserve_whitespace: true,
            in_preformatted: true,
            ..self
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendering {
    pub markdown: String,
    pub media: Vec<MediaReference>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Render the document's root and apply the final cleanup pass.
    pub fn render(&self, document: &Document, base_url: &str) -> Rendering {
        let raw = self.render_raw(document, base_url);
        Rendering {
            markdown: clean_markdown(&raw.markdown),
            media: raw.media,
        }
    }

    /// Render without the final cleanup pass.
    pub fn render_raw(&self, document: &Document, base_url: &str) -> Rendering {
        let base = match Url::parse(base_url) {
            Ok(url) => Some(url),
            Err(err) => {
                if !base_url.is_empty() {
                    engine_warn!("Ignoring malformed base url {:?}: {}", base_url, err);
                }
                None
            }
        };
        let walker = TreeWalker {
            doc: document,
            base: base.as_ref(),
            depth: Cell::new(0),
        };
        let mut media = Vec::new();
        let markdown = match document.root() {
            Some(root) => walker.node(root, ConversionContext::default(), &mut media),
            None => String::new(),
        };
        Rendering { markdown, media }
    }
}

struct TreeWalker<'a> {
    doc: &'a Document,
    base: Option<&'a Url>,
    depth: Cell<usize>,
}

impl TreeWalker<'_> {
    fn node(&self, id: NodeId, ctx: ConversionContext, media: &mut Vec<MediaReference>) -> String {
        let depth = self.depth.get();
        if depth >= MAX_RENDER_DEPTH {
            return render_text(&self.doc.text_content(id), ctx);
        }
        self.depth.set(depth + 1);
        let out = match self.doc.node(id) {
            NodeData::Text(text) => render_text(text, ctx),
            NodeData::Element(_) => self.element(id, ctx, media),
        };
        self.depth.set(depth);
        out
    }

    fn children(
        &self,
        id: NodeId,
        ctx: ConversionContext,
        media: &mut Vec<MediaReference>,
    ) -> String {
        self.children_except(id, None, ctx, media)
    }

    fn children_except(
        &self,
        id: NodeId,
        skip: Option<NodeId>,
        ctx: ConversionContext,
        media: &mut Vec<MediaReference>,
    ) -> String {
        let children: Vec<NodeId> = self
            .doc
            .children(id)
            .iter()
            .copied()
            .filter(|child| Some(*child) != skip)
            .collect();
        let count = children.len();
        children
            .into_iter()
            .enumerate()
            .map(|(index, child)| self.node(child, ctx.child(index, count), media))
            .collect()
    }

    fn inline(&self, id: NodeId, ctx: ConversionContext, media: &mut Vec<MediaReference>) -> String {
        self.children(id, ctx, media).trim().to_string()
    }

    fn element(&self, id: NodeId, ctx: ConversionContext, media: &mut Vec<MediaReference>) -> String {
        let Some(tag) = self.doc.tag(id) else {
            return String::new();
        };
        // Inside a preformatted region every element contributes its raw text.
        if ctx.in_preformatted {
            return self.children(id, ctx, media);
        }

        match tag {
            Tag::Heading(level) => {
                let content = self.inline(id, ctx.block(), media);
                format!("\n{} {content}\n\n", "#".repeat(usize::from(level)))
            }
            Tag::Paragraph => {
                let content = self.inline(id, ctx.block(), media);
                if content.is_empty() {
                    String::new()
                } else {
                    format!("\n{content}\n\n")
                }
            }
            Tag::LineBreak => "  \n".to_string(),
            Tag::Rule => "\n---\n\n".to_string(),
            Tag::Strong => format!("**{}**", self.inline(id, ctx, media)),
            Tag::Emphasis => format!("*{}*", self.inline(id, ctx, media)),
            Tag::Strike => format!("~~{}~~", self.inline(id, ctx, media)),
            Tag::Code => format!("`{}`", self.doc.text_content(id)),
            Tag::Pre => self.preformatted(id, ctx, media),
            Tag::Anchor => self.anchor(id, ctx, media),
            Tag::Image => self.image(id, media),
            Tag::Video => self.playable(id, MediaKind::Video, ctx, media),
            Tag::Audio => self.playable(id, MediaKind::Audio, ctx, media),
            Tag::UnorderedList | Tag::OrderedList => {
                format!("\n{}\n", self.list(id, 0, ctx, media))
            }
            Tag::Blockquote => {
                let content = self.inline(id, ctx.block(), media);
                let quoted: Vec<String> = content.split('\n').map(|line| format!("> {line}")).collect();
                format!("\n{}\n\n", quoted.join("\n"))
            }
            Tag::Table => self.table(id, ctx, media),
            Tag::Nav => String::new(),
            Tag::Details => self.details(id, ctx, media),
            Tag::Source
            | Tag::ListItem
            | Tag::TableHead
            | Tag::TableRow
            | Tag::TableHeader
            | Tag::TableCell
            | Tag::Summary
            | Tag::Other => self.children(id, ctx, media),
        }
    }

    fn preformatted(
        &self,
        id: NodeId,
        ctx: ConversionContext,
        media: &mut Vec<MediaReference>,
    ) -> String {
        let code = self.doc.find_descendant(id, Tag::Code);
        let language = code
            .and_then(|code| self.doc.as_element(code))
            .and_then(|code| code.attr("class"))
            .and_then(fence_language)
            .unwrap_or_default();
        let body = self.children(code.unwrap_or(id), ctx.preformatted(), media);
        format!("\n```{language}\n{body}\n```\n\n")
    }

    fn anchor(&self, id: NodeId, ctx: ConversionContext, media: &mut Vec<MediaReference>) -> String {
        let text = self.inline(id, ctx, media);
        let href = self
            .doc
            .as_element(id)
            .and_then(|element| element.attr("href"))
            .filter(|href| !href.is_empty());
        match href {
            Some(href) => format!("[{text}]({})", resolve_url(href, self.base)),
            None => text,
        }
    }

    fn image(&self, id: NodeId, media: &mut Vec<MediaReference>) -> String {
        let Some(element) = self.doc.as_element(id) else {
            return String::new();
        };
        // Lazy-loading pages park the real source in `data-src`.
        let src = element
            .attr("src")
            .filter(|src| !src.is_empty())
            .or_else(|| element.attr("data-src").filter(|src| !src.is_empty()));
        let Some(src) = src else {
            return String::new();
        };
        let alt = element.attr("alt").unwrap_or_default();
        let url = resolve_url(src, self.base);
        media.push(MediaReference {
            url: url.clone(),
            kind: MediaKind::Image,
            alt_text: (!alt.is_empty()).then(|| alt.to_string()),
        });
        format!("![{alt}]({url})")
    }

    fn playable(
        &self,
        id: NodeId,
        kind: MediaKind,
        ctx: ConversionContext,
        media: &mut Vec<MediaReference>,
    ) -> String {
        let Some(element) = self.doc.as_element(id) else {
            return String::new();
        };
        let src = element.attr("src").filter(|src| !src.is_empty()).or_else(|| {
            element
                .children
                .iter()
                .filter(|child| self.doc.tag(**child) == Some(Tag::Source))
                .find_map(|child| self.doc.as_element(*child)?.attr("src"))
                .filter(|src| !src.is_empty())
        });
        let Some(src) = src else {
            return self.children(id, ctx, media);
        };
        let title = element.attr("title").map(str::trim).filter(|t| !t.is_empty());
        let url = resolve_url(src, self.base);
        media.push(MediaReference {
            url: url.clone(),
            kind,
            alt_text: title.map(str::to_string),
        });
        format!("[{}]({url})", title.unwrap_or(kind.as_str()))
    }

    fn list(
        &self,
        id: NodeId,
        depth: usize,
        ctx: ConversionContext,
        media: &mut Vec<MediaReference>,
    ) -> String {
        let ordered = self.doc.tag(id) == Some(Tag::OrderedList);
        self.list_items(id)
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let marker = if ordered {
                    format!("{}.", index + 1)
                } else {
                    "-".to_string()
                };
                self.list_item(item, &marker, depth, ctx, media)
            })
            .collect()
    }

    fn list_items(&self, list: NodeId) -> Vec<NodeId> {
        self.doc
            .children(list)
            .iter()
            .copied()
            .filter(|child| self.doc.tag(*child) == Some(Tag::ListItem))
            .collect()
    }

    fn list_item(
        &self,
        item: NodeId,
        marker: &str,
        depth: usize,
        ctx: ConversionContext,
        media: &mut Vec<MediaReference>,
    ) -> String {
        let indent = "  ".repeat(depth);
        let level = self.depth.get();
        if level >= MAX_RENDER_DEPTH {
            let text = render_text(&self.doc.text_content(item), ctx.block());
            return format!("{indent}{marker} {text}\n");
        }
        self.depth.set(level + 1);
        let children = self.doc.children(item);
        let count = children.len();
        let mut content = String::new();
        let mut nested_block = String::new();
        for (index, child) in children.iter().copied().enumerate() {
            let nested_marker = match self.doc.tag(child) {
                Some(Tag::UnorderedList) => Some("-"),
                Some(Tag::OrderedList) => Some("1."),
                _ => None,
            };
            match nested_marker {
                Some(nested_marker) => {
                    for nested in self.list_items(child) {
                        nested_block.push_str(&self.list_item(
                            nested,
                            nested_marker,
                            depth + 1,
                            ctx,
                            media,
                        ));
                    }
                }
                None => content.push_str(&self.node(child, ctx.child(index, count), media)),
            }
        }
        self.depth.set(level);
        format!("{indent}{marker} {}\n{nested_block}", content.trim())
    }

    fn table(&self, id: NodeId, ctx: ConversionContext, media: &mut Vec<MediaReference>) -> String {
        let rows = self.doc.descendants_with(id, &[Tag::TableRow]);
        let Some(first_row) = rows.first() else {
            return String::new();
        };
        let has_header = self.doc.find_descendant(id, Tag::TableHead).is_some()
            || self.doc.find_descendant(*first_row, Tag::TableHeader).is_some();

        let mut markdown = String::from("\n");
        for (row_index, row) in rows.iter().enumerate() {
            let cells = self
                .doc
                .descendants_with(*row, &[Tag::TableHeader, Tag::TableCell]);
            let contents: Vec<String> = cells
                .iter()
                .map(|cell| self.inline(*cell, ctx.block(), media))
                .collect();
            markdown.push_str(&format!("| {} |\n", contents.join(" | ")));
            if row_index == 0 && has_header {
                let separators = vec!["---"; cells.len()];
                markdown.push_str(&format!("| {} |\n", separators.join(" | ")));
            }
        }
        markdown.push('\n');
        markdown
    }

    fn details(&self, id: NodeId, ctx: ConversionContext, media: &mut Vec<MediaReference>) -> String {
        let summary = self.doc.find_descendant(id, Tag::Summary);
        let label = summary
            .map(|summary| self.doc.text_content(summary).trim().to_string())
            .unwrap_or_else(|| "Details".to_string());
        let content = self
            .children_except(id, summary, ctx.block(), media)
            .trim()
            .to_string();
        format!("\n**{label}**\n\n{content}\n\n")
    }
}

fn render_text(text: &str, ctx: ConversionContext) -> String {
    if ctx.preserve_whitespace {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut in_whitespace = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                out.push(' ');
            }
            in_whitespace = true;
        } else {
            out.push(ch);
            in_whitespace = false;
        }
    }
    let out = if ctx.trim_start { out.trim_start() } else { &out };
    let out = if ctx.trim_end { out.trim_end() } else { out };
    out.to_string()
}

/// First `language-<name>` class token; the name is its leading word characters.
fn fence_language(class: &str) -> Option<String> {
    class.split_whitespace().find_map(|token| {
        let name: String = token
            .strip_prefix("language-")?
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        (!name.is_empty()).then_some(name)
    })
}

/// Resolve `reference` against `base`; on failure the reference is returned unchanged.
pub fn resolve_url(reference: &str, base: Option<&Url>) -> String {
    let resolved = match base {
        Some(base) => base.join(reference),
        None => Url::parse(reference),
    };
    match resolved {
        Ok(url) => url.into(),
        Err(err) => {
            engine_warn!("Keeping malformed url {:?} unresolved: {}", reference, err);
            reference.to_string()
        }
    }
}

/// Collapse runs of three or more newlines to two, trim, and end with one newline.
pub fn clean_markdown(markdown: &str) -> String {
    let mut collapsed = String::with_capacity(markdown.len());
    let mut newlines = 0usize;
    for ch in markdown.chars() {
        if ch == '\n' {
            newlines += 1;
            if newlines > 2 {
                continue;
            }
        } else {
            newlines = 0;
        }
        collapsed.push(ch);
    }
    let mut out = collapsed.trim().to_string();
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::{clean_markdown, fence_language, render_text, ConversionContext};

    #[test]
    fn fence_language_takes_first_language_token() {
        assert_eq!(fence_language("hljs language-rust language-c"), Some("rust".into()));
        assert_eq!(fence_language("language-c++"), Some("c".into()));
        assert_eq!(fence_language("highlight"), None);
        assert_eq!(fence_language("language-"), None);
    }

    #[test]
    fn text_collapses_and_trims_only_flagged_edges() {
        let ctx = ConversionContext::default();
        assert_eq!(render_text("  a \n\t b  ", ctx), " a b ");
        let start = ConversionContext {
            trim_start: true,
            ..ctx
        };
        assert_eq!(render_text("  a  b  ", start), "a b ");
        let verbatim = ConversionContext {
            preserve_whitespace: true,
            trim_start: true,
            ..ctx
        };
        assert_eq!(render_text("  a\n\n b", verbatim), "  a\n\n b");
    }

    #[test]
    fn cleanup_collapses_newline_runs() {
        assert_eq!(clean_markdown("\n\na\n\n\n\nb\n\n\n"), "a\n\nb\n");
        assert_eq!(clean_markdown(""), "\n");
    }
}
