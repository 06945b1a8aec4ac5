//! Arena-backed document tree consumed by the Markdown renderer.
//!
//! Nodes are addressed by [`NodeId`]; an element owns the ids of its children
//! and nothing points back up. Trees built from HTML are cleansed on import:
//! scripting and presentation-only elements and elements hidden through the
//! `hidden` attribute or an inline style never enter the arena.

use ego_tree::NodeRef;
use scraper::node::{Element as ScraperElement, Node};
use scraper::{ElementRef, Html};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Closed set of tags with dedicated rendering rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Heading(u8),
    Paragraph,
    LineBreak,
    Rule,
    Strong,
    Emphasis,
    Strike,
    Code,
    Pre,
    Anchor,
    Image,
    Video,
    Audio,
    Source,
    UnorderedList,
    OrderedList,
    ListItem,
    Blockquote,
    Table,
    TableHead,
    TableRow,
    TableHeader,
    TableCell,
    Nav,
    Details,
    Summary,
    Other,
}

impl Tag {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "h1" => Tag::Heading(1),
            "h2" => Tag::Heading(2),
            "h3" => Tag::Heading(3),
            "h4" => Tag::Heading(4),
            "h5" => Tag::Heading(5),
            "h6" => Tag::Heading(6),
            "p" => Tag::Paragraph,
            "br" => Tag::LineBreak,
            "hr" => Tag::Rule,
            "strong" | "b" => Tag::Strong,
            "em" | "i" => Tag::Emphasis,
            "del" | "s" | "strike" => Tag::Strike,
            "code" => Tag::Code,
            "pre" => Tag::Pre,
            "a" => Tag::Anchor,
            "img" => Tag::Image,
            "video" => Tag::Video,
            "audio" => Tag::Audio,
            "source" => Tag::Source,
            "ul" => Tag::UnorderedList,
            "ol" => Tag::OrderedList,
            "li" => Tag::ListItem,
            "blockquote" => Tag::Blockquote,
            "table" => Tag::Table,
            "thead" => Tag::TableHead,
            "tr" => Tag::TableRow,
            "th" => Tag::TableHeader,
            "td" => Tag::TableCell,
            "nav" => Tag::Nav,
            "details" => Tag::Details,
            "summary" => Tag::Summary,
            _ => Tag::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub tag: Tag,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<NodeId>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: Option<NodeId>,
}

/// Counts describing the imported content, below the root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentStatistics {
    pub characters: usize,
    pub words: usize,
    pub paragraphs: usize,
    pub headings: usize,
    pub links: usize,
    pub images: usize,
    /// `pre` and `code` elements, each counted.
    pub code_blocks: usize,
    pub tables: usize,
    pub lists: usize,
}

const STRIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "template", "head",
];

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an HTML fragment; the root is the parser's wrapper element.
    pub fn parse_fragment(html: &str) -> Self {
        let fragment = Html::parse_fragment(html);
        Self::from_element(fragment.root_element())
    }

    /// Parse a full HTML document rooted at `<html>`.
    pub fn parse_document(html: &str) -> Self {
        let document = Html::parse_document(html);
        Self::from_element(document.root_element())
    }

    /// Import a parsed subtree, cleansing it on the way in.
    pub fn from_element(element: ElementRef<'_>) -> Self {
        let mut doc = Self::new();
        doc.root = doc.import(*element);
        doc
    }

    pub fn text(&mut self, content: impl Into<String>) -> NodeId {
        self.push(NodeData::Text(content.into()))
    }

    /// Append an element whose children were already added.
    pub fn element(&mut self, name: &str, attrs: &[(&str, &str)], children: Vec<NodeId>) -> NodeId {
        let name = name.to_ascii_lowercase();
        self.push(NodeData::Element(Element {
            tag: Tag::from_name(&name),
            name,
            attrs: attrs
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
            children,
        }))
    }

    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    pub fn as_element(&self, id: NodeId) -> Option<&Element> {
        match self.node(id) {
            NodeData::Element(element) => Some(element),
            NodeData::Text(_) => None,
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<Tag> {
        self.as_element(id).map(|element| element.tag)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.node(id) {
            NodeData::Element(element) => &element.children,
            NodeData::Text(_) => &[],
        }
    }

    /// All nodes below `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    pub fn find_descendant(&self, id: NodeId, tag: Tag) -> Option<NodeId> {
        self.descendants(id)
            .into_iter()
            .find(|candidate| self.tag(*candidate) == Some(tag))
    }

    pub fn descendants_with(&self, id: NodeId, tags: &[Tag]) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|candidate| self.tag(*candidate).is_some_and(|tag| tags.contains(&tag)))
            .collect()
    }

    /// Concatenated text of every text node at or below `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let NodeData::Text(text) = self.node(id) {
            out.push_str(text);
        }
        for node in self.descendants(id) {
            if let NodeData::Text(text) = self.node(node) {
                out.push_str(text);
            }
        }
        out
    }

    /// Text and element counts below the root; blank text nodes are ignored.
    pub fn content_statistics(&self) -> ContentStatistics {
        let mut stats = ContentStatistics::default();
        let Some(root) = self.root else {
            return stats;
        };
        for id in self.descendants(root) {
            let tag = match self.node(id) {
                NodeData::Text(text) => {
                    if !text.trim().is_empty() {
                        stats.characters += text.chars().count();
                        stats.words += text.split_whitespace().count();
                    }
                    continue;
                }
                NodeData::Element(element) => element.tag,
            };
            match tag {
                Tag::Paragraph => stats.paragraphs += 1,
                Tag::Heading(_) => stats.headings += 1,
                Tag::Anchor => stats.links += 1,
                Tag::Image => stats.images += 1,
                Tag::Pre | Tag::Code => stats.code_blocks += 1,
                Tag::Table => stats.tables += 1,
                Tag::UnorderedList | Tag::OrderedList => stats.lists += 1,
                _ => {}
            }
        }
        stats
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(data);
        id
    }

    /// Post-order import with an explicit stack, so nesting depth is bounded
    /// only by memory.
    fn import(&mut self, root: NodeRef<'_, Node>) -> Option<NodeId> {
        let element = match root.value() {
            Node::Text(text) => {
                let content: &str = text;
                return Some(self.text(content));
            }
            Node::Element(element) if is_kept(element) => element,
            _ => return None,
        };

        let mut stack = vec![PendingElement::new(root, element)];
        let mut imported = None;
        while let Some(top) = stack.last_mut() {
            if let Some(child) = top.next_child {
                top.next_child = child.next_sibling();
                match child.value() {
                    Node::Text(text) => {
                        let content: &str = text;
                        let id = self.text(content);
                        top.children.push(id);
                    }
                    Node::Element(element) if is_kept(element) => {
                        stack.push(PendingElement::new(child, element));
                    }
                    _ => {}
                }
                continue;
            }

            let Some(done) = stack.pop() else { break };
            let id = self.push_imported(done.element, done.children);
            match stack.last_mut() {
                Some(parent) => parent.children.push(id),
                None => imported = Some(id),
            }
        }
        imported
    }

    fn push_imported(&mut self, element: &ScraperElement, children: Vec<NodeId>) -> NodeId {
        let name = element.name().to_ascii_lowercase();
        let attrs = element
            .attrs()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        self.push(NodeData::Element(Element {
            tag: Tag::from_name(&name),
            name,
            attrs,
            children,
        }))
    }
}

/// An element whose children are still being imported.
struct PendingElement<'a> {
    element: &'a ScraperElement,
    next_child: Option<NodeRef<'a, Node>>,
    children: Vec<NodeId>,
}

impl<'a> PendingElement<'a> {
    fn new(node: NodeRef<'a, Node>, element: &'a ScraperElement) -> Self {
        Self {
            element,
            next_child: node.first_child(),
            children: Vec::new(),
        }
    }
}

fn is_kept(element: &ScraperElement) -> bool {
    let name = element.name().to_ascii_lowercase();
    !STRIPPED_TAGS.contains(&name.as_str()) && !is_hidden(element)
}

fn is_hidden(element: &ScraperElement) -> bool {
    if element.attr("hidden").is_some() {
        return true;
    }
    let Some(style) = element.attr("style") else {
        return false;
    };
    let compact: String = style
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    compact
        .split(';')
        .any(|decl| decl.starts_with("display:none") || decl.starts_with("visibility:hidden"))
}

#[cfg(test)]
mod tests {
    use super::{ContentStatistics, Document, NodeData, Tag};

    #[test]
    fn scripts_and_hidden_elements_are_not_imported() {
        let doc = Document::parse_fragment(
            r#"<p>keep</p><script>x()</script><div hidden>a</div><span style="display: none">b</span><p style="color:red">c</p>"#,
        );
        let root = doc.root().unwrap();
        assert_eq!(doc.text_content(root), "keepc");
        assert!(doc.find_descendant(root, Tag::Other).is_none());
    }

    #[test]
    fn descendants_are_in_document_order() {
        let mut doc = Document::new();
        let a = doc.text("a");
        let b = doc.text("b");
        let inner = doc.element("em", &[], vec![b]);
        let c = doc.text("c");
        let root = doc.element("P", &[("Class", "x")], vec![a, inner, c]);
        doc.set_root(root);

        assert_eq!(doc.descendants(root), vec![a, inner, b, c]);
        assert_eq!(doc.text_content(root), "abc");
        assert_eq!(doc.tag(root), Some(Tag::Paragraph));
        assert_eq!(doc.as_element(root).unwrap().attr("class"), Some("x"));
        assert!(matches!(doc.node(a), NodeData::Text(t) if t == "a"));
    }

    #[test]
    fn content_statistics_count_cleansed_content() {
        let doc = Document::parse_fragment(
            "<h1>Title</h1><p>one  two</p>\n<p><a href=\"/\">three</a><img src=\"a.png\"></p>\
             <pre><code>x</code></pre><ul><li>four</li></ul><table><tr><td>5</td></tr></table>\
             <script>hidden words</script>",
        );
        let stats = doc.content_statistics();
        assert_eq!(
            stats,
            ContentStatistics {
                characters: 24,
                words: 7,
                paragraphs: 2,
                headings: 1,
                links: 1,
                images: 1,
                code_blocks: 2,
                tables: 1,
                lists: 1,
            }
        );
        assert_eq!(Document::new().content_statistics(), ContentStatistics::default());
    }

    #[test]
    fn deeply_nested_markup_imports_without_recursion() {
        let depth = 10_000;
        let html = format!("{}x{}", "<div>".repeat(depth), "</div>".repeat(depth));
        let doc = Document::parse_fragment(&html);
        let root = doc.root().unwrap();
        assert_eq!(doc.text_content(root), "x");
        assert!(doc.len() > depth);
    }

    #[test]
    fn import_keeps_sibling_order_around_stripped_children() {
        let doc = Document::parse_fragment("<p>a<script>b</script><em>c</em>d</p>");
        let root = doc.root().unwrap();
        let paragraph = doc.find_descendant(root, Tag::Paragraph).unwrap();
        assert_eq!(doc.children(paragraph).len(), 3);
        assert_eq!(doc.text_content(paragraph), "acd");
    }
}
