use crate::extract::PageMetadata;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub source: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub created: String,
}

impl FrontMatter {
    pub fn from_metadata(metadata: &PageMetadata, source: &str, created: &str) -> Self {
        Self {
            title: metadata.title.clone(),
            source: (!source.is_empty()).then(|| source.to_string()),
            author: metadata.author.clone(),
            date: metadata.published.clone(),
            description: metadata.description.clone(),
            keywords: metadata.keywords.clone(),
            created: created.to_string(),
        }
    }

    /// YAML block between `---` fences; absent fields are omitted and page-derived
    /// values are double-quoted.
    pub fn render(&self) -> String {
        let mut lines = vec!["---".to_string()];
        if let Some(title) = &self.title {
            lines.push(format!("title: \"{}\"", escape_yaml(title)));
        }
        if let Some(source) = &self.source {
            lines.push(format!("source: \"{}\"", escape_yaml(source)));
        }
        if let Some(author) = &self.author {
            lines.push(format!("author: \"{}\"", escape_yaml(author)));
        }
        if let Some(date) = &self.date {
            lines.push(format!("date: \"{}\"", escape_yaml(date)));
        }
        if let Some(description) = &self.description {
            lines.push(format!("description: \"{}\"", escape_yaml(description)));
        }
        if !self.keywords.is_empty() {
            lines.push("keywords:".to_string());
            lines.extend(self.keywords.iter().map(|keyword| format!("  - \"{}\"", escape_yaml(keyword))));
        }
        lines.push(format!("created: {}", self.created));
        lines.push("---".to_string());
        lines.join("\n")
    }
}

pub fn build_markdown_document(front_matter: &FrontMatter, body_markdown: &str) -> String {
    format!("{}\n\n{body_markdown}", front_matter.render())
}

fn escape_yaml(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace(['\n', '\r'], " ")
}
