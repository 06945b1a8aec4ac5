use std::fs;

use bytes::Bytes;
use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::TempDir;
use web2md_engine::{
    build_markdown_document, rewrite_media_links, write_bundle, BundleRequest, ContentStatistics,
    FailureKind,
    FetchError, FrontMatter, MediaKind, MediaResult, MediaStatistics, PageMetadata,
    PipelineOutput, MEDIA_DIR, METADATA_FILENAME,
};

const CREATED: &str = "2024-05-01T12:00:00+00:00";

fn success(url: &str, kind: MediaKind, filename: &str, payload: &'static [u8]) -> MediaResult {
    MediaResult {
        source_url: url.to_string(),
        kind,
        alt_text: None,
        local_filename: Some(filename.to_string()),
        byte_size: Some(payload.len() as u64),
        mime_type: Some("image/png".to_string()),
        failure: None,
        payload: Some(Bytes::from_static(payload)),
    }
}

fn failure(url: &str) -> MediaResult {
    MediaResult {
        source_url: url.to_string(),
        kind: MediaKind::Image,
        alt_text: None,
        local_filename: None,
        byte_size: None,
        mime_type: None,
        failure: Some(FetchError::new(
            FailureKind::FetchFailed { status: Some(404) },
            "404 Not Found",
        )),
        payload: None,
    }
}

fn sample_output() -> PipelineOutput {
    let media_results = vec![
        success("https://ex.com/a.png", MediaKind::Image, "a_1234.png", b"AAAA"),
        success("https://ex.com/v.mp4", MediaKind::Video, "v_5678.mp4", b"VV"),
        failure("https://ex.com/missing.png"),
    ];
    let statistics = MediaStatistics::from_results(&media_results);
    PipelineOutput {
        markdown: "# Post\n\n![a](https://ex.com/a.png)\n\n[video](https://ex.com/v.mp4)\n\n![m](https://ex.com/missing.png)\n"
            .to_string(),
        media_results,
        statistics,
        content: ContentStatistics {
            characters: 48,
            words: 9,
            paragraphs: 2,
            headings: 1,
            links: 1,
            images: 2,
            code_blocks: 0,
            tables: 0,
            lists: 1,
        },
    }
}

fn sample_metadata() -> PageMetadata {
    PageMetadata {
        title: Some("Post: \"Quoted\"".to_string()),
        author: Some("Jo".to_string()),
        published: Some("2024-04-30".to_string()),
        description: None,
        keywords: vec!["a".to_string(), "b".to_string()],
        language: Some("en".to_string()),
    }
}

#[test]
fn rewrite_points_successful_media_at_local_files() {
    let output = sample_output();
    let rewritten = rewrite_media_links(&output.markdown, &output.media_results, MEDIA_DIR);
    assert_eq!(
        rewritten,
        "# Post\n\n![a](media/a_1234.png)\n\n[video](media/v_5678.mp4)\n\n![m](https://ex.com/missing.png)\n"
    );
}

#[test]
fn front_matter_quotes_free_text_and_omits_missing_fields() {
    let front = FrontMatter::from_metadata(&sample_metadata(), "https://ex.com/post", CREATED);
    assert_eq!(
        front.render(),
        "---\n\
         title: \"Post: \\\"Quoted\\\"\"\n\
         source: \"https://ex.com/post\"\n\
         author: \"Jo\"\n\
         date: \"2024-04-30\"\n\
         keywords:\n  - \"a\"\n  - \"b\"\n\
         created: 2024-05-01T12:00:00+00:00\n\
         ---"
    );

    let bare = FrontMatter {
        created: CREATED.to_string(),
        ..FrontMatter::default()
    };
    assert_eq!(
        build_markdown_document(&bare, "body\n"),
        "---\ncreated: 2024-05-01T12:00:00+00:00\n---\n\nbody\n"
    );
}

#[test]
fn front_matter_quotes_values_that_would_break_yaml() {
    let metadata = PageMetadata {
        published: Some("2024: \"draft\"".to_string()),
        keywords: vec!["a: b".to_string(), "- c".to_string(), "#tag".to_string()],
        ..PageMetadata::default()
    };
    let front = FrontMatter::from_metadata(&metadata, "https://ex.com/?q=a: b#x", CREATED);
    assert_eq!(
        front.render(),
        "---\n\
         source: \"https://ex.com/?q=a: b#x\"\n\
         date: \"2024: \\\"draft\\\"\"\n\
         keywords:\n  - \"a: b\"\n  - \"- c\"\n  - \"#tag\"\n\
         created: 2024-05-01T12:00:00+00:00\n\
         ---"
    );
}

#[test]
fn bundle_writes_markdown_media_and_manifest() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("20240501_120000");
    let output = sample_output();
    let metadata = sample_metadata();
    let request = BundleRequest {
        source_url: "https://ex.com/post",
        metadata: &metadata,
        created_utc: CREATED,
        output: &output,
    };

    let summary = write_bundle(&dir, &request).unwrap();

    assert_eq!(summary.media_written, 2);
    assert_eq!(fs::read(dir.join(MEDIA_DIR).join("a_1234.png")).unwrap(), b"AAAA");
    assert_eq!(fs::read(dir.join(MEDIA_DIR).join("v_5678.mp4")).unwrap(), b"VV");
    assert_eq!(fs::read_dir(dir.join(MEDIA_DIR)).unwrap().count(), 2);

    let file_name = summary.markdown_path.file_name().unwrap().to_string_lossy().to_string();
    assert!(file_name.starts_with("Post_ _Quoted--"), "{file_name}");
    let document = fs::read_to_string(&summary.markdown_path).unwrap();
    assert!(document.starts_with("---\ntitle: "));
    assert!(document.contains("---\n\n# Post\n\n![a](media/a_1234.png)"));
    assert!(document.contains("![m](https://ex.com/missing.png)"));

    assert_eq!(summary.metadata_path, dir.join(METADATA_FILENAME));
    let manifest: Value =
        serde_json::from_str(&fs::read_to_string(&summary.metadata_path).unwrap()).unwrap();
    assert_eq!(manifest["timestamp"], CREATED);
    assert_eq!(manifest["source"]["url"], "https://ex.com/post");
    assert_eq!(manifest["source"]["language"], "en");
    let content = &manifest["content"]["statistics"];
    assert_eq!(content["characters"], 48);
    assert_eq!(content["words"], 9);
    assert_eq!(content["paragraphs"], 2);
    assert_eq!(content["headings"], 1);
    assert_eq!(content["links"], 1);
    assert_eq!(content["images"], 2);
    assert_eq!(content["codeBlocks"], 0);
    assert_eq!(content["tables"], 0);
    assert_eq!(content["lists"], 1);
    assert_eq!(manifest["statistics"]["total"], 3);
    assert_eq!(manifest["statistics"]["successful"], 2);
    assert_eq!(manifest["statistics"]["failed"], 1);
    assert_eq!(manifest["statistics"]["totalBytes"], 6);
    assert_eq!(manifest["statistics"]["byKind"]["image"], 1);
    assert_eq!(manifest["statistics"]["byKind"]["video"], 1);
    assert_eq!(manifest["media"]["total"], 3);
    assert_eq!(manifest["media"]["files"][0]["localFilename"], "a_1234.png");
    assert_eq!(manifest["media"]["files"][2]["localFilename"], Value::Null);
    assert_eq!(
        manifest["media"]["files"][2]["error"],
        "fetch failed with http status 404: 404 Not Found"
    );
    assert_eq!(manifest["conversion"]["tool"], "web2md_engine");
}

#[test]
fn bundle_without_media_writes_no_media_dir() {
    let temp = TempDir::new().unwrap();
    let output = PipelineOutput {
        markdown: "text\n".to_string(),
        media_results: Vec::new(),
        statistics: MediaStatistics::default(),
        content: ContentStatistics::default(),
    };
    let metadata = PageMetadata::default();
    let request = BundleRequest {
        source_url: "",
        metadata: &metadata,
        created_utc: CREATED,
        output: &output,
    };

    let summary = write_bundle(temp.path(), &request).unwrap();

    assert_eq!(summary.media_written, 0);
    assert!(!temp.path().join(MEDIA_DIR).exists());
    assert!(summary
        .markdown_path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("untitled--"));
    let manifest: Value =
        serde_json::from_str(&fs::read_to_string(&summary.metadata_path).unwrap()).unwrap();
    assert_eq!(manifest["statistics"]["byKind"], Value::Object(Default::default()));
    assert_eq!(manifest["content"]["statistics"]["words"], 0);
    assert_eq!(manifest["media"]["files"].as_array().map(Vec::len), Some(0));
}
