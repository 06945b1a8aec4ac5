use pretty_assertions::assert_eq;
use web2md_engine::{derive_media_filename, deterministic_filename, extension_for_mime};

#[test]
fn media_name_keeps_segment_and_url_extension() {
    assert_eq!(derive_media_filename("https://ex.com/x.png", None), "x_6f1b.png");
    assert_eq!(
        derive_media_filename("https://ex.com/images/cat.png", Some("image/jpeg")),
        "cat_48d9.png"
    );
}

#[test]
fn media_name_falls_back_to_mime_extension() {
    assert_eq!(derive_media_filename("https://ex.com/pic", None), "pic_db3a.bin");
    assert_eq!(
        derive_media_filename("https://ex.com/pic", Some("image/webp")),
        "pic_db3a.webp"
    );
    // Extensions longer than five characters are not trusted.
    assert_eq!(
        derive_media_filename("https://ex.com/file.download", Some("image/png")),
        "file_4e3c.png"
    );
}

#[test]
fn media_name_for_empty_path_uses_file() {
    assert_eq!(derive_media_filename("https://ex.com/", None), "file_7f53.bin");
}

#[test]
fn media_name_keeps_only_alphanumeric_extension_characters() {
    assert_eq!(
        derive_media_filename("https://ex.com/pic.p:g", Some("image/png")),
        "pic_5a5c.pg"
    );
    assert_eq!(
        derive_media_filename("https://ex.com/pic.:::", Some("image/png")),
        "pic_5a5d.png"
    );
}

#[test]
fn data_url_media_is_named_from_its_mime_type() {
    assert_eq!(
        derive_media_filename("data:image/png;base64,iVBORw0KGgo=", Some("image/png")),
        "file_331f.png"
    );
}

#[test]
fn media_name_sanitizes_base_and_ignores_query() {
    assert_eq!(
        derive_media_filename("https://ex.com/my%20photo.jpeg?x=1", None),
        "my_20photo_8346.jpeg"
    );
    assert_eq!(derive_media_filename("https://ex.com/.hidden", None), "_hidden_1005.bin");
}

#[test]
fn media_name_for_unparseable_url_uses_full_hash() {
    assert_eq!(
        derive_media_filename("not a url", Some("image/gif")),
        "media_ba0b25d.gif"
    );
}

#[test]
fn media_name_truncates_long_base() {
    let url = format!("https://ex.com/{}.png", "a".repeat(80));
    let name = derive_media_filename(&url, None);
    let base = name.split('_').next().unwrap();
    assert_eq!(base.len(), 50);
    assert!(name.ends_with(".png"));
}

#[test]
fn same_segment_from_different_paths_gets_distinct_names() {
    let a = derive_media_filename("https://ex.com/a/photo.jpg", None);
    let b = derive_media_filename("https://ex.com/b/photo.jpg", None);
    assert_eq!(a, "photo_7ba3.jpg");
    assert_eq!(b, "photo_1088.jpg");
}

#[test]
fn media_name_is_pure() {
    let url = "https://cdn.ex.com/assets/logo.svg";
    assert_eq!(
        derive_media_filename(url, Some("image/svg+xml")),
        derive_media_filename(url, Some("image/svg+xml"))
    );
}

#[test]
fn mime_table_ignores_parameters_and_case() {
    assert_eq!(extension_for_mime(Some("image/JPEG")), "jpg");
    assert_eq!(extension_for_mime(Some("audio/mpeg; bitrate=320")), "mp3");
    assert_eq!(extension_for_mime(Some("video/ogg")), "ogv");
    assert_eq!(extension_for_mime(Some("application/octet-stream")), "bin");
    assert_eq!(extension_for_mime(None), "bin");
}

#[test]
fn document_filename_is_deterministic_and_safe() {
    let fname = deterministic_filename(Some("My: Title?/Bad"), "https://example.com/foo");
    assert!(fname.starts_with("My_ Title_Bad--"));
    assert!(fname.ends_with(".md"));
    assert_eq!(
        fname,
        deterministic_filename(Some("My: Title?/Bad"), "https://example.com/foo")
    );

    let reserved = deterministic_filename(Some("CON"), "https://example.com/foo");
    assert!(reserved.starts_with("CON_--"));

    let untitled = deterministic_filename(None, "https://example.com/foo");
    assert!(untitled.starts_with("untitled--"));
}
