use sha2::{Digest, Sha256};
use url::Url;

const MAX_MEDIA_BASE_LEN: usize = 50;
const MAX_URL_EXTENSION_LEN: usize = 5;

/// Windows-safe, deterministic document filename: `{sanitized_title}--{short_hash(url)}.md`
pub fn deterministic_filename(title: Option<&str>, url: &str) -> String {
    let sanitized = sanitize_title(title.unwrap_or("untitled"));
    let hash = short_hash(url);
    format!("{sanitized}--{hash}.md")
}

/// Local filename for a media payload: `{base}_{fingerprint}.{ext}`.
///
/// Pure in `(url, mime_type)`. The four-hex-digit fingerprint separates sources
/// whose last path segments sanitize to the same base name.
pub fn derive_media_filename(url: &str, mime_type: Option<&str>) -> String {
    let hash = url_hash(url);
    let Ok(parsed) = Url::parse(url) else {
        let ext = extension_for_mime(mime_type);
        return format!("media_{hash:x}.{ext}");
    };

    let segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .unwrap_or("file");

    let (name, extension) = match segment.rfind('.') {
        Some(dot) if dot > 0 => (&segment[..dot], &segment[dot + 1..]),
        _ => (segment, ""),
    };

    let base: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_MEDIA_BASE_LEN)
        .collect();

    let ext: String = if extension.chars().count() > MAX_URL_EXTENSION_LEN {
        String::new()
    } else {
        extension.chars().filter(char::is_ascii_alphanumeric).collect()
    };
    let ext = if ext.is_empty() {
        extension_for_mime(mime_type).to_string()
    } else {
        ext
    };

    let fingerprint: String = format!("{hash:x}").chars().take(4).collect();
    format!("{base}_{fingerprint}.{ext}")
}

/// File extension for a MIME type; parameters are ignored and unknown types map to `bin`.
pub fn extension_for_mime(mime_type: Option<&str>) -> &'static str {
    let essence = mime_type
        .and_then(|mime| mime.split(';').next())
        .map(|mime| mime.trim().to_ascii_lowercase())
        .unwrap_or_default();
    match essence.as_str() {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "image/bmp" => "bmp",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/ogg" => "ogv",
        "audio/mpeg" => "mp3",
        "audio/ogg" => "ogg",
        "audio/wav" => "wav",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}

/// 31-multiplier string hash over UTF-16 units, wrapped to 32 bits, sign dropped.
fn url_hash(input: &str) -> u32 {
    let hash = input
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)));
    hash.unsigned_abs()
}

fn sanitize_title(input: &str) -> String {
    let mut cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]).to_string();
    if cleaned.is_empty() {
        cleaned = "untitled".to_string();
    }
    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' && prev_underscore {
            continue;
        }
        prev_underscore = c == '_';
        compacted.push(c);
    }
    let mut final_name: String = compacted.chars().take(80).collect();
    if is_reserved_windows_name(&final_name) {
        final_name.push('_');
    }
    final_name
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
