use std::path::Path;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Detects MIME content type from a file name extension.
pub fn detect_content_type(name: &str) -> &'static str {
    match extension(name).as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("svg") => "image/svg+xml",
        Some("txt" | "log") => "text/plain",
        Some("htm" | "html") => "text/html",
        Some("css") => "text/css",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz") => "application/gzip",
        Some("tar") => "application/x-tar",
        Some("7z") => "application/x-7z-compressed",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("mov") => "video/quicktime",
        _ => FALLBACK_CONTENT_TYPE,
    }
}

/// Parses a comma- or whitespace-separated extension list.
///
/// Entries are trimmed, lowercased and stripped of a leading dot.
pub fn parse_extension_list(list: &str) -> Vec<String> {
    list.split(|c: char| c == ',' || c.is_whitespace())
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Returns true when `name` may be added under `filter`.
///
/// An empty filter admits everything; otherwise the lowercased extension
/// must be listed. Names without an extension never pass a non-empty filter.
pub fn passes_extension_filter(name: &str, filter: &[String]) -> bool {
    if filter.is_empty() {
        return true;
    }
    let Some(ext) = extension(name) else {
        return false;
    };
    filter.iter().any(|f| f.eq_ignore_ascii_case(&ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_content_type_known() {
        assert_eq!(detect_content_type("image.png"), "image/png");
        assert_eq!(detect_content_type("photo.jpeg"), "image/jpeg");
        assert_eq!(detect_content_type("movie.mp4"), "video/mp4");
        assert_eq!(detect_content_type("archive.tar.gz"), "application/gzip");
    }

    #[test]
    fn detect_content_type_fallback() {
        assert_eq!(detect_content_type("noext"), FALLBACK_CONTENT_TYPE);
        assert_eq!(detect_content_type("data.bin"), FALLBACK_CONTENT_TYPE);
        assert_eq!(detect_content_type(""), FALLBACK_CONTENT_TYPE);
    }

    #[test]
    fn detect_content_type_case_insensitive() {
        assert_eq!(detect_content_type("IMAGE.PNG"), "image/png");
    }

    #[test]
    fn parse_extension_list_mixed_separators() {
        assert_eq!(
            parse_extension_list(" JPG, .png  gif,,\tmp4 "),
            vec!["jpg", "png", "gif", "mp4"]
        );
        assert!(parse_extension_list("").is_empty());
    }

    #[test]
    fn filter_empty_admits_all() {
        assert!(passes_extension_filter("anything", &[]));
    }

    #[test]
    fn filter_matches_extension() {
        let filter = parse_extension_list("jpg,png");
        assert!(passes_extension_filter("a.JPG", &filter));
        assert!(passes_extension_filter("dir.v2/b.png", &filter));
        assert!(!passes_extension_filter("c.gif", &filter));
        assert!(!passes_extension_filter("jpg", &filter));
    }
}
