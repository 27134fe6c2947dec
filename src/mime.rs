//! MIME type determination from file name and leading content.
//!
//! The download path buffers the first kilobyte so this gets both the name
//! and real bytes to look at; the type is emitted exactly once per
//! transfer, before the first data chunk.

/// Well-known magic numbers, checked before the extension table.
fn sniff_content(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(b"%PDF-") {
        return Some("application/pdf");
    }
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some("image/png");
    }
    if data.starts_with(b"\xff\xd8\xff") {
        return Some("image/jpeg");
    }
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if data.starts_with(b"PK\x03\x04") {
        return Some("application/zip");
    }
    if data.starts_with(b"\x1f\x8b") {
        return Some("application/gzip");
    }
    if data.starts_with(b"BZh") {
        return Some("application/x-bzip2");
    }
    if data.starts_with(b"\xfd7zXZ\x00") {
        return Some("application/x-xz");
    }
    if data.starts_with(b"\x7fELF") {
        return Some("application/x-executable");
    }
    if data.starts_with(b"#!") {
        return Some("application/x-shellscript");
    }
    if data.starts_with(b"<?xml") {
        return Some("application/xml");
    }
    None
}

fn by_extension(name: &str) -> Option<&'static str> {
    let ext = name.rsplit('.').next()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "txt" | "log" | "readme" => "text/plain",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "md" => "text/markdown",
        "js" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" | "tgz" => "application/gzip",
        "bz2" => "application/x-bzip2",
        "xz" => "application/x-xz",
        "tar" => "application/x-tar",
        "iso" => "application/x-cd-image",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "mp4" => "video/mp4",
        "mkv" => "video/x-matroska",
        _ => return None,
    };
    Some(mime)
}

fn looks_like_text(data: &[u8]) -> bool {
    if data.is_empty() {
        return false;
    }
    !data
        .iter()
        .any(|b| *b == 0 || (*b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0c)))
}

/// Determine the MIME type for `name` with `data` as its first bytes.
pub fn mime_for(name: &str, data: &[u8]) -> &'static str {
    if let Some(mime) = sniff_content(data) {
        return mime;
    }
    if let Some(mime) = by_extension(name) {
        return mime;
    }
    if looks_like_text(data) {
        "text/plain"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_beats_extension() {
        assert_eq!(mime_for("file.txt", b"%PDF-1.4 ..."), "application/pdf");
    }

    #[test]
    fn test_extension_fallback() {
        assert_eq!(mime_for("notes.txt", b""), "text/plain");
        assert_eq!(mime_for("archive.tar", b"ustar-ish"), "application/x-tar");
    }

    #[test]
    fn test_text_heuristic() {
        assert_eq!(mime_for("COPYING", b"GNU GENERAL PUBLIC LICENSE\n"), "text/plain");
    }

    #[test]
    fn test_binary_default() {
        assert_eq!(mime_for("blob", b"\x00\x01\x02\x03"), "application/octet-stream");
    }
}
