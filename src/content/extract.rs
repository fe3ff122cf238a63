use super::schema::ContentType;

/// Maximum text kept from an upload (100KB) before it is described.
pub const MAX_TEXT_LEN: usize = 102_400;

/// Extract text from an upload based on its MIME type.
/// Returns `None` for media that needs a description instead.
pub fn extract_text(data: &[u8], mime_type: &str) -> Option<String> {
    // Parameters such as `; charset=utf-8` do not change how text is read.
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    match essence {
        "text/plain" | "text/markdown" | "text/csv" | "text/html" | "text/xml"
        | "application/json" | "application/xml" => {
            truncate_text(String::from_utf8_lossy(data).into_owned())
        }

        "application/pdf" => extract_pdf(data),

        t if t.starts_with("image/") || t.starts_with("audio/") || t.starts_with("video/") => None,

        _ => match std::str::from_utf8(data) {
            Ok(text) => truncate_text(text.to_string()),
            Err(_) => None,
        },
    }
}

fn truncate_text(mut text: String) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    if text.len() > MAX_TEXT_LEN {
        let mut cut = MAX_TEXT_LEN;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    Some(text)
}

#[cfg(feature = "pdf")]
fn extract_pdf(data: &[u8]) -> Option<String> {
    match pdf_extract::extract_text_from_mem(data) {
        Ok(text) => truncate_text(text),
        Err(e) => {
            tracing::warn!(error = %e, "PDF text extraction failed");
            None
        }
    }
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf(_data: &[u8]) -> Option<String> {
    None
}

/// Guess MIME type from filename extension.
pub fn guess_mime_type(filename: &str) -> &'static str {
    let ext = filename.rsplit_once('.').map(|(_, e)| e).unwrap_or("").to_lowercase();
    match ext.as_str() {
        "txt" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "xml" => "application/xml",
        "html" | "htm" => "text/html",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

/// MIME type of an image payload, sniffed from its magic bytes.
pub fn sniff_image_mime(data: &[u8]) -> Option<&'static str> {
    image::guess_format(data).ok().map(|format| format.to_mime_type())
}

/// Upload kind implied by a MIME type, used when the client does not say.
pub fn content_type_for_mime(mime_type: &str) -> Option<ContentType> {
    match mime_type {
        "application/pdf" => Some(ContentType::Pdf),
        t if t.starts_with("image/") => Some(ContentType::Image),
        t if t.starts_with("video/") => Some(ContentType::Video),
        t if t.starts_with("text/") || t == "application/json" || t == "application/xml" => {
            Some(ContentType::Text)
        }
        _ => None,
    }
}
