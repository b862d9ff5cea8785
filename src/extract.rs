//! Text extraction for uploaded files and fetched web pages.
//!
//! Uploads are dispatched on file extension:
//!
//! | Extension | Parser | `content_type` |
//! |-----------|--------|----------------|
//! | `.txt`, `.md` | UTF-8 (lossy) | `text` |
//! | `.pdf` | `pdf-extract` | `pdf` |
//! | `.docx` | `zip` + `quick-xml` over `word/document.xml` | `docx` |
//!
//! Web pages are fetched with `reqwest` and reduced to their visible text
//! with `scraper`. Extraction never panics; every failure is an
//! [`ExtractError`] and the caller decides whether to skip the item.

use scraper::{Html, Node};
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Per-request timeout for URL fetches.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Elements whose text is never part of the readable page.
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template"];

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("no readable text in {0}")]
    NoReadableText(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to read {0}")]
    Io(String, #[source] std::io::Error),
}

/// Extract text from an uploaded file, returning `(text, content_type)`.
///
/// Fails with [`ExtractError::UnsupportedFileType`] for unknown extensions
/// and [`ExtractError::NoReadableText`] when nothing but whitespace remains.
pub fn extract_upload(file_name: &str, bytes: &[u8]) -> Result<(String, &'static str), ExtractError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let (text, content_type) = match extension.as_str() {
        "txt" | "md" => (String::from_utf8_lossy(bytes).into_owned(), "text"),
        "pdf" => (extract_pdf(bytes)?, "pdf"),
        "docx" => (extract_docx(bytes)?, "docx"),
        _ => return Err(ExtractError::UnsupportedFileType(file_name.to_string())),
    };

    if text.trim().is_empty() {
        return Err(ExtractError::NoReadableText(file_name.to_string()));
    }
    Ok((text, content_type))
}

/// Read a local file and extract it as if it had been uploaded.
pub fn extract_path(path: &Path) -> Result<(String, &'static str), ExtractError> {
    let bytes =
        std::fs::read(path).map_err(|e| ExtractError::Io(path.display().to_string(), e))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    extract_upload(&file_name, &bytes)
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Docx("word/document.xml not found".to_string()))?;

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }
    docx_paragraphs(&doc_xml)
}

/// Concatenate `<w:t>` runs, one line per `<w:p>` paragraph.
fn docx_paragraphs(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().map_err(|e| ExtractError::Docx(e.to_string()))?;
                out.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// Visible text of an HTML document, one non-empty text node per line.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut lines: Vec<&str> = Vec::new();

    for node in document.tree.nodes() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| SKIPPED_TAGS.contains(&e.name()))
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed);
        }
    }

    lines.join("\n")
}

/// GET `url` and return its visible text.
///
/// Non-2xx responses and transport failures are [`ExtractError::Fetch`];
/// a page with no visible text is [`ExtractError::NoReadableText`].
pub async fn fetch_url_text(client: &reqwest::Client, url: &str) -> Result<String, ExtractError> {
    let fetch_err = |source| ExtractError::Fetch {
        url: url.to_string(),
        source,
    };
    let body = client
        .get(url)
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(fetch_err)?
        .text()
        .await
        .map_err(fetch_err)?;

    let text = html_to_text(&body);
    if text.is_empty() {
        return Err(ExtractError::NoReadableText(url.to_string()));
    }
    Ok(text)
}
