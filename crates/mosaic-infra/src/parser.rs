//! Local file parser.
//!
//! Implements `DocumentParser` for plain-text formats and standalone image
//! files. Rich formats (PDF, office documents) are not handled here.
//!
//! - Text files are read as UTF-8. A form feed (`\x0C`) marks a page break.
//! - Markdown titles come from the first `# ` heading, otherwise the file stem.
//! - Image files become a single `ImageAsset` on page 1, with dimensions read
//!   from the PNG or GIF header when present.

use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use mosaic_core::indexing::parser::DocumentParser;
use mosaic_types::document::{DocumentMetadata, ImageAsset, ImageFormat, ParsedDocument};
use mosaic_types::error::ParseError;
use uuid::Uuid;

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "text", "md", "markdown", "csv", "tsv", "json", "jsonl", "html", "htm", "xml", "log", "rst",
    "toml", "yaml", "yml", "rs", "py", "js", "ts", "go", "java", "c", "h", "cpp", "hpp", "sh", "sql",
];

const PAGE_BREAK: char = '\x0C';

/// `DocumentParser` over the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileParser;

impl LocalFileParser {
    pub fn new() -> Self {
        Self
    }

    /// Whether `path` has an extension this parser reads.
    pub fn supports(path: &Path) -> bool {
        classify(path).is_some()
    }
}

enum FileKind {
    Text { markdown: bool },
    Image(ImageFormat),
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

fn classify(path: &Path) -> Option<FileKind> {
    let ext = extension(path)?;
    if let Some(format) = ImageFormat::from_extension(&ext) {
        return Some(FileKind::Image(format));
    }
    if TEXT_EXTENSIONS.contains(&ext.as_str()) {
        return Some(FileKind::Text {
            markdown: matches!(ext.as_str(), "md" | "markdown"),
        });
    }
    None
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

fn to_utc(time: std::io::Result<SystemTime>) -> Option<DateTime<Utc>> {
    time.ok().map(DateTime::<Utc>::from)
}

fn markdown_title(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("# "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Replace page-break characters with newlines and record where each page
/// starts. Both are one byte, so offsets into the result stay valid.
/// Returns no offsets for text without page breaks.
fn split_pages(raw: &str) -> (String, Vec<usize>) {
    if !raw.contains(PAGE_BREAK) {
        return (raw.to_string(), Vec::new());
    }
    let mut offsets = vec![0];
    offsets.extend(raw.match_indices(PAGE_BREAK).map(|(i, _)| i + 1).filter(|&i| i < raw.len()));
    (raw.replace(PAGE_BREAK, "\n"), offsets)
}

/// Width and height from a PNG IHDR chunk or a GIF logical screen descriptor.
fn image_dimensions(bytes: &[u8], format: ImageFormat) -> Option<(u32, u32)> {
    match format {
        ImageFormat::Png if bytes.len() >= 24 && &bytes[12..16] == b"IHDR" => {
            let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
            let height = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
            Some((width, height))
        }
        ImageFormat::Gif if bytes.len() >= 10 && bytes.starts_with(b"GIF8") => {
            let width = u16::from_le_bytes([bytes[6], bytes[7]]);
            let height = u16::from_le_bytes([bytes[8], bytes[9]]);
            Some((u32::from(width), u32::from(height)))
        }
        _ => None,
    }
}

impl DocumentParser for LocalFileParser {
    async fn parse(&self, path: &Path) -> Result<ParsedDocument, ParseError> {
        let display = path.display().to_string();
        let meta = match tokio::fs::metadata(path).await {
            Ok(meta) => meta,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ParseError::NotFound(display));
            }
            Err(err) => return Err(ParseError::Io(format!("{display}: {err}"))),
        };
        if !meta.is_file() {
            return Err(ParseError::Unsupported(format!("{display} is not a regular file")));
        }

        let kind = classify(path).ok_or_else(|| {
            ParseError::Unsupported(extension(path).unwrap_or_else(|| display.clone()))
        })?;

        let mut metadata = DocumentMetadata {
            title: None,
            page_count: 1,
            page_offsets: Vec::new(),
            size_bytes: meta.len(),
            created_at: to_utc(meta.created()),
            modified_at: to_utc(meta.modified()),
        };

        match kind {
            FileKind::Text { markdown } => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| ParseError::Io(format!("{display}: {e}")))?;
                let raw = String::from_utf8(bytes)
                    .map_err(|e| ParseError::Malformed(format!("{display} is not valid UTF-8: {e}")))?;

                let (text, page_offsets) = split_pages(&raw);
                metadata.page_count = page_offsets.len().max(1) as u32;
                metadata.page_offsets = page_offsets;
                let heading = if markdown { markdown_title(&text) } else { None };
                metadata.title = heading.or_else(|| file_stem(path));

                tracing::debug!(path = %display, bytes = text.len(), pages = metadata.page_count, "parsed text file");
                Ok(ParsedDocument {
                    text,
                    images: Vec::new(),
                    metadata,
                })
            }
            FileKind::Image(format) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| ParseError::Io(format!("{display}: {e}")))?;
                if bytes.is_empty() {
                    return Err(ParseError::Malformed(format!("{display} is empty")));
                }
                let dims = image_dimensions(&bytes, format);
                metadata.title = file_stem(path);

                tracing::debug!(path = %display, format = %format, "parsed image file");
                Ok(ParsedDocument {
                    text: String::new(),
                    images: vec![ImageAsset {
                        document_id: Uuid::nil(),
                        page_number: 1,
                        bytes,
                        format,
                        width: dims.map(|(w, _)| w),
                        height: dims.map(|(_, h)| h),
                        caption: None,
                    }],
                    metadata,
                })
            }
        }
    }

    fn is_ready(&self) -> bool {
        true
    }
}
