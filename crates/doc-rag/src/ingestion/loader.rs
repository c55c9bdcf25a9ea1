//! Per-format text extraction
//!
//! PDF and DOCX produce one segment per page. Plain text and Markdown are
//! returned as a single segment numbered 1.

use std::io::{Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::convert::LibreOfficeConverter;
use crate::config::ConversionConfig;
use crate::error::{Error, Result};
use crate::types::{Document, FileType, Segment};

/// Dispatches documents to their format reader
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    converter: LibreOfficeConverter,
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self::new(ConversionConfig::default())
    }
}

impl DocumentLoader {
    pub fn new(conversion: ConversionConfig) -> Self {
        Self {
            converter: LibreOfficeConverter::new(conversion),
        }
    }

    /// Extract ordered text segments from a document
    ///
    /// Fails with `CorruptDocument` when nothing but whitespace comes out.
    pub fn load(&self, doc: &Document) -> Result<Vec<Segment>> {
        let segments = match doc.file_type {
            FileType::Pdf => Self::load_pdf(&doc.filename, &doc.data)?,
            FileType::Docx => Self::load_docx(&doc.filename, &doc.data)?,
            FileType::Doc => {
                let converted = self.converter.doc_to_docx(&doc.filename, &doc.data)?;
                Self::load_docx(&doc.filename, &converted)?
            }
            FileType::Txt => vec![Segment::new(Self::decode_utf8(&doc.filename, &doc.data)?, 1)],
            FileType::Markdown => {
                let raw = Self::decode_utf8(&doc.filename, &doc.data)?;
                vec![Segment::new(render_markdown(&raw), 1)]
            }
        };

        if segments.iter().all(|s| s.text.trim().is_empty()) {
            return Err(Error::corrupt_document(
                &doc.filename,
                "no text content could be extracted",
            ));
        }

        tracing::debug!(
            "Loaded {} ({}): {} segment(s)",
            doc.filename,
            doc.file_type,
            segments.len()
        );
        Ok(segments)
    }

    fn decode_utf8(filename: &str, data: &[u8]) -> Result<String> {
        let text = std::str::from_utf8(data).map_err(|e| {
            Error::corrupt_document(filename, format!("file is not valid UTF-8 text: {}", e))
        })?;
        Ok(text.strip_prefix('\u{feff}').unwrap_or(text).to_string())
    }

    /// Parse PDF page by page, trying pdf-extract first and lopdf second
    fn load_pdf(filename: &str, data: &[u8]) -> Result<Vec<Segment>> {
        let mut file = tempfile::Builder::new()
            .prefix("doc-rag-")
            .suffix(".pdf")
            .tempfile()?;
        file.write_all(data)?;
        file.flush()?;

        let pages = match Self::extract_pdf_pages(file.path()) {
            Ok(pages) if pages.iter().any(|p| !p.trim().is_empty()) => pages,
            Ok(_) => {
                tracing::warn!("pdf-extract found no text in {}, trying lopdf", filename);
                Self::extract_pdf_pages_fallback(filename, file.path())?
            }
            Err(message) => {
                tracing::warn!("pdf-extract failed for {}: {}, trying lopdf", filename, message);
                Self::extract_pdf_pages_fallback(filename, file.path())?
            }
        };

        if pages.iter().all(|p| p.trim().is_empty()) {
            return Err(Error::corrupt_document(
                filename,
                "PDF has no extractable text (it may be scanned or image-only)",
            ));
        }

        Ok(pages
            .iter()
            .enumerate()
            .map(|(i, page)| Segment::new(cleanup_pdf_text(page), i as u32 + 1))
            .collect())
    }

    fn extract_pdf_pages(path: &Path) -> std::result::Result<Vec<String>, String> {
        // pdf-extract panics on some malformed font tables
        match panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_by_pages(path))) {
            Ok(Ok(pages)) => Ok(pages),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("pdf-extract panicked".to_string()),
        }
    }

    fn extract_pdf_pages_fallback(filename: &str, path: &Path) -> Result<Vec<String>> {
        let doc = lopdf::Document::load(path)
            .map_err(|e| Error::corrupt_document(filename, format!("failed to load PDF: {}", e)))?;

        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(Error::corrupt_document(filename, "PDF has no pages"));
        }

        Ok(pages
            .keys()
            .map(|&page_num| match doc.extract_text(&[page_num]) {
                Ok(text) => text,
                Err(e) => {
                    tracing::debug!("Could not extract page {} of {}: {}", page_num, filename, e);
                    String::new()
                }
            })
            .collect())
    }

    /// Parse DOCX from `word/document.xml`, splitting on page breaks
    fn load_docx(filename: &str, data: &[u8]) -> Result<Vec<Segment>> {
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(data))
            .map_err(|e| Error::corrupt_document(filename, format!("not a DOCX archive: {}", e)))?;

        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .map_err(|e| {
                Error::corrupt_document(filename, format!("missing word/document.xml: {}", e))
            })?
            .read_to_string(&mut xml)
            .map_err(|e| Error::corrupt_document(filename, format!("unreadable document.xml: {}", e)))?;

        let body = extract_docx_body(&xml)
            .map_err(|e| Error::corrupt_document(filename, format!("malformed document.xml: {}", e)))?;

        Ok(body
            .into_pages()
            .into_iter()
            .enumerate()
            .map(|(i, text)| Segment::new(text, i as u32 + 1))
            .collect())
    }
}

/// Text from `document.xml` with the two kinds of page break positions
#[derive(Debug, Default)]
struct DocxBody {
    text: String,
    /// Breaks recorded by Word's layout engine
    rendered_breaks: Vec<usize>,
    /// Breaks inserted by the author
    explicit_breaks: Vec<usize>,
}

impl DocxBody {
    /// Split on rendered breaks when Word recorded any, otherwise on explicit ones
    fn into_pages(self) -> Vec<String> {
        let mut breaks = if self.rendered_breaks.is_empty() {
            self.explicit_breaks
        } else {
            self.rendered_breaks
        };
        breaks.retain(|&b| b > 0 && b < self.text.len());
        breaks.dedup();

        let mut pages = Vec::with_capacity(breaks.len() + 1);
        let mut last = 0;
        for b in breaks {
            pages.push(self.text[last..b].trim().to_string());
            last = b;
        }
        pages.push(self.text[last..].trim().to_string());

        while pages.len() > 1 && pages.last().is_some_and(|p| p.is_empty()) {
            pages.pop();
        }
        pages
    }
}

fn extract_docx_body(xml: &str) -> std::result::Result<DocxBody, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut body = DocxBody::default();
    let mut in_text = false;
    let mut in_tab_stops = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"tabs" => in_tab_stops = true,
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" if !in_tab_stops => body.text.push('\t'),
                b"br" if has_attr(&e, b"type", b"page") => {
                    body.explicit_breaks.push(body.text.len())
                }
                b"br" | b"cr" => body.text.push('\n'),
                b"lastRenderedPageBreak" => body.rendered_breaks.push(body.text.len()),
                b"pageBreakBefore" if !has_attr(&e, b"val", b"0") && !has_attr(&e, b"val", b"false") => {
                    body.explicit_breaks.push(body.text.len())
                }
                _ => {}
            },
            Event::Text(e) if in_text => body.text.push_str(&e.unescape()?),
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"tabs" => in_tab_stops = false,
                b"p" => body.text.push('\n'),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(body)
}

fn has_attr(e: &BytesStart<'_>, name: &[u8], value: &[u8]) -> bool {
    e.attributes()
        .flatten()
        .any(|a| a.key.local_name().as_ref() == name && a.value.as_ref() == value)
}

/// Normalize extraction artifacts without touching line structure
fn cleanup_pdf_text(text: &str) -> String {
    let replaced = text
        .replace('\0', "")
        .replace('\u{00A0}', " ")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl");

    let mut cleaned = String::with_capacity(replaced.len());
    let mut blank_run = 0;
    for line in replaced.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        cleaned.push_str(line);
        cleaned.push('\n');
    }
    cleaned.trim().to_string()
}

/// Render Markdown to plain text, separating blocks with blank lines
fn render_markdown(raw: &str) -> String {
    use pulldown_cmark::{Event, Options, Parser, TagEnd};

    let mut out = String::with_capacity(raw.len());
    for event in Parser::new_ext(raw, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH) {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak => out.push(' '),
            Event::HardBreak | Event::Rule => out.push('\n'),
            Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::CodeBlock) => {
                out.push_str("\n\n")
            }
            Event::End(TagEnd::Item | TagEnd::TableRow | TagEnd::TableHead) => out.push('\n'),
            Event::End(TagEnd::TableCell) => out.push('\t'),
            _ => {}
        }
    }
    out.trim().to_string()
}
