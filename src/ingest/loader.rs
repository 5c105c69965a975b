use crate::error::{RagchatError, Result};
use pulldown_cmark::{Event, Parser as CmarkParser, TagEnd};
use quick_xml::events::Event as XmlEvent;
use quick_xml::Reader;
use std::io::Read;
use std::path::Path;

/// Decompressed size cap for the docx body (zip-bomb guard).
const MAX_DOCX_XML_BYTES: u64 = 50 * 1024 * 1024;

/// Text extracted from one source file, before chunking
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    pub text: String,
    pub source_file: String,
    pub file_type: String,
}

/// Turns a file on disk into plain text.
///
/// Implementations raise `UnsupportedFormat` for extensions they cannot read and
/// `Parse` for corrupt input; callers skip the file and carry on with the batch.
pub trait DocumentLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Vec<LoadedDocument>>;

    fn supports(&self, extension: &str) -> bool;
}

/// Loader for the formats accepted by the upload endpoint
#[derive(Debug, Default, Clone, Copy)]
pub struct FileLoader;

impl FileLoader {
    pub fn new() -> Self {
        Self
    }
}

/// Lowercased extension without the dot, or empty
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase()
}

impl DocumentLoader for FileLoader {
    fn supports(&self, extension: &str) -> bool {
        matches!(extension, "txt" | "md" | "pdf" | "docx")
    }

    fn load(&self, path: &Path) -> Result<Vec<LoadedDocument>> {
        let extension = file_extension(path);
        let source_file = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if !self.supports(&extension) {
            return Err(RagchatError::UnsupportedFormat(format!(
                "{} (.{})",
                source_file, extension
            )));
        }

        let bytes = std::fs::read(path)?;
        let text = match extension.as_str() {
            "txt" => String::from_utf8_lossy(&bytes).into_owned(),
            "md" => markdown_to_text(&String::from_utf8_lossy(&bytes)),
            "pdf" => pdf_extract::extract_text_from_mem(&bytes)
                .map_err(|e| RagchatError::Parse(format!("{}: {}", source_file, e)))?,
            "docx" => extract_docx(&bytes)
                .map_err(|e| RagchatError::Parse(format!("{}: {}", source_file, e)))?,
            _ => return Err(RagchatError::UnsupportedFormat(source_file)),
        };

        log::debug!("Loaded {} ({} chars)", source_file, text.chars().count());

        Ok(vec![LoadedDocument {
            text,
            source_file,
            file_type: extension,
        }])
    }
}

/// Render markdown to plain text, one line per block
fn markdown_to_text(content: &str) -> String {
    let mut out = String::new();
    for event in CmarkParser::new(content) {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::End(TagEnd::Paragraph)
            | Event::End(TagEnd::Heading(_))
            | Event::End(TagEnd::Item)
            | Event::End(TagEnd::CodeBlock) => out.push_str("\n\n"),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// Concatenate the `w:t` runs of `word/document.xml`, one line per paragraph
fn extract_docx(bytes: &[u8]) -> std::result::Result<String, String> {
    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| "word/document.xml not found".to_string())?;

    let mut xml = Vec::new();
    entry
        .take(MAX_DOCX_XML_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| e.to_string())?;
    if xml.len() as u64 >= MAX_DOCX_XML_BYTES {
        return Err("word/document.xml exceeds size limit".to_string());
    }

    let mut reader = Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(XmlEvent::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(XmlEvent::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(XmlEvent::Empty(e)) if e.local_name().as_ref() == b"tab" => out.push('\t'),
            Ok(XmlEvent::Text(e)) if in_text => out.push_str(&String::from_utf8_lossy(e.as_ref())),
            Ok(XmlEvent::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }

    Ok(out.trim().to_string())
}
