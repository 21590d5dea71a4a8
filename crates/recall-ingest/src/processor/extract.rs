//! Format-specific text extractors.
//!
//! Extractors return raw text; whitespace and control characters are cleaned
//! up afterwards by [`super::normalize`].

use std::io::{Cursor, Read};

use pulldown_cmark::{Event as MdEvent, Parser, TagEnd};
use quick_xml::events::Event as XmlEvent;
use quick_xml::Reader;
use thiserror::Error;

use super::format::DocumentFormat;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ExtractFailure(pub String);

impl ExtractFailure {
    fn new(reason: impl ToString) -> Self {
        ExtractFailure(reason.to_string())
    }
}

type ExtractResult = Result<String, ExtractFailure>;

/// Minimum run length for the legacy .doc printable-text heuristic.
const MIN_DOC_RUN: usize = 4;

pub fn extract_text(format: DocumentFormat, bytes: &[u8]) -> ExtractResult {
    match format {
        DocumentFormat::PlainText => Ok(decode_utf8(bytes)),
        DocumentFormat::Markdown => Ok(markdown_to_text(&decode_utf8(bytes))),
        DocumentFormat::Csv => Ok(csv_to_text(&decode_utf8(bytes))),
        DocumentFormat::Pdf => extract_pdf(bytes),
        DocumentFormat::Doc => Ok(legacy_doc_to_text(bytes)),
        DocumentFormat::Docx => extract_docx(bytes),
        DocumentFormat::Rtf => Ok(rtf_to_text(&decode_utf8(bytes))),
    }
}

fn decode_utf8(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Visible text of a Markdown document, one block per line.
pub fn markdown_to_text(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    for event in Parser::new(source) {
        match event {
            MdEvent::Text(text) | MdEvent::Code(text) => out.push_str(&text),
            MdEvent::SoftBreak | MdEvent::HardBreak => out.push('\n'),
            MdEvent::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::CodeBlock
                | TagEnd::TableRow,
            ) => out.push('\n'),
            MdEvent::End(TagEnd::TableCell) => out.push(' '),
            _ => {}
        }
    }
    out
}

/// Rows become lines, cells are joined with ", ". Quoted cells may contain
/// commas and doubled quotes.
pub fn csv_to_text(source: &str) -> String {
    source
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            split_csv_row(line)
                .into_iter()
                .map(|cell| cell.trim().to_string())
                .filter(|cell| !cell.is_empty())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn split_csv_row(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => cells.push(std::mem::take(&mut cell)),
            _ => cell.push(c),
        }
    }
    cells.push(cell);
    cells
}

#[cfg(feature = "pdf")]
fn extract_pdf(bytes: &[u8]) -> ExtractResult {
    pdf_extract::extract_text_from_mem(bytes).map_err(ExtractFailure::new)
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf(_bytes: &[u8]) -> ExtractResult {
    Err(ExtractFailure::new("PDF support is not enabled in this build"))
}

fn extract_docx(bytes: &[u8]) -> ExtractResult {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(ExtractFailure::new)?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(ExtractFailure::new)?
        .read_to_string(&mut xml)
        .map_err(ExtractFailure::new)?;
    docx_xml_to_text(&xml)
}

/// Text runs of a WordprocessingML body, with paragraph and line breaks kept.
pub fn docx_xml_to_text(xml: &str) -> ExtractResult {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event() {
            Ok(XmlEvent::Start(e)) => {
                if e.name().as_ref() == b"w:t" {
                    in_text_run = true;
                }
            }
            Ok(XmlEvent::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text_run = false,
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Ok(XmlEvent::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => out.push('\t'),
                b"w:br" | b"w:cr" => out.push('\n'),
                _ => {}
            },
            Ok(XmlEvent::Text(text)) if in_text_run => {
                out.push_str(&text.unescape().map_err(ExtractFailure::new)?);
            }
            Ok(XmlEvent::Eof) => break,
            Err(e) => {
                return Err(ExtractFailure(format!(
                    "malformed document.xml at position {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
    }

    Ok(out)
}

/// Best-effort text from a binary .doc.
///
/// Word stores each text piece either as 8-bit characters or as UTF-16LE, so
/// both encodings are scanned. Runs of at least [`MIN_DOC_RUN`] characters
/// that contain a letter are kept and joined in file order.
pub fn legacy_doc_to_text(bytes: &[u8]) -> String {
    let mut runs = ascii_runs(bytes);
    runs.extend(utf16_runs(bytes));
    runs.sort_by_key(|(offset, _)| *offset);

    runs.into_iter()
        .map(|(_, text)| text)
        .collect::<Vec<_>>()
        .join(" ")
}

fn keep_run(run: &str) -> bool {
    let run = run.trim();
    run.chars().count() >= MIN_DOC_RUN && run.chars().any(char::is_alphabetic)
}

fn ascii_runs(bytes: &[u8]) -> Vec<(usize, String)> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut current = String::new();

    for (i, &b) in bytes.iter().enumerate() {
        if b == b'\t' || b == b'\r' || b == b'\n' || (0x20..0x7f).contains(&b) {
            if current.is_empty() {
                start = i;
            }
            current.push(char::from(b));
        } else {
            if keep_run(&current) {
                runs.push((start, current.trim().to_string()));
            }
            current.clear();
        }
    }
    if keep_run(&current) {
        runs.push((start, current.trim().to_string()));
    }
    runs
}

/// Code units Word text pieces realistically contain: Latin, Greek and
/// Cyrillic letters, whitespace, and general punctuation. Pairs of 8-bit
/// characters read as UTF-16 land outside these ranges.
fn is_doc_text_unit(unit: u16) -> bool {
    let in_text_range = matches!(
        unit,
        0x0009 | 0x000A | 0x000D | 0x0020..=0x007E | 0x00A0..=0x052F | 0x2010..=0x203A
    );
    in_text_range && char::from_u32(u32::from(unit)).is_some_and(|c| !c.is_control() || c.is_whitespace())
}

fn utf16_runs(bytes: &[u8]) -> Vec<(usize, String)> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut current = String::new();

    for (i, pair) in bytes.chunks_exact(2).enumerate() {
        let unit = u16::from_le_bytes([pair[0], pair[1]]);
        let c = if is_doc_text_unit(unit) {
            char::from_u32(u32::from(unit))
        } else {
            None
        };
        match c {
            Some(c) => {
                if current.is_empty() {
                    start = i * 2;
                }
                current.push(c);
            }
            None => {
                if keep_run(&current) {
                    runs.push((start, current.trim().to_string()));
                }
                current.clear();
            }
        }
    }
    if keep_run(&current) {
        runs.push((start, current.trim().to_string()));
    }
    runs
}

/// Destinations whose content is never body text.
const RTF_SKIP_DESTINATIONS: &[&str] = &[
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "pict",
    "header",
    "footer",
    "themedata",
    "datastore",
    "xmlnstbl",
    "listtable",
    "listoverridetable",
    "rsidtbl",
    "generator",
];

/// Plain text of an RTF document: control words are dropped, `\par` and
/// `\line` become newlines, `\'hh` and `\uN` escapes are decoded.
pub fn rtf_to_text(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::new();
    let mut depth: usize = 0;
    // Group depth at which skipping started, if inside an ignored destination.
    let mut skip_from: Option<usize> = None;
    // Characters still to drop after a \uN escape (the ANSI fallback).
    let mut pending_fallback = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '{' => {
                depth += 1;
                i += 1;
                // {\* ...} marks an optional destination
                if chars.get(i) == Some(&'\\') && chars.get(i + 1) == Some(&'*') && skip_from.is_none() {
                    skip_from = Some(depth);
                }
            }
            '}' => {
                if skip_from == Some(depth) {
                    skip_from = None;
                }
                depth = depth.saturating_sub(1);
                i += 1;
            }
            '\\' => {
                i += 1;
                let Some(&next) = chars.get(i) else { break };

                if next.is_ascii_alphabetic() {
                    let start = i;
                    while i < chars.len() && chars[i].is_ascii_alphabetic() {
                        i += 1;
                    }
                    let word: String = chars[start..i].iter().collect();

                    let param_start = i;
                    if chars.get(i) == Some(&'-') {
                        i += 1;
                    }
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                    let param: Option<i32> = chars[param_start..i].iter().collect::<String>().parse().ok();
                    if chars.get(i) == Some(&' ') {
                        i += 1;
                    }

                    if skip_from.is_none() && RTF_SKIP_DESTINATIONS.contains(&word.as_str()) {
                        skip_from = Some(depth);
                        continue;
                    }
                    if skip_from.is_some() {
                        continue;
                    }

                    match word.as_str() {
                        "par" | "line" | "sect" | "page" => out.push('\n'),
                        "tab" => out.push('\t'),
                        "u" => {
                            if let Some(code) = param {
                                // Negative values encode code points above 32767.
                                let code = if code < 0 { code + 65536 } else { code };
                                if let Some(ch) = u32::try_from(code).ok().and_then(char::from_u32) {
                                    out.push(ch);
                                }
                                pending_fallback = 1;
                            }
                        }
                        _ => {}
                    }
                } else {
                    i += 1;
                    if skip_from.is_some() {
                        continue;
                    }
                    match next {
                        '\\' | '{' | '}' => push_text(&mut out, next, &mut pending_fallback),
                        '~' => push_text(&mut out, ' ', &mut pending_fallback),
                        '\'' => {
                            let hex: String = chars.iter().skip(i).take(2).collect();
                            i += hex.chars().count();
                            if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                                push_text(&mut out, char::from(byte), &mut pending_fallback);
                            }
                        }
                        '\n' | '\r' => out.push('\n'),
                        _ => {}
                    }
                }
            }
            '\r' | '\n' => i += 1,
            _ => {
                if skip_from.is_none() {
                    push_text(&mut out, c, &mut pending_fallback);
                }
                i += 1;
            }
        }
    }

    out
}

fn push_text(out: &mut String, c: char, pending_fallback: &mut usize) {
    if *pending_fallback > 0 {
        *pending_fallback -= 1;
    } else {
        out.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_keeps_visible_text_only() {
        let text = markdown_to_text("# Title\n\nSome **bold** text with `code` and [a link](http://x).\n\n- item one\n- item two\n");

        assert!(text.contains("Title"));
        assert!(text.contains("Some bold text with code and a link."));
        assert!(text.contains("item two"));
        assert!(!text.contains("**"));
        assert!(!text.contains("http://x"));
    }

    #[test]
    fn csv_rows_become_lines() {
        let text = csv_to_text("name,role\n\"Smith, Ann\",\"says \"\"hi\"\"\"\n\n");
        assert_eq!(text, "name, role\nSmith, Ann, says \"hi\"");
    }

    #[test]
    fn docx_xml_collects_runs_per_paragraph() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t xml:space="preserve"> world &amp; co</w:t></w:r></w:p>
            <w:p><w:r><w:t>Second</w:t><w:br/><w:t>line</w:t></w:r></w:p>
        </w:body></w:document>"#;

        let text = docx_xml_to_text(xml).unwrap();

        assert!(text.contains("Hello world & co\n"));
        assert!(text.contains("Second\nline"));
    }

    #[test]
    fn docx_requires_a_zip_archive() {
        assert!(extract_text(DocumentFormat::Docx, b"not a zip").is_err());
    }

    #[test]
    fn legacy_doc_keeps_long_printable_runs() {
        let mut bytes = vec![0u8, 1, 2];
        bytes.extend_from_slice(b"Quarterly report");
        bytes.extend_from_slice(&[0, 0xff, b'a', b'b', 0]);
        bytes.extend_from_slice(b"final notes");

        assert_eq!(legacy_doc_to_text(&bytes), "Quarterly report final notes");
    }

    fn utf16le(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    #[test]
    fn legacy_doc_reads_utf16_text_pieces() {
        let mut bytes = vec![0xec, 0xa5, 0xff, 0xff];
        bytes.extend(utf16le("Quarterly roadmap für 2025"));
        bytes.extend_from_slice(&[0xff, 0xff, 0x00, 0x00]);
        bytes.extend(utf16le("Второй раздел"));

        assert_eq!(legacy_doc_to_text(&bytes), "Quarterly roadmap für 2025 Второй раздел");
    }

    #[test]
    fn legacy_doc_keeps_mixed_pieces_in_file_order() {
        let mut bytes = b"Header text".to_vec();
        bytes.extend_from_slice(&[0xff; 5]);
        bytes.extend(utf16le("Unicode body"));
        bytes.extend_from_slice(&[0x00, 0x00, 0x07, 0x07]);
        bytes.extend_from_slice(b"Trailing 8-bit piece");

        assert_eq!(
            legacy_doc_to_text(&bytes),
            "Header text Unicode body Trailing 8-bit piece"
        );
    }

    #[test]
    fn legacy_doc_skips_runs_without_letters() {
        let mut bytes = b"1234 5678".to_vec();
        bytes.push(0x00);
        bytes.extend_from_slice(b"Body");

        assert_eq!(legacy_doc_to_text(&bytes), "Body");
    }

    #[test]
    fn rtf_drops_control_words_and_tables() {
        let rtf = r"{\rtf1\ansi{\fonttbl{\f0 Times New Roman;}}{\colortbl;\red0\green0\blue0;}
{\*\generator Riched20;}\f0\fs24 Hello {\b bold} world.\par
Caf\'e9 \u8364? ok\par}";

        let text = rtf_to_text(rtf);

        assert!(text.contains("Hello bold world."));
        assert!(text.contains("Café € ok"));
        assert!(!text.contains("Times"));
        assert!(!text.contains("Riched"));
        assert!(!text.contains('\\'));
    }

    #[test]
    fn plain_text_strips_bom() {
        assert_eq!(
            extract_text(DocumentFormat::PlainText, b"\xEF\xBB\xBFhello").unwrap(),
            "hello"
        );
    }
}
