//! Supported document formats, keyed by MIME type.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    PlainText,
    Markdown,
    Csv,
    Pdf,
    /// Legacy binary Word (.doc)
    Doc,
    /// Office Open XML Word (.docx)
    Docx,
    Rtf,
}

impl DocumentFormat {
    pub const ALL: [DocumentFormat; 7] = [
        DocumentFormat::PlainText,
        DocumentFormat::Markdown,
        DocumentFormat::Csv,
        DocumentFormat::Pdf,
        DocumentFormat::Doc,
        DocumentFormat::Docx,
        DocumentFormat::Rtf,
    ];

    /// Parameters such as `; charset=utf-8` are ignored.
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "text/plain" => Some(DocumentFormat::PlainText),
            "text/markdown" | "text/x-markdown" => Some(DocumentFormat::Markdown),
            "text/csv" => Some(DocumentFormat::Csv),
            "application/pdf" => Some(DocumentFormat::Pdf),
            "application/msword" => Some(DocumentFormat::Doc),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(DocumentFormat::Docx)
            }
            "application/rtf" | "text/rtf" => Some(DocumentFormat::Rtf),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::PlainText => "plain_text",
            DocumentFormat::Markdown => "markdown",
            DocumentFormat::Csv => "csv",
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Doc => "doc",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Rtf => "rtf",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
