use anyhow::Context;
use docx_rs::{BreakType, Docx, Paragraph, Run};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::cli::OutputFormat;
use crate::format::paragraphs;
use crate::utils::strip_unsafe_filename_chars;
use crate::{Result, ScribeError};

pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const TEXT_MIME: &str = "text/plain; charset=utf-8";

const FALLBACK_NAME: &str = "transcript";

/// A written transcript document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentArtifact {
    /// File name offered for download
    pub filename: String,

    /// Where the file was written
    pub path: PathBuf,

    /// Raw file contents
    pub bytes: Vec<u8>,

    /// MIME type of the contents
    pub mime: &'static str,
}

/// Writes transcripts into a scratch directory
pub struct DocumentWriter {
    scratch_dir: PathBuf,
}

impl DocumentWriter {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Use a fresh per-run directory under `root`, created on first write
    pub fn in_scratch_root(root: &Path) -> Self {
        Self::new(root.join(crate::utils::generate_run_dirname()))
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Write `text` as a document named after `title`
    pub fn write(&self, text: &str, title: &str, format: OutputFormat) -> Result<DocumentArtifact> {
        let (bytes, extension, mime) = match format {
            OutputFormat::Docx => (render_docx(text)?, "docx", DOCX_MIME),
            OutputFormat::Text => (text.as_bytes().to_vec(), "txt", TEXT_MIME),
        };

        let filename = document_filename(title, extension);
        let path = self.scratch_dir.join(&filename);

        fs_err::create_dir_all(&self.scratch_dir).context("Failed to create scratch directory")?;

        let mut file = NamedTempFile::new_in(&self.scratch_dir)
            .context("Failed to create file in scratch directory")?;
        file.write_all(&bytes)?;
        file.persist(&path)
            .map_err(|e| ScribeError::Document(format!("{}: {}", path.display(), e)))?;

        tracing::info!(
            "Wrote {} ({})",
            path.display(),
            crate::utils::format_file_size(bytes.len() as u64)
        );

        Ok(DocumentArtifact {
            filename,
            path,
            bytes,
            mime,
        })
    }
}

/// Title-based file name with filesystem-unsafe characters removed
pub fn document_filename(title: &str, extension: &str) -> String {
    let stem = strip_unsafe_filename_chars(title);
    let stem = stem.trim().trim_end_matches('.');
    let stem = if stem.is_empty() { FALLBACK_NAME } else { stem };
    format!("{}.{}", stem, extension)
}

/// Single-paragraph docx; paragraph breaks become line breaks inside it
pub fn render_docx(text: &str) -> Result<Vec<u8>> {
    let mut run = Run::new();
    for (index, paragraph) in paragraphs(text).enumerate() {
        if index > 0 {
            run = run.add_break(BreakType::TextWrapping).add_break(BreakType::TextWrapping);
        }
        run = run.add_text(paragraph);
    }

    let mut buffer = Vec::new();
    Docx::new()
        .add_paragraph(Paragraph::new().add_run(run))
        .build()
        .pack(Cursor::new(&mut buffer))
        .map_err(|e| ScribeError::Document(e.to_string()))?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNSAFE: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

    #[test]
    fn test_document_filename_strips_unsafe_chars() {
        for title in [
            "Episode: One",
            r#"What? "Why" <now> | a/b\c *"#,
            "::::",
            "  ",
            "trailing dots...",
        ] {
            let name = document_filename(title, "docx");
            assert!(!name.contains(UNSAFE), "{} -> {}", title, name);
            assert!(name.ends_with(".docx"));
        }

        assert_eq!(document_filename("Episode: One", "docx"), "Episode One.docx");
        assert_eq!(document_filename("::::", "txt"), "transcript.txt");
        assert_eq!(document_filename("trailing dots...", "txt"), "trailing dots.txt");
    }

    #[test]
    fn test_render_docx_is_zip() {
        let bytes = render_docx("intro \n\n>>hello").unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_write_docx_and_text() {
        let dir = tempfile::tempdir().unwrap();
        let writer = DocumentWriter::new(dir.path());

        let docx = writer.write("hello \n\n>>world", "Ep 1: Start?", OutputFormat::Docx).unwrap();
        assert_eq!(docx.filename, "Ep 1 Start.docx");
        assert_eq!(docx.mime, DOCX_MIME);
        assert_eq!(fs_err::read(&docx.path).unwrap(), docx.bytes);

        let text = writer.write("hello", "Ep 1: Start?", OutputFormat::Text).unwrap();
        assert_eq!(text.filename, "Ep 1 Start.txt");
        assert_eq!(text.bytes, b"hello");
    }

    #[test]
    fn test_scratch_dir_created_on_first_write() {
        let root = tempfile::tempdir().unwrap();
        let writer = DocumentWriter::in_scratch_root(root.path());
        assert!(writer.scratch_dir().starts_with(root.path()));
        assert!(!writer.scratch_dir().exists());

        let artifact = writer.write("text", "Title", OutputFormat::Text).unwrap();
        assert!(writer.scratch_dir().is_dir());
        assert_eq!(artifact.path.parent(), Some(writer.scratch_dir()));
    }
}
