//! Source-format detection and per-format conversion arguments.
//!
//! The format is resolved exactly once, from the file extension, before any
//! external tool runs — every downstream stage then matches on the
//! [`SourceFormat`] variant instead of comparing strings. Each variant knows
//! the pandoc reader flags its format needs, so argument assembly lives next
//! to the tag it belongs to.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::IngestError;

/// The three supported manuscript source formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Latex,
    Docx,
    Markdown,
}

impl SourceFormat {
    /// Detect the format from a file name's extension.
    ///
    /// Extensions are matched case-insensitively. Anything other than
    /// `.tex`, `.docx`, `.md` or `.markdown` fails with
    /// [`IngestError::UnsupportedFormat`] naming the extension and path.
    pub fn detect(path: &Path) -> Result<Self, IngestError> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "tex" => Ok(SourceFormat::Latex),
            "docx" => Ok(SourceFormat::Docx),
            "md" | "markdown" => Ok(SourceFormat::Markdown),
            _ => Err(IngestError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            }),
        }
    }

    /// Short tag used in reports and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Latex => "latex",
            SourceFormat::Docx => "docx",
            SourceFormat::Markdown => "markdown",
        }
    }

    /// Parse a user-supplied override tag (CLI `--format`).
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.to_lowercase().as_str() {
            "latex" | "tex" => Some(SourceFormat::Latex),
            "docx" | "word" => Some(SourceFormat::Docx),
            "markdown" | "md" => Some(SourceFormat::Markdown),
            _ => None,
        }
    }

    /// Pandoc arguments for the HTML conversion of this format.
    ///
    /// All three produce fragment output (no `-s`, so no document wrapper):
    /// - LaTeX: raw-LaTeX passthrough on, auto section identifiers off,
    ///   syntax highlighting off.
    /// - Docx: embedded media extracted into a sibling `./media` directory
    ///   (relative to the working directory, which the converter pins to the
    ///   manuscript's parent).
    /// - Markdown: no special flags.
    pub fn html_args(&self) -> Vec<&'static str> {
        match self {
            SourceFormat::Latex => vec![
                "-f",
                "latex+raw_tex-auto_identifiers",
                "--no-highlight",
                "-t",
                "html",
            ],
            SourceFormat::Docx => vec!["-f", "docx", "--extract-media=./media", "-t", "html"],
            SourceFormat::Markdown => vec!["-f", "markdown", "-t", "html"],
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn detects_all_supported_extensions() {
        assert_eq!(
            SourceFormat::detect(Path::new("manuscript.tex")).unwrap(),
            SourceFormat::Latex
        );
        assert_eq!(
            SourceFormat::detect(Path::new("thesis.docx")).unwrap(),
            SourceFormat::Docx
        );
        assert_eq!(
            SourceFormat::detect(Path::new("notes.md")).unwrap(),
            SourceFormat::Markdown
        );
        assert_eq!(
            SourceFormat::detect(Path::new("notes.markdown")).unwrap(),
            SourceFormat::Markdown
        );
    }

    #[test]
    fn detection_is_case_insensitive() {
        assert_eq!(
            SourceFormat::detect(Path::new("Manuscript.TEX")).unwrap(),
            SourceFormat::Latex
        );
        assert_eq!(
            SourceFormat::detect(Path::new("chapters/Book.MD")).unwrap(),
            SourceFormat::Markdown
        );
    }

    #[test]
    fn rejects_everything_else() {
        for name in ["notes.TXT", "book.pdf", "image.png", "plain", "trailing."] {
            let err = SourceFormat::detect(Path::new(name)).unwrap_err();
            match err {
                IngestError::UnsupportedFormat { path, .. } => {
                    assert_eq!(path, PathBuf::from(name));
                }
                other => panic!("expected UnsupportedFormat, got: {other}"),
            }
        }
    }

    #[test]
    fn latex_args_enable_raw_tex_and_disable_highlighting() {
        let args = SourceFormat::Latex.html_args();
        assert!(args.contains(&"latex+raw_tex-auto_identifiers"));
        assert!(args.contains(&"--no-highlight"));
        // Fragment output: no standalone flag.
        assert!(!args.contains(&"-s"));
    }

    #[test]
    fn docx_args_extract_media() {
        let args = SourceFormat::Docx.html_args();
        assert!(args.contains(&"--extract-media=./media"));
    }

    #[test]
    fn parse_accepts_aliases() {
        assert_eq!(SourceFormat::parse("LaTeX"), Some(SourceFormat::Latex));
        assert_eq!(SourceFormat::parse("word"), Some(SourceFormat::Docx));
        assert_eq!(SourceFormat::parse("md"), Some(SourceFormat::Markdown));
        assert_eq!(SourceFormat::parse("rst"), None);
    }
}
