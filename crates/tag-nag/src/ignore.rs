//! suppression markers in terraform source comments
//!
//! ```hcl
//! #tag-nag ignore-all
//! ```
//! anywhere in a file suppresses all violations of that file.
//!
//! ```hcl
//! #tag-nag ignore
//! resource "aws_s3_bucket" "this" { #tag-nag ignore
//!   #tag-nag ignore
//! }
//! ```
//! on the line before a resource declaration, on the declaration line itself or on the first line of
//! its body suppresses the violation of that resource. A marker after a one-line resource belongs to
//! the next declaration only.
//!
//! Suppressed violations are still reported, flagged as suppressed.
use crate::terraform_documents::SourceFile;

pub const IGNORE_FILE_MARKER: &str = "#tag-nag ignore-all";
pub const IGNORE_RESOURCE_MARKER: &str = "#tag-nag ignore";

/// Markers of one file
#[derive(Debug)]
pub struct IgnoreDirectives<'a> {
    source: &'a SourceFile,
    ignore_all: bool,
}

impl<'a> IgnoreDirectives<'a> {
    pub fn new(source: &'a SourceFile) -> Self {
        let ignore_all = source.text.contains(IGNORE_FILE_MARKER);
        if ignore_all {
            tracing::debug!(path=%source.path.display(), "file is ignored");
        }

        Self { source, ignore_all }
    }

    pub fn ignores_file(&self) -> bool {
        self.ignore_all
    }

    /// Whether the resource spanning `line..=last_line` (1-based) is suppressed
    pub fn ignores_resource(&self, line: usize, last_line: usize) -> bool {
        if self.ignore_all {
            return true;
        }

        let first_body_line = (line < last_line).then_some(line + 1);

        [Some(line.saturating_sub(1)), Some(line), first_body_line]
            .into_iter()
            .flatten()
            .filter_map(|line| self.source.line(line))
            .any(|text| text.contains(IGNORE_RESOURCE_MARKER))
    }
}
