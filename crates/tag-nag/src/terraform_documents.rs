//! collection of terraform documents (parsed [Body], raw text and path of each source file)
//!
//! [TerraformDocuments] tracks
//! - the source files (path and raw text, the text is needed for ignore markers)
//! - the root blocks of every file
//!
//! and defines a numeric index for each. Once added those indices are stable (removal is not possible).
//! Every file is parsed exactly once; all later phases work on the parsed blocks.
use hcl_edit::structure::{Block, Body, Structure};
use hcl_edit::Span;
use std::path::{Path, PathBuf};

/// Directories that never contain sources of the configuration being scanned
pub const SKIPPED_DIRS: [&str; 2] = [".terraform", ".git"];

const TERRAFORM_EXTENSION: &str = "tf";

#[derive(Default, Debug)]
pub struct TerraformDocuments {
    sources: Vec<SourceFile>,
    root_blocks: Vec<(usize, Block)>,
}

/// A loaded file
#[derive(Debug)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
}

impl SourceFile {
    /// 1-based line number of a byte offset
    pub fn line_at(&self, offset: usize) -> usize {
        let offset = offset.min(self.text.len());
        self.text.as_bytes()[..offset]
            .iter()
            .filter(|b| **b == b'\n')
            .count()
            + 1
    }

    /// Text of a 1-based line
    pub fn line(&self, line: usize) -> Option<&str> {
        line.checked_sub(1)
            .and_then(|index| self.text.lines().nth(index))
    }

    /// 1-based line on which a block is declared (the line holding its identifier)
    pub fn declaration_line(&self, block: &Block) -> usize {
        let start = block.span().map_or(0, |span| span.start);
        let first_line = self.line_at(start);
        let ident = block.ident.value().as_str();

        self.text
            .lines()
            .skip(first_line - 1)
            .position(|line| line.trim_start().starts_with(ident))
            .map_or(first_line, |offset| first_line + offset)
    }

    /// 1-based line holding the end of a block
    pub fn last_line(&self, block: &Block) -> usize {
        match block.span() {
            Some(span) => self.line_at(span.end.saturating_sub(1)),
            None => self.declaration_line(block),
        }
    }
}

impl TerraformDocuments {
    /// Inserts and indexes a parsed document
    pub fn insert(&mut self, document: Body, path: impl Into<PathBuf>, text: impl Into<String>) {
        let source_index = self.sources.len();
        self.sources.push(SourceFile {
            path: path.into(),
            text: text.into(),
        });

        for structure in document.into_iter() {
            // root attributes have no meaning in terraform
            if let Structure::Block(block) = structure {
                self.root_blocks.push((source_index, block));
            }
        }
    }

    /// Parses and inserts a document
    pub fn insert_source(
        &mut self,
        path: impl Into<PathBuf>,
        text: impl Into<String>,
    ) -> Result<(), LoadError> {
        let text = text.into();
        let path = path.into();
        let body = hcl_edit::parser::parse_body(&text).map_err(|source| LoadError::HclParseFailed {
            path: path.clone(),
            source,
        })?;

        self.insert(body, path, text);
        Ok(())
    }

    pub fn blocks(&self) -> impl Iterator<Item = SourceBlock> {
        self.root_blocks
            .iter()
            .enumerate()
            .map(|(index, (source_index, block))| (index, &self.sources[*source_index], block))
    }

    /// All root blocks with the given identifier (`resource`, `provider`, ...)
    pub fn blocks_of<'a>(&'a self, ident: &'a str) -> impl Iterator<Item = SourceBlock<'a>> {
        self.blocks()
            .filter(move |(_, _, block)| block.ident.value().as_str() == ident)
    }

    pub fn sources(&self) -> &[SourceFile] {
        &self.sources
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

impl TerraformDocuments {
    pub fn load_file(&mut self, file_path: &Path) -> Result<(), LoadError> {
        tracing::info!(path=%file_path.display(), "loading file");

        let file_contents =
            std::fs::read_to_string(file_path).map_err(|source| LoadError::IoError {
                path: file_path.to_owned(),
                source,
            })?;

        self.insert_source(file_path, file_contents)
    }

    /// Loads every `.tf` file below `dir_path`
    ///
    /// `.terraform` and `.git` directories and paths starting with any of `skip` are ignored.
    /// Files that fail to read or parse are logged and skipped.
    #[tracing::instrument(skip(self))]
    pub fn load_directory(&mut self, dir_path: &Path, skip: &[PathBuf]) -> Result<(), LoadError> {
        if !dir_path.is_dir() {
            return Err(LoadError::NotADirectory(dir_path.to_owned()));
        }

        let mut any_files_loaded = false;

        for file_path in terraform_files(dir_path, skip) {
            let file_path = file_path?;
            match self.load_file(&file_path) {
                Ok(()) => any_files_loaded = true,
                Err(error) => tracing::warn!(path=%file_path.display(), %error, "skipping file"),
            }
        }

        if !any_files_loaded {
            return Err(LoadError::NoFilesFound);
        }

        Ok(())
    }
}

/// Returns true as soon as one `.tf` file is found below `dir_path`
pub fn contains_terraform_files(dir_path: &Path) -> Result<bool, LoadError> {
    match terraform_files(dir_path, &[]).next() {
        None => Ok(false),
        Some(Ok(_)) => Ok(true),
        Some(Err(error)) => Err(error),
    }
}

fn terraform_files<'a>(
    dir_path: &Path,
    skip: &'a [PathBuf],
) -> impl Iterator<Item = Result<PathBuf, LoadError>> + 'a {
    let root = dir_path.to_owned();

    walkdir::WalkDir::new(dir_path)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| {
            let skipped_dir = entry.file_type().is_dir()
                && entry.depth() > 0
                && SKIPPED_DIRS.contains(&entry.file_name().to_string_lossy().as_ref());

            // skip prefixes may be given relative to the scanned directory
            let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
            let skipped_path = skip
                .iter()
                .any(|prefix| entry.path().starts_with(prefix) || relative.starts_with(prefix));

            !skipped_dir && !skipped_path
        })
        .filter_map(|entry| match entry {
            Ok(entry) => {
                let is_terraform_file = entry.file_type().is_file()
                    && entry.path().extension().is_some_and(|e| e == TERRAFORM_EXTENSION);
                is_terraform_file.then(|| Ok(entry.into_path()))
            }
            // only an unreadable root is fatal
            Err(error) if error.depth() > 0 => {
                tracing::warn!(%error, "skipping unreadable path");
                None
            }
            Err(error) => Some(Err(LoadError::WalkFailed(error))),
        })
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("No terraform files found in directory")]
    NoFilesFound,
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("Unable to read {}", .path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to walk directory")]
    WalkFailed(#[from] walkdir::Error),
    #[error("Unable to parse hcl file {}", .path.display())]
    HclParseFailed {
        path: PathBuf,
        #[source]
        source: hcl_edit::parser::Error,
    },
}

/// Utility macro to create [TerraformDocuments]
///
/// Create from a single document (stored as `main.tf`)
/// ```
/// # use tag_nag::terraform_documents;
/// terraform_documents!(r#"resource "aws_s3_bucket" "this" {}"#);
/// ```
///
/// Create from multiple documents (path required)
/// ```
/// # use tag_nag::terraform_documents;
/// terraform_documents! {
///   "variables.tf" => r#"variable "env" { default = "dev" }"#,
///   "main.tf" => r#"resource "aws_s3_bucket" "this" {}"#
/// };
/// ```
///
/// # Panic
/// Panics on invalid input
///
/// ```should_panic
/// # use tag_nag::terraform_documents;
/// terraform_documents!("not = valid = hcl");
/// ```
#[macro_export]
macro_rules! terraform_documents {
    // single document
    { $expr:expr } => {
        $crate::terraform_documents! { "main.tf" => $expr }
    };
    // multi document with sources
    { $($source:expr => $expr:expr),+ } => {{
        let mut docs = $crate::terraform_documents::TerraformDocuments::default();
        $(
            docs.insert_source($source, $expr).expect("body must parse");
        )+

        docs
    }};
}

pub type SourceBlock<'a> = (usize, &'a SourceFile, &'a Block);

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn iterators() {
        let documents = terraform_documents! {r#"
        locals {}
        resource "aws_s3_bucket" "a" {}
        provider "aws" {}
        resource "aws_s3_bucket" "b" {}
        "#};

        assert_eq!(documents.blocks().count(), 4);
        assert_eq!(documents.blocks_of("resource").count(), 2);
        assert_eq!(documents.source_count(), 1);
    }

    #[test]
    fn declaration_lines() {
        let documents = terraform_documents! {
            "one.tf" => "locals {}\n\n# comment\nresource \"aws_s3_bucket\" \"a\" {\n  bucket = \"x\"\n}\n",
            "two.tf" => "resource \"aws_s3_bucket\" \"b\" {}\n"
        };

        let lines: Vec<_> = documents
            .blocks_of("resource")
            .map(|(_, source, block)| (source.path.clone(), source.declaration_line(block)))
            .collect();

        assert_eq!(
            lines,
            vec![(PathBuf::from("one.tf"), 4), (PathBuf::from("two.tf"), 1)]
        );

        let last_lines: Vec<_> = documents
            .blocks_of("resource")
            .map(|(_, source, block)| source.last_line(block))
            .collect();
        assert_eq!(last_lines, vec![6, 1]);
    }

    #[test]
    fn source_lines() {
        let documents = terraform_documents!("a {}\nb {}\n");
        let source = &documents.sources()[0];

        assert_eq!(source.line(2), Some("b {}"));
        assert_eq!(source.line(0), None);
        assert_eq!(source.line_at(5), 2);
    }

    #[test]
    fn directory_loading_skips_unparsable_and_hidden() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.tf"), "resource \"aws_s3_bucket\" \"a\" {}").unwrap();
        std::fs::write(dir.path().join("broken.tf"), "resource {").unwrap();
        std::fs::write(dir.path().join("README.md"), "# readme").unwrap();
        std::fs::create_dir(dir.path().join(".terraform")).unwrap();
        std::fs::write(dir.path().join(".terraform/module.tf"), "a {}").unwrap();
        std::fs::create_dir(dir.path().join("legacy")).unwrap();
        std::fs::write(dir.path().join("legacy/old.tf"), "a {}").unwrap();

        let mut documents = TerraformDocuments::default();
        documents
            .load_directory(dir.path(), &[dir.path().join("legacy")])
            .unwrap();

        assert_eq!(documents.source_count(), 1);
        assert!(documents.sources()[0].path.ends_with("main.tf"));
    }

    #[test]
    fn directory_without_terraform_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.yaml"), "a: b").unwrap();

        assert!(!contains_terraform_files(dir.path()).unwrap());
        assert!(matches!(
            TerraformDocuments::default().load_directory(dir.path(), &[]),
            Err(LoadError::NoFilesFound)
        ));
    }

    #[test]
    fn nested_terraform_file_is_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/main.tf"), "").unwrap();

        assert!(contains_terraform_files(dir.path()).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subdirectory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.tf"), "resource \"aws_s3_bucket\" \"a\" {}").unwrap();
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::write(locked.join("hidden.tf"), "a {}").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        // root can still read the directory, then there is nothing to skip
        let readable = std::fs::read_dir(&locked).is_ok();

        let mut documents = TerraformDocuments::default();
        let loaded = documents.load_directory(dir.path(), &[]);
        let found = contains_terraform_files(dir.path());

        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        loaded.unwrap();
        assert!(found.unwrap());
        let expected = if readable { 2 } else { 1 };
        assert_eq!(documents.source_count(), expected);
    }

    #[test]
    fn unreadable_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");

        assert!(matches!(
            contains_terraform_files(&missing),
            Err(LoadError::WalkFailed(_))
        ));
    }
}
