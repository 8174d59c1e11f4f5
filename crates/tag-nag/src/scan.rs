//! scan orchestration
//!
//! A scan runs strictly ordered phases over the same set of parsed files:
//! 1. build the evaluation context (`variable`, `locals`)
//! 2. collect provider `default_tags`
//! 3. determine the effective tags of every resource
//! 4. match them against the required tags and assemble violations
//!
//! Every table built by an earlier phase is read-only for the later ones.
use crate::context;
use crate::ignore::IgnoreDirectives;
use crate::provider;
use crate::registry::TaggabilityRegistry;
use crate::resource::{ResourceTagExtractor, TargetProvider};
use crate::tags::{Casing, TagSpec};
use crate::terraform_documents::{self, LoadError, TerraformDocuments};
use crate::violation::{self, Violation};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub required: TagSpec,
    pub casing: Casing,
    pub target: TargetProvider,
    /// path prefixes excluded from discovery
    pub skip: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanReport {
    pub violations: Vec<Violation>,
    pub summary: Summary,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// number of violations, including suppressed ones
    pub total: usize,
    /// number of suppressed violations
    pub skipped: usize,
    /// number of files with at least one violation
    pub files_affected: usize,
}

impl ScanReport {
    fn new(violations: Vec<Violation>) -> Self {
        let files_affected = violations
            .iter()
            .map(|v| v.file_path.as_path())
            .collect::<indexmap::IndexSet<_>>()
            .len();

        let summary = Summary {
            total: violations.len(),
            skipped: violations.iter().filter(|v| v.suppressed).count(),
            files_affected,
        };

        Self {
            violations,
            summary,
        }
    }

    /// Violations that are not suppressed
    pub fn failing(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| !v.suppressed)
    }

    pub fn has_failures(&self) -> bool {
        self.failing().next().is_some()
    }
}

/// Scans already loaded documents
#[tracing::instrument(level = "debug", skip_all)]
pub fn scan(
    documents: &TerraformDocuments,
    options: &ScanOptions,
    registry: Option<&TaggabilityRegistry>,
) -> ScanReport {
    let casing = options.casing;

    let (context, references) = context::resolve(documents, casing);
    let default_tags = provider::collect_default_tags(documents, &context, &references, casing);

    let extractor = ResourceTagExtractor::new(
        &context,
        &references,
        &default_tags,
        &options.target,
        registry,
        casing,
    );

    let mut directives: indexmap::IndexMap<&Path, IgnoreDirectives> = indexmap::IndexMap::new();
    let mut violations = vec![];
    let mut checked = 0usize;

    for resource in extractor.resources(documents) {
        checked += 1;

        let directives = directives
            .entry(resource.source.path.as_path())
            .or_insert_with(|| IgnoreDirectives::new(resource.source));

        if let Some(violation) = violation::assess(&resource, &options.required, directives, casing) {
            violations.push(violation);
        }
    }

    let report = ScanReport::new(violations);
    tracing::info!(
        files = documents.source_count(),
        resources = checked,
        violations = report.summary.total,
        suppressed = report.summary.skipped,
        "scan finished"
    );

    report
}

/// Discovers, loads and scans all terraform files below `path`
///
/// A directory without terraform files yields an empty report.
#[tracing::instrument(level = "debug", skip(options, registry))]
pub fn scan_directory(
    path: &Path,
    options: &ScanOptions,
    registry: Option<&TaggabilityRegistry>,
) -> Result<ScanReport, LoadError> {
    if !path.is_dir() {
        return Err(LoadError::NotADirectory(path.to_owned()));
    }

    if !terraform_documents::contains_terraform_files(path)? {
        tracing::info!(path=%path.display(), "no terraform files found");
        return Ok(ScanReport::default());
    }

    let mut documents = TerraformDocuments::default();
    match documents.load_directory(path, &options.skip) {
        Ok(()) => {}
        Err(LoadError::NoFilesFound) => {
            tracing::warn!(path=%path.display(), "no terraform file could be loaded");
            return Ok(ScanReport::default());
        }
        Err(error) => return Err(error),
    }

    Ok(scan(&documents, options, registry))
}

/// Loads the taggability registry, `None` (every type taggable) on failure
pub fn load_registry(path: &Path, target: &TargetProvider) -> Option<TaggabilityRegistry> {
    match TaggabilityRegistry::load(path, &target.registry_address) {
        Ok(registry) => Some(registry),
        Err(error) => {
            tracing::warn!(%error, "provider schema unavailable, assuming all resources are taggable (run `terraform init` to fix)");
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn options(required: &str) -> ScanOptions {
        ScanOptions {
            required: required.parse().unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn summary_counts() {
        let documents = crate::terraform_documents! {
            "a.tf" => r#"
                resource "aws_s3_bucket" "missing" {}

                #tag-nag ignore
                resource "aws_s3_bucket" "ignored" {}
                resource "aws_s3_bucket" "ok" {
                  tags = { Owner = "x" }
                }
            "#,
            "b.tf" => r#"
                resource "aws_sqs_queue" "missing" {}
            "#,
            "c.tf" => "#tag-nag ignore-all\nresource \"aws_sqs_queue\" \"ignored\" {}\n"
        };

        let report = scan(&documents, &options("Owner"), None);

        assert_eq!(
            report.summary,
            Summary {
                total: 4,
                skipped: 2,
                files_affected: 3,
            }
        );
        assert!(report.has_failures());
        assert_eq!(
            report
                .failing()
                .map(|v| v.resource_name.as_str())
                .collect::<Vec<_>>(),
            vec!["missing", "missing"]
        );
    }

    #[test]
    fn only_suppressed_violations_do_not_fail() {
        let documents = crate::terraform_documents! {
            "#tag-nag ignore-all\nresource \"aws_s3_bucket\" \"this\" {}\n"
        };

        let report = scan(&documents, &options("Owner"), None);

        assert_eq!(report.summary.total, 1);
        assert!(!report.has_failures());
        assert_eq!(report.summary.files_affected, 1);
    }

    #[test]
    fn directory_scan() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("main.tf"),
            "resource \"aws_s3_bucket\" \"this\" {}\n",
        )
        .unwrap();
        std::fs::create_dir(dir.path().join("legacy")).unwrap();
        std::fs::write(
            dir.path().join("legacy/main.tf"),
            "resource \"aws_s3_bucket\" \"old\" {}\n",
        )
        .unwrap();

        let mut options = options("Owner");
        options.skip = vec![PathBuf::from("legacy")];

        let report = scan_directory(dir.path(), &options, None).unwrap();
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].resource_name, "this");
    }

    #[test]
    fn empty_directory() {
        let dir = tempfile::tempdir().unwrap();

        let report = scan_directory(dir.path(), &options("Owner"), None).unwrap();
        assert_eq!(report, ScanReport::default());
    }

    #[test]
    fn missing_directory() {
        let dir = tempfile::tempdir().unwrap();

        let error = scan_directory(&dir.path().join("nope"), &options("Owner"), None).unwrap_err();
        assert!(matches!(error, LoadError::NotADirectory(_)), "{error:?}");
    }
}
