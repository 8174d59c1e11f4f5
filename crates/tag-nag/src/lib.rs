//! # tag-nag - find terraform resources missing required tags
//!
//! ## Introduction for developers
//!
//! Read this to understand how `tag-nag` works internally.
//!
//! ### HCL Terms
//!
//! Quick introduction to terms used to describe elements of terraform (HCL) documents.
//!
//! - a file gets parsed as a `body`
//! - ...which is just a list of `structures`
//! - ...where there are two kinds:
//!   - `attribute`: a "key = value" pair
//!   - or `block`: 1 `identifier`, 0 or more `labels` and a `body` enclosed in `{` and `}`
//!
//! ```hcl
//! provider "aws" {
//!   alias = "west"
//!
//!   default_tags {
//!     tags = local.tags
//!   }
//! }
//!
//! locals {
//!   tags = { Owner = var.owner }
//! }
//!
//! #tag-nag ignore
//! resource "aws_s3_bucket" "this" {
//!   provider = aws.west
//!   tags     = { Name = "logs" }
//! }
//! ```
//!
//! ### Loading files
//!
//! Every `.tf` file is parsed exactly once into a [hcl_edit::structure::Body]. We use
//! [terraform_documents::TerraformDocuments] to store the root blocks of all files together with
//! the path and raw text of their source. The raw text is needed later on to find ignore markers
//! and the line a resource is declared on. Files that fail to parse are logged and skipped.
//!
//! ### Evaluation context
//!
//! see [context::EvaluationContext::build]
//!
//! - `variable` defaults are evaluated against the function library only, a missing or
//!   unresolvable default becomes `null`
//! - `locals` may depend on each other in any order, they are resolved by repeated passes until a
//!   pass makes no progress (at most [context::MAX_LOCAL_PASSES])
//!
//! Every resolved object-shaped variable or local is additionally stored by its reference name
//! (`local.tags`) in a [context::ReferenceTable]. It is used as a fallback when a tags expression
//! cannot be evaluated.
//!
//! Evaluation itself is done by [hcl::eval] ([eval::evaluate]) with the functions declared in
//! [functions].
//!
//! ### Default tags
//!
//! see [provider::collect_default_tags]
//!
//! Each `provider` block has an identity (`aws`, `aws.west`). The tags of its `default_tags` block
//! are recorded under that identity.
//!
//! ### Resources
//!
//! see [resource::ResourceTagExtractor]
//!
//! | **step** | **source** |
//! |----------|------------|
//! | filter | resource type prefix (`aws_`), [registry::TaggabilityRegistry] |
//! | provider | `provider` attribute or the unaliased provider |
//! | own tags | `tags` attribute, `each.*`/`count.*` replaced by placeholders |
//! | effective tags | default tags of the provider, overridden by own tags |
//!
//! ### Matching and output
//!
//! The effective tags are compared to the required [tags::TagSpec] by [matcher::missing_tags].
//! Resources missing tags become a [violation::Violation], flagged as suppressed when an
//! [ignore] marker applies. [scan::scan] ties all phases together and returns a
//! [scan::ScanReport] which gets serialized via [serde].
//!
pub mod config;
pub mod context;
pub mod eval;
pub mod functions;
pub mod ignore;
pub mod matcher;
pub mod provider;
pub mod registry;
pub mod resource;
pub mod scan;
pub mod tags;
pub mod terraform_documents;
mod util;
pub mod value;
pub mod violation;
mod visit;
