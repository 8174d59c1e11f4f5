//! End-to-end scans of small terraform configurations

use pretty_assertions::assert_eq;
use tag_nag::scan::{scan, ScanOptions, ScanReport};
use tag_nag::tags::Casing;
use tag_nag::terraform_documents;

fn options(required: &str, casing: Casing) -> ScanOptions {
    ScanOptions {
        required: required.parse().expect("valid tag spec"),
        casing,
        ..Default::default()
    }
}

fn missing(report: &ScanReport) -> Vec<(&str, Vec<String>)> {
    report
        .violations
        .iter()
        .map(|v| (v.resource_name.as_str(), v.missing_tags.clone()))
        .collect()
}

#[test]
fn allowed_value_present() {
    let documents = terraform_documents! {r#"
        resource "aws_s3_bucket" "this" {
          tags = { Owner = "jake", Environment = "Dev" }
        }
    "#};

    let report = scan(
        &documents,
        &options("Owner,Environment[Dev,Prod]", Casing::Sensitive),
        None,
    );
    assert!(report.violations.is_empty());
}

#[test]
fn value_outside_allowed_set() {
    let documents = terraform_documents! {r#"
        resource "aws_s3_bucket" "this" {
          tags = { Owner = "jake", Environment = "Test" }
        }
    "#};

    let report = scan(
        &documents,
        &options("Owner,Environment[Dev,Prod]", Casing::Sensitive),
        None,
    );
    assert_eq!(
        missing(&report),
        vec![("this", vec!["Environment[Dev,Prod]".to_string()])]
    );
}

#[test]
fn provider_default_tags_fill_in() {
    let documents = terraform_documents! {
        "providers.tf" => r#"
            provider "aws" {
              default_tags {
                tags = { CostCenter = "C1" }
              }
            }
        "#,
        "main.tf" => r#"
            resource "aws_s3_bucket" "this" {
              tags = { Owner = "jake" }
            }
        "#
    };

    let report = scan(&documents, &options("CostCenter,Owner", Casing::Sensitive), None);
    assert!(report.violations.is_empty());
}

#[test]
fn resource_tags_override_provider_defaults() {
    let documents = terraform_documents! {r#"
        provider "aws" {
          default_tags {
            tags = { Owner = "team-a" }
          }
        }

        resource "aws_s3_bucket" "this" {
          tags = { Owner = "team-b" }
        }
    "#};

    let report = scan(&documents, &options("Owner[team-b]", Casing::Sensitive), None);
    assert!(report.violations.is_empty());

    let report = scan(&documents, &options("Owner[team-a]", Casing::Sensitive), None);
    assert_eq!(
        missing(&report),
        vec![("this", vec!["Owner[team-a]".to_string()])]
    );
}

#[test]
fn ignored_file_still_reports_suppressed_violation() {
    let documents = terraform_documents! {r#"
        #tag-nag ignore-all
        resource "aws_s3_bucket" "this" {}
    "#};

    let report = scan(&documents, &options("Owner,Environment", Casing::Sensitive), None);

    assert_eq!(report.violations.len(), 1);
    assert!(report.violations[0].suppressed);
    assert_eq!(
        report.violations[0].missing_tags,
        vec!["Environment".to_string(), "Owner".to_string()]
    );
    assert!(!report.has_failures());
}

#[test]
fn tags_through_locals_and_variables() {
    let documents = terraform_documents! {
        "variables.tf" => r#"
            variable "environment" {
              default = "dev"
            }
        "#,
        "main.tf" => r#"
            resource "aws_s3_bucket" "this" {
              tags = local.tags
            }
        "#,
        "locals.tf" => r#"
            locals {
              tags = { Env = var.environment }
            }
        "#
    };

    let report = scan(&documents, &options("Env[dev]", Casing::Sensitive), None);
    assert!(report.violations.is_empty());
}

#[test]
fn case_insensitive_matching_ignores_spec_casing() {
    let documents = terraform_documents! {r#"
        provider "AWS" {
          alias = "West"
          default_tags {
            tags = { OWNER = "Team" }
          }
        }

        resource "aws_s3_bucket" "this" {
          provider = aws.west
          tags     = { environment = "PROD" }
        }
    "#};

    let upper = scan(&documents, &options("Owner,Environment[prod]", Casing::Insensitive), None);
    let lower = scan(&documents, &options("owner,environment[Prod]", Casing::Insensitive), None);

    assert!(upper.violations.is_empty());
    assert!(lower.violations.is_empty());

    let sensitive = scan(&documents, &options("Owner,Environment[prod]", Casing::Sensitive), None);
    assert_eq!(
        missing(&sensitive),
        vec![(
            "this",
            vec!["Environment[prod]".to_string(), "Owner".to_string()]
        )]
    );
}

#[test]
fn repeated_scans_are_identical() {
    let documents = terraform_documents! {r#"
        variable "team" { default = "platform" }
        locals {
          common = merge(local.base, { Team = var.team })
          base   = { Owner = upper(var.team) }
        }
        resource "aws_s3_bucket" "this" {
          tags = local.common
        }
        resource "aws_sqs_queue" "queue" {}
    "#};

    let options = options("Owner,Team,Environment", Casing::Sensitive);
    assert_eq!(
        scan(&documents, &options, None),
        scan(&documents, &options, None)
    );
}

#[test]
fn report_shape() {
    let documents = terraform_documents! {
        "main.tf" => "resource \"aws_s3_bucket\" \"logs\" {\n  tags = { Owner = \"jake\" }\n}\n\n#tag-nag ignore\nresource \"aws_sqs_queue\" \"jobs\" {}\n"
    };

    let report = scan(
        &documents,
        &options("Owner,Environment[Dev,Prod]", Casing::Sensitive),
        None,
    );

    insta::assert_json_snapshot!(report, @r###"
    {
      "violations": [
        {
          "resource_type": "aws_s3_bucket",
          "resource_name": "logs",
          "file_path": "main.tf",
          "line": 1,
          "missing_tags": [
            "Environment[Dev,Prod]"
          ],
          "suppressed": false
        },
        {
          "resource_type": "aws_sqs_queue",
          "resource_name": "jobs",
          "file_path": "main.tf",
          "line": 6,
          "missing_tags": [
            "Environment[Dev,Prod]",
            "Owner"
          ],
          "suppressed": true
        }
      ],
      "summary": {
        "total": 2,
        "skipped": 1,
        "files_affected": 1
      }
    }
    "###);
}

#[test]
fn type_conversions_in_locals() {
    let documents = terraform_documents! {r#"
        locals {
          tags  = tomap({ Owner = "x" })
          teams = toset(["a", "b", "a"])
        }
        resource "aws_s3_bucket" "this" {
          tags = merge(local.tags, { Teams = length(tolist(local.teams)) })
        }
    "#};

    let report = scan(&documents, &options("Owner,Teams[2]", Casing::Sensitive), None);
    assert!(report.violations.is_empty(), "{:?}", report.violations);
}

#[test]
fn huge_substr_length_does_not_abort_the_scan() {
    let documents = terraform_documents! {r#"
        resource "aws_s3_bucket" "this" {
          tags = { Owner = substr("abc", 1, 1e19) }
        }
        resource "aws_sqs_queue" "queue" {}
    "#};

    let report = scan(&documents, &options("Owner[bc]", Casing::Sensitive), None);
    assert_eq!(
        missing(&report),
        vec![("queue", vec!["Owner[bc]".to_string()])]
    );
}

#[test]
fn resource_marker_does_not_reach_back_over_one_line_resources() {
    let documents = terraform_documents! {r#"
        resource "aws_s3_bucket" "a" {}
        #tag-nag ignore
        resource "aws_s3_bucket" "b" {}
    "#};

    let report = scan(&documents, &options("Owner", Casing::Sensitive), None);
    let suppressed: Vec<_> = report
        .violations
        .iter()
        .map(|v| (v.resource_name.as_str(), v.suppressed))
        .collect();
    assert_eq!(suppressed, vec![("a", false), ("b", true)]);
}
