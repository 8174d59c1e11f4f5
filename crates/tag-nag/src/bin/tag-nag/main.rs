mod cli;

use std::io::Write;
use std::process::ExitCode;
use tag_nag::config::Config;
use tag_nag::scan::{ScanOptions, ScanReport};
use tag_nag::tags::{Casing, TagSpec};

fn main() -> ExitCode {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("TAG_NAG_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                return ExitCode::FAILURE;
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    return ExitCode::FAILURE;
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            for error in e.chain() {
                eprintln!("{error}")
            }
            ExitCode::FAILURE
        }
    }
}

/// Options resolved from command line flags and the config file
struct Settings {
    options: ScanOptions,
    dry_run: bool,
}

fn settings(cli: &cli::Cli) -> anyhow::Result<Settings> {
    if let Some(tags) = &cli.tags {
        let required: TagSpec = tags.parse()?;

        return Ok(Settings {
            options: ScanOptions {
                required,
                casing: Casing::from_insensitive_flag(cli.case_insensitive),
                skip: cli.skip.clone(),
                ..Default::default()
            },
            dry_run: cli.dry_run,
        });
    }

    let Some((path, config)) = Config::find(&std::env::current_dir()?)? else {
        anyhow::bail!("Please specify required tags using --tags or create .tag-nag.yml");
    };
    tracing::info!(path=%path.display(), "using config file");

    // flags extend the config file
    let mut skip = config.skip.clone();
    skip.extend(cli.skip.iter().cloned());

    Ok(Settings {
        options: ScanOptions {
            required: config.tag_spec(),
            casing: Casing::from_insensitive_flag(
                cli.case_insensitive || config.settings.case_insensitive,
            ),
            skip,
            ..Default::default()
        },
        dry_run: cli.dry_run || config.settings.dry_run,
    })
}

fn run(cli: cli::Cli) -> anyhow::Result<ExitCode> {
    let settings = settings(&cli)?;
    anyhow::ensure!(
        !settings.options.required.is_empty(),
        "No required tags specified"
    );

    let registry = if cli.no_schema {
        None
    } else {
        tag_nag::scan::load_registry(&cli.path, &settings.options.target)
    };

    let report = tag_nag::scan::scan_directory(&cli.path, &settings.options, registry.as_ref())?;

    output(&cli.format, &report)?;

    let failing = report.failing().count();
    if failing == 0 {
        eprintln!("No tag violations found");
        return Ok(ExitCode::SUCCESS);
    }

    eprintln!("Found {failing} tag violation(s)");
    if settings.dry_run {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn output(format: &cli::OutputFormat, report: &ScanReport) -> anyhow::Result<()> {
    match format {
        cli::OutputFormat::Text => render_text(std::io::stdout().lock(), report)?,
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), report)?,
        cli::OutputFormat::Json => {
            serde_json::to_writer_pretty(std::io::stdout(), report)?;
            println!();
        }
    };

    Ok(())
}

/// Violations grouped by file, in scan order
fn render_text(mut out: impl Write, report: &ScanReport) -> std::io::Result<()> {
    let mut by_file: indexmap::IndexMap<_, Vec<_>> = indexmap::IndexMap::new();
    for violation in &report.violations {
        by_file
            .entry(violation.file_path.as_path())
            .or_default()
            .push(violation);
    }

    for (path, violations) in by_file {
        writeln!(out, "\nViolation(s) in {}", path.display())?;

        for v in violations {
            if v.suppressed {
                writeln!(out, "  {}: {} \"{}\" skipped", v.line, v.resource_type, v.resource_name)?;
            } else {
                writeln!(
                    out,
                    "  {}: {} \"{}\" Missing tags: {}",
                    v.line,
                    v.resource_type,
                    v.resource_name,
                    v.missing_tags.join(", ")
                )?;
            }
        }
    }

    Ok(())
}
