mod config;
mod context;

use anyhow::{Context as _, anyhow};
use clap::{Parser, Subcommand};
use promptdex_core::params;
use promptdex_core::record::Record;
use promptdex_core::renderer::Renderer;
use promptdex_core::{Index, IndexRegistry};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    version,
    display_name = "promptdex",
    bin_name = "promptdex",
    about = "A searchable, renderable prompt library in a directory of text files"
)]
struct Args {
    /// Root directory of the prompt library (overrides the config file).
    #[arg(short = 'p', long)]
    prompts_path: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// List every indexed prompt, most recently modified first
    List,
    /// Fuzzy-search the library
    Search {
        query: String,
        #[arg(short = 'l', long, default_value_t = 50)]
        limit: usize,
    },
    /// Show one prompt's metadata, issues, and body
    Show { id: String },
    /// Render a prompt with parameters and ambient context
    Render {
        id: String,
        /// Parameter value as name=value, repeatable
        #[arg(long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,
        /// Extra context value as key=value, repeatable
        #[arg(long = "context", value_parser = parse_key_value)]
        context: Vec<(String, String)>,
        /// Copy the rendered output to the clipboard
        #[arg(short = 'c', long)]
        copy: bool,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected name=value, got '{raw}'")),
    }
}

fn find_record(index: &Arc<Index>, id: &str) -> anyhow::Result<Record> {
    index
        .get_all()
        .into_iter()
        .find(|record| record.id == id)
        .ok_or_else(|| anyhow!("no prompt with id '{id}'"))
}

fn print_listing(records: &[Record]) {
    for record in records {
        let marker = if record.is_renderable() { " " } else { "!" };
        println!(
            "{marker} {:<40} {:<30} [{}]",
            record.id,
            record.title(),
            record.tags.join(", ")
        );
    }
}

fn cmd_show(record: &Record) {
    println!("id:       {}", record.id);
    println!("title:    {}", record.title());
    if let Some(fm) = &record.front_matter {
        if let Some(description) = &fm.description {
            println!("about:    {description}");
        }
    }
    println!("tags:     [{}]", record.tags.join(", "));
    println!("modified: {}", record.modified_at.to_rfc3339());
    if !record.validation_issues.is_empty() {
        println!("issues:");
        for issue in &record.validation_issues {
            println!("  - {issue}");
        }
    }
    println!("---");
    println!("{}", record.content);
}

fn cmd_render(
    record: &Record,
    raw_params: &[(String, String)],
    extra_context: &[(String, String)],
    copy: bool,
) -> anyhow::Result<()> {
    let Some(front_matter) = &record.front_matter else {
        eprintln!("Error: '{}' has metadata problems and cannot be rendered:", record.id);
        for issue in &record.validation_issues {
            eprintln!("  - {issue}");
        }
        std::process::exit(exitcode::DATAERR);
    };

    // Declared defaults prefill; explicit --param values override them.
    let mut raw: HashMap<String, Value> = HashMap::new();
    for spec in &front_matter.parameters {
        if let Some(default) = &spec.default {
            let value = serde_json::to_value(default)
                .with_context(|| format!("unusable default for parameter '{}'", spec.name))?;
            raw.insert(spec.name.clone(), value);
        }
    }
    for (name, value) in raw_params {
        raw.insert(name.clone(), Value::String(value.clone()));
    }

    let normalized = params::normalize_parameters(&front_matter.parameters, &raw);
    if !normalized.is_ok() {
        for name in &normalized.missing {
            eprintln!("Error: required parameter '{name}' is missing");
        }
        for invalid in &normalized.invalid {
            eprintln!("Error: {} is invalid: {}", invalid.label, invalid.message);
        }
        std::process::exit(exitcode::USAGE);
    }

    let scope_context = context::gather_context(extra_context);
    let rendered = Renderer::new().render(record, &normalized.values, &scope_context)?;

    println!("{}", rendered.output);

    if copy {
        let mut clipboard =
            arboard::Clipboard::new().context("clipboard unavailable, output not copied")?;
        clipboard
            .set_text(rendered.output)
            .context("failed to copy rendered output")?;
        eprintln!("(copied to clipboard)");
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = config::load_config();
    let root = config::resolve_root(args.prompts_path.clone(), &config);

    let registry = IndexRegistry::new();
    let index = registry
        .get_or_init(&root)
        .with_context(|| format!("failed to index {}", root.display()))?;

    match &args.cmd {
        Commands::List => print_listing(&index.get_all()),
        Commands::Search { query, limit } => {
            for result in index.search(query, Some(*limit)) {
                println!(
                    "{:>6.3}  {:<40} {}",
                    result.score,
                    result.record.id,
                    result.record.title()
                );
            }
        }
        Commands::Show { id } => cmd_show(&find_record(&index, id)?),
        Commands::Render {
            id,
            params,
            context,
            copy,
        } => {
            let record = find_record(&index, id)?;
            cmd_render(&record, params, context, *copy || config.copy_on_render)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("topic=rust"),
            Ok(("topic".to_string(), "rust".to_string()))
        );
        assert_eq!(
            parse_key_value("eq=a=b"),
            Ok(("eq".to_string(), "a=b".to_string()))
        );
        assert_eq!(
            parse_key_value(" spaced = value"),
            Ok(("spaced".to_string(), " value".to_string()))
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=empty-key").is_err());
    }

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
