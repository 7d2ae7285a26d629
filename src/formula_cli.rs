//! formula subcommand - formula extraction and variable analysis

use clap::Subcommand;
use formula::{
    ExtractError, ExtractOptions, ExtractResult, Formula, FormulaExtractor, RoleClassifier,
    VariableTracker,
};
use paper::{FileSource, Section, SectionSegmenter, TextSource};

#[derive(Subcommand)]
pub enum FormulaCommands {
    /// Extract formulas from a paper text file
    Extract {
        /// Paper text file
        file: String,
        /// Exclude inline formulas
        #[arg(long)]
        no_inline: bool,
        /// Keep only numbered equations
        #[arg(long)]
        numbered_only: bool,
        /// Filter by section name (case-insensitive substring)
        #[arg(short, long)]
        section: Option<String>,
        /// JSON output
        #[arg(long)]
        json: bool,
    },
    /// Aggregate variable usage across formulas
    Vars {
        /// Paper text file
        file: String,
        /// Restrict to these symbols (comma-separated)
        #[arg(short, long)]
        symbols: Option<String>,
        /// JSON output
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(cmd: FormulaCommands) -> anyhow::Result<()> {
    match cmd {
        FormulaCommands::Extract { file, no_inline, numbered_only, section, json } => {
            cmd_extract(&file, no_inline, numbered_only, section.as_deref(), json).await
        }
        FormulaCommands::Vars { file, symbols, json } => {
            cmd_vars(&file, symbols.as_deref(), json).await
        }
    }
}

/// 读取并切分文档; 输入错误返回类型化错误而不是 panic
pub(crate) async fn load_sections(file: &str) -> Result<Vec<Section>, ExtractError> {
    let mut source = FileSource::new(file);
    let doc = source.fetch().await?;
    let sections = SectionSegmenter::new().segment(&doc);
    if sections.is_empty() {
        return Err(ExtractError::EmptyDocument);
    }
    Ok(sections)
}

pub(crate) fn extract_classified(sections: &[Section], options: &ExtractOptions) -> Vec<Formula> {
    let mut formulas = FormulaExtractor::new().extract(sections, options);
    RoleClassifier::new().classify_all(&mut formulas);
    formulas
}

async fn cmd_extract(
    file: &str,
    no_inline: bool,
    numbered_only: bool,
    section: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let mut options = ExtractOptions::from_env()
        .with_include_inline(!no_inline)
        .with_numbered_only(numbered_only);
    if let Some(section) = section {
        options = options.with_filter_section(section);
    }

    let result = match load_sections(file).await {
        Ok(sections) => ExtractResult::ok(extract_classified(&sections, &options)),
        Err(e) => ExtractResult::failure(e.to_string()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if let Some(error) = &result.error {
        println!("Extraction failed: {}", error);
        return Ok(());
    }

    println!("Found {} formulas:\n", result.stats.total_formulas);
    for formula in &result.formulas {
        println!(
            "  {} [{}] ({:.2})",
            formula.id,
            formula.role.label(),
            formula.confidence
        );
        println!("    {}", formula.latex);
        println!("    section: {}", formula.section);
        println!();
    }

    println!(
        "numbered: {}, inline: {}",
        result.stats.numbered_equations, result.stats.inline_formulas
    );
    for (role, count) in &result.stats.by_role {
        println!("  {}: {}", role, count);
    }

    Ok(())
}

async fn cmd_vars(file: &str, symbols: Option<&str>, json: bool) -> anyhow::Result<()> {
    let mut options = ExtractOptions::from_env();
    if let Some(symbols) = symbols {
        let list: Vec<String> = symbols
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        options = options.with_filter_symbols(list);
    }

    let sections = match load_sections(file).await {
        Ok(sections) => sections,
        Err(e) => {
            println!("Extraction failed: {}", e);
            return Ok(());
        }
    };

    let formulas = extract_classified(&sections, &options);
    let result = VariableTracker::new().track(&formulas, &options);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("Tracked {} symbols:\n", result.stats.total_symbols);
    for usage in &result.variables {
        let defined = if usage.defined_in.is_empty() {
            "undefined".to_string()
        } else {
            usage.defined_in.join(", ")
        };
        println!("  {} (first seen: {})", usage.symbol, usage.first_appearance);
        println!("    defined in: {}", defined);
        println!("    used in: {}", usage.used_in.join(", "));
        println!();
    }

    if !result.stats.undefined_symbols.is_empty() {
        println!("Undefined symbols: {}", result.stats.undefined_symbols.join(", "));
    }

    Ok(())
}
