//! graph subcommand - dependency analysis and diagrams

use crate::formula_cli::{extract_classified, load_sections};
use clap::Subcommand;
use formula::ExtractOptions;
use graph::{
    DependencyAnalysisResult, DependencyBuilder, DiagramBuilder, Direction, GraphAnalyzer,
    MermaidWriter, OllamaRelations,
};

#[derive(Subcommand)]
pub enum GraphCommands {
    /// Build and analyze the formula dependency graph
    Deps {
        /// Paper text file
        file: String,
        /// Enable secondary relation inference via Ollama
        #[arg(long)]
        infer: bool,
        /// Ask the model for a prose description of the logical flow
        #[arg(long)]
        describe: bool,
        /// Ollama model for relation inference
        #[arg(short, long, default_value = "qwen2.5")]
        model: String,
        /// Skip inference above this formula count
        #[arg(long, default_value = "20")]
        max_inference_size: usize,
        /// JSON output
        #[arg(long)]
        json: bool,
    },
    /// Render the dependency graph as a Mermaid diagram
    Diagram {
        /// Paper text file
        file: String,
        /// Layout direction (td, lr)
        #[arg(short, long, default_value = "td")]
        direction: String,
        /// Max nodes
        #[arg(long, default_value = "100")]
        max_nodes: usize,
        /// Output file
        #[arg(short, long)]
        output: Option<String>,
    },
}

pub async fn run(cmd: GraphCommands) -> anyhow::Result<()> {
    match cmd {
        GraphCommands::Deps { file, infer, describe, model, max_inference_size, json } => {
            cmd_deps(&file, infer, describe, &model, max_inference_size, json).await
        }
        GraphCommands::Diagram { file, direction, max_nodes, output } => {
            cmd_diagram(&file, &direction, max_nodes, output.as_deref()).await
        }
    }
}

async fn cmd_deps(
    file: &str,
    infer: bool,
    describe: bool,
    model: &str,
    max_inference_size: usize,
    json: bool,
) -> anyhow::Result<()> {
    let sections = match load_sections(file).await {
        Ok(sections) => sections,
        Err(e) => {
            println!("Extraction failed: {}", e);
            return Ok(());
        }
    };
    let options = ExtractOptions::from_env().with_max_inference_size(max_inference_size);
    let formulas = extract_classified(&sections, &options);

    let mut collaborator = OllamaRelations::new(model);
    let builder = DependencyBuilder::new().with_max_inference_size(options.max_inference_size);
    let edges = if infer {
        // 协作者失败在 builder 内降级, 这里总能拿到可用图
        builder.build_with_inference(&formulas, &mut collaborator).await
    } else {
        builder.build(&formulas)
    };

    let analyzer = GraphAnalyzer::new();
    let analysis = analyzer.analyze(&formulas, &edges);
    let clusters = analyzer.clusters(&formulas);
    let diagram = DiagramBuilder::new().build(&formulas, &edges, &clusters);
    let result = DependencyAnalysisResult {
        analysis,
        graph: diagram,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!(
        "{} formulas, {} dependencies\n",
        result.analysis.total_formulas, result.analysis.total_dependencies
    );
    println!("Roots: {}", result.analysis.root_formulas.join(", "));
    println!("Leaves: {}", result.analysis.leaf_formulas.join(", "));
    println!();
    for cluster in &result.analysis.clusters {
        println!("  {}: {}", cluster.description, cluster.formulas.join(", "));
    }
    println!();
    for edge in &result.graph.edges {
        match &edge.label {
            Some(label) => println!("  {} -> {} [{}]", edge.from, edge.to, label),
            None => println!("  {} -> {}", edge.from, edge.to),
        }
    }

    if describe {
        // 描述服务同样是纯增强, 失败只打警告
        match collaborator.describe_flow(&formulas).await {
            Ok(prose) => println!("\n{}", prose),
            Err(e) => println!("\nFlow description unavailable: {}", e),
        }
    }

    Ok(())
}

async fn cmd_diagram(
    file: &str,
    direction: &str,
    max_nodes: usize,
    output: Option<&str>,
) -> anyhow::Result<()> {
    let sections = match load_sections(file).await {
        Ok(sections) => sections,
        Err(e) => {
            println!("Extraction failed: {}", e);
            return Ok(());
        }
    };
    let formulas = extract_classified(&sections, &ExtractOptions::from_env());
    let edges = DependencyBuilder::new().build(&formulas);
    let clusters = GraphAnalyzer::new().clusters(&formulas);

    let direction = match direction {
        "lr" | "LR" => Direction::LeftRight,
        _ => Direction::TopDown,
    };
    let diagram = DiagramBuilder::new()
        .with_direction(direction)
        .build(&formulas, &edges, &clusters);
    let mermaid = MermaidWriter::new().with_max_nodes(max_nodes).write(&diagram);

    match output {
        Some(file) => {
            std::fs::write(file, format!("```mermaid\n{}\n```\n", mermaid))?;
            println!("Saved to: {}", file);
        }
        None => {
            println!("{}", mermaid);
        }
    }

    Ok(())
}
