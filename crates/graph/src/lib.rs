//! graph - 公式依赖图
//!
//! 从共享变量推断公式间依赖, 分析图结构, 投影为抽象图描述

mod analyzer;
mod dependency;
mod diagram;
mod mermaid;
mod ollama;

pub use analyzer::{DependencyAnalysisResult, FormulaCluster, GraphAnalysis, GraphAnalyzer};
pub use dependency::{
    DependencyBuilder, DependencyKind, FormulaDependency, RelationError, RelationInference,
    RelationProposal,
};
pub use diagram::{
    DiagramBuilder, DiagramEdge, DiagramGraph, DiagramNode, DiagramSubgraph, Direction,
};
pub use mermaid::MermaidWriter;
pub use ollama::OllamaRelations;
