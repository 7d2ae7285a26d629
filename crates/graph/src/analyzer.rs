use crate::dependency::FormulaDependency;
use crate::diagram::DiagramGraph;
use formula::{Formula, FormulaRole};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 公式簇 - 按角色分组, 面向展示
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormulaCluster {
    /// "cluster_definition" 等
    pub id: String,
    pub formulas: Vec<String>,
    /// 双语描述标签
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<FormulaRole>,
}

/// 图结构分析
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphAnalysis {
    pub total_formulas: usize,
    pub total_dependencies: usize,
    /// 入度 0 - 候选基础公式, 按文档顺序
    pub root_formulas: Vec<String>,
    /// 出度 0 - 候选结论公式, 按文档顺序
    pub leaf_formulas: Vec<String>,
    pub clusters: Vec<FormulaCluster>,
}

/// 依赖分析结果 - 对外暴露的数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyAnalysisResult {
    pub analysis: GraphAnalysis,
    pub graph: DiagramGraph,
}

/// 图分析器
pub struct GraphAnalyzer {
    /// 每个簇的成员数上限 (展示限制)
    max_cluster_size: usize,
}

impl GraphAnalyzer {
    pub fn new() -> Self {
        Self {
            max_cluster_size: 10,
        }
    }

    pub fn with_max_cluster_size(mut self, size: usize) -> Self {
        self.max_cluster_size = size;
        self
    }

    /// 计算根/叶与角色簇
    pub fn analyze(&self, formulas: &[Formula], edges: &[FormulaDependency]) -> GraphAnalysis {
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut out_degree: HashMap<&str, usize> = HashMap::new();
        for edge in edges {
            *out_degree.entry(edge.from.as_str()).or_insert(0) += 1;
            *in_degree.entry(edge.to.as_str()).or_insert(0) += 1;
        }

        // 文档顺序保持: 直接按 formulas 顺序过滤
        let root_formulas: Vec<String> = formulas
            .iter()
            .filter(|f| !in_degree.contains_key(f.id.as_str()))
            .map(|f| f.id.clone())
            .collect();
        let leaf_formulas: Vec<String> = formulas
            .iter()
            .filter(|f| !out_degree.contains_key(f.id.as_str()))
            .map(|f| f.id.clone())
            .collect();

        GraphAnalysis {
            total_formulas: formulas.len(),
            total_dependencies: edges.len(),
            root_formulas,
            leaf_formulas,
            clusters: self.clusters(formulas),
        }
    }

    /// 按角色分簇: 每个非空角色桶一个簇, 成员数受展示上限约束
    pub fn clusters(&self, formulas: &[Formula]) -> Vec<FormulaCluster> {
        let mut clusters = Vec::new();
        for role in FormulaRole::all() {
            let members: Vec<String> = formulas
                .iter()
                .filter(|f| f.role == *role)
                .take(self.max_cluster_size)
                .map(|f| f.id.clone())
                .collect();
            if members.is_empty() {
                continue;
            }
            clusters.push(FormulaCluster {
                id: format!("cluster_{}", role),
                formulas: members,
                description: role.label().to_string(),
                role: Some(*role),
            });
        }
        clusters
    }
}

impl Default for GraphAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
