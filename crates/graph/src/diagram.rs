use crate::analyzer::FormulaCluster;
use crate::dependency::FormulaDependency;
use formula::Formula;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 布局方向提示 - 由下游绘制步骤消费
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    TopDown,
    LeftRight,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::TopDown => "TD",
            Direction::LeftRight => "LR",
        }
    }
}

/// 图节点 - 一个公式
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagramNode {
    pub id: String,
    /// 编号或 ID + 截断的公式预览
    pub label: String,
    /// 视觉分桶键 = 角色名
    pub kind: String,
}

/// 图边 - 一条依赖
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagramEdge {
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// 子图 - 一个角色簇
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagramSubgraph {
    pub id: String,
    pub label: String,
    pub nodes: Vec<String>,
}

/// 抽象图描述 - 与具体绘图语法无关
///
/// 每次请求重新组装, 构造后不再修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagramGraph {
    pub direction: Direction,
    pub nodes: Vec<DiagramNode>,
    pub edges: Vec<DiagramEdge>,
    pub subgraphs: Vec<DiagramSubgraph>,
}

/// 图投影器
///
/// 不做任何布局计算; 引用缺失 ID 的边和子图成员静默跳过
/// (对已过滤的输入保持健壮)
pub struct DiagramBuilder {
    direction: Direction,
    /// 节点标签中公式预览的截断长度
    max_label_len: usize,
    /// 边标签上共享变量数上限
    max_edge_symbols: usize,
}

impl DiagramBuilder {
    pub fn new() -> Self {
        Self {
            direction: Direction::TopDown,
            max_label_len: 30,
            max_edge_symbols: 3,
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_max_label_len(mut self, len: usize) -> Self {
        self.max_label_len = len;
        self
    }

    pub fn with_max_edge_symbols(mut self, count: usize) -> Self {
        self.max_edge_symbols = count;
        self
    }

    /// 投影公式/依赖/簇为抽象图
    pub fn build(
        &self,
        formulas: &[Formula],
        edges: &[FormulaDependency],
        clusters: &[FormulaCluster],
    ) -> DiagramGraph {
        let nodes: Vec<DiagramNode> = formulas
            .iter()
            .map(|f| DiagramNode {
                id: f.id.clone(),
                label: self.node_label(f),
                kind: f.role.as_str().to_string(),
            })
            .collect();

        let known: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();

        let diagram_edges: Vec<DiagramEdge> = edges
            .iter()
            .filter(|e| known.contains(e.from.as_str()) && known.contains(e.to.as_str()))
            .map(|e| DiagramEdge {
                from: e.from.clone(),
                to: e.to.clone(),
                label: self.edge_label(e),
            })
            .collect();

        let subgraphs: Vec<DiagramSubgraph> = clusters
            .iter()
            .map(|c| DiagramSubgraph {
                id: c.id.clone(),
                label: c.description.clone(),
                nodes: c
                    .formulas
                    .iter()
                    .filter(|id| known.contains(id.as_str()))
                    .cloned()
                    .collect(),
            })
            .filter(|s| !s.nodes.is_empty())
            .collect();

        DiagramGraph {
            direction: self.direction,
            nodes,
            edges: diagram_edges,
            subgraphs,
        }
    }

    /// 节点标签: "(3) L = y^2" / "inline_1 x_i"
    fn node_label(&self, formula: &Formula) -> String {
        let head = match &formula.number {
            Some(n) => format!("({})", n),
            None => formula.id.clone(),
        };
        let preview: String = formula.latex.chars().take(self.max_label_len).collect();
        if preview.is_empty() {
            head
        } else {
            format!("{} {}", head, preview)
        }
    }

    /// 边标签: 至多 max_edge_symbols 个共享变量
    fn edge_label(&self, edge: &FormulaDependency) -> Option<String> {
        if edge.shared_variables.is_empty() {
            return edge.description.clone();
        }
        let mut label = edge
            .shared_variables
            .iter()
            .take(self.max_edge_symbols)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if edge.shared_variables.len() > self.max_edge_symbols {
            label.push_str(", ...");
        }
        Some(label)
    }
}

impl Default for DiagramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::DependencyKind;
    use formula::{FormulaRole, FormulaType};

    fn make_formula(id: &str, latex: &str, number: Option<&str>) -> Formula {
        Formula {
            id: id.to_string(),
            latex: latex.to_string(),
            formula_type: FormulaType::Equation,
            role: FormulaRole::Definition,
            number: number.map(|n| n.to_string()),
            context: String::new(),
            section: "Method".to_string(),
            page_number: None,
            variables: vec![],
            confidence: 0.5,
        }
    }

    fn make_edge(from: &str, to: &str, symbols: &[&str]) -> FormulaDependency {
        FormulaDependency {
            from: from.to_string(),
            to: to.to_string(),
            kind: DependencyKind::UsesVariable,
            shared_variables: symbols.iter().map(|s| s.to_string()).collect(),
            description: None,
        }
    }

    #[test]
    fn test_one_node_per_formula() {
        let formulas = vec![
            make_formula("eq1", "x = 1", Some("1")),
            make_formula("eq2", "y = 2", None),
        ];
        let graph = DiagramBuilder::new().build(&formulas, &[], &[]);
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.nodes[0].label, "(1) x = 1");
        assert_eq!(graph.nodes[1].label, "eq2 y = 2");
    }

    #[test]
    fn test_node_label_truncated() {
        let long = "x = ".to_string() + &"y + ".repeat(30);
        let formulas = vec![make_formula("eq1", &long, None)];
        let graph = DiagramBuilder::new().with_max_label_len(10).build(&formulas, &[], &[]);
        assert!(graph.nodes[0].label.len() < long.len());
    }

    #[test]
    fn test_edge_with_missing_node_skipped() {
        let formulas = vec![make_formula("eq1", "x", None)];
        let edges = vec![make_edge("eq1", "eq_filtered_out", &["x"])];
        let graph = DiagramBuilder::new().build(&formulas, &edges, &[]);
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn test_edge_label_caps_shared_variables() {
        let formulas = vec![
            make_formula("eq1", "a", None),
            make_formula("eq2", "b", None),
        ];
        let edges = vec![make_edge("eq1", "eq2", &["a", "b", "c", "d", "e"])];
        let graph = DiagramBuilder::new().build(&formulas, &edges, &[]);
        assert_eq!(graph.edges[0].label.as_deref(), Some("a, b, c, ..."));
    }

    #[test]
    fn test_subgraph_members_filtered_to_known() {
        let formulas = vec![make_formula("eq1", "x", None)];
        let clusters = vec![FormulaCluster {
            id: "cluster_definition".to_string(),
            formulas: vec!["eq1".to_string(), "eq_gone".to_string()],
            description: "定义 (Definition)".to_string(),
            role: Some(FormulaRole::Definition),
        }];
        let graph = DiagramBuilder::new().build(&formulas, &[], &clusters);
        assert_eq!(graph.subgraphs.len(), 1);
        assert_eq!(graph.subgraphs[0].nodes, vec!["eq1"]);
    }

    #[test]
    fn test_empty_subgraph_dropped() {
        let formulas = vec![make_formula("eq1", "x", None)];
        let clusters = vec![FormulaCluster {
            id: "cluster_theorem".to_string(),
            formulas: vec!["eq_gone".to_string()],
            description: "定理 (Theorem)".to_string(),
            role: Some(FormulaRole::Theorem),
        }];
        let graph = DiagramBuilder::new().build(&formulas, &[], &clusters);
        assert!(graph.subgraphs.is_empty());
    }

    #[test]
    fn test_direction_hint_carried() {
        let graph = DiagramBuilder::new()
            .with_direction(Direction::LeftRight)
            .build(&[], &[], &[]);
        assert_eq!(graph.direction, Direction::LeftRight);
        assert_eq!(graph.direction.as_str(), "LR");
    }
}
