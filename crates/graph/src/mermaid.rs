use crate::diagram::DiagramGraph;
use std::collections::HashSet;

/// Mermaid 图生成器
///
/// 把抽象图投影为 flowchart 文本; 布局交给 Mermaid 本身
pub struct MermaidWriter {
    max_nodes: usize,
}

impl MermaidWriter {
    pub fn new() -> Self {
        Self { max_nodes: 100 }
    }

    pub fn with_max_nodes(mut self, max: usize) -> Self {
        self.max_nodes = max;
        self
    }

    /// 生成 Mermaid flowchart 代码
    pub fn write(&self, graph: &DiagramGraph) -> String {
        let mut lines = vec![format!("flowchart {}", graph.direction.as_str())];

        let included: HashSet<&str> = graph
            .nodes
            .iter()
            .take(self.max_nodes)
            .map(|n| n.id.as_str())
            .collect();

        // 子图内声明成员节点
        let mut in_subgraph: HashSet<&str> = HashSet::new();
        for subgraph in &graph.subgraphs {
            let members: Vec<&str> = subgraph
                .nodes
                .iter()
                .map(|id| id.as_str())
                .filter(|id| included.contains(id))
                .collect();
            if members.is_empty() {
                continue;
            }
            lines.push(format!(
                "    subgraph {}[\"{}\"]",
                Self::node_id(&subgraph.id),
                Self::escape(&subgraph.label)
            ));
            for id in members {
                let node = graph.nodes.iter().find(|n| n.id == id);
                if let Some(node) = node {
                    lines.push(format!(
                        "        {}[\"{}\"]",
                        Self::node_id(&node.id),
                        Self::escape(&node.label)
                    ));
                    in_subgraph.insert(id);
                }
            }
            lines.push("    end".to_string());
        }

        // 不属于任何子图的节点
        for node in graph.nodes.iter().take(self.max_nodes) {
            if in_subgraph.contains(node.id.as_str()) {
                continue;
            }
            lines.push(format!(
                "    {}[\"{}\"]",
                Self::node_id(&node.id),
                Self::escape(&node.label)
            ));
        }

        // 边
        for edge in &graph.edges {
            if !included.contains(edge.from.as_str()) || !included.contains(edge.to.as_str()) {
                continue;
            }
            match &edge.label {
                Some(label) => lines.push(format!(
                    "    {} -->|{}| {}",
                    Self::node_id(&edge.from),
                    Self::escape(label),
                    Self::node_id(&edge.to)
                )),
                None => lines.push(format!(
                    "    {} --> {}",
                    Self::node_id(&edge.from),
                    Self::node_id(&edge.to)
                )),
            }
        }

        lines.join("\n")
    }

    #[doc(hidden)]
    pub fn node_id(name: &str) -> String {
        name.replace("::", "_")
            .replace("/", "_")
            .replace(".", "_")
            .replace("-", "_")
            .replace(" ", "_")
    }

    fn escape(text: &str) -> String {
        text.replace('"', "#quot;").replace('|', "/")
    }
}

impl Default for MermaidWriter {
    fn default() -> Self {
        Self::new()
    }
}
