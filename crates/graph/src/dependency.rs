use async_trait::async_trait;
use formula::Formula;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {0}")]
    Api(String),
}

pub type Result<T> = std::result::Result<T, RelationError>;

/// 依赖类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// 共享变量 (一次推断)
    UsesVariable,
    /// 由前式推导 (二次推断)
    DerivesFrom,
    /// 代入 (二次推断)
    Substitutes,
    /// 组合 (二次推断)
    Combines,
}

/// 公式依赖边
///
/// 不变式: 每个有序 (from, to) 对至多一条边,
/// 多个共享变量累积进同一条边的 shared_variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormulaDependency {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: DependencyKind,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub shared_variables: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// 外部协作者提出的候选边
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationProposal {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: DependencyKind,
    #[serde(default)]
    pub description: Option<String>,
}

/// 关系推断协作者 trait
///
/// 可失败、可超时; 失败时贡献为零, 不向上传播
#[async_trait]
pub trait RelationInference: Send + Sync {
    /// 对一组公式提出类型化依赖边
    async fn infer(&mut self, formulas: &[Formula]) -> Result<Vec<RelationProposal>>;
}

/// 依赖图构建器
///
/// 一次推断 (共享变量规则) 总是执行; 二次推断 (外部协作者)
/// 仅在公式数不超过上限时尝试, 失败静默降级
pub struct DependencyBuilder {
    /// 二次推断的公式数上限
    max_inference_size: usize,
}

impl DependencyBuilder {
    pub fn new() -> Self {
        Self {
            max_inference_size: 20,
        }
    }

    pub fn with_max_inference_size(mut self, size: usize) -> Self {
        self.max_inference_size = size;
        self
    }

    /// 共享变量推断
    ///
    /// 某符号出现在 >= 2 个公式时, 为每个无序对建一条边,
    /// 方向为文档顺序靠前 → 靠后。重复对只累积共享符号。
    pub fn build(&self, formulas: &[Formula]) -> Vec<FormulaDependency> {
        // 符号 → 提及该符号的公式下标 (按首次出现排序)
        let mut symbol_order: Vec<String> = Vec::new();
        let mut mentions: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, formula) in formulas.iter().enumerate() {
            for variable in &formula.variables {
                let entry = mentions.entry(variable.symbol.clone()).or_insert_with(|| {
                    symbol_order.push(variable.symbol.clone());
                    Vec::new()
                });
                if entry.last() != Some(&i) {
                    entry.push(i);
                }
            }
        }

        let mut edges: Vec<FormulaDependency> = Vec::new();
        let mut by_pair: HashMap<(String, String), usize> = HashMap::new();

        for symbol in &symbol_order {
            let indices = &mentions[symbol];
            if indices.len() < 2 {
                continue;
            }
            for a in 0..indices.len() {
                for b in (a + 1)..indices.len() {
                    let from = formulas[indices[a]].id.clone();
                    let to = formulas[indices[b]].id.clone();
                    let key = (from.clone(), to.clone());
                    match by_pair.get(&key) {
                        Some(&slot) => {
                            let edge = &mut edges[slot];
                            if !edge.shared_variables.contains(symbol) {
                                edge.shared_variables.push(symbol.clone());
                            }
                        }
                        None => {
                            by_pair.insert(key, edges.len());
                            edges.push(FormulaDependency {
                                from,
                                to,
                                kind: DependencyKind::UsesVariable,
                                shared_variables: vec![symbol.clone()],
                                description: None,
                            });
                        }
                    }
                }
            }
        }

        edges
    }

    /// 共享变量推断 + 可选的外部协作者增强
    ///
    /// 协作者失败时记警告并返回纯共享变量图
    pub async fn build_with_inference(
        &self,
        formulas: &[Formula],
        collaborator: &mut dyn RelationInference,
    ) -> Vec<FormulaDependency> {
        let mut edges = self.build(formulas);

        if formulas.len() > self.max_inference_size {
            tracing::info!(
                "Skipping relation inference: {} formulas exceeds limit {}",
                formulas.len(),
                self.max_inference_size
            );
            return edges;
        }

        match collaborator.infer(formulas).await {
            Ok(proposals) => self.merge_proposals(&mut edges, proposals, formulas),
            Err(e) => {
                tracing::warn!("Relation inference failed, using shared-variable graph: {}", e);
            }
        }

        edges
    }

    /// 合并协作者提案
    ///
    /// 已有 (from, to) 边优先 (共享变量边胜过协作者边);
    /// 同一对的重复提案只取第一条;
    /// 引用未知公式 ID 的提案静默丢弃
    fn merge_proposals(
        &self,
        edges: &mut Vec<FormulaDependency>,
        proposals: Vec<RelationProposal>,
        formulas: &[Formula],
    ) {
        let known: std::collections::HashSet<&str> =
            formulas.iter().map(|f| f.id.as_str()).collect();
        let mut occupied: std::collections::HashSet<(String, String)> = edges
            .iter()
            .map(|e| (e.from.clone(), e.to.clone()))
            .collect();

        for proposal in proposals {
            if !known.contains(proposal.from.as_str()) || !known.contains(proposal.to.as_str()) {
                continue;
            }
            if proposal.from == proposal.to {
                continue;
            }
            if !occupied.insert((proposal.from.clone(), proposal.to.clone())) {
                continue;
            }
            edges.push(FormulaDependency {
                from: proposal.from,
                to: proposal.to,
                kind: proposal.kind,
                shared_variables: Vec::new(),
                description: proposal.description,
            });
        }
    }
}

impl Default for DependencyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
