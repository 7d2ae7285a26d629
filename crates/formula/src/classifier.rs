use crate::types::{Formula, FormulaRole};

/// 分类规则: (角色, 线索词表)
///
/// 表序即优先级, 平分时靠前者胜:
/// definition > objective > theorem > constraint > derivation
/// > approximation > example > baseline
const RULES: &[(FormulaRole, &[&str])] = &[
    (
        FormulaRole::Definition,
        &[
            "we define", "define", "defined as", "is given by", "denote", "denotes",
            "let ", "where ", "notation",
        ],
    ),
    (
        FormulaRole::Objective,
        &[
            "minimize", "maximize", "objective", "loss function", "we optimize",
            "argmin", "argmax", "\\min", "\\max", "optimal",
        ],
    ),
    (
        FormulaRole::Theorem,
        &["theorem", "lemma", "proposition", "corollary", "we prove", "proof"],
    ),
    (
        FormulaRole::Constraint,
        &[
            "subject to", "s.t.", "constraint", "must satisfy", "bounded by",
            "\\leq", "\\geq", "≤", "≥",
        ],
    ),
    (
        FormulaRole::Derivation,
        &[
            "substituting", "substitute", "expanding", "rearranging", "it follows",
            "we obtain", "combining", "derivative", "from eq",
        ],
    ),
    (
        FormulaRole::Approximation,
        &["approximately", "approximation", "we approximate", "roughly", "\\approx", "≈"],
    ),
    (
        FormulaRole::Example,
        &["for example", "e.g.", "for instance", "as an example", "consider the case"],
    ),
    (
        FormulaRole::Baseline,
        &[
            "baseline", "prior work", "previous work", "compared to", "compared with",
            "existing method",
        ],
    ),
];

/// 角色分类器
///
/// 对单个公式独立打分, 不考虑其他公式。
/// 最高分规则胜出, 无命中则 unknown / 置信度 0。
pub struct RoleClassifier;

impl RoleClassifier {
    pub fn new() -> Self {
        Self
    }

    /// 分类单个公式, 返回 (角色, 置信度)
    pub fn classify(&self, latex: &str, context: &str) -> (FormulaRole, f32) {
        let haystack = format!("{} {}", context.to_lowercase(), latex.to_lowercase());

        let mut best_role = FormulaRole::Unknown;
        let mut best_hits = 0usize;

        for (role, cues) in RULES {
            let hits = cues.iter().filter(|cue| haystack.contains(*cue)).count();
            // 严格大于: 平分时表序靠前者保持胜出
            if hits > best_hits {
                best_hits = hits;
                best_role = *role;
            }
        }

        if best_hits == 0 {
            return (FormulaRole::Unknown, 0.0);
        }

        (best_role, Self::confidence(best_hits))
    }

    /// 批量分类, 就地写入 role/confidence
    pub fn classify_all(&self, formulas: &mut [Formula]) {
        for formula in formulas.iter_mut() {
            let (role, confidence) = self.classify(&formula.latex, &formula.context);
            formula.role = role;
            formula.confidence = confidence;
        }
    }

    /// 置信度: 线索命中数的单调函数, 不是校准概率
    fn confidence(hits: usize) -> f32 {
        (0.5 + 0.15 * (hits.saturating_sub(1)) as f32).min(0.95)
    }
}

impl Default for RoleClassifier {
    fn default() -> Self {
        Self::new()
    }
}
