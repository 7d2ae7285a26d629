use crate::types::{
    ExtractOptions, Formula, FormulaRole, VariableAnalysisResult, VariableStats, VariableUsage,
};
use std::collections::HashMap;

/// 变量使用跟踪器
///
/// 扫描全部公式, 按符号串汇总定义处与使用处。
/// 每次公式集变化后需要重算, 结果不独立持久化。
pub struct VariableTracker;

impl VariableTracker {
    pub fn new() -> Self {
        Self
    }

    /// 汇总变量使用情况
    ///
    /// 公式按文档顺序遍历: used_in 总是记录, defined_in 仅当公式角色为
    /// definition; 两者都去重。first_appearance 取首个提及符号的公式所在章节。
    pub fn track(&self, formulas: &[Formula], options: &ExtractOptions) -> VariableAnalysisResult {
        let mut usages: Vec<VariableUsage> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for formula in formulas {
            for variable in &formula.variables {
                let slot = *index.entry(variable.symbol.clone()).or_insert_with(|| {
                    usages.push(VariableUsage {
                        symbol: variable.symbol.clone(),
                        latex: variable.latex.clone(),
                        meaning: variable.meaning.clone().unwrap_or_default(),
                        defined_in: Vec::new(),
                        used_in: Vec::new(),
                        first_appearance: formula.section.clone(),
                    });
                    usages.len() - 1
                });

                let usage = &mut usages[slot];
                if formula.role == FormulaRole::Definition
                    && !usage.defined_in.contains(&formula.id)
                {
                    usage.defined_in.push(formula.id.clone());
                }
                if !usage.used_in.contains(&formula.id) {
                    usage.used_in.push(formula.id.clone());
                }
            }
        }

        if let Some(filter) = &options.filter_symbols {
            usages.retain(|u| filter.iter().any(|s| s == &u.symbol));
        }

        let stats = Self::stats(&usages);
        VariableAnalysisResult {
            variables: usages,
            stats,
        }
    }

    fn stats(usages: &[VariableUsage]) -> VariableStats {
        let undefined_symbols: Vec<String> = usages
            .iter()
            .filter(|u| u.defined_in.is_empty())
            .map(|u| u.symbol.clone())
            .collect();
        VariableStats {
            total_symbols: usages.len(),
            defined_symbols: usages.len() - undefined_symbols.len(),
            undefined_symbols,
        }
    }
}

impl Default for VariableTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FormulaType, Variable};

    fn make_formula(id: &str, role: FormulaRole, section: &str, symbols: &[&str]) -> Formula {
        Formula {
            id: id.to_string(),
            latex: String::new(),
            formula_type: FormulaType::Equation,
            role,
            number: None,
            context: String::new(),
            section: section.to_string(),
            page_number: None,
            variables: symbols.iter().map(|s| Variable::new(s, s)).collect(),
            confidence: 0.5,
        }
    }

    fn track(formulas: &[Formula]) -> VariableAnalysisResult {
        VariableTracker::new().track(formulas, &ExtractOptions::default())
    }

    #[test]
    fn test_defined_in_only_for_definition_role() {
        let formulas = vec![
            make_formula("eq1", FormulaRole::Definition, "Intro", &["x"]),
            make_formula("eq2", FormulaRole::Unknown, "Method", &["x"]),
        ];
        let result = track(&formulas);
        let x = &result.variables[0];
        assert_eq!(x.defined_in, vec!["eq1"]);
        assert_eq!(x.used_in, vec!["eq1", "eq2"]);
    }

    #[test]
    fn test_first_appearance_is_first_mention() {
        let formulas = vec![
            make_formula("eq1", FormulaRole::Unknown, "Intro", &["y"]),
            make_formula("eq2", FormulaRole::Definition, "Method", &["y"]),
        ];
        let result = track(&formulas);
        assert_eq!(result.variables[0].first_appearance, "Intro");
    }

    #[test]
    fn test_usage_deduplicated() {
        let formulas = vec![make_formula(
            "eq1",
            FormulaRole::Definition,
            "Intro",
            &["x", "x"],
        )];
        let result = track(&formulas);
        assert_eq!(result.variables[0].used_in, vec!["eq1"]);
        assert_eq!(result.variables[0].defined_in, vec!["eq1"]);
    }

    #[test]
    fn test_undefined_symbol_is_signal_not_error() {
        let formulas = vec![make_formula("eq1", FormulaRole::Unknown, "Intro", &["z"])];
        let result = track(&formulas);
        assert_eq!(result.stats.total_symbols, 1);
        assert_eq!(result.stats.defined_symbols, 0);
        assert_eq!(result.stats.undefined_symbols, vec!["z"]);
    }

    #[test]
    fn test_filter_symbols_restricts_output() {
        let formulas = vec![make_formula(
            "eq1",
            FormulaRole::Definition,
            "Intro",
            &["x", "y", "z"],
        )];
        let options = ExtractOptions::default()
            .with_filter_symbols(vec!["x".to_string(), "z".to_string()]);
        let result = VariableTracker::new().track(&formulas, &options);
        let symbols: Vec<_> = result.variables.iter().map(|v| v.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["x", "z"]);
    }

    #[test]
    fn test_one_usage_per_distinct_symbol() {
        let formulas = vec![
            make_formula("eq1", FormulaRole::Unknown, "Intro", &["a", "b"]),
            make_formula("eq2", FormulaRole::Unknown, "Method", &["b", "c"]),
        ];
        let result = track(&formulas);
        assert_eq!(result.variables.len(), 3);
        let b = result.variables.iter().find(|v| v.symbol == "b").unwrap();
        assert_eq!(b.used_in, vec!["eq1", "eq2"]);
    }
}
