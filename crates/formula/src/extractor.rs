use crate::types::{ExtractOptions, Formula, FormulaRole, FormulaType, Variable};
use paper::Section;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// 行尾编号标记: "(3)" / "(2.1)"
static RE_EQ_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d{1,3}(?:\.\d{1,3})*)\)\s*$").expect("valid number regex"));

/// 整行 $$...$$ 行间公式
static RE_DISPLAY_DOLLARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\$\$(.+?)\$\$\s*$").expect("valid display regex"));

/// 整行 \[...\] 行间公式
static RE_DISPLAY_BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\\\[(.+?)\\\]\s*$").expect("valid bracket regex"));

/// 行内嵌入的 $$...$$ 片段
static RE_EMBEDDED_DOLLARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\$(.+?)\$\$").expect("valid embedded regex"));

/// 保留函数名/命令名 - 不作为变量抽取
const RESERVED_WORDS: &[&str] = &[
    "sin", "cos", "tan", "cot", "sec", "csc", "log", "ln", "exp", "min", "max", "arg",
    "argmin", "argmax", "sum", "prod", "int", "lim", "sup", "inf", "det", "dim", "deg",
    "frac", "sqrt", "cdot", "times", "left", "right", "text", "mathbb", "mathcal",
    "mathrm", "partial", "nabla", "infty", "approx", "leq", "geq", "neq", "in", "to",
    "subject",
];

/// 希腊字母命令 - 作为变量抽取
const GREEK_LETTERS: &[&str] = &[
    "alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta", "iota",
    "kappa", "lambda", "mu", "nu", "xi", "pi", "rho", "sigma", "tau", "upsilon",
    "phi", "chi", "psi", "omega", "Gamma", "Delta", "Theta", "Lambda", "Xi", "Pi",
    "Sigma", "Phi", "Psi", "Omega",
];

/// 重音命令 - 抽取内部符号
const ACCENT_COMMANDS: &[&str] = &["hat", "bar", "tilde", "vec", "dot", "ddot"];

/// 候选公式形态
#[derive(Debug, Clone, PartialEq, Eq)]
enum CandidateKind {
    /// 显式编号
    Numbered(String),
    /// 无编号行间公式
    Display,
    /// 行内公式
    Inline,
}

/// 候选公式 - ID 分配前的中间表示
#[derive(Debug, Clone)]
struct Candidate {
    latex: String,
    kind: CandidateKind,
    context: String,
    section_name: String,
    page_number: Option<u32>,
}

/// 公式抽取器
///
/// 扫描章节文本识别三类公式: 编号行间式、无编号行间式、行内式。
/// ID 在过滤之前分配, 保证同一文档在不同配置下 ID 稳定。
pub struct FormulaExtractor {
    /// context 截断长度
    max_context_len: usize,
}

impl FormulaExtractor {
    pub fn new() -> Self {
        Self {
            max_context_len: 200,
        }
    }

    pub fn with_max_context_len(mut self, len: usize) -> Self {
        self.max_context_len = len;
        self
    }

    /// 抽取公式, 按文档顺序返回
    pub fn extract(&self, sections: &[Section], options: &ExtractOptions) -> Vec<Formula> {
        let mut candidates = Vec::new();
        for section in sections {
            self.scan_section(section, &mut candidates);
        }

        let formulas = Self::assign_ids(candidates);
        let retained = Self::apply_filters(formulas, options);
        tracing::debug!("Extracted {} formulas after filtering", retained.len());
        retained
    }

    /// 扫描单个章节, 逐行识别候选
    ///
    /// 无编号行间式本行没有文字, 取最近一行散文作语境
    fn scan_section(&self, section: &Section, out: &mut Vec<Candidate>) {
        let page_number = section.page_range.map(|(start, _)| start);
        let mut last_prose = String::new();

        for line in section.content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            // (a) 行尾带 "(n)" 的编号公式
            if let Some(caps) = RE_EQ_NUMBER.captures(trimmed) {
                let number = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
                let body = trimmed[..caps.get(0).map(|m| m.start()).unwrap_or(trimmed.len())].trim();
                let (latex, context) = Self::split_embedded_math(body);
                if !context.is_empty() {
                    last_prose = context.clone();
                }
                out.push(Candidate {
                    latex: self.truncate(&latex),
                    kind: CandidateKind::Numbered(number),
                    context: self.truncate(&context),
                    section_name: section.name.clone(),
                    page_number,
                });
                continue;
            }

            // (b) 无编号行间公式: $$...$$ / \[...\] / 纯数学行
            if let Some(caps) = RE_DISPLAY_DOLLARS
                .captures(trimmed)
                .or_else(|| RE_DISPLAY_BRACKETS.captures(trimmed))
            {
                let latex = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
                out.push(Candidate {
                    latex: self.truncate(latex),
                    kind: CandidateKind::Display,
                    context: self.truncate(&last_prose),
                    section_name: section.name.clone(),
                    page_number,
                });
                continue;
            }

            if Self::is_math_line(trimmed) {
                out.push(Candidate {
                    latex: self.truncate(trimmed),
                    kind: CandidateKind::Display,
                    context: self.truncate(&last_prose),
                    section_name: section.name.clone(),
                    page_number,
                });
                continue;
            }

            // (c) 行内 $...$ 片段; 该行本身是散文
            last_prose = trimmed.to_string();
            for fragment in Self::scan_inline(trimmed) {
                out.push(Candidate {
                    latex: self.truncate(&fragment),
                    kind: CandidateKind::Inline,
                    context: self.truncate(trimmed),
                    section_name: section.name.clone(),
                    page_number,
                });
            }
        }
    }

    /// 从行中分离嵌入的 $$...$$: 返回 (公式, 剩余文字语境)
    fn split_embedded_math(body: &str) -> (String, String) {
        if let Some(caps) = RE_EMBEDDED_DOLLARS.captures(body) {
            let latex = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("").to_string();
            let context = RE_EMBEDDED_DOLLARS.replace_all(body, " ").trim().to_string();
            return (latex, context);
        }
        if let Some(caps) = RE_DISPLAY_BRACKETS.captures(body) {
            let latex = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("").to_string();
            return (latex, String::new());
        }
        (body.to_string(), body.to_string())
    }

    /// 判定纯数学行: 含比较算子, 几乎没有散文词
    fn is_math_line(line: &str) -> bool {
        if line.len() > 120 {
            return false;
        }
        let has_operator = line.contains('=')
            || line.contains('≈')
            || line.contains('≤')
            || line.contains('≥')
            || line.contains("\\frac")
            || line.contains("\\sum")
            || line.contains("\\int");
        if !has_operator {
            return false;
        }
        // 连续字母长度 >= 4 视为散文词 (保留命令除外)
        let prose_words = Self::letter_runs(line)
            .into_iter()
            .filter(|w| w.len() >= 4 && !RESERVED_WORDS.contains(&w.as_str()) && !GREEK_LETTERS.contains(&w.as_str()))
            .count();
        prose_words <= 1
    }

    /// 扫描行内 $...$ 片段 (跳过 $$)
    fn scan_inline(line: &str) -> Vec<String> {
        let mut fragments = Vec::new();
        let bytes = line.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'$' {
                // $$ 属于行间公式, 整段跳过
                if i + 1 < bytes.len() && bytes[i + 1] == b'$' {
                    if let Some(end) = line[i + 2..].find("$$") {
                        i += end + 4;
                        continue;
                    }
                    break;
                }
                if let Some(end) = line[i + 1..].find('$') {
                    let inner = line[i + 1..i + 1 + end].trim();
                    if !inner.is_empty() {
                        fragments.push(inner.to_string());
                    }
                    i += end + 2;
                    continue;
                }
                break;
            }
            i += 1;
        }
        fragments
    }

    /// 分配稳定 ID 并构造 Formula
    ///
    /// 编号公式: "eq<n>" (去掉点号); 行内: "inline_<k>";
    /// 无编号行间式: "eq<k>", 计数器独立于编号桶, 遇到已占用 ID 顺延
    fn assign_ids(candidates: Vec<Candidate>) -> Vec<Formula> {
        let taken: HashSet<String> = candidates
            .iter()
            .filter_map(|c| match &c.kind {
                CandidateKind::Numbered(n) => Some(format!("eq{}", n.replace('.', ""))),
                _ => None,
            })
            .collect();

        let mut inline_counter = 0usize;
        let mut display_counter = 0usize;
        let mut formulas = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let (id, formula_type, number) = match &candidate.kind {
                CandidateKind::Numbered(n) => (
                    format!("eq{}", n.replace('.', "")),
                    FormulaType::Equation,
                    Some(n.clone()),
                ),
                CandidateKind::Inline => {
                    inline_counter += 1;
                    (format!("inline_{}", inline_counter), FormulaType::Inline, None)
                }
                CandidateKind::Display => {
                    // 独立计数器, 但避开编号桶已占用的 ID
                    loop {
                        display_counter += 1;
                        let id = format!("eq{}", display_counter);
                        if !taken.contains(&id) {
                            break;
                        }
                    }
                    (format!("eq{}", display_counter), FormulaType::Display, None)
                }
            };

            let variables = Self::scan_variables(&candidate.latex);
            formulas.push(Formula {
                id,
                latex: candidate.latex,
                formula_type,
                role: FormulaRole::Unknown,
                number,
                context: candidate.context,
                section: candidate.section_name,
                page_number: candidate.page_number,
                variables,
                confidence: 0.0,
            });
        }

        formulas
    }

    /// 应用过滤选项 - ID 已分配, 过滤不重排
    fn apply_filters(formulas: Vec<Formula>, options: &ExtractOptions) -> Vec<Formula> {
        let section_filter = options.filter_section.as_ref().map(|s| s.to_lowercase());

        formulas
            .into_iter()
            .filter(|f| {
                if options.numbered_only && f.number.is_none() {
                    return false;
                }
                if !options.include_inline && f.formula_type == FormulaType::Inline {
                    return false;
                }
                if let Some(filter) = &section_filter {
                    if !f.section.to_lowercase().contains(filter.as_str()) {
                        return false;
                    }
                }
                true
            })
            .collect()
    }

    /// 扫描公式中的变量符号
    ///
    /// 语法: 单字母 (可带下标), 希腊字母命令, 重音命令内的符号。
    /// 多字母单词与保留函数名不算变量。同一符号每个公式只记一次。
    pub fn scan_variables(latex: &str) -> Vec<Variable> {
        let mut variables: Vec<Variable> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let chars: Vec<char> = latex.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];

            if c == '\\' {
                // 命令: 希腊字母 / 重音 / 保留名
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end].is_ascii_alphabetic() {
                    end += 1;
                }
                let command: String = chars[start..end].iter().collect();
                i = end;

                if GREEK_LETTERS.contains(&command.as_str()) {
                    let symbol = Self::with_subscript(&command, &chars, &mut i);
                    if seen.insert(symbol.clone()) {
                        variables.push(Variable::new(&symbol, &format!("\\{}", symbol)));
                    }
                } else if ACCENT_COMMANDS.contains(&command.as_str()) {
                    // \hat{x} -> 符号 x, latex 保留重音形式
                    if i < chars.len() && chars[i] == '{' {
                        let mut j = i + 1;
                        while j < chars.len() && chars[j] != '}' {
                            j += 1;
                        }
                        let inner: String = chars[i + 1..j].iter().collect();
                        i = (j + 1).min(chars.len());
                        let inner = inner.trim();
                        if inner.len() == 1 && inner.chars().all(|c| c.is_ascii_alphabetic()) {
                            if seen.insert(inner.to_string()) {
                                variables.push(Variable::new(
                                    inner,
                                    &format!("\\{}{{{}}}", command, inner),
                                ));
                            }
                        }
                    }
                }
                continue;
            }

            if c.is_ascii_alphabetic() {
                let start = i;
                let mut end = i;
                while end < chars.len() && chars[end].is_ascii_alphabetic() {
                    end += 1;
                }
                let word: String = chars[start..end].iter().collect();
                i = end;

                // 只有单字母算变量; 多字母是散文词或函数名
                if word.len() == 1 {
                    let symbol = Self::with_subscript(&word, &chars, &mut i);
                    if seen.insert(symbol.clone()) {
                        variables.push(Variable::new(&symbol, &symbol));
                    }
                }
                continue;
            }

            i += 1;
        }

        variables
    }

    /// 吸收紧随的下标: "x_i" / "x_{ij}"
    fn with_subscript(base: &str, chars: &[char], i: &mut usize) -> String {
        if *i < chars.len() && chars[*i] == '_' {
            *i += 1;
            if *i < chars.len() && chars[*i] == '{' {
                let mut j = *i + 1;
                while j < chars.len() && chars[j] != '}' {
                    j += 1;
                }
                let sub: String = chars[*i + 1..j].iter().collect();
                *i = (j + 1).min(chars.len());
                return format!("{}_{}", base, sub.trim());
            }
            if *i < chars.len() && (chars[*i].is_ascii_alphanumeric()) {
                let sub = chars[*i];
                *i += 1;
                return format!("{}_{}", base, sub);
            }
        }
        base.to_string()
    }

    fn letter_runs(line: &str) -> Vec<String> {
        let mut runs = Vec::new();
        let mut current = String::new();
        for c in line.chars() {
            if c.is_ascii_alphabetic() {
                current.push(c);
            } else if !current.is_empty() {
                runs.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            runs.push(current);
        }
        runs
    }

    fn truncate(&self, text: &str) -> String {
        if text.chars().count() <= self.max_context_len {
            return text.to_string();
        }
        text.chars().take(self.max_context_len).collect()
    }
}

impl Default for FormulaExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_section(content: &str) -> Section {
        Section {
            id: "sec1".to_string(),
            name: "方法 (Method)".to_string(),
            original_name: "2. Method".to_string(),
            content: content.to_string(),
            page_range: None,
        }
    }

    fn extract(content: &str) -> Vec<Formula> {
        FormulaExtractor::new().extract(&[make_section(content)], &ExtractOptions::default())
    }

    #[test]
    fn test_numbered_equation_id_from_marker() {
        let formulas = extract("$$y = f(x)$$ (3)");
        assert_eq!(formulas.len(), 1);
        assert_eq!(formulas[0].id, "eq3");
        assert_eq!(formulas[0].number.as_deref(), Some("3"));
        assert_eq!(formulas[0].latex, "y = f(x)");
        assert_eq!(formulas[0].formula_type, FormulaType::Equation);
    }

    #[test]
    fn test_dotted_number_punctuation_stripped() {
        let formulas = extract("$$y = f(x)$$ (2.1)");
        assert_eq!(formulas[0].id, "eq21");
        assert_eq!(formulas[0].number.as_deref(), Some("2.1"));
    }

    #[test]
    fn test_prose_line_with_marker_is_numbered_formula() {
        let formulas = extract("We define x as the input (1)");
        assert_eq!(formulas.len(), 1);
        assert_eq!(formulas[0].id, "eq1");
        let symbols: Vec<_> = formulas[0].variables.iter().map(|v| v.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["x"]);
    }

    #[test]
    fn test_display_math_without_marker() {
        let formulas = extract("$$L = y^2$$");
        assert_eq!(formulas.len(), 1);
        assert_eq!(formulas[0].id, "eq1");
        assert_eq!(formulas[0].formula_type, FormulaType::Display);
        assert!(formulas[0].number.is_none());
    }

    #[test]
    fn test_bracket_display_math() {
        let formulas = extract("\\[a + b = c\\]");
        assert_eq!(formulas.len(), 1);
        assert_eq!(formulas[0].latex, "a + b = c");
        assert_eq!(formulas[0].formula_type, FormulaType::Display);
    }

    #[test]
    fn test_math_only_line_detected() {
        let formulas = extract("y = w x + b");
        assert_eq!(formulas.len(), 1);
        assert_eq!(formulas[0].formula_type, FormulaType::Display);
    }

    #[test]
    fn test_prose_line_not_math() {
        let formulas = extract("The method performs better than existing approaches overall.");
        assert!(formulas.is_empty());
    }

    #[test]
    fn test_inline_fragments() {
        let formulas = extract("where $x_i$ denotes the input and $y$ the output.");
        assert_eq!(formulas.len(), 2);
        assert_eq!(formulas[0].id, "inline_1");
        assert_eq!(formulas[0].latex, "x_i");
        assert_eq!(formulas[1].id, "inline_2");
        assert_eq!(formulas[1].latex, "y");
        assert!(formulas.iter().all(|f| f.formula_type == FormulaType::Inline));
    }

    #[test]
    fn test_inline_and_display_counters_independent() {
        let formulas = extract("$$a = b$$\nwhere $c$ is a constant used throughout.");
        let ids: Vec<_> = formulas.iter().map(|f| f.id.as_str()).collect();
        assert!(ids.contains(&"eq1"));
        assert!(ids.contains(&"inline_1"));
    }

    #[test]
    fn test_display_counter_skips_taken_numbered_id() {
        // eq1 被显式编号占用, 无编号公式顺延到 eq2
        let formulas = extract("$$y = f(x)$$ (1)\n$$a = b$$");
        let ids: Vec<_> = formulas.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["eq1", "eq2"]);
    }

    #[test]
    fn test_ids_unique() {
        let formulas = extract("$$y = f(x)$$ (1)\n$$a = b$$\n$$c = d$$ (2)\nwhere $z$ is small enough.");
        let mut ids: Vec<_> = formulas.iter().map(|f| f.id.clone()).collect();
        let before = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    #[test]
    fn test_extraction_deterministic() {
        let content = "We define x as the input (1)\n$$y = f(x)$$\nwhere $z$ is noise.";
        let first = extract(content);
        let second = extract(content);
        let ids_a: Vec<_> = first.iter().map(|f| f.id.clone()).collect();
        let ids_b: Vec<_> = second.iter().map(|f| f.id.clone()).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn test_exclude_inline_option() {
        let section = make_section("$$a = b$$ (1)\nwhere $c$ is a constant used here.");
        let options = ExtractOptions::default().with_include_inline(false);
        let formulas = FormulaExtractor::new().extract(&[section], &options);
        assert_eq!(formulas.len(), 1);
        assert_eq!(formulas[0].id, "eq1");
    }

    #[test]
    fn test_numbered_only_option() {
        let section = make_section("$$a = b$$ (1)\n$$c = d$$\nwhere $z$ appears in the text.");
        let options = ExtractOptions::default().with_numbered_only(true);
        let formulas = FormulaExtractor::new().extract(&[section], &options);
        assert_eq!(formulas.len(), 1);
        assert_eq!(formulas[0].id, "eq1");
    }

    #[test]
    fn test_filtering_keeps_ids_stable() {
        let content = "where $u$ is noise in the model.\n$$a = b$$ (1)";
        let section = make_section(content);
        let all = FormulaExtractor::new().extract(&[section.clone()], &ExtractOptions::default());
        let numbered = FormulaExtractor::new()
            .extract(&[section], &ExtractOptions::default().with_numbered_only(true));
        // 过滤不改变保留公式的 ID
        let eq1_all = all.iter().find(|f| f.id == "eq1").unwrap();
        assert_eq!(numbered[0].id, eq1_all.id);
        assert_eq!(numbered[0].latex, eq1_all.latex);
    }

    #[test]
    fn test_section_filter() {
        let intro = Section {
            id: "sec1".to_string(),
            name: "引言 (Introduction)".to_string(),
            original_name: "1. Introduction".to_string(),
            content: "$$a = b$$ (1)".to_string(),
            page_range: None,
        };
        let method = Section {
            id: "sec2".to_string(),
            name: "方法 (Method)".to_string(),
            original_name: "2. Method".to_string(),
            content: "$$c = d$$ (2)".to_string(),
            page_range: None,
        };
        let options = ExtractOptions::default().with_filter_section("method");
        let formulas = FormulaExtractor::new().extract(&[intro, method], &options);
        assert_eq!(formulas.len(), 1);
        assert_eq!(formulas[0].id, "eq2");
    }

    #[test]
    fn test_scan_variables_excludes_reserved() {
        let variables = FormulaExtractor::scan_variables("y = \\log x + \\exp z");
        let symbols: Vec<_> = variables.iter().map(|v| v.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["y", "x", "z"]);
    }

    #[test]
    fn test_scan_variables_greek() {
        let variables = FormulaExtractor::scan_variables("\\alpha x + \\beta");
        let symbols: Vec<_> = variables.iter().map(|v| v.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["alpha", "x", "beta"]);
    }

    #[test]
    fn test_scan_variables_subscripts() {
        let variables = FormulaExtractor::scan_variables("w_i x_{ij} + b");
        let symbols: Vec<_> = variables.iter().map(|v| v.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["w_i", "x_ij", "b"]);
    }

    #[test]
    fn test_scan_variables_accents() {
        let variables = FormulaExtractor::scan_variables("\\hat{y} = f(x)");
        let symbols: Vec<_> = variables.iter().map(|v| v.symbol.as_str()).collect();
        assert!(symbols.contains(&"y"));
        assert!(symbols.contains(&"x"));
        let y = variables.iter().find(|v| v.symbol == "y").unwrap();
        assert_eq!(y.latex, "\\hat{y}");
    }

    #[test]
    fn test_scan_variables_dedup_within_formula() {
        let variables = FormulaExtractor::scan_variables("x + x + x");
        assert_eq!(variables.len(), 1);
    }

    #[test]
    fn test_embedded_math_split_from_context() {
        let formulas = extract("Minimize the loss $$L = y^2$$ (3)");
        assert_eq!(formulas[0].latex, "L = y^2");
        assert!(formulas[0].context.contains("Minimize the loss"));
        assert!(!formulas[0].context.contains("L = y^2"));
    }

    #[test]
    fn test_display_context_from_preceding_prose_line() {
        let formulas = extract("Minimize the loss:\n$$L = y^2$$");
        assert_eq!(formulas.len(), 1);
        assert!(formulas[0].context.contains("Minimize the loss"));
    }

    #[test]
    fn test_display_without_preceding_prose_has_empty_context() {
        let formulas = extract("$$a = b$$");
        assert_eq!(formulas[0].context, "");
    }

    #[test]
    fn test_year_marker_not_equation() {
        // 四位数不匹配编号模式
        let formulas = extract("This approach was proposed earlier (2020)");
        assert!(formulas.is_empty());
    }
}
