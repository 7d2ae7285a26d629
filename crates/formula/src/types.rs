use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// 抽取管线错误
///
/// 只有输入阶段致命; 抽取空洞是数据 (unknown 角色, 置信度 0), 不是错误
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Input error: {0}")]
    Input(#[from] paper::PaperError),
    #[error("Empty document: no sections to scan")]
    EmptyDocument,
}

pub type Result<T> = std::result::Result<T, ExtractError>;

/// 公式形态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulaType {
    /// 带编号的行间公式
    Equation,
    /// 行内公式
    Inline,
    /// 无编号的行间公式
    Display,
    /// 上游已标注为定义式 (抽取器本身不产出)
    Definition,
}

/// 公式修辞角色 - 固定 9 值词表
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulaRole {
    Definition,
    Objective,
    Constraint,
    Theorem,
    Derivation,
    Approximation,
    Example,
    Baseline,
    Unknown,
}

impl FormulaRole {
    /// 完整词表, 顺序即显示顺序
    pub fn all() -> &'static [FormulaRole] {
        &[
            FormulaRole::Definition,
            FormulaRole::Objective,
            FormulaRole::Constraint,
            FormulaRole::Theorem,
            FormulaRole::Derivation,
            FormulaRole::Approximation,
            FormulaRole::Example,
            FormulaRole::Baseline,
            FormulaRole::Unknown,
        ]
    }

    /// 序列化名 (snake_case)
    pub fn as_str(&self) -> &'static str {
        match self {
            FormulaRole::Definition => "definition",
            FormulaRole::Objective => "objective",
            FormulaRole::Constraint => "constraint",
            FormulaRole::Theorem => "theorem",
            FormulaRole::Derivation => "derivation",
            FormulaRole::Approximation => "approximation",
            FormulaRole::Example => "example",
            FormulaRole::Baseline => "baseline",
            FormulaRole::Unknown => "unknown",
        }
    }

    /// 双语显示标签
    pub fn label(&self) -> &'static str {
        match self {
            FormulaRole::Definition => "定义 (Definition)",
            FormulaRole::Objective => "目标 (Objective)",
            FormulaRole::Constraint => "约束 (Constraint)",
            FormulaRole::Theorem => "定理 (Theorem)",
            FormulaRole::Derivation => "推导 (Derivation)",
            FormulaRole::Approximation => "近似 (Approximation)",
            FormulaRole::Example => "示例 (Example)",
            FormulaRole::Baseline => "基线 (Baseline)",
            FormulaRole::Unknown => "未知 (Unknown)",
        }
    }
}

impl std::fmt::Display for FormulaRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 变量 - 公式内的一次符号出现
///
/// 同一符号串可在多个公式中各出现一次, 不全局唯一
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    /// 符号串, 如 "x", "alpha", "w_i"
    pub symbol: String,
    /// 原始 LaTeX 形式
    pub latex: String,
    /// 含义描述 (由外部服务补充)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meaning: Option<String>,
    /// 类型描述, 如 "scalar", "vector"
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub var_type: Option<String>,
    /// 定义该符号的公式 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defined_in: Option<String>,
}

impl Variable {
    pub fn new(symbol: &str, latex: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            latex: latex.to_string(),
            meaning: None,
            var_type: None,
            defined_in: None,
        }
    }
}

/// 公式
///
/// 抽取器创建一次; role/confidence 由分类器设定一次; 之后不再修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formula {
    /// 稳定 ID: "eq3" / "inline_2"
    pub id: String,
    /// 公式 LaTeX 文本
    pub latex: String,
    #[serde(rename = "type")]
    pub formula_type: FormulaType,
    pub role: FormulaRole,
    /// 显式编号, 如 "3" / "2.1"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    /// 公式前后的文字语境
    pub context: String,
    /// 所属章节名
    pub section: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    pub variables: Vec<Variable>,
    /// 角色置信度 [0, 1]
    pub confidence: f32,
}

/// 抽取配置
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// 是否包含行内公式
    pub include_inline: bool,
    /// 仅保留带编号的公式
    pub numbered_only: bool,
    /// 按章节名过滤 (子串匹配, 不区分大小写)
    pub filter_section: Option<String>,
    /// 限定变量分析的符号集合
    pub filter_symbols: Option<Vec<String>>,
    /// 二次依赖推断的公式数上限
    pub max_inference_size: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            include_inline: true,
            numbered_only: false,
            filter_section: None,
            filter_symbols: None,
            max_inference_size: 20,
        }
    }
}

impl ExtractOptions {
    /// 从环境变量加载覆盖项
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Ok(v) = std::env::var("PRISM_INCLUDE_INLINE") {
            options.include_inline = v != "0" && v != "false";
        }

        if let Ok(v) = std::env::var("PRISM_NUMBERED_ONLY") {
            options.numbered_only = v == "1" || v == "true";
        }

        if let Ok(v) = std::env::var("PRISM_MAX_INFERENCE_SIZE") {
            if let Ok(n) = v.parse() {
                options.max_inference_size = n;
            }
        }

        options
    }

    pub fn with_include_inline(mut self, include: bool) -> Self {
        self.include_inline = include;
        self
    }

    pub fn with_numbered_only(mut self, numbered_only: bool) -> Self {
        self.numbered_only = numbered_only;
        self
    }

    pub fn with_filter_section(mut self, section: &str) -> Self {
        self.filter_section = Some(section.to_string());
        self
    }

    pub fn with_filter_symbols(mut self, symbols: Vec<String>) -> Self {
        self.filter_symbols = Some(symbols);
        self
    }

    pub fn with_max_inference_size(mut self, size: usize) -> Self {
        self.max_inference_size = size;
        self
    }
}

/// 抽取统计
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractStats {
    pub total_formulas: usize,
    pub numbered_equations: usize,
    pub inline_formulas: usize,
    /// 各角色的公式数, 计数之和等于 total_formulas
    pub by_role: BTreeMap<String, usize>,
}

impl ExtractStats {
    pub fn from_formulas(formulas: &[Formula]) -> Self {
        let mut stats = Self {
            total_formulas: formulas.len(),
            ..Default::default()
        };
        for formula in formulas {
            match formula.formula_type {
                FormulaType::Equation => stats.numbered_equations += 1,
                FormulaType::Inline => stats.inline_formulas += 1,
                _ => {}
            }
            *stats.by_role.entry(formula.role.as_str().to_string()).or_insert(0) += 1;
        }
        stats
    }
}

/// 公式抽取结果 - 对外暴露的数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractResult {
    pub formulas: Vec<Formula>,
    pub stats: ExtractStats,
    /// 输入错误时设置, 此时 formulas 为空
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractResult {
    pub fn ok(formulas: Vec<Formula>) -> Self {
        let stats = ExtractStats::from_formulas(&formulas);
        Self {
            formulas,
            stats,
            error: None,
        }
    }

    /// 输入错误: 无部分结果, 只有错误消息
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            formulas: Vec::new(),
            stats: ExtractStats::default(),
            error: Some(message.into()),
        }
    }
}

/// 变量使用汇总 - 派生视图, 公式集变化后需重算
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableUsage {
    pub symbol: String,
    pub latex: String,
    pub meaning: String,
    /// 定义该符号的公式 (role == definition)
    pub defined_in: Vec<String>,
    /// 使用该符号的公式
    pub used_in: Vec<String>,
    /// 首次出现的章节名
    pub first_appearance: String,
}

/// 变量统计
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariableStats {
    pub total_symbols: usize,
    pub defined_symbols: usize,
    /// 无定义式的符号 - 只是信号, 不是错误
    pub undefined_symbols: Vec<String>,
}

/// 变量分析结果 - 对外暴露的数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableAnalysisResult {
    pub variables: Vec<VariableUsage>,
    pub stats: VariableStats,
}
