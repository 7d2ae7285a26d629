//! formula - 公式抽取与分类
//!
//! 从章节文本中识别公式, 判定修辞角色, 统计变量使用

mod classifier;
mod extractor;
mod types;
mod variables;

pub use classifier::RoleClassifier;
pub use extractor::FormulaExtractor;
pub use types::{
    ExtractError, ExtractOptions, ExtractResult, ExtractStats, Formula, FormulaRole,
    FormulaType, Variable, VariableAnalysisResult, VariableStats, VariableUsage,
};
pub use variables::VariableTracker;
