use serde::{Deserialize, Serialize};

/// 文档文本 - 文本源返回的原始内容
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentText {
    /// 已抽取的纯文本
    pub text: String,
    /// 可选的章节页码提示
    pub section_hints: Option<Vec<SectionHint>>,
}

impl DocumentText {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            section_hints: None,
        }
    }
}

/// 章节页码提示 - 由上游抽取器提供
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionHint {
    /// 章节名 (与标题行匹配, 不区分大小写)
    pub name: String,
    /// 起始页码
    pub page: u32,
}

/// 章节 - 一个标题下的连续文本段
///
/// 切分时创建一次, 之后不再修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    /// 章节 ID: "sec1", "sec2", ... 按文档顺序
    pub id: String,
    /// 规范化显示名 (双语标签, 如 "引言 (Introduction)")
    pub name: String,
    /// 原始标题行
    pub original_name: String,
    /// 章节正文
    pub content: String,
    /// 页码范围 (起, 止), 来自 SectionHint
    pub page_range: Option<(u32, u32)>,
}
