use crate::types::{DocumentText, Section};
use regex::Regex;
use std::sync::LazyLock;

/// 编号标题: "1. Title" / "2.3 Title"
static RE_NUMBERED_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)*)\.?\s+(\p{L}.*)$").expect("valid heading regex"));

/// 规范章节名 → 中文标签
const CANONICAL_SECTIONS: &[(&str, &str)] = &[
    ("abstract", "摘要"),
    ("introduction", "引言"),
    ("related work", "相关工作"),
    ("background", "背景"),
    ("preliminaries", "预备知识"),
    ("method", "方法"),
    ("methods", "方法"),
    ("methodology", "方法"),
    ("approach", "方法"),
    ("model", "模型"),
    ("experiment", "实验"),
    ("experiments", "实验"),
    ("results", "结果"),
    ("evaluation", "评估"),
    ("analysis", "分析"),
    ("discussion", "讨论"),
    ("conclusion", "结论"),
    ("conclusions", "结论"),
    ("future work", "未来工作"),
    ("references", "参考文献"),
    ("appendix", "附录"),
    ("acknowledgments", "致谢"),
    ("acknowledgements", "致谢"),
];

/// 章节切分器
///
/// 逐行扫描文本, 识别标题行并切出章节。
/// 未检测到任何标题时整个输入作为单个隐式章节, 不报错。
pub struct SectionSegmenter {
    /// 短于此长度的章节内容被丢弃 (过滤单行伪章节)
    min_content_len: usize,
    /// 标题行长度上限 (过滤正文中的误报)
    max_heading_len: usize,
}

impl SectionSegmenter {
    pub fn new() -> Self {
        Self {
            min_content_len: 30,
            max_heading_len: 60,
        }
    }

    pub fn with_min_content_len(mut self, len: usize) -> Self {
        self.min_content_len = len;
        self
    }

    pub fn with_max_heading_len(mut self, len: usize) -> Self {
        self.max_heading_len = len;
        self
    }

    /// 切分文档
    pub fn segment(&self, doc: &DocumentText) -> Vec<Section> {
        let mut sections: Vec<Section> = Vec::new();
        let mut current: Option<(String, String)> = None; // (原始标题, 内容)

        for line in doc.text.lines() {
            if let Some(title) = self.detect_heading(line) {
                if let Some((heading, content)) = current.take() {
                    self.push_section(&mut sections, heading, content);
                }
                current = Some((title, String::new()));
            } else if let Some((_, content)) = current.as_mut() {
                content.push_str(line);
                content.push('\n');
            } else {
                // 第一个标题之前的内容归入隐式章节
                current = Some(("Body".to_string(), format!("{}\n", line)));
            }
        }

        if let Some((heading, content)) = current.take() {
            self.push_section(&mut sections, heading, content);
        }

        // 完全没有产出时回退到单个隐式章节
        if sections.is_empty() && !doc.text.trim().is_empty() {
            sections.push(Section {
                id: "sec1".to_string(),
                name: "正文 (Body)".to_string(),
                original_name: "Body".to_string(),
                content: doc.text.clone(),
                page_range: None,
            });
        }

        self.attach_page_hints(&mut sections, doc);
        tracing::debug!("Segmented document into {} sections", sections.len());
        sections
    }

    /// 检测标题行, 返回标题文本
    fn detect_heading(&self, line: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.len() > self.max_heading_len {
            return None;
        }

        if let Some(caps) = RE_NUMBERED_HEADING.captures(trimmed) {
            let title = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
            // 编号标题不应包含数学符号
            if !title.is_empty() && !title.contains('=') && !title.contains('$') {
                return Some(trimmed.to_string());
            }
        }

        let key = Self::canonical_key(trimmed);
        if CANONICAL_SECTIONS.iter().any(|(name, _)| *name == key) {
            return Some(trimmed.to_string());
        }

        None
    }

    fn push_section(&self, sections: &mut Vec<Section>, heading: String, content: String) {
        if content.trim().len() < self.min_content_len {
            return;
        }
        let id = format!("sec{}", sections.len() + 1);
        sections.push(Section {
            id,
            name: Self::display_name(&heading),
            original_name: heading,
            content,
            page_range: None,
        });
    }

    /// 规范化标题用于词表查询: 去编号、去冒号、小写
    fn canonical_key(heading: &str) -> String {
        let stripped = RE_NUMBERED_HEADING
            .captures(heading.trim())
            .and_then(|caps| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or(heading);
        stripped.trim().trim_end_matches(':').trim().to_lowercase()
    }

    /// 规范名映射为双语显示标签, 非规范名原样返回
    pub fn display_name(heading: &str) -> String {
        let key = Self::canonical_key(heading);
        match CANONICAL_SECTIONS.iter().find(|(name, _)| *name == key) {
            Some((name, label)) => {
                let mut chars = name.chars();
                let capitalized = match chars.next() {
                    Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                };
                format!("{} ({})", label, capitalized)
            }
            None => Self::canonical_key_title(heading),
        }
    }

    /// 非规范标题: 去掉编号后原样保留
    fn canonical_key_title(heading: &str) -> String {
        RE_NUMBERED_HEADING
            .captures(heading.trim())
            .and_then(|caps| caps.get(2))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_else(|| heading.trim().to_string())
    }

    /// 用 SectionHint 回填页码范围
    fn attach_page_hints(&self, sections: &mut [Section], doc: &DocumentText) {
        let Some(hints) = &doc.section_hints else {
            return;
        };

        let pages: Vec<Option<u32>> = sections
            .iter()
            .map(|s| {
                let original = s.original_name.to_lowercase();
                hints
                    .iter()
                    .find(|h| original.contains(&h.name.to_lowercase()))
                    .map(|h| h.page)
            })
            .collect();

        for (i, section) in sections.iter_mut().enumerate() {
            if let Some(start) = pages[i] {
                // 止页 = 下一个有提示的章节起页, 否则与起页相同
                let end = pages[i + 1..]
                    .iter()
                    .flatten()
                    .next()
                    .copied()
                    .unwrap_or(start);
                section.page_range = Some((start, end));
            }
        }
    }
}

impl Default for SectionSegmenter {
    fn default() -> Self {
        Self::new()
    }
}
