//! paper - 论文文本结构化
//!
//! 将已抽取的论文纯文本切分为章节结构

mod segmenter;
mod source;
mod types;

pub use segmenter::SectionSegmenter;
pub use source::{FileSource, PaperError, TextSource};
pub use types::{DocumentText, Section, SectionHint};
