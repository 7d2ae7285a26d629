use crate::types::DocumentText;
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaperError {
    #[error("Source error: {0}")]
    Source(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PaperError>;

/// 文本源 trait - 外部抽取器的接口
///
/// 核心只消费纯文本, 不解析任何二进制格式
#[async_trait]
pub trait TextSource: Send + Sync {
    /// 获取文档文本
    async fn fetch(&mut self) -> Result<DocumentText>;
}

/// 文件文本源
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TextSource for FileSource {
    async fn fetch(&mut self) -> Result<DocumentText> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            PaperError::Source(format!("cannot read {}: {}", self.path.display(), e))
        })?;

        if text.trim().is_empty() {
            return Err(PaperError::Source(format!(
                "empty document: {}",
                self.path.display()
            )));
        }

        Ok(DocumentText::from_text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_file_source_reads_text() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1. Introduction\nSome text.").unwrap();

        let mut source = FileSource::new(file.path());
        let doc = source.fetch().await.unwrap();
        assert!(doc.text.contains("Introduction"));
    }

    #[tokio::test]
    async fn test_file_source_missing_file() {
        let mut source = FileSource::new("/nonexistent/paper.txt");
        let result = source.fetch().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_file_source_empty_file_is_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut source = FileSource::new(file.path());
        assert!(source.fetch().await.is_err());
    }
}
