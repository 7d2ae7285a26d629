use crate::dependency::{RelationError, RelationInference, RelationProposal, Result};
use async_trait::async_trait;
use formula::{Formula, FormulaRole};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Ollama 关系推断协作者
///
/// 把公式清单 (id + 截断 latex + 角色) 交给本地模型,
/// 从回复中解析 JSON 边提案。纯增强, 失败由调用方降级
pub struct OllamaRelations {
    client: Option<Client>,
    base_url: String,
    model: String,
    /// 提示词中单条 latex 的截断长度
    max_latex_len: usize,
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaRelations {
    pub fn new(model: &str) -> Self {
        Self {
            client: None, // Lazy init
            base_url: "http://localhost:11434".to_string(),
            model: model.to_string(),
            max_latex_len: 60,
        }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    /// 获取或创建 HTTP client
    fn get_client(&mut self) -> Result<&Client> {
        if self.client.is_none() {
            let client = Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .map_err(RelationError::Http)?;
            self.client = Some(client);
        }
        Ok(self.client.as_ref().unwrap())
    }

    async fn generate(&mut self, prompt: String) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt,
            stream: false,
        };

        let client = self.get_client()?;
        let response = client.post(url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(RelationError::Api(format!(
                "Ollama returned status {}",
                response.status()
            )));
        }

        let data: GenerateResponse = response.json().await?;
        Ok(data.response)
    }

    /// 构造公式清单提示词
    fn relation_prompt(&self, formulas: &[Formula]) -> String {
        let mut prompt = String::from(
            "Below are formulas extracted from an academic paper. \
             Propose dependency edges between them as a JSON array of objects \
             with fields \"from\", \"to\", \"type\" \
             (one of derives_from, substitutes, combines) and \"description\". \
             Reply with the JSON array only.\n\n",
        );
        for formula in formulas {
            prompt.push_str(&format!(
                "- {} [{}]: {}\n",
                formula.id,
                formula.role,
                Self::truncate(&formula.latex, self.max_latex_len)
            ));
        }
        prompt
    }

    /// 从模型回复中切出 JSON 数组并解析
    fn parse_proposals(reply: &str) -> Result<Vec<RelationProposal>> {
        let start = reply
            .find('[')
            .ok_or_else(|| RelationError::Api("no JSON array in reply".to_string()))?;
        let end = reply
            .rfind(']')
            .ok_or_else(|| RelationError::Api("unterminated JSON array in reply".to_string()))?;
        if end < start {
            return Err(RelationError::Api("malformed JSON array in reply".to_string()));
        }
        serde_json::from_str(&reply[start..=end])
            .map_err(|e| RelationError::Api(format!("invalid proposal JSON: {}", e)))
    }

    /// 生成按角色分组的逻辑脉络描述 (不透明字符串, 不做解析)
    pub async fn describe_flow(&mut self, formulas: &[Formula]) -> Result<String> {
        let mut prompt = String::from(
            "Describe in one short paragraph the logical flow between the \
             following formulas, grouped by rhetorical role.\n\n",
        );
        for role in FormulaRole::all() {
            let members: Vec<&Formula> = formulas.iter().filter(|f| f.role == *role).collect();
            if members.is_empty() {
                continue;
            }
            prompt.push_str(&format!("{}:\n", role));
            for formula in members {
                prompt.push_str(&format!(
                    "  {} {}\n",
                    formula.id,
                    Self::truncate(&formula.latex, self.max_latex_len)
                ));
            }
        }
        let reply = self.generate(prompt).await?;
        Ok(reply.trim().to_string())
    }

    fn truncate(text: &str, max: usize) -> String {
        if text.chars().count() <= max {
            return text.to_string();
        }
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    }
}

#[async_trait]
impl RelationInference for OllamaRelations {
    async fn infer(&mut self, formulas: &[Formula]) -> Result<Vec<RelationProposal>> {
        let prompt = self.relation_prompt(formulas);
        let reply = self.generate(prompt).await?;
        Self::parse_proposals(&reply)
    }
}
