//! Provider identification.

/// Known chat-completion providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    OpenAI,
    Moonshot,
    Baichuan,
    ZhipuAI,
    DeepSeek,
    DashScope,
    Ollama,
}

impl ProviderType {
    /// Parse provider type from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Some(Self::OpenAI),
            "moonshot" | "kimi" => Some(Self::Moonshot),
            "baichuan" => Some(Self::Baichuan),
            "zhipuai" | "zhipu" | "glm" => Some(Self::ZhipuAI),
            "deepseek" => Some(Self::DeepSeek),
            "dashscope" | "qwen" => Some(Self::DashScope),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }

    /// Get the canonical provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Moonshot => "moonshot",
            Self::Baichuan => "baichuan",
            Self::ZhipuAI => "zhipuai",
            Self::DeepSeek => "deepseek",
            Self::DashScope => "dashscope",
            Self::Ollama => "ollama",
        }
    }

    /// Base URL used when the configuration names none.
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::OpenAI => "https://api.openai.com/v1",
            Self::Moonshot => "https://api.moonshot.cn/v1",
            Self::Baichuan => "https://api.baichuan-ai.com/v1",
            Self::ZhipuAI => "https://open.bigmodel.cn/api/paas/v4",
            Self::DeepSeek => "https://api.deepseek.com/v1",
            Self::DashScope => "https://dashscope.aliyuncs.com/compatible-mode/v1",
            Self::Ollama => "http://localhost:11434",
        }
    }

    /// Hosted providers speak the OpenAI chat-completions protocol and need a key.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
