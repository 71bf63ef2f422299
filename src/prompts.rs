//! Загрузчик системных промптов из файлов.
//!
//! Промпты хранятся в каталоге `prompts/` в корне проекта. Если файл
//! отсутствует, используется встроенный текст.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{Error, Result};

/// Built-in analyst persona, used when `prompts/market_analyst.md` is absent.
pub const MARKET_ANALYST_PROMPT: &str = "You are a senior financial market analyst.
Analyze the provided chat history from a Discord channel.
Identify key themes, market sentiment, and significant events mentioned by users.

CRITICAL: Your output must be a perfectly formed JSON object.
Do not include any conversational text before or after the JSON.
Escape all newlines and quotes within the markdown summary correctly.";

/// Доступные промпты.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// Аналитик рынка: тональность, темы, сводка в JSON.
    MarketAnalyst,
}

impl Prompt {
    /// Имя файла промпта (Markdown).
    pub fn filename(&self) -> &'static str {
        match self {
            Prompt::MarketAnalyst => "market_analyst.md",
        }
    }

    pub fn builtin(&self) -> &'static str {
        match self {
            Prompt::MarketAnalyst => MARKET_ANALYST_PROMPT,
        }
    }

    /// Загрузить промпт из файла.
    pub fn load(&self) -> Result<String> {
        load_prompt_from(&prompts_dir(), self.filename())
    }

    /// Файл из `prompts/`, иначе встроенный текст.
    pub fn load_or_builtin(&self) -> String {
        match self.load() {
            Ok(text) => text,
            Err(e) => {
                debug!(prompt = self.filename(), error = %e, "Using built-in prompt");
                self.builtin().to_string()
            }
        }
    }
}

/// Загрузить промпт по имени файла из каталога `dir`.
///
/// Пустой файл считается ошибкой.
pub fn load_prompt_from(dir: &Path, filename: &str) -> Result<String> {
    let path = dir.join(filename);
    let text = std::fs::read_to_string(&path).map_err(|e| {
        Error::InvalidInput(format!("Failed to load prompt {}: {}", filename, e))
    })?;
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::InvalidInput(format!("Prompt {} is empty", filename)));
    }
    Ok(text.to_string())
}

/// Путь к каталогу промптов.
pub fn prompts_dir() -> PathBuf {
    let candidates = [
        PathBuf::from("prompts"),
        PathBuf::from("../prompts"),
        PathBuf::from("../../prompts"),
    ];

    for path in candidates {
        if path.exists() {
            return path;
        }
    }

    PathBuf::from("prompts")
}
