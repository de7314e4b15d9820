use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use log::info;
use thiserror::Error;

pub const QUESTION_SLOT: &str = "{question}";

pub const DEFAULT_TEMPLATE: &str =
    "주어진 질문에 짧고 간결하게 한글로 답변을 제공해주세요.
                            Question: {question}";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt template has no '{}' slot", QUESTION_SLOT)]
    MissingSlot,
    #[error("Prompt file IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Prompt JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

#[derive(Deserialize, Debug, Clone)]
struct PromptFile {
    template: String,
}

/// A fixed prompt with a single `{question}` slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    pub fn from_template(text: impl Into<String>) -> Result<Self, PromptError> {
        let text = text.into();
        if !text.contains(QUESTION_SLOT) {
            return Err(PromptError::MissingSlot);
        }
        Ok(Self { text })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Substitutes every `{question}` occurrence in one pass; text inside the
    /// question is never substituted again.
    pub fn render(&self, question: &str) -> String {
        self.text.replace(QUESTION_SLOT, question)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self { text: DEFAULT_TEMPLATE.to_string() }
    }
}

pub fn load_prompts<P: AsRef<Path>>(path: P) -> Result<Arc<PromptTemplate>, PromptError> {
    let file_content = fs::read_to_string(path.as_ref())?;
    let file: PromptFile = serde_json::from_str(&file_content)?;
    let template = PromptTemplate::from_template(file.template)?;
    info!("Loaded prompt template from '{}'", path.as_ref().display());
    Ok(Arc::new(template))
}

/// Template from `path` when given, the built-in one otherwise.
pub fn resolve_template(path: Option<&str>) -> Result<Arc<PromptTemplate>, PromptError> {
    match path {
        Some(p) if !p.trim().is_empty() => load_prompts(p),
        _ => {
            info!("Using built-in prompt template");
            Ok(Arc::new(PromptTemplate::default()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn render_substitutes_question_byte_for_byte() {
        let template = PromptTemplate::default();
        let expected = DEFAULT_TEMPLATE.replace("{question}", "테스트");
        assert_eq!(template.render("테스트"), expected);
        assert!(template.render("테스트").ends_with("Question: 테스트"));
    }

    #[test]
    fn render_does_not_recurse_into_question() {
        let template = PromptTemplate::from_template("Q: {question}").unwrap();
        assert_eq!(template.render("{question}"), "Q: {question}");
    }

    #[test]
    fn template_without_slot_is_rejected() {
        let err = PromptTemplate::from_template("no slot here").unwrap_err();
        assert!(matches!(err, PromptError::MissingSlot));
    }

    #[test]
    fn loads_template_from_json_file() {
        let path = std::env::temp_dir().join(format!("prompt-{}.json", uuid::Uuid::new_v4()));
        let mut file = fs::File::create(&path).unwrap();
        write!(file, r#"{{"template": "Answer briefly: {{question}}"}}"#).unwrap();

        let template = load_prompts(&path).unwrap();
        assert_eq!(template.render("why?"), "Answer briefly: why?");
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_prompts("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, PromptError::IoError(_)));
    }

    #[test]
    fn resolve_without_path_uses_default() {
        assert_eq!(*resolve_template(None).unwrap(), PromptTemplate::default());
        assert_eq!(*resolve_template(Some("  ")).unwrap(), PromptTemplate::default());
    }
}
