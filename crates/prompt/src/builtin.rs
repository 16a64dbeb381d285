//! Built-in conversation prompts.
//!
//! Workspaces override these by placing `<id>.yml` under `.unichat/prompts/`.

use crate::types::PromptDefinition;
use unichat_core::{AppError, AppResult};

/// Rewrites a follow-up question into a standalone one.
pub const CONTEXTUALIZE_PROMPT_ID: &str = "rag.contextualize";

/// Answers a standalone question from retrieved context.
pub const ANSWER_PROMPT_ID: &str = "rag.answer";

const CONTEXTUALIZE_YAML: &str = r#"
id: rag.contextualize
title: Standalone question rewriter
apiVersion: "1.0"
createdBy: unichat
template: >-
  Given a chat history and the latest user question which might reference
  context in the chat history, formulate a standalone question which can be
  understood without the chat history. Do NOT answer the question, just
  reformulate it if needed and otherwise return it as is.
"#;

const ANSWER_YAML: &str = r#"
id: rag.answer
title: Grounded answer
apiVersion: "1.0"
createdBy: unichat
variables: [persona, language, llm_provider, llm_model, context]
template: |-
  {{persona}}
  Answer the question using only the known information below. If the known information does not contain the answer, say that you cannot answer it from the provided documents. Do not make up facts and do not add content that is not in the known information.
  Always answer in {{language}}.
  You are served by the {{llm_provider}} model {{llm_model}}.

  Known information:
  {{context}}
"#;

/// Get a built-in prompt definition by ID.
pub fn builtin_prompt(prompt_id: &str) -> AppResult<PromptDefinition> {
    let yaml = match prompt_id {
        CONTEXTUALIZE_PROMPT_ID => CONTEXTUALIZE_YAML,
        ANSWER_PROMPT_ID => ANSWER_YAML,
        other => {
            return Err(AppError::Prompt(format!(
                "No built-in prompt with id {}",
                other
            )))
        }
    };
    Ok(serde_yaml::from_str(yaml)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_parse() {
        let contextualize = builtin_prompt(CONTEXTUALIZE_PROMPT_ID).unwrap();
        assert!(contextualize.template.starts_with("Given a chat history"));
        assert!(contextualize.template.ends_with("return it as is."));
        assert!(!contextualize.template.contains('\n'));

        let answer = builtin_prompt(ANSWER_PROMPT_ID).unwrap();
        assert_eq!(answer.variables.len(), 5);
        assert!(answer.template.contains("{{context}}"));
    }

    #[test]
    fn test_unknown_builtin() {
        assert!(builtin_prompt("rag.unknown").is_err());
    }
}
