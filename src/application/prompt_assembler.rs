//! Prompt Assembler (C1): renders a bootstrap prompt from steering and spec documents.

use std::path::{Path, PathBuf};
use tokio::fs;

const STEERING_FILES: &[&str] = &[
    "CORE_PRINCIPLES.md",
    "ENVIRONMENT.md",
    "CURRENT_CONTEXT.md",
    "RULES_GUIDE.md",
];

const SPEC_DOCS: &[&str] = &["requirements.md", "design.md", "tasks.md"];

/// Renders bootstrap prompts for workers, reading steering and spec documents
/// through best-effort `tokio::fs` reads.
pub struct PromptAssembler {
    workspace_root: PathBuf,
    template: Option<String>,
}

impl PromptAssembler {
    pub fn new(workspace_root: PathBuf, template: Option<String>) -> Self {
        Self { workspace_root, template }
    }

    fn steering_dir(&self) -> PathBuf {
        self.workspace_root.join(".sce").join("steering")
    }

    fn spec_dir(&self, spec_name: &str) -> PathBuf {
        self.workspace_root.join(".sce").join("specs").join(spec_name)
    }

    async fn read_best_effort(path: &Path) -> Option<String> {
        match fs::read_to_string(path).await {
            Ok(contents) => Some(contents),
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "optional prompt input unreadable, skipping");
                None
            }
        }
    }

    async fn steering_context(&self) -> String {
        let dir = self.steering_dir();
        let mut sections = Vec::new();
        for file in STEERING_FILES {
            let path = dir.join(file);
            if let Some(content) = Self::read_best_effort(&path).await {
                sections.push(format!("## {file}\n\n{content}"));
            }
        }
        sections.join("\n\n")
    }

    async fn spec_documents(&self, spec_name: &str) -> String {
        let dir = self.spec_dir(spec_name);
        if !dir.exists() {
            return "(not found)".to_string();
        }
        let mut sections = Vec::new();
        for doc in SPEC_DOCS {
            let path = dir.join(doc);
            match Self::read_best_effort(&path).await {
                Some(content) => sections.push(format!("### {doc}\n\n{content}")),
                None => sections.push(format!("### {doc}\n\n(not found)")),
            }
        }
        sections.join("\n\n")
    }

    /// Builds the prompt for one spec; fails only if the final text is empty/whitespace.
    pub async fn build_prompt(&self, spec_name: &str) -> Result<String, String> {
        let spec_path = self.spec_dir(spec_name);
        let steering_context = self.steering_context().await;
        let spec_documents = self.spec_documents(spec_name).await;
        let task_instructions = format!(
            "Execute the tasks described in {}/tasks.md to completion, reporting a result summary as the final JSON line on stdout.",
            spec_path.display()
        );

        let prompt = if let Some(template) = &self.template {
            template
                .replace("{{specName}}", spec_name)
                .replace("{{specPath}}", &spec_path.display().to_string())
                .replace("{{steeringContext}}", &steering_context)
                .replace("{{taskInstructions}}", &task_instructions)
        } else {
            format!(
                "# Project Overview\n\nWorkspace: {}\n\n# Target Spec: {spec_name}\n\n# Spec Documents\n\n{spec_documents}\n\n# Steering Context\n\n{steering_context}\n\n# Task Execution Instructions\n\n{task_instructions}\n",
                self.workspace_root.display()
            )
        };

        if prompt.trim().is_empty() {
            return Err(format!("assembled prompt for spec '{spec_name}' was empty"));
        }

        tracing::debug!(spec_name, prompt_len = prompt.len(), "prompt assembled");
        Ok(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_spec_directory_yields_placeholder() {
        let dir = tempdir().unwrap();
        let assembler = PromptAssembler::new(dir.path().to_path_buf(), None);
        let prompt = assembler.build_prompt("01-01-missing").await.unwrap();
        assert!(prompt.contains("(not found)"));
    }

    #[tokio::test]
    async fn custom_template_substitutes_placeholders() {
        let dir = tempdir().unwrap();
        let assembler = PromptAssembler::new(
            dir.path().to_path_buf(),
            Some("spec={{specName}} path={{specPath}}".to_string()),
        );
        let prompt = assembler.build_prompt("01-01-track").await.unwrap();
        assert!(prompt.contains("spec=01-01-track"));
        assert!(prompt.contains("path="));
    }

    #[tokio::test]
    async fn reads_existing_spec_documents() {
        let dir = tempdir().unwrap();
        let spec_dir = dir.path().join(".sce").join("specs").join("01-01-track");
        tokio::fs::create_dir_all(&spec_dir).await.unwrap();
        tokio::fs::write(spec_dir.join("requirements.md"), "do the thing")
            .await
            .unwrap();
        let assembler = PromptAssembler::new(dir.path().to_path_buf(), None);
        let prompt = assembler.build_prompt("01-01-track").await.unwrap();
        assert!(prompt.contains("do the thing"));
    }
}
