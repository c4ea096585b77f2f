//! Spec materialization: writes `requirements.md`/`design.md`/`tasks.md` for a
//! portfolio and seeds its collaboration metadata, check-all-then-write-all so
//! a collision never leaves a half-created portfolio on disk.

use std::path::PathBuf;
use std::sync::Arc;

use crate::domain::error::SpecLayoutError;
use crate::domain::errors::OrchestratorResult;
use crate::domain::models::{Portfolio, Spec};
use crate::domain::ports::CollaborationStore;

const DOC_FILES: [&str; 3] = ["requirements.md", "design.md", "tasks.md"];

pub struct SpecMaterializer {
    workspace_root: PathBuf,
    store: Arc<dyn CollaborationStore>,
}

impl SpecMaterializer {
    pub fn new(workspace_root: PathBuf, store: Arc<dyn CollaborationStore>) -> Self {
        Self { workspace_root, store }
    }

    pub fn spec_dir(&self, spec_name: &str) -> PathBuf {
        self.workspace_root.join(".sce").join("specs").join(spec_name)
    }

    pub async fn materialize_portfolio(&self, portfolio: &Portfolio) -> OrchestratorResult<()> {
        let specs: Vec<&Spec> = portfolio.all_specs();
        self.materialize_specs(&specs).await
    }

    /// Refuses to write anything if any spec directory already exists.
    pub async fn materialize_specs(&self, specs: &[&Spec]) -> OrchestratorResult<()> {
        for spec in specs {
            if tokio::fs::try_exists(self.spec_dir(&spec.name)).await.unwrap_or(false) {
                return Err(SpecLayoutError::AlreadyExists(spec.name.clone()).into());
            }
        }
        for spec in specs {
            self.write_documents(spec).await?;
            self.store.write_metadata(spec).await?;
        }
        Ok(())
    }

    async fn write_documents(&self, spec: &Spec) -> OrchestratorResult<()> {
        let dir = self.spec_dir(&spec.name);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| SpecLayoutError::Io { spec: spec.name.clone(), source })?;
        for file in DOC_FILES {
            let path = dir.join(file);
            tokio::fs::write(&path, template(spec, file))
                .await
                .map_err(|source| SpecLayoutError::Io { spec: spec.name.clone(), source })?;
        }
        Ok(())
    }

    /// Lists the spec names currently materialized under `<ws>/.sce/specs`,
    /// used by the goal decomposer to resolve the next free numeric prefix.
    pub async fn existing_spec_names(&self) -> Vec<String> {
        let dir = self.workspace_root.join(".sce").join("specs");
        let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
            return Vec::new();
        };
        let mut names = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names
    }
}

fn template(spec: &Spec, file: &str) -> String {
    match file {
        "requirements.md" => format!(
            "# Requirements: {name}\n\n- [ ] Define acceptance criteria for `{name}`.\n",
            name = spec.name
        ),
        "design.md" => {
            let mut deps: Vec<&String> = spec.dependencies.iter().collect();
            deps.sort();
            format!(
                "# Design: {name}\n\nDependencies: {deps:?}\n\n- [ ] Describe the approach for `{name}`.\n",
                name = spec.name
            )
        }
        "tasks.md" => format!("# Tasks: {name}\n\n- [ ] Implement `{name}`.\n", name = spec.name),
        _ => unreachable!("DOC_FILES is exhaustive"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::collaboration_store::FileCollaborationStore;
    use crate::domain::models::SpecRole;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn portfolio() -> Portfolio {
        let master = Spec::new("01-00-goal", SpecRole::Master, HashSet::from(["01-01-track".to_string()]));
        let sub = Spec::new("01-01-track", SpecRole::Sub, HashSet::new());
        Portfolio {
            goal: "goal".into(),
            prefix: 1,
            master_spec: master,
            sub_specs: vec![sub],
            tracks: vec!["track".into()],
        }
    }

    #[tokio::test]
    async fn materializes_documents_and_metadata_for_every_spec() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FileCollaborationStore::new(dir.path().to_path_buf()));
        let materializer = SpecMaterializer::new(dir.path().to_path_buf(), store.clone());
        materializer.materialize_portfolio(&portfolio()).await.unwrap();

        let requirements = tokio::fs::read_to_string(dir.path().join(".sce/specs/01-01-track/requirements.md"))
            .await
            .unwrap();
        assert!(requirements.contains("01-01-track"));
        assert!(store.read_metadata("01-00-goal").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn refuses_to_write_when_any_spec_already_exists() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FileCollaborationStore::new(dir.path().to_path_buf()));
        let materializer = SpecMaterializer::new(dir.path().to_path_buf(), store.clone());
        tokio::fs::create_dir_all(dir.path().join(".sce/specs/01-01-track")).await.unwrap();

        let err = materializer.materialize_portfolio(&portfolio()).await.unwrap_err();
        assert!(matches!(err, crate::domain::errors::OrchestratorError::SpecLayout(_)));
        assert!(!tokio::fs::try_exists(dir.path().join(".sce/specs/01-00-goal")).await.unwrap_or(false));
    }

    #[tokio::test]
    async fn existing_spec_names_lists_materialized_directories() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FileCollaborationStore::new(dir.path().to_path_buf()));
        let materializer = SpecMaterializer::new(dir.path().to_path_buf(), store);
        materializer.materialize_portfolio(&portfolio()).await.unwrap();
        let mut names = materializer.existing_spec_names().await;
        names.sort();
        assert_eq!(names, vec!["01-00-goal".to_string(), "01-01-track".to_string()]);
    }
}
