//! Implementation of the `auto status` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::adapters::FileSessionStore;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::cli::types::StatusArgs;
use crate::domain::models::CloseLoopSession;
use crate::domain::ports::{SessionResumeRef, SessionStore};

pub struct StatusOutput {
    session: Option<CloseLoopSession>,
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        match &self.session {
            Some(session) => TableFormatter::new().format_session(session),
            None => "no matching session".to_string(),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match &self.session {
            Some(session) => serde_json::to_value(session).unwrap_or_default(),
            None => serde_json::Value::Null,
        }
    }
}

fn parse_reference(raw: &str) -> SessionResumeRef {
    match raw {
        "latest" => SessionResumeRef::Latest,
        "interrupted" => SessionResumeRef::Interrupted,
        _ if raw.contains(std::path::MAIN_SEPARATOR) || raw.ends_with(".json") => {
            SessionResumeRef::Path(PathBuf::from(raw))
        }
        other => SessionResumeRef::Id(other.to_string()),
    }
}

pub async fn execute(args: StatusArgs, workspace_root: PathBuf, json_mode: bool) -> Result<i32> {
    let store = Arc::new(FileSessionStore::new(workspace_root));
    let reference = parse_reference(&args.session_id);
    let session = store.resolve(&reference).await.context("failed to resolve session")?;
    let found = session.is_some();
    output(&StatusOutput { session }, json_mode);
    Ok(if found { 0 } else { 1 })
}
