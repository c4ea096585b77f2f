//! Spec and portfolio domain types.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Role a spec plays within its portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecRole {
    Master,
    Sub,
}

/// Lifecycle status of a spec, as tracked by the collaboration store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpecStatus {
    NotStarted,
    InProgress,
    Completed,
    Blocked,
    Failed,
}

impl SpecStatus {
    /// `blocked`/`failed`/`completed` do not change further within one orchestration run.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Blocked | Self::Failed)
    }
}

/// A unit of work: `PP-SS-slug` naming, a set of dependency edges, and a status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spec {
    pub name: String,
    pub role: SpecRole,
    pub dependencies: HashSet<String>,
    pub status: SpecStatus,
    pub assigned_agent_logical_id: Option<String>,
    /// First two dash-separated tokens of the slug; specs sharing a lease key
    /// cannot run concurrently.
    pub lease_key: String,
}

impl Spec {
    pub fn new(name: impl Into<String>, role: SpecRole, dependencies: HashSet<String>) -> Self {
        let name = name.into();
        let lease_key = derive_lease_key(&name);
        Self {
            name,
            role,
            dependencies,
            status: SpecStatus::NotStarted,
            assigned_agent_logical_id: None,
            lease_key,
        }
    }
}

/// First two dash-separated tokens after the `PP-SS-` prefix form the lease key,
/// e.g. `01-02-quality-gates-review` -> `quality-gates`.
pub fn derive_lease_key(spec_name: &str) -> String {
    let tokens: Vec<&str> = spec_name.splitn(3, '-').collect();
    let slug = tokens.get(2).copied().unwrap_or(spec_name);
    slug.splitn(3, '-').take(2).collect::<Vec<_>>().join("-")
}

/// One master spec plus 2-5 sub-specs sharing a numeric prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub goal: String,
    pub prefix: u32,
    pub master_spec: Spec,
    pub sub_specs: Vec<Spec>,
    /// Track slugs selected for each sub, in the same order as `sub_specs`.
    pub tracks: Vec<String>,
}

impl Portfolio {
    pub fn all_specs(&self) -> Vec<&Spec> {
        let mut all = vec![&self.master_spec];
        all.extend(self.sub_specs.iter());
        all
    }

    pub fn spec_names(&self) -> Vec<String> {
        self.all_specs().into_iter().map(|s| s.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_key_from_sub_slug() {
        assert_eq!(derive_lease_key("01-02-quality-gates-review"), "quality-gates");
    }

    #[test]
    fn lease_key_short_slug() {
        assert_eq!(derive_lease_key("01-01-docs"), "docs");
    }

    #[test]
    fn portfolio_spec_names_includes_master() {
        let master = Spec::new("01-00-goal", SpecRole::Master, HashSet::new());
        let sub = Spec::new("01-01-track", SpecRole::Sub, HashSet::new());
        let portfolio = Portfolio {
            goal: "goal".into(),
            prefix: 1,
            master_spec: master,
            sub_specs: vec![sub],
            tracks: vec!["track".into()],
        };
        assert_eq!(portfolio.spec_names(), vec!["01-00-goal", "01-01-track"]);
    }
}
