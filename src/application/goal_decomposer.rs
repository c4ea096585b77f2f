//! Goal Decomposer (C6): heuristic semantic analysis of a goal string into a
//! master/sub spec portfolio with a dependency plan.

use std::collections::{HashMap, HashSet};

use crate::domain::error::GoalError;
use crate::domain::models::{Portfolio, Spec, SpecRole};

const CATEGORIES: &[&str] = &["close_loop", "decomposition", "orchestration", "quality", "docs"];

fn category_keywords(category: &str) -> &'static [&'static str] {
    match category {
        "close_loop" => &["close-loop", "close loop", "closed-loop", "closed loop", "autonomous", "bucle cerrado"],
        "decomposition" => &["decompose", "decomposition", "master/sub", "master-sub", "breakdown", "descomponer"],
        "orchestration" => &["orchestrate", "orchestration", "parallel", "coordinate", "schedule", "orquestar"],
        "quality" => &["quality", "gate", "test", "validate", "risk", "calidad"],
        "docs" => &["document", "documentation", "docs", "rollout", "publish", "documentacion"],
        _ => &[],
    }
}

struct Track {
    slug: &'static str,
    triggers: &'static [&'static str],
    categories: &'static [&'static str],
}

const TRACK_LIBRARY: &[Track] = &[
    Track {
        slug: "close-loop-execution",
        triggers: &["close-loop", "closed-loop", "autonomous"],
        categories: &["close_loop"],
    },
    Track {
        slug: "master-sub-decomposition",
        triggers: &["decompose", "master/sub", "master-sub", "breakdown"],
        categories: &["decomposition"],
    },
    Track {
        slug: "orchestration-runtime",
        triggers: &["orchestrate", "parallel", "coordinate"],
        categories: &["orchestration"],
    },
    Track {
        slug: "quality-gates",
        triggers: &["quality", "gate", "test", "validate"],
        categories: &["quality"],
    },
    Track {
        slug: "rollout-documentation",
        triggers: &["document", "rollout", "publish"],
        categories: &["docs"],
    },
];

#[derive(Debug, Clone, Default)]
pub struct DecomposeOptions {
    pub sub_count: Option<u8>,
    pub prefix: Option<i64>,
    pub track_bias: HashMap<String, i32>,
    pub existing_spec_names: Vec<String>,
}

pub struct GoalDecomposer;

impl GoalDecomposer {
    pub fn decompose(goal: &str, options: &DecomposeOptions) -> Result<Portfolio, GoalError> {
        let normalized = normalize_goal(goal);
        if normalized.is_empty() {
            return Err(GoalError::EmptyGoal);
        }

        let clauses = split_clauses(&normalized);
        let category_scores = score_categories(&normalized, &clauses);
        let sub_count = select_sub_count(&normalized, &clauses, &category_scores, options.sub_count)?;
        let tracks = select_tracks(&normalized, &category_scores, &options.track_bias, sub_count);
        let prefix = resolve_prefix(options.prefix, &options.existing_spec_names)?;

        let master_slug = master_slug(&normalized);
        let master_name = format!("{:02}-00-{master_slug}", prefix);

        let sub_names: Vec<String> = tracks
            .iter()
            .enumerate()
            .map(|(i, track)| format!("{:02}-{:02}-{}", prefix, i as u32 + 1, slugify(track, 42)))
            .collect();

        let sub_specs: Vec<Spec> = sub_names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let sub_index = i as u32 + 1;
                let dependencies = sub_dependencies(sub_index, &sub_names);
                Spec::new(name.clone(), SpecRole::Sub, dependencies)
            })
            .collect();

        let master_deps: HashSet<String> = sub_specs.iter().map(|s| s.name.clone()).collect();
        let master_spec = Spec::new(master_name, SpecRole::Master, master_deps);

        tracing::info!(
            goal = %normalized,
            sub_count,
            prefix,
            tracks = ?tracks,
            "goal decomposed into portfolio"
        );

        Ok(Portfolio {
            goal: normalized,
            prefix,
            master_spec,
            sub_specs,
            tracks,
        })
    }
}

/// Subs 1 and 2 have no dependencies; sub 3 depends on 1 and 2; each
/// subsequent sub depends on its immediate predecessor.
fn sub_dependencies(sub_index: u32, sub_names: &[String]) -> HashSet<String> {
    match sub_index {
        1 | 2 => HashSet::new(),
        3 => HashSet::from([sub_names[0].clone(), sub_names[1].clone()]),
        n => HashSet::from([sub_names[(n - 2) as usize].clone()]),
    }
}

fn normalize_goal(goal: &str) -> String {
    goal.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn split_clauses(goal: &str) -> Vec<String> {
    let mut fragments = Vec::new();
    for strong in goal.split(|c| matches!(c, ',' | ';' | ':' | '、' | '；' | '：')) {
        for connector_split in split_connectors(strong) {
            let trimmed = connector_split.trim();
            if !trimmed.is_empty() {
                fragments.push(trimmed.to_string());
            }
        }
    }
    fragments
}

const CONNECTORS: &[&str] = &[" and ", " with ", " then ", " plus ", " while ", " y ", " con "];

fn split_connectors(fragment: &str) -> Vec<String> {
    let mut pieces = vec![fragment.to_string()];
    for connector in CONNECTORS {
        pieces = pieces
            .into_iter()
            .flat_map(|p| p.split(connector).map(str::to_string).collect::<Vec<_>>())
            .collect();
    }
    pieces
}

fn score_categories(goal: &str, clauses: &[String]) -> HashMap<&'static str, u32> {
    let goal_lower = goal.to_lowercase();
    let mut scores: HashMap<&'static str, u32> = HashMap::new();
    for category in CATEGORIES {
        let mut score = 0;
        for keyword in category_keywords(category) {
            if goal_lower.contains(keyword) {
                score += 2;
            }
        }
        for clause in clauses {
            let clause_lower = clause.to_lowercase();
            for keyword in category_keywords(category) {
                if clause_lower.contains(keyword) {
                    score += 1;
                }
            }
        }
        scores.insert(category, score);
    }
    scores
}

fn token_count(goal: &str) -> usize {
    let is_cjk = goal.chars().any(|c| {
        let code = c as u32;
        (0x4E00..=0x9FFF).contains(&code) || (0x3040..=0x30FF).contains(&code)
    });
    if is_cjk {
        let cjk_chars = goal
            .chars()
            .filter(|c| {
                let code = *c as u32;
                (0x4E00..=0x9FFF).contains(&code) || (0x3040..=0x30FF).contains(&code)
            })
            .count();
        cjk_chars.div_ceil(4).max(1)
    } else {
        goal.split_whitespace().count()
    }
}

fn select_sub_count(
    goal: &str,
    clauses: &[String],
    category_scores: &HashMap<&'static str, u32>,
    pinned: Option<u8>,
) -> Result<u8, GoalError> {
    if let Some(count) = pinned {
        if !(2..=5).contains(&count) {
            return Err(GoalError::InvalidSubCount(count));
        }
        return Ok(count);
    }

    let tokens = token_count(goal);
    let separators = goal.chars().filter(|c| matches!(c, ',' | ';' | ':')).count();
    let len = goal.chars().count();
    let active_categories = category_scores.values().filter(|&&s| s > 0).count();

    if tokens >= 24 || separators >= 4 || len >= 160 || clauses.len() >= 5 || active_categories >= 4 {
        Ok(5)
    } else if tokens >= 14 || separators >= 2 || len >= 90 || clauses.len() >= 3 || active_categories >= 3 {
        Ok(4)
    } else {
        Ok(3)
    }
}

fn select_tracks(
    goal: &str,
    category_scores: &HashMap<&'static str, u32>,
    bias: &HashMap<String, i32>,
    sub_count: u8,
) -> Vec<String> {
    let goal_lower = goal.to_lowercase();
    let library_len = TRACK_LIBRARY.len();
    let mut scored: Vec<(usize, &Track, f64)> = TRACK_LIBRARY
        .iter()
        .enumerate()
        .map(|(index, track)| {
            let mut score = 0.0;
            let category_score: u32 = track
                .categories
                .iter()
                .map(|c| category_scores.get(c).copied().unwrap_or(0))
                .sum();
            score += f64::from(category_score);
            let trigger_hits = track.triggers.iter().filter(|trigger| goal_lower.contains(*trigger)).count();
            score += 3.0 * trigger_hits as f64;
            let tie_breaker = (library_len - index) as f64 * 1e-3;
            score += tie_breaker;
            let track_bias = bias.get(track.slug).copied().unwrap_or(0).clamp(-2, 2);
            score += f64::from(track_bias);
            (index, track, score)
        })
        .collect();

    scored.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap().then(a.0.cmp(&b.0)));

    scored
        .into_iter()
        .take(sub_count as usize)
        .map(|(_, track, _)| track.slug.to_string())
        .collect()
}

fn resolve_prefix(pinned: Option<i64>, existing: &[String]) -> Result<u32, GoalError> {
    if let Some(value) = pinned {
        if value <= 0 {
            return Err(GoalError::InvalidPrefix(value));
        }
        return Ok(value as u32);
    }

    let pattern = regex::Regex::new(r"^(\d+)-\d{2}-").unwrap();
    let max_prefix = existing
        .iter()
        .filter_map(|name| pattern.captures(name))
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .max();

    Ok(max_prefix.map_or(1, |max| max + 1))
}

fn master_slug(goal: &str) -> String {
    let lower = goal.to_lowercase();
    let signals_close_loop = category_keywords("close_loop").iter().any(|k| lower.contains(k));
    let signals_decomposition = category_keywords("decomposition").iter().any(|k| lower.contains(k));
    if signals_close_loop && signals_decomposition {
        return "autonomous-close-loop-master-sub-program".to_string();
    }
    slugify(goal, 52)
}

fn slugify(input: &str, max_len: usize) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut last_was_dash = true;
    for ch in input.chars() {
        if ch.is_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    let trimmed = slug.trim_matches('-');
    trimmed.chars().take(max_len).collect::<String>().trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_goal_is_rejected() {
        let err = GoalDecomposer::decompose("   ", &DecomposeOptions::default()).unwrap_err();
        assert_eq!(err, GoalError::EmptyGoal);
    }

    #[test]
    fn simple_goal_yields_three_subs() {
        let portfolio = GoalDecomposer::decompose("Build closed-loop orchestration", &DecomposeOptions::default()).unwrap();
        assert_eq!(portfolio.sub_specs.len(), 3);
        assert_eq!(portfolio.prefix, 1);
        assert!(portfolio.master_spec.name.starts_with("01-00-"));
        assert_eq!(portfolio.sub_specs[0].name, format!("01-01-{}", portfolio.tracks[0]));
    }

    #[test]
    fn complex_goal_yields_five_subs() {
        let goal = "Design closed-loop master/sub decomposition, orchestrate parallel execution, enforce quality gates, and publish rollout documentation";
        let portfolio = GoalDecomposer::decompose(goal, &DecomposeOptions::default()).unwrap();
        assert_eq!(portfolio.sub_specs.len(), 5);
    }

    #[test]
    fn pinned_sub_count_out_of_range_is_rejected() {
        let options = DecomposeOptions {
            sub_count: Some(7),
            ..Default::default()
        };
        let err = GoalDecomposer::decompose("Build something", &options).unwrap_err();
        assert_eq!(err, GoalError::InvalidSubCount(7));
    }

    #[test]
    fn prefix_derives_from_existing_specs() {
        let options = DecomposeOptions {
            existing_spec_names: vec!["03-00-existing".to_string(), "03-01-track".to_string()],
            ..Default::default()
        };
        let portfolio = GoalDecomposer::decompose("Build closed-loop orchestration", &options).unwrap();
        assert_eq!(portfolio.prefix, 4);
    }

    #[test]
    fn direct_trigger_hit_breaks_an_equal_category_score_tie() {
        // "document" scores the docs category (2) and is a rollout-documentation
        // trigger; "schedule" scores the orchestration category (2) equally but is
        // not an orchestration-runtime trigger. Without the +3 trigger bonus the
        // lower-index orchestration track would win on tie-breaker alone.
        let goal = "document the schedule";
        let scores = score_categories(goal, &split_clauses(goal));
        let tracks = select_tracks(goal, &scores, &HashMap::new(), 1);
        assert_eq!(tracks, vec!["rollout-documentation"]);
    }

    #[test]
    fn master_depends_on_every_sub() {
        let portfolio = GoalDecomposer::decompose("Build closed-loop orchestration", &DecomposeOptions::default()).unwrap();
        for sub in &portfolio.sub_specs {
            assert!(portfolio.master_spec.dependencies.contains(&sub.name));
        }
    }
}
