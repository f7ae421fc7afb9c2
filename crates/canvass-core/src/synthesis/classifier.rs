//! Requirement classification.
//!
//! The frequency policy here is deliberately plain code, applied
//! before any oracle judgment: the oracle assigns categories and
//! writes resolution narratives, but it can never move an item between
//! the required/preferred buckets. That keeps classification auditable
//! and testable independent of oracle variance.

use super::{ConflictEntry, ConflictGroup, RequirementItem};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum_macros::Display;

/// Importance a source attached to a mention, as extracted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RawImportance {
    Required,
    Preferred,
    Excluded,
    #[default]
    Unspecified,
}

/// Final importance bucket of a classified requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Importance {
    Required,
    Preferred,
    Excluded,
}

/// All mentions of one keyword, merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRequirement {
    pub keyword: String,
    pub category: String,
    /// Number of distinct respondents who mentioned the keyword.
    pub mention_count: usize,
    pub mentioned_by: Vec<String>,
    /// Some source explicitly marked the keyword required.
    pub explicit_required: bool,
    /// Some source explicitly ruled the keyword out.
    pub explicit_excluded: bool,
    pub quotes: Vec<String>,
}

/// One classified requirement, possibly a merged disjunction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedRequirement {
    pub keyword: String,
    pub mention_count: usize,
    pub importance: Importance,
    #[serde(default)]
    pub resolution_note: Option<String>,
}

/// Mentions needed for a keyword to classify as required.
pub fn required_threshold(respondent_count: usize) -> usize {
    respondent_count.div_ceil(2)
}

/// Groups extracted items by exact keyword, in first-seen order.
///
/// Case and synonym normalization is the caller's responsibility; two
/// spellings of one keyword merge only if pre-normalized to the same
/// string. The category of a merged keyword is the first one extracted
/// for it.
pub fn merge_items(items: &[RequirementItem]) -> Vec<MergedRequirement> {
    let mut merged: Vec<MergedRequirement> = Vec::new();
    for item in items {
        let entry = match merged.iter_mut().find(|m| m.keyword == item.keyword) {
            Some(entry) => entry,
            None => {
                merged.push(MergedRequirement {
                    keyword: item.keyword.clone(),
                    category: item.category.clone(),
                    mention_count: 0,
                    mentioned_by: Vec::new(),
                    explicit_required: false,
                    explicit_excluded: false,
                    quotes: Vec::new(),
                });
                merged.last_mut().expect("just pushed")
            }
        };
        for respondent in &item.mentioned_by {
            if !entry.mentioned_by.contains(respondent) {
                entry.mentioned_by.push(respondent.clone());
            }
        }
        entry.mention_count = entry.mentioned_by.len();
        entry.explicit_required |= item.importance_raw == RawImportance::Required;
        entry.explicit_excluded |= item.importance_raw == RawImportance::Excluded;
        if !item.context_quote.is_empty() {
            entry.quotes.push(item.context_quote.clone());
        }
    }
    merged
}

/// Applies the frequency policy and conflict merging.
///
/// Rules, in order:
/// - keywords in an oracle-flagged conflict group merge into ONE
///   disjunctive requirement ("A or B"), classified by the group's
///   combined distinct-respondent count;
/// - explicitly excluded keywords with no contradicting mention
///   classify as excluded;
/// - `mention_count >= ceil(respondents / 2)` classifies as required;
/// - a single mention classifies as preferred; if that single source
///   marked it required, it additionally surfaces as a conflict;
/// - anything else is preferred.
pub fn classify(
    merged: &[MergedRequirement],
    respondent_count: usize,
    conflict_groups: &[ConflictGroup],
) -> (Vec<ClassifiedRequirement>, Vec<ConflictEntry>) {
    let threshold = required_threshold(respondent_count);
    let mut classified = Vec::new();
    let mut conflicts = Vec::new();
    let mut absorbed: BTreeSet<&str> = BTreeSet::new();

    for group in conflict_groups {
        let members: Vec<&MergedRequirement> = merged
            .iter()
            .filter(|m| group.keywords.contains(&m.keyword))
            .collect();
        if members.len() < 2 {
            // A one-member "group" is not a real conflict; its member
            // falls through to individual classification below.
            continue;
        }
        absorbed.extend(members.iter().map(|m| m.keyword.as_str()));
        let respondents: BTreeSet<&String> =
            members.iter().flat_map(|m| &m.mentioned_by).collect();
        let combined = respondents.len();
        let keyword = members
            .iter()
            .map(|m| m.keyword.as_str())
            .collect::<Vec<_>>()
            .join(" or ");
        classified.push(ClassifiedRequirement {
            keyword,
            mention_count: combined,
            importance: if combined >= threshold {
                Importance::Required
            } else {
                Importance::Preferred
            },
            resolution_note: Some(group.resolution.clone()),
        });
        conflicts.push(ConflictEntry {
            issue: group.issue.clone(),
            options: members.iter().map(|m| m.keyword.clone()).collect(),
            resolution: group.resolution.clone(),
        });
    }

    for item in merged {
        if absorbed.contains(item.keyword.as_str()) {
            continue;
        }

        if item.explicit_excluded && !item.explicit_required {
            classified.push(ClassifiedRequirement {
                keyword: item.keyword.clone(),
                mention_count: item.mention_count,
                importance: Importance::Excluded,
                resolution_note: None,
            });
            continue;
        }

        if item.mention_count >= threshold {
            classified.push(ClassifiedRequirement {
                keyword: item.keyword.clone(),
                mention_count: item.mention_count,
                importance: Importance::Required,
                resolution_note: None,
            });
            continue;
        }

        let mut resolution_note = None;
        if item.mention_count == 1 && item.explicit_required {
            let issue = format!(
                "'{}' was marked required by a single respondent out of {respondent_count}",
                item.keyword
            );
            resolution_note = Some(issue.clone());
            conflicts.push(ConflictEntry {
                issue,
                options: vec![item.keyword.clone()],
                resolution: format!(
                    "Kept as preferred; only {} of {respondent_count} respondents asked for it.",
                    item.mention_count
                ),
            });
        }
        classified.push(ClassifiedRequirement {
            keyword: item.keyword.clone(),
            mention_count: item.mention_count,
            importance: Importance::Preferred,
            resolution_note,
        });
    }

    (classified, conflicts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(keyword: &str, respondent: &str, importance: RawImportance) -> RequirementItem {
        RequirementItem {
            keyword: keyword.to_string(),
            category: "stack".to_string(),
            importance_raw: importance,
            mentioned_by: vec![respondent.to_string()],
            context_quote: format!("{respondent} said {keyword}"),
        }
    }

    fn find<'a>(
        classified: &'a [ClassifiedRequirement],
        keyword: &str,
    ) -> &'a ClassifiedRequirement {
        classified
            .iter()
            .find(|c| c.keyword == keyword)
            .unwrap_or_else(|| panic!("missing {keyword}"))
    }

    #[test]
    fn threshold_is_half_rounded_up() {
        assert_eq!(required_threshold(1), 1);
        assert_eq!(required_threshold(2), 1);
        assert_eq!(required_threshold(3), 2);
        assert_eq!(required_threshold(4), 2);
        assert_eq!(required_threshold(5), 3);
    }

    #[test]
    fn merge_counts_distinct_respondents_only() {
        let items = vec![
            item("Python", "a", RawImportance::Unspecified),
            item("Python", "a", RawImportance::Required),
            item("Python", "b", RawImportance::Unspecified),
        ];
        let merged = merge_items(&items);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].mention_count, 2);
        assert!(merged[0].explicit_required);
        assert_eq!(merged[0].quotes.len(), 3);
    }

    #[test]
    fn majority_required_single_preferred_conflict_merged() {
        // Three respondents: Python unanimous, Kubernetes mentioned
        // once, Django vs FastAPI each demanded by one respondent.
        let items = vec![
            item("Python", "a", RawImportance::Unspecified),
            item("Python", "b", RawImportance::Unspecified),
            item("Python", "c", RawImportance::Unspecified),
            item("Kubernetes", "b", RawImportance::Unspecified),
            item("Django", "a", RawImportance::Required),
            item("FastAPI", "c", RawImportance::Required),
        ];
        let merged = merge_items(&items);
        let groups = vec![ConflictGroup {
            category: "stack".to_string(),
            keywords: vec!["Django".to_string(), "FastAPI".to_string()],
            issue: "competing web frameworks proposed as required".to_string(),
            resolution: "Either framework is acceptable; deep experience in one transfers."
                .to_string(),
        }];

        let (classified, conflicts) = classify(&merged, 3, &groups);

        assert_eq!(find(&classified, "Python").importance, Importance::Required);
        assert_eq!(
            find(&classified, "Kubernetes").importance,
            Importance::Preferred
        );

        let disjunction = find(&classified, "Django or FastAPI");
        assert_eq!(disjunction.importance, Importance::Required); // 2 of 3 >= ceil(3/2)
        assert!(disjunction.resolution_note.is_some());

        // One conflict entry, not two independent required items.
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].options, vec!["Django", "FastAPI"]);
        assert!(!classified.iter().any(|c| c.keyword == "Django"));
        assert!(!classified.iter().any(|c| c.keyword == "FastAPI"));
    }

    #[test]
    fn lone_explicit_required_mention_stays_preferred_but_conflicts() {
        let items = vec![
            item("Rust", "a", RawImportance::Required),
            item("Git", "b", RawImportance::Unspecified),
            item("Git", "c", RawImportance::Unspecified),
        ];
        let merged = merge_items(&items);
        let (classified, conflicts) = classify(&merged, 3, &[]);

        let rust = find(&classified, "Rust");
        assert_eq!(rust.importance, Importance::Preferred);
        assert!(rust.resolution_note.is_some());
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].options, vec!["Rust"]);
    }

    #[test]
    fn explicit_exclusion_wins_over_frequency() {
        let items = vec![
            item("PHP", "a", RawImportance::Excluded),
            item("PHP", "b", RawImportance::Excluded),
        ];
        let merged = merge_items(&items);
        let (classified, _) = classify(&merged, 2, &[]);

        assert_eq!(find(&classified, "PHP").importance, Importance::Excluded);
    }
}
