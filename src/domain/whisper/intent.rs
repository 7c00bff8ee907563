//! 用户意图关键词分类

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// 意图类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentCategory {
    Hire,
    Build,
    Story,
    Process,
    Explore,
    Learn,
}

impl IntentCategory {
    pub const ALL: [IntentCategory; 6] = [
        IntentCategory::Hire,
        IntentCategory::Build,
        IntentCategory::Story,
        IntentCategory::Process,
        IntentCategory::Explore,
        IntentCategory::Learn,
    ];
}

static PATTERNS: LazyLock<Vec<(IntentCategory, Regex)>> = LazyLock::new(|| {
    [
        (
            IntentCategory::Hire,
            r"(?i)\b(hire|hiring|job|role|work with|collaborat\w*|freelance|contract)\b",
        ),
        (
            IntentCategory::Build,
            r"(?i)\b(build\w*|make|making|create|ship|prototype|code|develop\w*)\b",
        ),
        (
            IntentCategory::Story,
            r"(?i)\b(story|stories|tell|narrative|write|writing|book|memoir)\b",
        ),
        (
            IntentCategory::Process,
            r"(?i)\b(process|workflow|method\w*|approach|how do you|how you)\b",
        ),
        (
            IntentCategory::Explore,
            r"(?i)\b(explore|exploring|wander\w*|browse|browsing|curious|look around)\b",
        ),
        (
            IntentCategory::Learn,
            r"(?i)\b(learn\w*|teach\w*|understand\w*|study|studying|tutorial)\b",
        ),
    ]
    .into_iter()
    .filter_map(|(category, pattern)| match Regex::new(pattern) {
        Ok(regex) => Some((category, regex)),
        Err(e) => {
            tracing::error!(?category, error = %e, "Invalid intent pattern");
            None
        }
    })
    .collect()
});

/// 匹配意图文本命中的所有类别
pub fn match_intent(intent: &str) -> Vec<IntentCategory> {
    PATTERNS
        .iter()
        .filter(|(_, regex)| regex.is_match(intent))
        .map(|(category, _)| *category)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_story_intent() {
        assert_eq!(match_intent("I want to tell my story"), vec![IntentCategory::Story]);
    }

    #[test]
    fn test_multiple_categories() {
        let categories = match_intent("I'd like to hire someone to build a prototype");
        assert!(categories.contains(&IntentCategory::Hire));
        assert!(categories.contains(&IntentCategory::Build));
    }

    #[test]
    fn test_neutral_intent_matches_nothing() {
        assert!(match_intent("hello there").is_empty());
        assert!(match_intent("").is_empty());
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(match_intent("EXPLORE"), vec![IntentCategory::Explore]);
    }
}
