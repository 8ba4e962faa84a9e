//! Tolerant parser for the classifier's free-text output.
//!
//! The model is asked for five labeled lines:
//!
//! ```text
//! Level: High
//! ToxicPerson: Person A
//! Behaviors: insults, sarcasm
//! Problem: called the other person names
//! Suggestion: use respectful language
//! ```
//!
//! Lines may come in any order; blank and unrecognized lines are ignored.
//! Parsing never fails. Anything missing or unusable keeps its default from
//! [`AnalysisResult::default`].

use crate::model::{
    AnalysisResult, DEFAULT_SUGGESTION, NO_BEHAVIORS, NO_PROBLEM, ToxicPerson, ToxicityLevel,
};

const LEVEL_PREFIX: &str = "Level:";
const PERSON_PREFIX: &str = "ToxicPerson:";
const BEHAVIORS_PREFIX: &str = "Behaviors:";
const PROBLEM_PREFIX: &str = "Problem:";
const SUGGESTION_PREFIX: &str = "Suggestion:";

/// Sentinel phrase marking "no behaviors" in model output.
const BEHAVIORS_SENTINEL: &str = "No toxic behaviors";

/// Parse raw model text into a fully populated result.
pub fn parse_analysis(raw: &str) -> AnalysisResult {
    let mut result = AnalysisResult::default();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(value) = value_after(line, LEVEL_PREFIX) {
            if let Some(level) = ToxicityLevel::from_label(value) {
                result.level = level;
            }
        } else if let Some(value) = value_after(line, PERSON_PREFIX) {
            if let Some(person) = ToxicPerson::from_label(value) {
                result.toxic_person = person;
            }
        } else if let Some(value) = value_after(line, BEHAVIORS_PREFIX) {
            if !value.contains(BEHAVIORS_SENTINEL) {
                let behaviors = split_behaviors(value);
                if !behaviors.is_empty() {
                    result.behaviors = behaviors;
                }
            }
        } else if let Some(value) = value_after(line, PROBLEM_PREFIX) {
            if !value.is_empty() && !value.contains(NO_PROBLEM) {
                result.problem = value.to_string();
            }
        } else if let Some(value) = value_after(line, SUGGESTION_PREFIX) {
            if !value.is_empty() && !value.contains(DEFAULT_SUGGESTION) {
                result.suggestion = value.to_string();
            }
        }
    }

    if result.behaviors.is_empty() {
        result.behaviors = vec![NO_BEHAVIORS.to_string()];
    }
    result
}

fn value_after<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    line.strip_prefix(prefix).map(str::trim)
}

fn split_behaviors(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_formed_response() {
        let raw = "Level: High\nToxicPerson: Person A\nBehaviors: insults, sarcasm\nProblem: called other person names\nSuggestion: use respectful language";

        let result = parse_analysis(raw);

        assert_eq!(result.level, ToxicityLevel::High);
        assert_eq!(result.toxic_person, ToxicPerson::PersonA);
        assert_eq!(result.behaviors, vec!["insults", "sarcasm"]);
        assert_eq!(result.problem, "called other person names");
        assert_eq!(result.suggestion, "use respectful language");
    }

    #[test]
    fn test_parse_empty_input_gives_defaults() {
        assert_eq!(parse_analysis(""), AnalysisResult::default());
        assert_eq!(parse_analysis("\n\n   \n"), AnalysisResult::default());
    }

    #[test]
    fn test_parse_unlabeled_text_gives_defaults() {
        let raw = "The conversation looks fine.\nNothing to report here.";
        assert_eq!(parse_analysis(raw), AnalysisResult::default());
    }

    #[test]
    fn test_parse_unrecognized_enum_values_fall_back() {
        let raw = "Level: Extreme\nToxicPerson: Person C\nBehaviors: yelling";

        let result = parse_analysis(raw);

        assert_eq!(result.level, ToxicityLevel::None);
        assert_eq!(result.toxic_person, ToxicPerson::None);
        assert_eq!(result.behaviors, vec!["yelling"]);
    }

    #[test]
    fn test_parse_any_order_with_noise_and_indentation() {
        let raw = "Here is my analysis:\n\n  Suggestion: take a break  \nBehaviors: dismissiveness\n   Level: Low\nToxicPerson: Both\nThanks!";

        let result = parse_analysis(raw);

        assert_eq!(result.level, ToxicityLevel::Low);
        assert_eq!(result.toxic_person, ToxicPerson::Both);
        assert_eq!(result.behaviors, vec!["dismissiveness"]);
        assert_eq!(result.problem, NO_PROBLEM);
        assert_eq!(result.suggestion, "take a break");
    }

    #[test]
    fn test_parse_sentinels_keep_defaults() {
        let raw = "Level: None\nToxicPerson: None\nBehaviors: No toxic behaviors detected\nProblem: No significant issues found\nSuggestion: Keep up the good communication!";

        let result = parse_analysis(raw);

        assert_eq!(result, AnalysisResult::default());
        assert!(result.is_clean());
    }

    #[test]
    fn test_parse_behaviors_drops_empty_items() {
        let result = parse_analysis("Behaviors: , name-calling ,, threats ,");
        assert_eq!(result.behaviors, vec!["name-calling", "threats"]);

        let result = parse_analysis("Behaviors: , ,");
        assert_eq!(result.behaviors, vec![NO_BEHAVIORS]);
    }

    #[test]
    fn test_parse_is_total_on_odd_input() {
        for raw in [
            "Level:",
            "Level:High",
            "ToxicPerson:",
            ":::",
            "Problem:",
            "\u{0}\u{1}Level: High",
            "Behaviors",
        ] {
            let result = parse_analysis(raw);
            assert!(!result.behaviors.is_empty());
            assert!(!result.problem.is_empty());
            assert!(!result.suggestion.is_empty());
        }
        assert_eq!(parse_analysis("Level:High").level, ToxicityLevel::High);
    }
}
