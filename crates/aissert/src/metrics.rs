//! Built-in heuristic metrics
//!
//! Cheap string metrics for the CLI and for quick gates. All return values
//! in [0, 1].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BuiltinMetric {
    /// 1.0 when output equals input exactly
    ExactMatch,
    /// 1.0 when output equals input ignoring case and surrounding whitespace
    CaseInsensitive,
    /// 1.0 when either text contains the other, ignoring case
    Contains,
    /// Token-level F1 between input and output
    TokenF1,
    /// Share of input tokens mentioned in the output
    MentionCoverage,
}

impl BuiltinMetric {
    pub fn all() -> &'static [BuiltinMetric] {
        &[
            BuiltinMetric::ExactMatch,
            BuiltinMetric::CaseInsensitive,
            BuiltinMetric::Contains,
            BuiltinMetric::TokenF1,
            BuiltinMetric::MentionCoverage,
        ]
    }

    pub fn id(&self) -> &'static str {
        match self {
            BuiltinMetric::ExactMatch => "exact-match",
            BuiltinMetric::CaseInsensitive => "case-insensitive",
            BuiltinMetric::Contains => "contains",
            BuiltinMetric::TokenF1 => "token-f1",
            BuiltinMetric::MentionCoverage => "mention-coverage",
        }
    }

    /// Score `output` against `input`
    pub fn compute(&self, input: &str, output: &str) -> f64 {
        match self {
            BuiltinMetric::ExactMatch => bool_score(input == output),
            BuiltinMetric::CaseInsensitive => {
                bool_score(input.trim().to_lowercase() == output.trim().to_lowercase())
            }
            BuiltinMetric::Contains => {
                let input = input.trim().to_lowercase();
                let output = output.trim().to_lowercase();
                // An empty side is contained in everything.
                if input.is_empty() != output.is_empty() {
                    return 0.0;
                }
                bool_score(input.contains(&output) || output.contains(&input))
            }
            BuiltinMetric::TokenF1 => token_f1(input, output),
            BuiltinMetric::MentionCoverage => {
                let expected = tokenize(input);
                mention_coverage(output, &expected)
            }
        }
    }
}

impl fmt::Display for BuiltinMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for BuiltinMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuiltinMetric::all()
            .iter()
            .copied()
            .find(|m| m.id() == s)
            .ok_or_else(|| format!("unknown metric: {s}"))
    }
}

fn bool_score(matched: bool) -> f64 {
    if matched {
        1.0
    } else {
        0.0
    }
}

/// Lowercased alphanumeric tokens
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Token-level F1, counting repeated tokens
pub fn token_f1(reference: &str, prediction: &str) -> f64 {
    let reference = tokenize(reference);
    let prediction = tokenize(prediction);
    if reference.is_empty() && prediction.is_empty() {
        return 1.0;
    }
    if reference.is_empty() || prediction.is_empty() {
        return 0.0;
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in &reference {
        *counts.entry(token.as_str()).or_default() += 1;
    }

    let mut overlap = 0usize;
    for token in &prediction {
        if let Some(count) = counts.get_mut(token.as_str()) {
            if *count > 0 {
                *count -= 1;
                overlap += 1;
            }
        }
    }

    if overlap == 0 {
        return 0.0;
    }
    let precision = overlap as f64 / prediction.len() as f64;
    let recall = overlap as f64 / reference.len() as f64;
    2.0 * precision * recall / (precision + recall)
}

/// Items from `should_mention` that `answer` does not contain
pub fn missing_mentions(answer: &str, should_mention: &[String]) -> Vec<String> {
    let answer_lower = answer.to_lowercase();
    should_mention
        .iter()
        .filter(|item| !answer_lower.contains(&item.to_lowercase()))
        .cloned()
        .collect()
}

/// Share of `should_mention` found in `answer`; 1.0 when nothing is expected
pub fn mention_coverage(answer: &str, should_mention: &[String]) -> f64 {
    if should_mention.is_empty() {
        return 1.0;
    }
    let missing = missing_mentions(answer, should_mention).len();
    (should_mention.len() - missing) as f64 / should_mention.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_and_case_insensitive() {
        assert_eq!(BuiltinMetric::ExactMatch.compute("Paris", "Paris"), 1.0);
        assert_eq!(BuiltinMetric::ExactMatch.compute("Paris", "paris"), 0.0);
        assert_eq!(BuiltinMetric::CaseInsensitive.compute("Paris", " paris "), 1.0);
    }

    #[test]
    fn test_contains_either_direction() {
        assert_eq!(BuiltinMetric::Contains.compute("paris", "It is Paris."), 1.0);
        assert_eq!(BuiltinMetric::Contains.compute("It is Paris.", "paris"), 1.0);
        assert_eq!(BuiltinMetric::Contains.compute("Paris", "Berlin"), 0.0);
    }

    #[test]
    fn test_contains_blank_side_scores_zero() {
        assert_eq!(BuiltinMetric::Contains.compute("Paris", ""), 0.0);
        assert_eq!(BuiltinMetric::Contains.compute("What is the capital of France?", "  "), 0.0);
        assert_eq!(BuiltinMetric::Contains.compute("", "Paris"), 0.0);
        assert_eq!(BuiltinMetric::Contains.compute("", ""), 1.0);
    }

    #[test]
    fn test_token_f1() {
        assert_eq!(token_f1("the cat sat", "the cat sat"), 1.0);
        assert_eq!(token_f1("the cat", "a dog"), 0.0);
        assert_eq!(token_f1("", ""), 1.0);
        // precision 1/2, recall 1/1
        let f1 = token_f1("paris", "paris france");
        assert!((f1 - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_mentions() {
        let answer = "The system uses SurrealDB for storage";
        let should_mention = vec!["SurrealDB".to_string(), "BM25".to_string()];
        assert_eq!(missing_mentions(answer, &should_mention), vec!["BM25".to_string()]);
        assert_eq!(mention_coverage(answer, &should_mention), 0.5);
        assert_eq!(mention_coverage(answer, &[]), 1.0);
    }

    #[test]
    fn test_parse_ids() {
        for metric in BuiltinMetric::all() {
            assert_eq!(metric.id().parse::<BuiltinMetric>().unwrap(), *metric);
        }
        assert!("bleu".parse::<BuiltinMetric>().is_err());
    }
}
