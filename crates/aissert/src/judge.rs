//! LLM-as-a-judge prompts and verdict parsing
//!
//! The prompts ask a grading model for one of two labels per criterion.
//! Calling a model is left to a [`JudgeBackend`]; this module only builds
//! prompts and turns the reply into a metric value.

use anyhow::{bail, Context, Result};

/// Prompt asking whether `response` fully answers `question`
pub fn evaluate_response(response: &str, question: &str) -> String {
    format!(
        "Evaluate the following RESPONSE based on the given QUESTION. \
         A complete response is one that fully addresses all parts of the question. \
         Return one of the following labels: 'Complete' or 'Incomplete.'\n\
         QUESTION: {question}\nRESPONSE: {response}"
    )
}

/// Prompt comparing `response` against a reference answer
pub fn reference_answer(response: &str, reference: &str) -> String {
    format!(
        "Compare the generated RESPONSE to the REFERENCE answer. \
         Evaluate if the generated response correctly conveys the same meaning, \
         even if the wording is different. \
         Return one of these labels: 'Correct' or 'Incorrect.'\n\
         REFERENCE: {reference}\nRESPONSE: {response}"
    )
}

/// Prompt asking whether `context` helps answer `question`
pub fn context_relevance(context: &str, question: &str) -> String {
    format!(
        "Evaluate the relevance of the CONTEXT in answering the QUESTION. \
         A relevant CONTEXT contains information that helps answer the question, even if partially. \
         Return one of the following labels: 'Relevant', or 'Irrelevant.'\n\
         CONTEXT: '{context}'\nQUESTION: {question}"
    )
}

/// Prompt asking whether `response` sticks to `context`
pub fn context_faithfulness(context: &str, response: &str) -> String {
    format!(
        "Evaluate the following RESPONSE for faithfulness to the CONTEXT. \
         A faithful RESPONSE should only include information present in the CONTEXT, \
         avoid inventing new details, and not contradict the CONTEXT. \
         Return one of the following labels: 'Faithful' or 'Not Faithful'.\n\
         CONTEXT: '{context}'\nRESPONSE: {response}"
    )
}

/// What the judge is asked to grade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    Completeness,
    Correctness,
    Relevance,
    Faithfulness,
}

impl Criterion {
    /// Label that scores 1.0
    pub fn positive_label(&self) -> &'static str {
        match self {
            Criterion::Completeness => "Complete",
            Criterion::Correctness => "Correct",
            Criterion::Relevance => "Relevant",
            Criterion::Faithfulness => "Faithful",
        }
    }

    /// Label that scores 0.0
    pub fn negative_label(&self) -> &'static str {
        match self {
            Criterion::Completeness => "Incomplete",
            Criterion::Correctness => "Incorrect",
            Criterion::Relevance => "Irrelevant",
            Criterion::Faithfulness => "Not Faithful",
        }
    }

    /// Build the grading prompt
    ///
    /// `subject` is the text being graded and `against` is what it is
    /// graded against (question, reference, or context).
    pub fn prompt(&self, subject: &str, against: &str) -> String {
        match self {
            Criterion::Completeness => evaluate_response(subject, against),
            Criterion::Correctness => reference_answer(subject, against),
            Criterion::Relevance => context_relevance(subject, against),
            Criterion::Faithfulness => context_faithfulness(against, subject),
        }
    }

    /// Map a judge reply to 1.0 or 0.0
    ///
    /// Labels are matched as whole words, case-insensitively. The positive
    /// label counts as negative when preceded by "not", "no" or "non", or
    /// when it carries a negating prefix ("Unfaithful", "Incomplete").
    pub fn score(&self, reply: &str) -> Result<f64> {
        let positive = self.positive_label().to_lowercase();
        let words: Vec<String> = reply
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();

        let mut found_positive = false;
        for (i, word) in words.iter().enumerate() {
            if *word == positive {
                let negated = i > 0 && NEGATIONS.contains(&words[i - 1].as_str());
                if negated {
                    return Ok(0.0);
                }
                found_positive = true;
            } else if let Some(prefix) = word.strip_suffix(positive.as_str()) {
                if NEGATING_PREFIXES.contains(&prefix) {
                    return Ok(0.0);
                }
            }
        }

        if found_positive {
            return Ok(1.0);
        }
        bail!(
            "judge reply has neither '{}' nor '{}' label",
            self.positive_label(),
            self.negative_label()
        )
    }
}

const NEGATIONS: &[&str] = &["not", "no", "non", "never"];
const NEGATING_PREFIXES: &[&str] = &["un", "in", "ir", "non"];

/// Something that can answer a grading prompt
pub trait JudgeBackend: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String>;
}

impl<F> JudgeBackend for F
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    fn complete(&self, prompt: &str) -> Result<String> {
        self(prompt)
    }
}

/// Scores one criterion with a grading model
pub struct LlmJudge<B> {
    backend: B,
    criterion: Criterion,
}

impl<B: JudgeBackend> LlmJudge<B> {
    pub fn new(backend: B, criterion: Criterion) -> Self {
        Self { backend, criterion }
    }

    pub fn criterion(&self) -> Criterion {
        self.criterion
    }

    /// Ask the backend and parse its label
    pub fn score(&self, subject: &str, against: &str) -> Result<f64> {
        let prompt = self.criterion.prompt(subject, against);
        let reply = self
            .backend
            .complete(&prompt)
            .context("Judge backend failed")?;
        self.criterion
            .score(&reply)
            .with_context(|| format!("Failed to parse judge reply: {}", reply.trim()))
    }
}
