//! Scoring of jobs on a 0-10 scale with a short justification.
//!
//! The model sees the worked examples as earlier turns of the conversation and
//! is expected to answer `<score> - <justification>`.

use super::{ChatMessage, ChatModel};
use crate::config::EvaluationExample;
use crate::jobs::JobRecord;
use std::cmp::Ordering;

pub const EVALUATOR_SYSTEM_PROMPT: &str = "You are a job evaluator.";
pub const MAX_SCORE: u8 = 10;

pub fn default_examples() -> Vec<EvaluationExample> {
    vec![
        EvaluationExample {
            description: "Looking for a video editor with experience in Adobe Premiere Pro to create marketing videos for social media.".to_string(),
            score: 9,
            justification: "This job matches my skills in video editing and experience with Adobe Premiere Pro, and the marketing focus aligns with my interests.".to_string(),
        },
        EvaluationExample {
            description: "Seeking a graphic designer to create logos and branding materials for a new startup.".to_string(),
            score: 5,
            justification: "While I have experience in graphic design, logo creation is not my primary expertise. However, branding materials are within my skill set.".to_string(),
        },
        EvaluationExample {
            description: "Need a virtual assistant to handle data entry and customer support tasks for an e-commerce business.".to_string(),
            score: 6,
            justification: "I have experience in data entry and customer support, but the e-commerce industry is not my main area of expertise.".to_string(),
        },
    ]
}

pub fn evaluation_prompt(description: &str, criteria: &str) -> String {
    format!(
        "Evaluate the following job description based on these criteria: {}.\n\nJob Description: {}\nScore: \nJustification: ",
        criteria, description
    )
}

/// Parse `8 - Strong match` into `(8, "Strong match")`. The split happens at
/// the first `-`, so hyphens inside the justification are kept.
pub fn parse_evaluation(reply: &str) -> Option<(u8, String)> {
    let (score, justification) = reply.split_once('-')?;
    let score: u8 = score.trim().parse().ok()?;
    if score > MAX_SCORE {
        return None;
    }
    Some((score, justification.trim().to_string()))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub scores: Vec<u8>,
    pub justifications: Vec<String>,
}

impl Evaluation {
    /// Mean of the parsed scores, 0 when no reply could be parsed.
    pub fn mean_score(&self) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().map(|&s| s as f64).sum::<f64>() / self.scores.len() as f64
    }
}

pub struct Evaluator<'a, M> {
    model: &'a M,
    model_name: &'a str,
    criteria: &'a str,
    examples: Vec<EvaluationExample>,
    samples: usize,
}

impl<'a, M: ChatModel> Evaluator<'a, M> {
    /// Empty `examples` selects the built-in set. `samples` is at least 1.
    pub fn new(
        model: &'a M,
        model_name: &'a str,
        criteria: &'a str,
        examples: &[EvaluationExample],
        samples: usize,
    ) -> Self {
        let examples = if examples.is_empty() { default_examples() } else { examples.to_vec() };
        Self {
            model,
            model_name,
            criteria,
            examples,
            samples: samples.max(1),
        }
    }

    fn messages(&self, description: &str) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(EVALUATOR_SYSTEM_PROMPT)];
        for example in &self.examples {
            messages.push(ChatMessage::user(evaluation_prompt(&example.description, self.criteria)));
            messages.push(ChatMessage::assistant(format!("{} - {}", example.score, example.justification)));
        }
        messages.push(ChatMessage::user(evaluation_prompt(description, self.criteria)));
        messages
    }

    pub async fn evaluate(&self, description: &str) -> Evaluation {
        let messages = self.messages(description);
        let mut evaluation = Evaluation::default();
        for _ in 0..self.samples {
            let reply = match self.model.complete(self.model_name, &messages).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!(error = %e, "evaluation call failed");
                    continue;
                }
            };
            match parse_evaluation(&reply) {
                Some((score, justification)) => {
                    evaluation.scores.push(score);
                    evaluation.justifications.push(justification);
                }
                None => tracing::debug!(%reply, "ignoring unparseable evaluation"),
            }
        }
        evaluation
    }

    /// Score every job and keep the `top_n` best, highest first. Ties keep
    /// input order.
    pub async fn rank(&self, jobs: Vec<JobRecord>, top_n: usize) -> Vec<JobRecord> {
        let mut scored = Vec::with_capacity(jobs.len());
        for mut job in jobs {
            let evaluation = self.evaluate(&job.description).await;
            job.mean_score = Some(evaluation.mean_score());
            job.justifications = Some(evaluation.justifications.join(" | "));
            scored.push(job);
        }
        scored.sort_by(|a, b| {
            b.mean_score
                .partial_cmp(&a.mean_score)
                .unwrap_or(Ordering::Equal)
        });
        scored.truncate(top_n);
        scored
    }
}
