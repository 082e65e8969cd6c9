use super::{ChatMessage, ChatModel};
use crate::jobs::JobRecord;

pub const DEFAULT_SCREEN_CRITERIA: &str = "You are a job filter. Your task is to evaluate job descriptions based on the following criteria:\n\
- Includes video editing tasks such as cutting footage, color correction, audio editing, animations (especially motion graphics), screenshare videos, or voice overs for faceless videos.\n\
- Does not require the team to be physically present to film with the client or to film themselves presenting a product.\n\
- Does not require immediate turnaround (within 24/48 hours from job posting).\n\
- Involves using video editing software, preferably Adobe Premiere Pro.\n\
- The job description is in Portuguese or English.\n\
Respond with 'yes' or 'no' indicating if the job fits these criteria.";

pub fn user_prompt(title: &str, description: &str) -> String {
    format!("Title: {}\nDescription: {}\nResponse: ", title, description)
}

/// Only an exact `yes` (case and surrounding whitespace ignored) passes.
pub fn is_fit(reply: &str) -> bool {
    reply.trim().eq_ignore_ascii_case("yes")
}

/// Yes/no screen of jobs against free-text criteria.
pub struct Screener<'a, M> {
    model: &'a M,
    model_name: &'a str,
    criteria: &'a str,
}

impl<'a, M: ChatModel> Screener<'a, M> {
    pub fn new(model: &'a M, model_name: &'a str, criteria: &'a str) -> Self {
        Self { model, model_name, criteria }
    }

    /// Whether one job fits. A failed call counts as "no".
    pub async fn fits(&self, job: &JobRecord) -> bool {
        let messages = [
            ChatMessage::system(self.criteria),
            ChatMessage::user(user_prompt(&job.title, &job.description)),
        ];
        match self.model.complete(self.model_name, &messages).await {
            Ok(reply) => is_fit(&reply),
            Err(e) => {
                tracing::warn!(guid = %job.guid, error = %e, "screening call failed, dropping job");
                false
            }
        }
    }

    /// Jobs that fit, marked `initial_fit = true`, in input order.
    pub async fn screen(&self, jobs: Vec<JobRecord>) -> Vec<JobRecord> {
        let mut kept = Vec::new();
        for mut job in jobs {
            if self.fits(&job).await {
                job.initial_fit = Some(true);
                kept.push(job);
            }
        }
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_fit() {
        assert!(is_fit("yes"));
        assert!(is_fit(" YES\n"));
        assert!(!is_fit("no"));
        assert!(!is_fit("yes, mostly"));
        assert!(!is_fit(""));
    }

    #[test]
    fn test_user_prompt() {
        assert_eq!(
            user_prompt("Editor", "Cut videos"),
            "Title: Editor\nDescription: Cut videos\nResponse: "
        );
    }
}
