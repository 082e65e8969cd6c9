use super::record::JobRecord;
use crate::config::FilterConfig;
use crate::store::RunLog;

/// Keeps jobs that pay enough, plus jobs that state neither an hourly rate
/// nor a budget.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdFilter {
    pub hourly_rate_threshold: f64,
    pub budget_threshold: f64,
}

impl From<&FilterConfig> for ThresholdFilter {
    fn from(config: &FilterConfig) -> Self {
        Self {
            hourly_rate_threshold: config.hourly_rate_threshold,
            budget_threshold: config.budget_threshold,
        }
    }
}

impl ThresholdFilter {
    pub fn keeps(&self, hourly_average: Option<f64>, budget: Option<f64>) -> bool {
        match (hourly_average, budget) {
            (None, None) => true,
            (hourly, budget) => {
                hourly.is_some_and(|h| h >= self.hourly_rate_threshold)
                    || budget.is_some_and(|b| b >= self.budget_threshold)
            }
        }
    }

    /// Fill in `rss_url_id` (from the run log) and `Hourly Average`, then drop
    /// the rows that fail the thresholds.
    pub fn apply(&self, jobs: Vec<JobRecord>, log: &RunLog) -> Vec<JobRecord> {
        jobs.into_iter()
            .map(|mut job| {
                job.rss_url_id = job.run_id().and_then(|id| log.source_for_run(id));
                job.hourly_average = job.hourly_range().map(|r| r.average());
                job
            })
            .filter(|job| self.keeps(job.hourly_average, job.budget_amount()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RunLogEntry;
    use chrono::Utc;

    fn filter() -> ThresholdFilter {
        ThresholdFilter::from(&FilterConfig::default())
    }

    #[test]
    fn test_keeps_truth_table() {
        let f = filter();
        assert!(f.keeps(None, None));
        assert!(f.keeps(Some(15.0), None));
        assert!(!f.keeps(Some(14.99), None));
        assert!(f.keeps(None, Some(200.0)));
        assert!(!f.keeps(None, Some(150.0)));
        assert!(f.keeps(Some(5.0), Some(500.0)));
        assert!(!f.keeps(Some(5.0), Some(50.0)));
    }

    #[test]
    fn test_apply_enriches_and_filters() {
        let log = RunLog::from_entries(vec![RunLogEntry {
            run_id: 3,
            source_id: 42,
            run_timestamp: Utc::now(),
            http_status: 200,
            item_count: 3,
        }]);
        let job = |file: &str, hourly: &str, budget: &str| JobRecord {
            file_name: file.to_string(),
            hourly_range: hourly.to_string(),
            budget: budget.to_string(),
            ..JobRecord::default()
        };
        let jobs = vec![
            job("3", "$10.00-$30.00", ""),
            job("3", "$5.00-$8.00", ""),
            job("3", "", "$1,000"),
            job("9", "", ""),
        ];

        let kept = filter().apply(jobs, &log);
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].hourly_average, Some(20.0));
        assert_eq!(kept[0].rss_url_id, Some(42));
        assert_eq!(kept[1].budget, "$1,000");
        assert_eq!(kept[2].file_name, "9");
        assert_eq!(kept[2].rss_url_id, None);
    }
}
