//! Sub-fields embedded in a job description.
//!
//! Job feeds append labelled lines to the description HTML:
//!
//! ```text
//! <b>Hourly Range</b>: $15.00-$30.00
//! <br /><b>Posted On</b>: January 01, 2024 10:00 UTC<br />
//! ```
//!
//! A field value starts after `<b>LABEL</b>:` (whitespace around the label and
//! colon is allowed) and ends at the first `<br`, the next label, or the end of
//! the text.

use regex::{Match, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<b>\s*([^<]+?)\s*</b>\s*:").expect("label pattern is valid")
});

pub const HOURLY_RANGE: &str = "Hourly Range";
pub const BUDGET: &str = "Budget";
pub const POSTED_ON: &str = "Posted On";
pub const CATEGORY: &str = "Category";
pub const SKILLS: &str = "Skills";
pub const COUNTRY: &str = "Country";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptionFields {
    pub hourly_range: String,
    pub budget: String,
    pub posted_on: String,
    pub category: String,
    pub skills: String,
    pub country: String,
}

impl DescriptionFields {
    /// Pull every known label out of `html`; missing labels are empty.
    pub fn extract(html: &str) -> Self {
        let markers: Vec<(&str, Match<'_>)> = LABEL_RE
            .captures_iter(html)
            .filter_map(|caps| Some((caps.get(1)?.as_str(), caps.get(0)?)))
            .collect();

        let mut found: HashMap<&str, String> = HashMap::new();
        for (i, &(label, marker)) in markers.iter().enumerate() {
            let next_label = markers.get(i + 1).map_or(html.len(), |(_, next)| next.start());
            let rest = &html[marker.end()..next_label];
            let value = rest.find("<br").map_or(rest, |at| &rest[..at]);
            found.entry(label).or_insert_with(|| value.trim().to_string());
        }
        let mut take = |label: &str| found.remove(label).unwrap_or_default();
        Self {
            hourly_range: take(HOURLY_RANGE),
            budget: take(BUDGET),
            posted_on: take(POSTED_ON),
            category: take(CATEGORY),
            skills: take(SKILLS),
            country: take(COUNTRY),
        }
    }
}

/// A dollar amount such as `$1,250.50`. Dollar signs, commas and spaces are ignored.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Fixed-price budget of a job.
pub fn parse_budget(raw: &str) -> Option<f64> {
    parse_amount(raw)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourlyRange {
    pub low: f64,
    pub high: f64,
}

impl HourlyRange {
    /// `$15.00-$30.00` or a single rate `$25`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.split_once('-') {
            Some((low, high)) => Some(Self {
                low: parse_amount(low)?,
                high: parse_amount(high)?,
            }),
            None => parse_amount(raw).map(|rate| Self { low: rate, high: rate }),
        }
    }

    pub fn average(&self) -> f64 {
        (self.low + self.high) / 2.0
    }
}
