use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SummaryPeriod {
    Week,
    #[default]
    Month,
    Year,
}

impl SummaryPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryPeriod::Week => "week",
            SummaryPeriod::Month => "month",
            SummaryPeriod::Year => "year",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "week" | "weekly" => Some(SummaryPeriod::Week),
            "month" | "monthly" => Some(SummaryPeriod::Month),
            "year" | "yearly" => Some(SummaryPeriod::Year),
            _ => None,
        }
    }
}

/// AI-generated spending summary for a period
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Summary {
    #[serde(default)]
    pub period: Option<String>,
    #[serde(alias = "text")]
    pub summary: String,
    #[serde(default)]
    pub total_income: f64,
    #[serde(default)]
    pub total_expenses: f64,
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
}

impl Summary {
    pub fn net(&self) -> f64 {
        self.total_income - self.total_expenses
    }
}
