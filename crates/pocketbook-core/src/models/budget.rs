use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Weekly,
    #[default]
    Monthly,
    Yearly,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Budget {
    pub id: i64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(alias = "amount")]
    pub limit: f64,
    #[serde(default)]
    pub spent: f64,
    #[serde(default)]
    pub period: BudgetPeriod,
}

impl Budget {
    pub fn remaining(&self) -> f64 {
        self.limit - self.spent
    }

    pub fn is_over_budget(&self) -> bool {
        self.spent > self.limit
    }

    /// Share of the limit already spent, in percent. Zero limits report 0.
    pub fn percent_used(&self) -> f64 {
        if self.limit <= 0.0 {
            0.0
        } else {
            self.spent / self.limit * 100.0
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct NewBudget {
    pub category_id: i64,
    pub limit: f64,
    pub period: BudgetPeriod,
}
