use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    #[default]
    Expense,
    Income,
}

/// Processing state of a transaction. Transactions created from free text
/// start out `Pending` while the AI parser works on them.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Processing,
    #[default]
    Completed,
    Failed,
}

impl TransactionStatus {
    /// `Completed` and `Failed` never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Completed | TransactionStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Transaction {
    pub id: i64,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default, rename = "type")]
    pub kind: TransactionKind,
    #[serde(default)]
    pub status: TransactionStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Signed amount for display: expenses negative, income positive
    pub fn display_amount(&self) -> String {
        match self.kind {
            TransactionKind::Expense => format!("-{:.2}", self.amount.abs()),
            TransactionKind::Income => format!("+{:.2}", self.amount.abs()),
        }
    }

    pub fn display_category(&self) -> &str {
        self.category.as_deref().unwrap_or("Uncategorized")
    }

    pub fn display_date(&self) -> String {
        match self.date {
            Some(date) => date.format("%b %d, %Y").to_string(),
            None => "-".to_string(),
        }
    }
}

/// One page of the transaction list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct TransactionPage {
    #[serde(default, alias = "transactions")]
    pub items: Vec<Transaction>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub total_pages: Option<u32>,
    #[serde(default)]
    pub total: Option<u64>,
}

impl TransactionPage {
    pub fn has_next(&self) -> bool {
        match (self.page, self.total_pages) {
            (Some(page), Some(total)) => page < total,
            _ => false,
        }
    }
}

/// Filters for the transaction list
#[derive(Debug, Clone, Default)]
pub struct TransactionQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category_id: Option<i64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl TransactionQuery {
    pub fn page(page: u32) -> Self {
        Self {
            page: Some(page),
            ..Self::default()
        }
    }

    pub(crate) fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page".to_string(), page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(category_id) = self.category_id {
            pairs.push(("category_id".to_string(), category_id.to_string()));
        }
        if let Some(from) = self.from {
            pairs.push(("from".to_string(), from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = self.to {
            pairs.push(("to".to_string(), to.format("%Y-%m-%d").to_string()));
        }
        pairs
    }
}

/// Manually entered transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct NewTransaction {
    pub amount: f64,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
}

/// Free-text expense submitted for AI parsing, e.g. "lunch with Ana 18.50"
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ExpenseText {
    pub text: String,
}

/// Result of polling a transaction's parsing status
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct TransactionStatusResponse {
    pub id: i64,
    pub status: TransactionStatus,
    #[serde(default)]
    pub transaction: Option<Transaction>,
    #[serde(default)]
    pub error_details: Option<String>,
}
