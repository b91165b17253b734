use serde::{Deserialize, Serialize};

use super::TransactionKind;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Category {
    pub id: i64,
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: Option<TransactionKind>,
}
