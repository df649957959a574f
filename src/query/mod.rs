//! List-query DSL
//!
//! Query-style messages take their parameters from the URL query string:
//! paging (`limit`, `start`), counting (`count`, `replyWithCount`),
//! `groupBy`, `sort`, `fields`, and `q` conditions.

mod parser;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use parser::{apply_query_string, detect_operator, parse_condition, single_resource};

/// Condition operators, in the order they are tested against a clause
pub const QUERY_OPS: [QueryOp; 10] = [
    QueryOp::Eq,
    QueryOp::NotEq,
    QueryOp::Gt,
    QueryOp::Lt,
    QueryOp::Gte,
    QueryOp::Lte,
    QueryOp::In,
    QueryOp::NotIn,
    QueryOp::Like,
    QueryOp::NotLike,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "?=")]
    In,
    #[serde(rename = "!?=")]
    NotIn,
    #[serde(rename = "~=")]
    Like,
    #[serde(rename = "!~=")]
    NotLike,
}

impl QueryOp {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::In => "?=",
            Self::NotIn => "!?=",
            Self::Like => "~=",
            Self::NotLike => "!~=",
        }
    }
}

impl fmt::Display for QueryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `name op value` filter clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCondition {
    pub name: String,
    pub op: QueryOp,
    /// Kept untrimmed, spaces can be significant
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Query block carried by query-style messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i32>,
    #[serde(default)]
    pub count: bool,
    #[serde(default)]
    pub reply_with_count: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_direction: Option<SortDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    /// Empty means query all
    #[serde(default)]
    pub conditions: Vec<QueryCondition>,
}
