//! 规则操作符定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 条件操作符
///
/// 存储中的操作符以字符串保存。无法识别的操作符不会导致规则解析失败，
/// 而是保留为 `Unknown`，评估时视为不满足并记录告警。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    // 通用比较
    Equals,
    NotEquals,

    // 数值比较
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Between,

    // 字符串操作（大小写不敏感）
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Regex,

    // 列表成员
    In,
    NotIn,

    // 时间操作
    Before,
    After,

    // 空值检查
    IsEmpty,
    IsNotEmpty,

    Unknown(String),
}

impl Operator {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::GreaterThan => "greater_than",
            Self::GreaterThanOrEqual => "greater_than_or_equal",
            Self::LessThan => "less_than",
            Self::LessThanOrEqual => "less_than_or_equal",
            Self::Between => "between",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::Regex => "regex",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Before => "before",
            Self::After => "after",
            Self::IsEmpty => "is_empty",
            Self::IsNotEmpty => "is_not_empty",
            Self::Unknown(name) => name,
        }
    }

    /// 是否为已知操作符
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<&str> for Operator {
    fn from(s: &str) -> Self {
        match s {
            "equals" | "eq" => Self::Equals,
            "not_equals" | "neq" => Self::NotEquals,
            "greater_than" | "gt" => Self::GreaterThan,
            "greater_than_or_equal" | "gte" => Self::GreaterThanOrEqual,
            "less_than" | "lt" => Self::LessThan,
            "less_than_or_equal" | "lte" => Self::LessThanOrEqual,
            "between" => Self::Between,
            "contains" => Self::Contains,
            "not_contains" => Self::NotContains,
            "starts_with" => Self::StartsWith,
            "ends_with" => Self::EndsWith,
            "regex" => Self::Regex,
            "in" => Self::In,
            "not_in" => Self::NotIn,
            "before" => Self::Before,
            "after" => Self::After,
            "is_empty" => Self::IsEmpty,
            "is_not_empty" => Self::IsNotEmpty,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl From<String> for Operator {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        match op {
            Operator::Unknown(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 条件组合方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicType {
    #[default]
    #[serde(alias = "and")]
    And,
    #[serde(alias = "or")]
    Or,
}

impl LogicType {
    /// 解析存储中的逻辑类型字符串（大小写不敏感）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Some(Self::And),
            "OR" => Some(Self::Or),
            _ => None,
        }
    }
}

impl fmt::Display for LogicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_aliases() {
        assert_eq!(Operator::from("eq"), Operator::Equals);
        assert_eq!(Operator::from("gte"), Operator::GreaterThanOrEqual);
        assert_eq!(Operator::from("greater_than"), Operator::GreaterThan);
    }

    #[test]
    fn test_unknown_operator_round_trips_its_name() {
        let op: Operator = serde_json::from_value(json!("fuzzy_match")).unwrap();
        assert_eq!(op, Operator::Unknown("fuzzy_match".to_string()));
        assert!(!op.is_known());
        assert_eq!(serde_json::to_value(&op).unwrap(), json!("fuzzy_match"));
    }

    #[test]
    fn test_logic_type_parse() {
        assert_eq!(LogicType::parse("and"), Some(LogicType::And));
        assert_eq!(LogicType::parse(" OR "), Some(LogicType::Or));
        assert_eq!(LogicType::parse("XOR"), None);
        let parsed: LogicType = serde_json::from_value(json!("or")).unwrap();
        assert_eq!(parsed, LogicType::Or);
    }
}
