//! 条件评估器（操作符表）
//!
//! 给定字段值、操作符和字面量，确定性地计算比较结果。
//! 字段缺失（或为 null）时，除 `is_empty` / `is_not_empty` 外所有操作符均返回 false。

use crate::error::{Result, RuleError};
use crate::operators::Operator;
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde_json::Value;
use tracing::warn;

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估条件
    ///
    /// # Arguments
    /// * `field_value` - 解析得到的字段值
    /// * `operator` - 操作符
    /// * `expected_value` - 规则中定义的字面量
    pub fn evaluate(
        field_value: Option<&Value>,
        operator: &Operator,
        expected_value: &Value,
    ) -> Result<bool> {
        let present = field_value.filter(|v| !v.is_null());

        match (operator, present) {
            (Operator::IsEmpty, _) => Ok(Self::is_empty(field_value)),
            (Operator::IsNotEmpty, _) => Ok(Self::is_not_empty(field_value)),
            (_, None) => Ok(false),
            (Operator::Equals, Some(field)) => Ok(Self::strict_eq(field, expected_value)),
            (Operator::NotEquals, Some(field)) => Ok(!Self::strict_eq(field, expected_value)),
            (Operator::GreaterThan, Some(field)) => {
                Ok(Self::compare(field, expected_value, |a, b| a > b))
            }
            (Operator::GreaterThanOrEqual, Some(field)) => {
                Ok(Self::compare(field, expected_value, |a, b| a >= b))
            }
            (Operator::LessThan, Some(field)) => {
                Ok(Self::compare(field, expected_value, |a, b| a < b))
            }
            (Operator::LessThanOrEqual, Some(field)) => {
                Ok(Self::compare(field, expected_value, |a, b| a <= b))
            }
            (Operator::Between, Some(field)) => Self::between(field, expected_value),
            (Operator::Contains, Some(field)) => Ok(Self::contains(field, expected_value)),
            (Operator::NotContains, Some(field)) => Ok(!Self::contains(field, expected_value)),
            (Operator::StartsWith, Some(field)) => {
                Ok(Self::lower_text(field).starts_with(&Self::lower_text(expected_value)))
            }
            (Operator::EndsWith, Some(field)) => {
                Ok(Self::lower_text(field).ends_with(&Self::lower_text(expected_value)))
            }
            (Operator::Regex, Some(field)) => Self::regex_match(field, expected_value),
            (Operator::In, Some(field)) => Ok(Self::in_list(field, expected_value)),
            (Operator::NotIn, Some(field)) => Ok(!Self::in_list(field, expected_value)),
            (Operator::Before, Some(field)) => {
                Self::time_compare(field, expected_value, |a, b| a < b)
            }
            (Operator::After, Some(field)) => {
                Self::time_compare(field, expected_value, |a, b| a > b)
            }
            (Operator::Unknown(name), Some(_)) => {
                warn!(operator = %name, "未知的操作符，条件视为不满足");
                Ok(false)
            }
        }
    }

    /// 缺失、假值（null / false / 0 / NaN / 空串）、纯空白字符串、空数组或空对象
    fn is_empty(value: Option<&Value>) -> bool {
        match value {
            None | Some(Value::Null) => true,
            Some(Value::Bool(b)) => !b,
            Some(Value::Number(n)) => n.as_f64().is_none_or(|f| f == 0.0 || f.is_nan()),
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(Value::Array(arr)) => arr.is_empty(),
            Some(Value::Object(obj)) => obj.is_empty(),
        }
    }

    /// 值存在且有内容
    ///
    /// 与 `is_empty` 不是简单取反：`false` 和 `0` 是存在的值，因此两者都返回 true。
    fn is_not_empty(value: Option<&Value>) -> bool {
        match value {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(Value::Array(arr)) => !arr.is_empty(),
            Some(Value::Object(obj)) => !obj.is_empty(),
            Some(_) => true,
        }
    }

    /// 严格相等：数字按数值比较（100 == 100.0），其余类型不做转换
    fn strict_eq(field: &Value, expected: &Value) -> bool {
        match (field, expected) {
            (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => a == b,
            },
            _ => field == expected,
        }
    }

    /// 数值比较，两侧都先做数值转换，无法转换时结果为 false
    fn compare<F>(field: &Value, expected: &Value, cmp: F) -> bool
    where
        F: Fn(f64, f64) -> bool,
    {
        let (a, b) = (Self::to_number(field), Self::to_number(expected));
        if a.is_nan() || b.is_nan() {
            return false;
        }
        cmp(a, b)
    }

    /// 范围比较 (between)
    /// expected 应为 [min, max] 数组
    fn between(field: &Value, expected: &Value) -> Result<bool> {
        let arr = expected
            .as_array()
            .filter(|arr| arr.len() == 2)
            .ok_or_else(|| RuleError::TypeMismatch {
                expected: "array [min, max]".to_string(),
                actual: Self::type_name(expected).to_string(),
            })?;

        let value = Self::to_number(field);
        let (min, max) = (Self::to_number(&arr[0]), Self::to_number(&arr[1]));
        Ok(value >= min && value <= max)
    }

    /// 大小写不敏感的包含检查；字段为数组时检查是否有元素与字面量相同
    fn contains(field: &Value, expected: &Value) -> bool {
        let needle = Self::lower_text(expected);
        match field {
            Value::Array(items) => items.iter().any(|item| Self::lower_text(item) == needle),
            _ => Self::lower_text(field).contains(&needle),
        }
    }

    /// 列表成员检查，标量字面量视为单元素列表
    fn in_list(field: &Value, expected: &Value) -> bool {
        match expected {
            Value::Array(items) => items.iter().any(|item| Self::strict_eq(field, item)),
            scalar => Self::strict_eq(field, scalar),
        }
    }

    /// 正则表达式匹配
    fn regex_match(field: &Value, expected: &Value) -> Result<bool> {
        let pattern = expected.as_str().ok_or_else(|| RuleError::TypeMismatch {
            expected: "string (regex pattern)".to_string(),
            actual: Self::type_name(expected).to_string(),
        })?;

        let regex = Regex::new(pattern).map_err(|e| {
            RuleError::Evaluation(format!("无效的正则表达式 '{}': {}", pattern, e))
        })?;

        Ok(regex.is_match(&Self::text(field)))
    }

    /// 时间比较
    fn time_compare<F>(field: &Value, expected: &Value, cmp: F) -> Result<bool>
    where
        F: Fn(DateTime<Utc>, DateTime<Utc>) -> bool,
    {
        let field_time = Self::parse_datetime(field)?;
        let expected_time = Self::parse_datetime(expected)?;

        Ok(cmp(field_time, expected_time))
    }

    /// 解析日期时间（RFC 3339 或 YYYY-MM-DD）
    fn parse_datetime(value: &Value) -> Result<DateTime<Utc>> {
        let s = value.as_str().ok_or_else(|| RuleError::TypeMismatch {
            expected: "datetime string".to_string(),
            actual: Self::type_name(value).to_string(),
        })?;

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }

        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
            .ok_or_else(|| RuleError::Evaluation(format!("无法解析日期时间: '{}'", s)))
    }

    /// 数值转换：布尔值转 1/0，空白字符串与 null 转 0，无法解析时为 NaN
    fn to_number(value: &Value) -> f64 {
        match value {
            Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Null => 0.0,
            Value::Array(_) | Value::Object(_) => f64::NAN,
        }
    }

    /// 值的文本形式
    fn text(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Array(items) => items.iter().map(Self::text).collect::<Vec<_>>().join(","),
            other => other.to_string(),
        }
    }

    fn lower_text(value: &Value) -> String {
        Self::text(value).to_lowercase()
    }

    /// 获取值的类型名称
    fn type_name(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(field: Option<Value>, operator: Operator, expected: Value) -> bool {
        ConditionEvaluator::evaluate(field.as_ref(), &operator, &expected).unwrap()
    }

    #[test]
    fn test_equals_is_strict() {
        assert!(eval(Some(json!(100)), Operator::Equals, json!(100)));
        assert!(eval(Some(json!(100.0)), Operator::Equals, json!(100)));
        assert!(eval(Some(json!("hello")), Operator::Equals, json!("hello")));
        assert!(!eval(Some(json!("5")), Operator::Equals, json!(5)));
        assert!(!eval(Some(json!("Hello")), Operator::Equals, json!("hello")));
        assert!(eval(Some(json!("5")), Operator::NotEquals, json!(5)));
    }

    #[test]
    fn test_numeric_comparisons_coerce_both_sides() {
        assert!(eval(Some(json!(0.9)), Operator::GreaterThan, json!(0.8)));
        assert!(eval(Some(json!("0.9")), Operator::GreaterThan, json!("0.8")));
        assert!(eval(Some(json!(100)), Operator::GreaterThanOrEqual, json!(100)));
        assert!(eval(Some(json!(50)), Operator::LessThan, json!("100")));
        assert!(eval(Some(json!(100)), Operator::LessThanOrEqual, json!(100)));
        assert!(!eval(Some(json!("abc")), Operator::GreaterThan, json!(1)));
        assert!(!eval(Some(json!("abc")), Operator::LessThan, json!(1)));
    }

    #[test]
    fn test_between() {
        assert!(eval(Some(json!(50)), Operator::Between, json!([0, 100])));
        assert!(!eval(Some(json!(150)), Operator::Between, json!([0, 100])));
        let malformed =
            ConditionEvaluator::evaluate(Some(&json!(5)), &Operator::Between, &json!([1]));
        assert!(malformed.is_err());
    }

    #[test]
    fn test_string_operators_ignore_case() {
        assert!(eval(Some(json!("Hello World")), Operator::Contains, json!("WORLD")));
        assert!(eval(Some(json!("Hello World")), Operator::NotContains, json!("mars")));
        assert!(eval(Some(json!("Hello World")), Operator::StartsWith, json!("hello")));
        assert!(eval(Some(json!("Hello World")), Operator::EndsWith, json!("World")));
        assert!(!eval(Some(json!("Hello World")), Operator::EndsWith, json!("hello")));
    }

    #[test]
    fn test_contains_array_membership() {
        assert!(eval(Some(json!(["VIP", "frequent"])), Operator::Contains, json!("vip")));
        assert!(!eval(Some(json!(["vip"])), Operator::Contains, json!("frequent")));
    }

    #[test]
    fn test_is_empty() {
        assert!(eval(None, Operator::IsEmpty, json!(null)));
        assert!(eval(Some(json!(null)), Operator::IsEmpty, json!(null)));
        assert!(eval(Some(json!("")), Operator::IsEmpty, json!(null)));
        assert!(eval(Some(json!("   ")), Operator::IsEmpty, json!(null)));
        assert!(eval(Some(json!(0)), Operator::IsEmpty, json!(null)));
        assert!(eval(Some(json!(false)), Operator::IsEmpty, json!(null)));
        assert!(!eval(Some(json!("a")), Operator::IsEmpty, json!(null)));
    }

    #[test]
    fn test_is_not_empty_is_not_plain_negation() {
        assert!(!eval(None, Operator::IsNotEmpty, json!(null)));
        assert!(!eval(Some(json!("  ")), Operator::IsNotEmpty, json!(null)));
        assert!(eval(Some(json!("a")), Operator::IsNotEmpty, json!(null)));
        // 0 和 false 是假值但属于存在的值
        assert!(eval(Some(json!(0)), Operator::IsEmpty, json!(null)));
        assert!(eval(Some(json!(0)), Operator::IsNotEmpty, json!(null)));
        assert!(eval(Some(json!(false)), Operator::IsNotEmpty, json!(null)));
    }

    #[test]
    fn test_in_list() {
        assert!(eval(Some(json!(5)), Operator::In, json!([1, 5, 9])));
        assert!(!eval(Some(json!(5)), Operator::NotIn, json!([1, 5, 9])));
        assert!(!eval(Some(json!(4)), Operator::In, json!([1, 5, 9])));
        assert!(eval(Some(json!(4)), Operator::NotIn, json!([1, 5, 9])));
        // 标量字面量视为单元素列表
        assert!(eval(Some(json!("a")), Operator::In, json!("a")));
        assert!(eval(Some(json!("b")), Operator::NotIn, json!("a")));
    }

    #[test]
    fn test_regex() {
        assert!(eval(
            Some(json!("user@example.com")),
            Operator::Regex,
            json!(r"^[\w.-]+@[\w.-]+\.\w+$")
        ));
        let invalid =
            ConditionEvaluator::evaluate(Some(&json!("x")), &Operator::Regex, &json!("(unclosed"));
        assert!(invalid.is_err());
    }

    #[test]
    fn test_time_comparison() {
        assert!(eval(
            Some(json!("2024-01-15T10:00:00Z")),
            Operator::Before,
            json!("2024-01-20")
        ));
        assert!(eval(
            Some(json!("2024-01-20T10:00:00Z")),
            Operator::After,
            json!("2024-01-15T10:00:00Z")
        ));
    }

    #[test]
    fn test_absent_field_is_false_for_every_comparison() {
        let operators = [
            Operator::Equals,
            Operator::NotEquals,
            Operator::GreaterThan,
            Operator::GreaterThanOrEqual,
            Operator::LessThan,
            Operator::LessThanOrEqual,
            Operator::Between,
            Operator::Contains,
            Operator::NotContains,
            Operator::StartsWith,
            Operator::EndsWith,
            Operator::Regex,
            Operator::In,
            Operator::NotIn,
            Operator::Before,
            Operator::After,
        ];
        for op in operators {
            assert!(!eval(None, op.clone(), json!([1, 2])), "{op} on absent");
            assert!(!eval(Some(json!(null)), op.clone(), json!([1, 2])), "{op} on null");
        }
    }

    #[test]
    fn test_unknown_operator_is_false() {
        assert!(!eval(
            Some(json!("x")),
            Operator::Unknown("sounds_like".to_string()),
            json!("x")
        ));
        assert!(!eval(None, Operator::Unknown("sounds_like".to_string()), json!("x")));
    }

    #[test]
    fn test_empty_checks_accept_every_input_shape() {
        let inputs = [
            None,
            Some(json!(null)),
            Some(json!(true)),
            Some(json!(1.5)),
            Some(json!("text")),
            Some(json!([1])),
            Some(json!({"k": "v"})),
        ];
        for input in inputs {
            for op in [Operator::IsEmpty, Operator::IsNotEmpty] {
                assert!(
                    ConditionEvaluator::evaluate(input.as_ref(), &op, &json!(null)).is_ok(),
                    "{op} on {input:?}"
                );
            }
        }
        assert!(!eval(Some(json!({"k": "v"})), Operator::IsEmpty, json!(null)));
        assert!(eval(Some(json!([])), Operator::IsEmpty, json!(null)));
    }
}
