//! 字段解析
//!
//! 按以下顺序查找字段值：
//! 1. 输入数据上的同名属性（包括含 `.` 的字面键名）
//! 2. 执行上下文 metadata 上的同名属性
//! 3. 按 `.` 分隔的路径逐级遍历输入数据

use crate::models::ExecutionContext;
use serde_json::Value;

/// 字段解析器
pub struct FieldResolver;

impl FieldResolver {
    /// 解析字段路径，任何缺失都返回 `None` 而不是报错
    pub fn resolve<'a>(
        path: &str,
        data: &'a Value,
        context: &'a ExecutionContext,
    ) -> Option<&'a Value> {
        if let Some(value) = data.as_object().and_then(|map| map.get(path)) {
            return Some(value);
        }

        if let Some(value) = context.metadata.get(path) {
            return Some(value);
        }

        if path.contains('.') {
            return Self::traverse(path, data);
        }

        None
    }

    /// 逐级遍历点号路径，中间节点缺失或不是容器时立即返回 `None`
    fn traverse<'a>(path: &str, data: &'a Value) -> Option<&'a Value> {
        let mut current = data;

        for segment in path.split('.') {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                // 支持数组索引访问，如 "items.0.name"
                Value::Array(arr) => arr.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }

        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_data() -> Value {
        json!({
            "riskScore": 0.9,
            "mission": {
                "status": "active",
                "owner": {"name": "Ada"}
            },
            "signals": [
                {"kind": "login", "count": 3}
            ],
            "a.b": "literal-key"
        })
    }

    #[test]
    fn test_direct_property() {
        let data = sample_data();
        let ctx = ExecutionContext::new();
        assert_eq!(
            FieldResolver::resolve("riskScore", &data, &ctx),
            Some(&json!(0.9))
        );
    }

    #[test]
    fn test_literal_dotted_key_wins_over_traversal() {
        let data = sample_data();
        let ctx = ExecutionContext::new();
        assert_eq!(
            FieldResolver::resolve("a.b", &data, &ctx),
            Some(&json!("literal-key"))
        );
    }

    #[test]
    fn test_metadata_fallback() {
        let data = sample_data();
        let ctx = ExecutionContext::new().with_metadata("region", "emea");
        assert_eq!(
            FieldResolver::resolve("region", &data, &ctx),
            Some(&json!("emea"))
        );
    }

    #[test]
    fn test_data_takes_precedence_over_metadata() {
        let data = sample_data();
        let ctx = ExecutionContext::new().with_metadata("riskScore", 0.1);
        assert_eq!(
            FieldResolver::resolve("riskScore", &data, &ctx),
            Some(&json!(0.9))
        );
    }

    #[test]
    fn test_nested_path() {
        let data = sample_data();
        let ctx = ExecutionContext::new();
        assert_eq!(
            FieldResolver::resolve("mission.owner.name", &data, &ctx),
            Some(&json!("Ada"))
        );
        assert_eq!(
            FieldResolver::resolve("signals.0.count", &data, &ctx),
            Some(&json!(3))
        );
    }

    #[test]
    fn test_missing_segments_short_circuit() {
        let data = sample_data();
        let ctx = ExecutionContext::new();
        assert_eq!(FieldResolver::resolve("mission.missing.name", &data, &ctx), None);
        // 中间节点不是对象
        assert_eq!(FieldResolver::resolve("riskScore.value", &data, &ctx), None);
        assert_eq!(FieldResolver::resolve("nonexistent", &data, &ctx), None);
    }

    #[test]
    fn test_non_object_payload() {
        let data = json!("just a string");
        let ctx = ExecutionContext::new();
        assert_eq!(FieldResolver::resolve("anything", &data, &ctx), None);
    }
}
