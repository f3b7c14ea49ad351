//! 测试用的标准样例数据

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;

/// 样例数据类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleCategory {
    Mission,
    Entity,
    Incident,
    Transaction,
    Signal,
}

impl SampleCategory {
    pub const ALL: [SampleCategory; 5] = [
        Self::Mission,
        Self::Entity,
        Self::Incident,
        Self::Transaction,
        Self::Signal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mission => "mission",
            Self::Entity => "entity",
            Self::Incident => "incident",
            Self::Transaction => "transaction",
            Self::Signal => "signal",
        }
    }

    /// 该类别的标准样例数据
    pub fn payload(&self) -> Value {
        match self {
            Self::Mission => json!({
                "id": "mission-001",
                "name": "Northern corridor survey",
                "status": "active",
                "priority": "high",
                "riskScore": 0.85,
                "progress": 45,
                "assignedAgents": ["agent-007", "agent-011"],
                "startDate": "2025-01-15T08:00:00Z",
                "endDate": "2025-03-31T18:00:00Z",
                "location": {"region": "north", "country": "NO"}
            }),
            Self::Entity => json!({
                "id": "entity-042",
                "type": "organization",
                "name": "Acme Holdings",
                "status": "under_review",
                "riskScore": 0.72,
                "riskLevel": "medium",
                "tags": ["watchlist", "cross-border"],
                "createdAt": "2024-11-02T10:30:00Z",
                "address": {"city": "Rotterdam", "country": "NL"}
            }),
            Self::Incident => json!({
                "id": "incident-913",
                "title": "Unusual access pattern",
                "severity": "high",
                "status": "open",
                "category": "security",
                "reportedBy": "agent-011",
                "affectedEntities": ["entity-042"],
                "occurredAt": "2025-02-10T22:14:00Z"
            }),
            Self::Transaction => json!({
                "id": "txn-55021",
                "amount": 125000,
                "currency": "USD",
                "type": "wire_transfer",
                "status": "pending",
                "sender": {"id": "entity-042", "country": "NL"},
                "receiver": {"id": "entity-108", "country": "PA"},
                "timestamp": "2025-02-11T09:45:00Z",
                "flags": []
            }),
            Self::Signal => json!({
                "id": "signal-7781",
                "source": "osint",
                "type": "keyword_match",
                "confidence": 0.93,
                "keywords": ["sanctions", "shell company"],
                "entityId": "entity-042",
                "detectedAt": "2025-02-11T07:20:00Z",
                "verified": false
            }),
        }
    }
}

impl FromStr for SampleCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("未知的样例类别: {}", s))
    }
}

impl fmt::Display for SampleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
