//! Permission domain models

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

static SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9_-]+$").unwrap());

/// Permission (immutable reference data)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Permission {
    pub id: Uuid,
    pub code: String,
    pub module: String,
    pub resource: String,
    pub action: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A validated `module.resource.action` code
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionCode {
    module: String,
    resource: String,
    action: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid permission code '{0}': expected module.resource.action")]
pub struct InvalidPermissionCode(pub String);

impl PermissionCode {
    pub fn parse(code: &str) -> Result<Self, InvalidPermissionCode> {
        let parts: Vec<&str> = code.split('.').collect();
        if parts.len() != 3 || !parts.iter().all(|p| SEGMENT.is_match(p)) {
            return Err(InvalidPermissionCode(code.to_string()));
        }

        Ok(Self {
            module: parts[0].to_string(),
            resource: parts[1].to_string(),
            action: parts[2].to_string(),
        })
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn action(&self) -> &str {
        &self.action
    }
}

impl fmt::Display for PermissionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.module, self.resource, self.action)
    }
}

/// Catalog entry used to seed the `permissions` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionDefinition {
    pub code: String,
    pub module: String,
    pub resource: String,
    pub action: String,
    pub description: String,
}

impl PermissionDefinition {
    pub fn new(code: &str, description: &str) -> Result<Self, InvalidPermissionCode> {
        let parsed = PermissionCode::parse(code)?;
        Ok(Self {
            code: parsed.to_string(),
            module: parsed.module,
            resource: parsed.resource,
            action: parsed.action,
            description: description.to_string(),
        })
    }
}

/// Permission listing filters
///
/// Unknown query keys are rejected rather than ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermissionQuery {
    pub module: Option<String>,
    pub resource: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

impl PermissionQuery {
    pub fn matches(&self, permission: &Permission) -> bool {
        (self.include_inactive || permission.is_active)
            && self.module.as_ref().map_or(true, |m| m == &permission.module)
            && self.resource.as_ref().map_or(true, |r| r == &permission.resource)
    }
}

/// 整体替换角色权限列表
#[derive(Debug, Deserialize)]
pub struct SetRolePermissionsRequest {
    pub permission_ids: Vec<Uuid>,
}

/// 直接授予用户权限
#[derive(Debug, Deserialize)]
pub struct GrantPermissionRequest {
    pub permission_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_code() {
        let code = PermissionCode::parse("finance.payment.approve").unwrap();
        assert_eq!(code.module(), "finance");
        assert_eq!(code.resource(), "payment");
        assert_eq!(code.action(), "approve");
        assert_eq!(code.to_string(), "finance.payment.approve");

        assert!(PermissionCode::parse("finance.cash-bank.create").is_ok());
        assert!(PermissionCode::parse("procurement.purchase_order.approve").is_ok());
    }

    #[test]
    fn test_parse_invalid_code() {
        assert!(PermissionCode::parse("finance.payment").is_err());
        assert!(PermissionCode::parse("a.b.c.d").is_err());
        assert!(PermissionCode::parse("finance..approve").is_err());
        assert!(PermissionCode::parse("Finance.Payment.Approve").is_err());
        assert!(PermissionCode::parse("").is_err());
    }

    #[test]
    fn test_query_rejects_unknown_keys() {
        let ok: Result<PermissionQuery, _> =
            serde_json::from_value(serde_json::json!({"module": "finance"}));
        assert!(ok.is_ok());

        let err: Result<PermissionQuery, _> =
            serde_json::from_value(serde_json::json!({"modul": "finance"}));
        assert!(err.is_err());
    }

    #[test]
    fn test_query_matches() {
        let permission = Permission {
            id: Uuid::new_v4(),
            code: "hr.employee.read".to_string(),
            module: "hr".to_string(),
            resource: "employee".to_string(),
            action: "read".to_string(),
            description: None,
            is_active: false,
            created_at: Utc::now(),
        };

        assert!(!PermissionQuery::default().matches(&permission));
        let query = PermissionQuery {
            module: Some("hr".to_string()),
            resource: None,
            include_inactive: true,
        };
        assert!(query.matches(&permission));
    }
}
