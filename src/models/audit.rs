//! Audit domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 审计操作类型（只追加，不修改）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    RoleCreated,
    RoleUpdated,
    RoleDeleted,
    PermissionGrantedToRole,
    PermissionRevokedFromRole,
    RoleAssignedToUser,
    RoleRevokedFromUser,
    UserPermissionGranted,
    UserPermissionRevoked,
}

impl AuditAction {
    pub const ALL: [AuditAction; 9] = [
        AuditAction::RoleCreated,
        AuditAction::RoleUpdated,
        AuditAction::RoleDeleted,
        AuditAction::PermissionGrantedToRole,
        AuditAction::PermissionRevokedFromRole,
        AuditAction::RoleAssignedToUser,
        AuditAction::RoleRevokedFromUser,
        AuditAction::UserPermissionGranted,
        AuditAction::UserPermissionRevoked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::RoleCreated => "role_created",
            AuditAction::RoleUpdated => "role_updated",
            AuditAction::RoleDeleted => "role_deleted",
            AuditAction::PermissionGrantedToRole => "permission_granted_to_role",
            AuditAction::PermissionRevokedFromRole => "permission_revoked_from_role",
            AuditAction::RoleAssignedToUser => "role_assigned_to_user",
            AuditAction::RoleRevokedFromUser => "role_revoked_from_user",
            AuditAction::UserPermissionGranted => "user_permission_granted",
            AuditAction::UserPermissionRevoked => "user_permission_revoked",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown audit action: {0}")]
pub struct UnknownAuditAction(String);

impl FromStr for AuditAction {
    type Err = UnknownAuditAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownAuditAction(s.to_string()))
    }
}

impl TryFrom<String> for AuditAction {
    type Error = UnknownAuditAction;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: Uuid,
    #[sqlx(try_from = "String")]
    pub action: AuditAction,
    pub actor_id: Option<Uuid>,
    pub target_user_id: Option<Uuid>,
    pub target_role_id: Option<Uuid>,
    pub target_permission_id: Option<Uuid>,
    pub details: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 待写入的审计条目
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub action: AuditAction,
    pub actor_id: Option<Uuid>,
    pub target_user_id: Option<Uuid>,
    pub target_role_id: Option<Uuid>,
    pub target_permission_id: Option<Uuid>,
    pub details: Option<String>,
    pub ip_address: Option<String>,
}

impl NewAuditEntry {
    pub fn new(action: AuditAction, actor_id: Option<Uuid>) -> Self {
        Self {
            action,
            actor_id,
            target_user_id: None,
            target_role_id: None,
            target_permission_id: None,
            details: None,
            ip_address: None,
        }
    }

    pub fn user(mut self, user_id: Uuid) -> Self {
        self.target_user_id = Some(user_id);
        self
    }

    pub fn role(mut self, role_id: Uuid) -> Self {
        self.target_role_id = Some(role_id);
        self
    }

    pub fn permission(mut self, permission_id: Uuid) -> Self {
        self.target_permission_id = Some(permission_id);
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn ip_address(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }
}

pub const DEFAULT_AUDIT_LIMIT: i64 = 50;
pub const MAX_AUDIT_LIMIT: i64 = 500;

/// Audit log filters
///
/// Unknown query keys are rejected rather than ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditQuery {
    pub actor_id: Option<Uuid>,
    pub target_user_id: Option<Uuid>,
    pub target_role_id: Option<Uuid>,
    /// 作为操作者或目标出现的用户
    pub involving_user: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl AuditQuery {
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_AUDIT_LIMIT)
            .clamp(1, MAX_AUDIT_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.actor_id.map_or(true, |id| entry.actor_id == Some(id))
            && self.target_user_id.map_or(true, |id| entry.target_user_id == Some(id))
            && self.target_role_id.map_or(true, |id| entry.target_role_id == Some(id))
            && self.involving_user.map_or(true, |id| {
                entry.actor_id == Some(id) || entry.target_user_id == Some(id)
            })
            && self.action.map_or(true, |a| entry.action == a)
            && self.since.map_or(true, |t| entry.created_at >= t)
            && self.until.map_or(true, |t| entry.created_at <= t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_round_trip() {
        for action in AuditAction::ALL {
            assert_eq!(action.as_str().parse::<AuditAction>().unwrap(), action);
            let json = serde_json::to_value(action).unwrap();
            assert_eq!(json, action.as_str());
        }
        assert!("role.create".parse::<AuditAction>().is_err());
    }

    #[test]
    fn test_query_limit_is_clamped() {
        let query = AuditQuery::default();
        assert_eq!(query.limit(), DEFAULT_AUDIT_LIMIT);
        assert_eq!(query.offset(), 0);

        let query = AuditQuery {
            limit: Some(10_000),
            offset: Some(-5),
            ..Default::default()
        };
        assert_eq!(query.limit(), MAX_AUDIT_LIMIT);
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn test_query_rejects_unknown_keys() {
        let err: Result<AuditQuery, _> =
            serde_json::from_value(serde_json::json!({"user": "someone"}));
        assert!(err.is_err());
    }

    #[test]
    fn test_involving_user_matches_actor_or_target() {
        let user = Uuid::new_v4();
        let entry = AuditEntry {
            id: Uuid::new_v4(),
            action: AuditAction::RoleAssignedToUser,
            actor_id: None,
            target_user_id: Some(user),
            target_role_id: Some(Uuid::new_v4()),
            target_permission_id: None,
            details: None,
            ip_address: None,
            created_at: Utc::now(),
        };

        let query = AuditQuery {
            involving_user: Some(user),
            ..Default::default()
        };
        assert!(query.matches(&entry));

        let query = AuditQuery {
            involving_user: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert!(!query.matches(&entry));
    }
}
