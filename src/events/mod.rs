//! 审计事件分发
//!
//! 按 `AuditAction` 标签注册处理函数，在进程组装阶段通过 `EventRegistryBuilder`
//! 一次性构建，之后不可修改。同一标签的处理函数按注册顺序执行。

use crate::models::audit::{AuditAction, AuditEntry};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub type EventHandler = Arc<dyn Fn(&AuditEntry) + Send + Sync>;

#[derive(Default, Clone)]
pub struct EventRegistry {
    handlers: HashMap<AuditAction, Vec<EventHandler>>,
}

impl EventRegistry {
    pub fn builder() -> EventRegistryBuilder {
        EventRegistryBuilder::default()
    }

    /// 空注册表
    pub fn empty() -> Self {
        Self::default()
    }

    /// 调用该条目动作对应的处理函数，返回调用数量
    pub fn dispatch(&self, entry: &AuditEntry) -> usize {
        let Some(handlers) = self.handlers.get(&entry.action) else {
            return 0;
        };
        for handler in handlers {
            handler(entry);
        }
        handlers.len()
    }

    pub fn handler_count(&self, action: AuditAction) -> usize {
        self.handlers.get(&action).map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&str, usize> = self
            .handlers
            .iter()
            .map(|(action, handlers)| (action.as_str(), handlers.len()))
            .collect();
        f.debug_struct("EventRegistry").field("handlers", &counts).finish()
    }
}

#[derive(Default)]
pub struct EventRegistryBuilder {
    handlers: HashMap<AuditAction, Vec<EventHandler>>,
}

impl EventRegistryBuilder {
    pub fn on<F>(mut self, action: AuditAction, handler: F) -> Self
    where
        F: Fn(&AuditEntry) + Send + Sync + 'static,
    {
        self.handlers.entry(action).or_default().push(Arc::new(handler));
        self
    }

    /// 为多个动作注册同一处理函数
    pub fn on_each<F>(mut self, actions: &[AuditAction], handler: F) -> Self
    where
        F: Fn(&AuditEntry) + Send + Sync + 'static,
    {
        let handler: EventHandler = Arc::new(handler);
        for action in actions {
            self.handlers.entry(*action).or_default().push(handler.clone());
        }
        self
    }

    pub fn build(self) -> EventRegistry {
        EventRegistry {
            handlers: self.handlers,
        }
    }
}

/// 默认注册表：把每条审计记录写入日志
pub fn default_registry() -> EventRegistry {
    EventRegistry::builder()
        .on_each(&AuditAction::ALL, |entry| {
            tracing::info!(
                action = %entry.action,
                actor_id = ?entry.actor_id,
                target_user_id = ?entry.target_user_id,
                target_role_id = ?entry.target_role_id,
                target_permission_id = ?entry.target_permission_id,
                "Authorization change recorded"
            );
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;
    use uuid::Uuid;

    fn entry(action: AuditAction) -> AuditEntry {
        AuditEntry {
            id: Uuid::new_v4(),
            action,
            actor_id: None,
            target_user_id: None,
            target_role_id: None,
            target_permission_id: None,
            details: None,
            ip_address: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (first, second) = (seen.clone(), seen.clone());

        let registry = EventRegistry::builder()
            .on(AuditAction::RoleDeleted, move |_| first.lock().unwrap().push("first"))
            .on(AuditAction::RoleDeleted, move |_| second.lock().unwrap().push("second"))
            .build();

        assert_eq!(registry.dispatch(&entry(AuditAction::RoleDeleted)), 2);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_dispatch_is_keyed_by_action() {
        let registry = EventRegistry::builder()
            .on(AuditAction::RoleCreated, |_| {})
            .build();

        assert_eq!(registry.dispatch(&entry(AuditAction::RoleUpdated)), 0);
        assert_eq!(registry.handler_count(AuditAction::RoleCreated), 1);
    }

    #[test]
    fn test_default_registry_covers_every_action() {
        let registry = default_registry();
        for action in AuditAction::ALL {
            assert_eq!(registry.handler_count(action), 1);
        }
    }
}
