//! Resolved permission set (缓存的派生数据)
//!
//! `UserPermissionSet` 由解析器在缓存未命中时整体重建，从不局部修补。

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// 达到该等级的角色授予超级管理员能力
pub const SUPERADMIN_LEVEL: i32 = 99;

/// 用户的完整权限集合
///
/// `permissions` 使用有序集合，保证相同输入序列化后字节一致。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPermissionSet {
    pub user_id: Uuid,
    pub permissions: BTreeSet<String>,
    pub roles: Vec<String>,
    pub max_level: i32,
    pub is_superadmin: bool,
}

impl UserPermissionSet {
    /// 创建空权限集合（默认拒绝）
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            permissions: BTreeSet::new(),
            roles: Vec::new(),
            max_level: 0,
            is_superadmin: false,
        }
    }

    /// 记录一个有效的角色
    pub fn add_role(&mut self, name: &str, level: i32, grants_superadmin: bool) {
        self.roles.push(name.to_string());
        if level > self.max_level {
            self.max_level = level;
        }
        if grants_superadmin || level >= SUPERADMIN_LEVEL {
            self.is_superadmin = true;
        }
    }

    /// 记录一个权限编码（重复添加无副作用）
    pub fn add_permission(&mut self, code: &str) {
        self.permissions.insert(code.to_string());
    }

    pub fn has_permission(&self, code: &str) -> bool {
        self.is_superadmin || self.permissions.contains(code)
    }

    pub fn has_any_permission<S: AsRef<str>>(&self, codes: &[S]) -> bool {
        self.is_superadmin || codes.iter().any(|c| self.permissions.contains(c.as_ref()))
    }

    pub fn has_all_permissions<S: AsRef<str>>(&self, codes: &[S]) -> bool {
        self.is_superadmin || codes.iter().all(|c| self.permissions.contains(c.as_ref()))
    }

    /// 模块访问：持有任意以 `"<module>."` 开头的权限编码
    pub fn has_module_access(&self, module: &str) -> bool {
        if self.is_superadmin {
            return true;
        }
        let prefix = format!("{}.", module);
        self.permissions
            .range(prefix.clone()..)
            .next()
            .is_some_and(|code| code.starts_with(&prefix))
    }

    pub fn has_min_level(&self, level: i32) -> bool {
        self.is_superadmin || self.max_level >= level
    }

    /// 是否满足路由要求
    pub fn satisfies(&self, requirement: &PermissionRequirement) -> bool {
        match requirement {
            PermissionRequirement::Permission(code) => self.has_permission(code),
            PermissionRequirement::AnyOf(codes) => self.has_any_permission(codes),
            PermissionRequirement::Module(module) => self.has_module_access(module),
            PermissionRequirement::MinLevel(level) => self.has_min_level(*level),
        }
    }
}

/// 路由所需权限
///
/// 拒绝响应中以 `{"type": ..., "value": ...}` 的形式返回给客户端。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PermissionRequirement {
    Permission(String),
    AnyOf(Vec<String>),
    Module(String),
    MinLevel(i32),
}

impl PermissionRequirement {
    pub fn permission(code: &str) -> Self {
        Self::Permission(code.to_string())
    }

    pub fn any_of(codes: &[&str]) -> Self {
        Self::AnyOf(codes.iter().map(|c| c.to_string()).collect())
    }

    pub fn module(module: &str) -> Self {
        Self::Module(module.to_string())
    }

    pub fn min_level(level: i32) -> Self {
        Self::MinLevel(level)
    }
}

impl fmt::Display for PermissionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permission(code) => write!(f, "{}", code),
            Self::AnyOf(codes) => write!(f, "any of [{}]", codes.join(", ")),
            Self::Module(module) => write!(f, "module {}", module),
            Self::MinLevel(level) => write!(f, "role level >= {}", level),
        }
    }
}
