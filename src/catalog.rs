//! 内置权限目录
//! 服务自身需要的 rbac.* 权限以及 ERP 业务模块的示例权限

use crate::models::permission::{InvalidPermissionCode, PermissionDefinition};
use std::collections::BTreeMap;

/// (code, description)
const BUILTIN: &[(&str, &str)] = &[
    // RBAC 管理
    ("rbac.role.read", "View roles and their permissions"),
    ("rbac.role.create", "Create roles"),
    ("rbac.role.update", "Update roles and their permission lists"),
    ("rbac.role.delete", "Delete non-system roles"),
    ("rbac.permission.read", "View the permission catalog"),
    ("rbac.user_role.read", "View role assignments of a user"),
    ("rbac.user_role.assign", "Assign roles to users"),
    ("rbac.user_role.revoke", "Revoke roles from users"),
    ("rbac.user_permission.read", "View direct permission grants of a user"),
    ("rbac.user_permission.grant", "Grant permissions directly to users"),
    ("rbac.user_permission.revoke", "Revoke direct permission grants"),
    ("rbac.audit.read", "View the authorization audit log"),
    // 财务
    ("finance.journal.read", "View journal entries"),
    ("finance.journal.create", "Create journal entries"),
    ("finance.journal.post", "Post journal entries to the ledger"),
    ("finance.payment.read", "View payments"),
    ("finance.payment.create", "Create payments"),
    ("finance.payment.approve", "Approve payments"),
    ("finance.cash-bank.read", "View cash and bank accounts"),
    // 采购
    ("procurement.purchase_order.read", "View purchase orders"),
    ("procurement.purchase_order.create", "Create purchase orders"),
    ("procurement.purchase_order.approve", "Approve purchase orders"),
    ("procurement.purchase_order.delete", "Delete purchase orders"),
    ("procurement.supplier.read", "View suppliers"),
    // 人事
    ("hr.employee.read", "View employees"),
    ("hr.employee.update", "Update employee records"),
    ("hr.payroll.read", "View payroll"),
    ("hr.payroll.process", "Process payroll"),
    // 生产
    ("production.work_order.read", "View work orders"),
    ("production.work_order.create", "Create work orders"),
    ("production.work_order.release", "Release work orders to the shop floor"),
    // 库存
    ("inventory.stock.read", "View stock levels"),
    ("inventory.stock.adjust", "Adjust stock levels"),
    ("inventory.transfer.create", "Create stock transfers"),
    // 主数据
    ("masterdata.product.read", "View products"),
    ("masterdata.product.update", "Update products"),
    ("masterdata.customer.read", "View customers"),
];

/// 权限目录（运行期不可变）
#[derive(Debug, Clone)]
pub struct PermissionCatalog {
    definitions: BTreeMap<String, PermissionDefinition>,
}

impl PermissionCatalog {
    pub fn new(
        entries: &[(&str, &str)],
    ) -> Result<Self, InvalidPermissionCode> {
        let mut definitions = BTreeMap::new();
        for (code, description) in entries {
            let def = PermissionDefinition::new(code, description)?;
            definitions.insert(def.code.clone(), def);
        }
        Ok(Self { definitions })
    }

    /// 内置目录；任何非法代码都使加载失败
    pub fn builtin() -> Result<Self, InvalidPermissionCode> {
        Self::new(BUILTIN)
    }

    pub fn get(&self, code: &str) -> Option<&PermissionDefinition> {
        self.definitions.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.definitions.contains_key(code)
    }

    /// 所有模块名（去重、有序）
    pub fn modules(&self) -> Vec<&str> {
        let mut modules: Vec<&str> = self.definitions.values().map(|d| d.module.as_str()).collect();
        modules.dedup();
        modules
    }

    pub fn by_module<'a>(&'a self, module: &'a str) -> impl Iterator<Item = &'a PermissionDefinition> + 'a {
        self.definitions.values().filter(move |d| d.module == module)
    }

    pub fn definitions(&self) -> Vec<PermissionDefinition> {
        self.definitions.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
