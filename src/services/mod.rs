//! Business logic services layer

pub mod audit_service;
pub mod authorization_service;
pub mod clock;
pub mod invalidation;
pub mod resolver;

pub use audit_service::AuditService;
pub use authorization_service::{Actor, AuthorizationService, RoleDetail};
pub use clock::{Clock, ManualClock, SystemClock};
pub use resolver::PermissionResolver;
