//! ERP 授权服务库
//! 角色与权限分配、权限解析与缓存、请求级权限检查

pub mod auth;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod telemetry;
