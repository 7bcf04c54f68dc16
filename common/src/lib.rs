//! 基金查询服务公共模块
//!
//! 提供各服务共享的基础设施：
//! - 配置加载
//! - 统一错误类型与 HTTP 映射
//! - 统一响应格式
//! - 请求 ID 中间件
//! - 请求模型与 SQL 校验

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod response;
pub mod utils;
