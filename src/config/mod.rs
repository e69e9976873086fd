// ==========================================
// 安保驻勤排班系统 - 配置层
// ==========================================
// 职责: 运行参数管理（逾期阈值、生成天数等）
// 存储: config_kv 表
// ==========================================

pub mod config_manager;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
