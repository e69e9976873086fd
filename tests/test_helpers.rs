// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、基础数据播种
// 说明: 各仓储自建表结构, 构建 StaffingRepositories 即完成建库
// ==========================================

use std::error::Error;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tempfile::NamedTempFile;

use guard_roster::domain::monitoring::{Installation, MonitoringConfig};
use guard_roster::domain::roster::{Guard, Post, PostAssignment};
use guard_roster::domain::types::{MonitoringMode, PlanBase};
use guard_roster::engine::StaffingRepositories;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    // 仓储聚合构造会逐表执行 ensure_table
    let _ = StaffingRepositories::new(&db_path)?;

    Ok((temp_file, db_path))
}

/// 在测试库上构建仓储聚合
pub fn build_repos(db_path: &str) -> StaffingRepositories {
    StaffingRepositories::new(db_path).expect("构建仓储聚合失败")
}

// ==========================================
// 日期/时刻快捷解析
// ==========================================

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("测试日期格式错误")
}

pub fn dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").expect("测试时刻格式错误")
}

pub fn time(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M:%S").expect("测试时间格式错误")
}

// ==========================================
// 基础数据播种
// ==========================================

pub fn seed_guard(repos: &StaffingRepositories, guard_id: &str, full_name: &str) -> Guard {
    let guard = Guard::new(guard_id.to_string(), full_name.to_string());
    repos.guard_repo.upsert(&guard).expect("播种保安员失败");
    guard
}

pub fn seed_post(
    repos: &StaffingRepositories,
    post_id: &str,
    installation_id: &str,
    name: &str,
) -> Post {
    let post = Post::new(
        post_id.to_string(),
        installation_id.to_string(),
        name.to_string(),
    );
    repos.post_repo.upsert(&post).expect("播种岗位失败");
    post
}

pub fn seed_installation(
    repos: &StaffingRepositories,
    installation_id: &str,
    name: &str,
    monitoring: MonitoringConfig,
) -> Installation {
    let now = dt("2026-03-01 08:00:00");
    let installation = Installation {
        installation_id: installation_id.to_string(),
        name: name.to_string(),
        phone: Some("021-0000000".to_string()),
        monitoring,
        created_at: now,
        updated_at: now,
    };
    repos
        .installation_repo
        .upsert(&installation)
        .expect("播种驻勤点失败");
    installation
}

/// 启用查哨的配置（日间/跨夜由起止时间决定）
pub fn monitored_config(start: &str, end: &str, interval_minutes: i64) -> MonitoringConfig {
    MonitoringConfig {
        enabled: true,
        interval_minutes,
        window_start: Some(time(start)),
        window_end: Some(time(end)),
        mode: MonitoringMode::Call,
        message_template: None,
    }
}

pub fn seed_assignment(
    repos: &StaffingRepositories,
    post_id: &str,
    day: NaiveDate,
    plan_base: PlanBase,
    guard_id: Option<&str>,
) -> PostAssignment {
    let assignment = PostAssignment::new(
        post_id.to_string(),
        day,
        plan_base,
        guard_id.map(|g| g.to_string()),
        "seed".to_string(),
    );
    repos
        .assignment_repo
        .upsert(&assignment)
        .expect("播种基础排班失败");
    assignment
}
