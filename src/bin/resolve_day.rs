// Ops utility: resolve and persist operational statuses for one date, then
// regenerate call slots for every monitored installation.
//
// Usage:
//   cargo run --bin resolve_day -- [db_path] [date YYYY-MM-DD] [--verbose]
//
// Defaults: db path from GUARD_ROSTER_DB_PATH / user data dir, date = today.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveDate};
use tracing_subscriber::EnvFilter;

use guard_roster::api::{MonitoringApi, RosterApi};
use guard_roster::config::ConfigManager;
use guard_roster::db::{get_default_db_path, open_sqlite_connection, stamp_schema_version};
use guard_roster::engine::StaffingRepositories;
use guard_roster::i18n::{outcome_label, status_label};
use guard_roster::logging;

const ACTOR: &str = "resolve_day bin";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut positional = Vec::new();
    let mut verbose = false;
    for arg in std::env::args().skip(1) {
        if arg == "--verbose" {
            verbose = true;
        } else {
            positional.push(arg);
        }
    }

    if verbose {
        logging::init_with_filter(EnvFilter::new("debug"));
    } else {
        logging::init();
    }

    let db_path = positional
        .first()
        .cloned()
        .unwrap_or_else(get_default_db_path);
    let date = match positional.get(1) {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")?,
        None => Local::now().date_naive(),
    };

    let conn = Arc::new(Mutex::new(open_sqlite_connection(&db_path)?));
    {
        let c = conn.lock().unwrap();
        stamp_schema_version(&c)?;
    }

    let repos = StaffingRepositories::from_connection(conn.clone())?;
    let config_manager = Arc::new(ConfigManager::from_connection(conn)?);
    let roster = RosterApi::new(repos.clone());
    let monitoring = MonitoringApi::new(repos, config_manager);

    // 1. 整日解析落库
    let report = roster.apply_day(date, ACTOR).await?;
    println!(
        "db={} date={}: 解析落库 {} 个岗位, 失败 {}",
        db_path,
        date,
        report.applied,
        report.failures.len()
    );
    for f in &report.failures {
        println!("  失败 {}: {}", f.post_id, f.message);
    }
    for w in &report.warnings {
        println!("  警告 {}", w);
    }

    // 2. 状态分布摘要
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for status in roster.list_statuses(date)? {
        *counts.entry(status.operation_status.code()).or_default() += 1;
    }
    for (code, n) in &counts {
        println!("  {} x{} ({})", status_label(code), n, code);
    }

    // 3. 重新生成查哨时隙（默认生成天数取配置）
    let generated = monitoring.generate_all(date, None, ACTOR)?;
    println!(
        "时隙生成: 驻勤点 {}, 新增 {}",
        generated.installations, generated.total_inserted
    );
    for w in &generated.warnings {
        println!("  跳过 {}: {}", w.installation_id, w.message);
    }

    // 4. 当日查哨结果分布
    let mut outcome_counts: BTreeMap<&str, i64> = BTreeMap::new();
    for installation in monitoring.list_installations()? {
        let summary = monitoring.outcome_summary(&installation.installation_id, date, date, None)?;
        for (code, n) in [
            ("pending", summary.pending),
            ("successful", summary.successful),
            ("no_answer", summary.no_answer),
            ("busy", summary.busy),
            ("incident", summary.incident),
        ] {
            if n > 0 {
                *outcome_counts.entry(code).or_default() += n;
            }
        }
    }
    if !outcome_counts.is_empty() {
        println!("当日查哨结果分布:");
        for (code, n) in &outcome_counts {
            println!("  {} x{} ({})", outcome_label(code), n, code);
        }
    }

    Ok(())
}
