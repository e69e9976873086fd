// ==========================================
// 查哨监控 API 集成测试
// ==========================================
// 职责: 验证监控读侧（看板/汇总/标记视图）、
//       驻勤点维护入口与并发录入的唯一赢家语义
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod monitoring_api_test {
    use std::sync::Arc;
    use std::thread;

    use guard_roster::api::{ApiError, MonitoringApi, RosterApi};
    use guard_roster::config::{config_keys, ConfigManager};
    use guard_roster::domain::monitoring::CallSlotView;
    use guard_roster::domain::types::{CallChannel, CallOutcome, PlanBase};
    use guard_roster::engine::{RecordOutcomeRequest, StaffingRepositories};
    use tempfile::NamedTempFile;

    use crate::test_helpers::{
        build_repos, create_test_db, date, dt, monitored_config, seed_assignment,
        seed_guard, seed_installation, seed_post,
    };

    const ACTOR: &str = "op-a";

    fn setup() -> (NamedTempFile, StaffingRepositories, Arc<ConfigManager>, MonitoringApi) {
        let (temp_file, db_path) = create_test_db().unwrap();
        let repos = build_repos(&db_path);
        let config_manager = Arc::new(ConfigManager::new(&db_path).expect("配置管理器"));
        let api = MonitoringApi::new(repos.clone(), config_manager.clone());
        (temp_file, repos, config_manager, api)
    }

    /// 10:00-13:00 整点查哨, 单日4个时隙
    fn seed_morning_slots(repos: &StaffingRepositories, api: &MonitoringApi) -> Vec<String> {
        seed_installation(
            repos,
            "INST-01",
            "滨江仓库",
            monitored_config("10:00:00", "13:00:00", 60),
        );
        let report = api
            .generate_slots("INST-01", date("2026-03-10"), Some(0), ACTOR)
            .unwrap();
        assert_eq!(report.inserted, 4);
        report.slots.iter().map(|s| s.slot_id.clone()).collect()
    }

    fn slot_at<'a>(views: &'a [CallSlotView], when: &str) -> &'a CallSlotView {
        views
            .iter()
            .find(|v| v.slot.scheduled_for == dt(when))
            .unwrap_or_else(|| panic!("缺少 {} 的时隙", when))
    }

    fn record(api: &MonitoringApi, slot_id: &str, executed_at: &str, by: &str) {
        api.record_call(RecordOutcomeRequest {
            slot_id: slot_id.to_string(),
            outcome: CallOutcome::Successful,
            channel: Some(CallChannel::Phone),
            executed_at: Some(dt(executed_at)),
            observations: None,
            recorded_by: by.to_string(),
        })
        .unwrap();
    }

    fn find_slot_id(repos: &StaffingRepositories, when: &str) -> String {
        let slots = repos
            .slot_repo
            .list_range("INST-01", dt("2026-03-10 00:00:00"), dt("2026-03-12 00:00:00"))
            .unwrap();
        slots
            .iter()
            .find(|s| s.scheduled_for == dt(when))
            .unwrap_or_else(|| panic!("缺少 {} 的时隙", when))
            .slot_id
            .clone()
    }

    // ==========================================
    // 并发录入: 恰好一个赢家
    // ==========================================

    #[test]
    fn test_concurrent_record_exactly_one_wins() {
        let (_tmp, repos, _config, api) = setup();
        seed_morning_slots(&repos, &api);
        let slot_id = find_slot_id(&repos, "2026-03-10 10:00:00");

        let api = Arc::new(api);
        let mut handles = Vec::new();
        for (operator, outcome) in [("op-a", CallOutcome::Successful), ("op-b", CallOutcome::NoAnswer)] {
            let api = api.clone();
            let slot_id = slot_id.clone();
            handles.push(thread::spawn(move || {
                api.record_call(RecordOutcomeRequest {
                    slot_id,
                    outcome,
                    channel: Some(CallChannel::Phone),
                    executed_at: Some(dt("2026-03-10 10:05:00")),
                    observations: None,
                    recorded_by: operator.to_string(),
                })
            }));
        }

        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("线程未崩溃"))
            .collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "并发录入必须恰好一个成功");

        let loser = results.into_iter().find(|r| r.is_err()).unwrap();
        match loser {
            Err(ApiError::InvalidState { .. }) | Err(ApiError::IntegrityConflict(_)) => {}
            other => panic!("输家应拿到状态冲突类错误, 实际 {:?}", other),
        }

        // 落库行等于赢家的写入, 不得混合两人的字段
        let stored = repos.slot_repo.find_by_id(&slot_id).unwrap().unwrap();
        match stored.outcome {
            CallOutcome::Successful => {
                assert_eq!(stored.recorded_by.as_deref(), Some("op-a"))
            }
            CallOutcome::NoAnswer => {
                assert_eq!(stored.recorded_by.as_deref(), Some("op-b"))
            }
            other => panic!("意外结果 {:?}", other),
        }
    }

    // ==========================================
    // 待办看板
    // ==========================================

    #[tokio::test]
    async fn test_due_board_joins_slots_and_post_statuses() {
        let (_tmp, repos, _config, api) = setup();
        seed_morning_slots(&repos, &api);
        seed_installation(
            &repos,
            "INST-02",
            "空看板驻勤点",
            monitored_config("10:00:00", "13:00:00", 60),
        );

        // 该点一个岗位的当日状态: 未到岗未补班
        seed_post(&repos, "P1", "INST-01", "一号岗");
        seed_guard(&repos, "G1", "赵卫东");
        seed_assignment(&repos, "P1", date("2026-03-10"), PlanBase::Planned, Some("G1"));
        let roster = RosterApi::new(repos.clone());
        roster
            .apply_status("P1", date("2026-03-10"), ACTOR)
            .await
            .unwrap();

        // 10:00 已打, 11:00/12:00 到点未打, 13:00 未到点
        record(&api, &find_slot_id(&repos, "2026-03-10 10:00:00"), "2026-03-10 10:02:00", ACTOR);

        let board = api.due_board(Some(dt("2026-03-10 12:15:00"))).unwrap();
        assert_eq!(board.entries.len(), 2, "启用查哨的驻勤点都有看板项");

        let entry = board
            .entries
            .iter()
            .find(|e| e.installation_id == "INST-01")
            .expect("INST-01 看板项");
        assert_eq!(entry.due_slots.len(), 2);
        assert!(slot_at(&entry.due_slots, "2026-03-10 11:00:00").is_urgent, "逾期75分钟");
        assert!(!slot_at(&entry.due_slots, "2026-03-10 12:00:00").is_urgent, "逾期15分钟");
        assert_eq!(entry.post_statuses.len(), 1);
        assert_eq!(entry.post_statuses[0].operation_status.code(), "absence_unfilled");

        let empty = board
            .entries
            .iter()
            .find(|e| e.installation_id == "INST-02")
            .expect("INST-02 看板项");
        assert!(empty.due_slots.is_empty());
        assert!(empty.post_statuses.is_empty());
    }

    // ==========================================
    // 结果汇总
    // ==========================================

    #[test]
    fn test_outcome_summary_counts_and_urgent() {
        let (_tmp, repos, _config, api) = setup();
        seed_morning_slots(&repos, &api);
        record(&api, &find_slot_id(&repos, "2026-03-10 11:00:00"), "2026-03-10 11:03:00", ACTOR);

        // now=12:15, 阈值30分钟 → 截点11:45: 只有10:00仍待执行且已过截点
        let summary = api
            .outcome_summary(
                "INST-01",
                date("2026-03-10"),
                date("2026-03-10"),
                Some(dt("2026-03-10 12:15:00")),
            )
            .unwrap();
        assert_eq!(summary.pending, 3);
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.no_answer, 0);
        assert_eq!(summary.busy, 0);
        assert_eq!(summary.incident, 0);
        assert_eq!(summary.urgent, 1);
    }

    #[test]
    fn test_outcome_summary_rejects_inverted_range() {
        let (_tmp, _repos, _config, api) = setup();
        let err = api
            .outcome_summary("INST-01", date("2026-03-11"), date("2026-03-10"), None)
            .expect_err("区间倒置必须拒绝");
        assert!(matches!(err, ApiError::InvalidInput(_)), "实际 {:?}", err);
    }

    // ==========================================
    // 标记视图
    // ==========================================

    #[test]
    fn test_list_slots_flags_current_upcoming_urgent() {
        let (_tmp, repos, _config, api) = setup();
        seed_installation(
            &repos,
            "INST-01",
            "滨江仓库",
            monitored_config("21:00:00", "07:00:00", 60),
        );
        api.generate_slots("INST-01", date("2026-03-10"), Some(0), ACTOR)
            .unwrap();

        let views = api
            .list_slots(
                "INST-01",
                dt("2026-03-10 00:00:00"),
                dt("2026-03-11 07:00:00"),
                Some(dt("2026-03-10 23:15:00")),
            )
            .unwrap();

        let at_2300 = slot_at(&views, "2026-03-10 23:00:00");
        assert!(at_2300.is_current, "同一钟点 → 当前");
        assert!(!at_2300.is_upcoming);
        assert!(!at_2300.is_urgent, "逾期15分钟未过阈值");

        let at_0000 = slot_at(&views, "2026-03-11 00:00:00");
        assert!(at_0000.is_upcoming, "计划时刻在未来");
        assert!(!at_0000.is_current);

        let at_2200 = slot_at(&views, "2026-03-10 22:00:00");
        assert!(at_2200.is_urgent, "逾期75分钟且待执行");
    }

    #[test]
    fn test_list_slots_rejects_inverted_range() {
        let (_tmp, _repos, _config, api) = setup();
        let err = api
            .list_slots(
                "INST-01",
                dt("2026-03-10 12:00:00"),
                dt("2026-03-10 08:00:00"),
                None,
            )
            .expect_err("区间倒置必须拒绝");
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[test]
    fn test_urgent_threshold_reads_config() {
        let (_tmp, repos, config_manager, api) = setup();
        seed_morning_slots(&repos, &api);
        config_manager
            .set_config_value(config_keys::URGENT_AFTER_MINUTES, "45")
            .unwrap();
        let slot_id = find_slot_id(&repos, "2026-03-10 10:00:00");

        let view = api
            .get_slot(&slot_id, Some(dt("2026-03-10 10:40:00")))
            .unwrap();
        assert!(!view.is_urgent, "40分钟未过45分钟阈值");

        let view = api
            .get_slot(&slot_id, Some(dt("2026-03-10 10:50:00")))
            .unwrap();
        assert!(view.is_urgent);
    }

    // ==========================================
    // 驻勤点维护
    // ==========================================

    #[test]
    fn test_upsert_installation_validates_and_audits() {
        let (_tmp, repos, _config, api) = setup();

        let mut installation = seed_installation(
            &repos,
            "INST-10",
            "城东油库",
            monitored_config("08:00:00", "20:00:00", 120),
        );

        installation.name = "  ".to_string();
        let err = api
            .upsert_installation(installation.clone(), ACTOR)
            .expect_err("空名称必须拒绝");
        assert!(matches!(err, ApiError::InvalidInput(_)));

        installation.name = "城东油库(更名)".to_string();
        let saved = api.upsert_installation(installation, ACTOR).unwrap();
        assert_eq!(saved.name, "城东油库(更名)");

        let logs = repos.action_log_repo.list_recent(10).unwrap();
        assert!(logs.iter().any(|l| {
            l.action_type == "UpsertInstallation"
                && l.installation_id.as_deref() == Some("INST-10")
        }));
    }

    #[test]
    fn test_update_monitoring_config_only_touches_monitoring() {
        let (_tmp, repos, _config, api) = setup();
        seed_installation(
            &repos,
            "INST-10",
            "城东油库",
            monitored_config("08:00:00", "20:00:00", 120),
        );

        let updated = api
            .update_monitoring_config(
                "INST-10",
                monitored_config("09:00:00", "18:00:00", 90),
                ACTOR,
            )
            .unwrap();
        assert_eq!(updated.name, "城东油库", "主数据不动");
        assert_eq!(updated.monitoring.interval_minutes, 90);
    }

    #[test]
    fn test_get_installation_missing_is_not_found() {
        let (_tmp, _repos, _config, api) = setup();
        let err = api.get_installation("INST-404").expect_err("未登记");
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
