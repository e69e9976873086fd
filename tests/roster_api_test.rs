// ==========================================
// 排班与状态 API 集成测试
// ==========================================
// 职责: 验证写入口的"写入后重解析落库"语义、
//       人事事件级联刷新、人工改写与审计追踪
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod roster_api_test {
    use guard_roster::api::{ApiError, RosterApi};
    use guard_roster::domain::types::{LeaveKind, OperationStatus, PlanBase, StatusOrigin};
    use guard_roster::engine::StaffingRepositories;
    use tempfile::NamedTempFile;

    use crate::test_helpers::{build_repos, create_test_db, date, seed_guard, seed_post};

    const ACTOR: &str = "dispatcher";

    fn setup() -> (NamedTempFile, StaffingRepositories, RosterApi) {
        let (temp_file, db_path) = create_test_db().unwrap();
        let repos = build_repos(&db_path);
        let api = RosterApi::new(repos.clone());
        (temp_file, repos, api)
    }

    /// 登记岗位+保安员并写入基础排班（自动解析落库）
    async fn seed_planned_day(
        repos: &StaffingRepositories,
        api: &RosterApi,
        post_id: &str,
        guard_id: &str,
        day: &str,
    ) {
        if repos.post_repo.find_by_id(post_id).unwrap().is_none() {
            seed_post(repos, post_id, "INST-01", post_id);
        }
        if repos.guard_repo.find_by_id(guard_id).unwrap().is_none() {
            seed_guard(repos, guard_id, guard_id);
        }
        api.upsert_post_assignment(
            post_id,
            date(day),
            PlanBase::Planned,
            Some(guard_id.to_string()),
            ACTOR,
        )
        .await
        .unwrap();
    }

    // ==========================================
    // 基础排班写入口
    // ==========================================

    #[tokio::test]
    async fn test_upsert_assignment_applies_and_audits() {
        let (_tmp, repos, api) = setup();
        seed_post(&repos, "P1", "INST-01", "一号岗");
        seed_guard(&repos, "G1", "赵卫东");

        let outcome = api
            .upsert_post_assignment("P1", date("2026-03-10"), PlanBase::Planned, Some("G1".to_string()), ACTOR)
            .await
            .unwrap();
        assert_eq!(outcome.status.operation_status.code(), "absence_unfilled");

        let stored = repos
            .status_repo
            .find("P1", date("2026-03-10"))
            .unwrap()
            .expect("写入后状态已落库");
        assert_eq!(stored.operation_status.code(), "absence_unfilled");
        assert_eq!(stored.origin, StatusOrigin::System);

        let logs = repos.action_log_repo.list_by_post("P1").unwrap();
        assert!(logs.iter().any(|l| l.action_type == "UpsertAssignment"));
    }

    #[tokio::test]
    async fn test_upsert_assignment_unknown_post_is_not_found() {
        let (_tmp, _repos, api) = setup();
        let err = api
            .upsert_post_assignment("P404", date("2026-03-10"), PlanBase::Planned, None, ACTOR)
            .await
            .expect_err("岗位未登记");
        assert!(matches!(err, ApiError::NotFound(_)), "实际 {:?}", err);
    }

    #[tokio::test]
    async fn test_upsert_assignment_blank_guard_means_vacant() {
        let (_tmp, repos, api) = setup();
        seed_post(&repos, "P1", "INST-01", "一号岗");

        // 空白在编人等于空缺 → 待补位
        let outcome = api
            .upsert_post_assignment("P1", date("2026-03-10"), PlanBase::Planned, Some("   ".to_string()), ACTOR)
            .await
            .unwrap();
        assert_eq!(outcome.status.operation_status.code(), "pending_coverage_unfilled");
        assert!(outcome.status.is_pending_coverage);
    }

    #[tokio::test]
    async fn test_blank_actor_is_rejected() {
        let (_tmp, repos, api) = setup();
        seed_post(&repos, "P1", "INST-01", "一号岗");

        let err = api
            .upsert_post_assignment("P1", date("2026-03-10"), PlanBase::Planned, None, "  ")
            .await
            .expect_err("空操作人必须拒绝");
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    // ==========================================
    // 替班与到岗确认
    // ==========================================

    #[tokio::test]
    async fn test_assign_and_cancel_coverage_roundtrip() {
        let (_tmp, repos, api) = setup();
        seed_planned_day(&repos, &api, "P1", "G1", "2026-03-10").await;
        seed_guard(&repos, "G2", "钱向明");

        let filled = api
            .assign_coverage("P1", date("2026-03-10"), "G2", ACTOR)
            .await
            .unwrap();
        assert_eq!(filled.status.operation_status.code(), "absence_filled_by_extra_shift");
        assert_eq!(filled.status.coverage_guard_id.as_deref(), Some("G2"));
        assert_eq!(
            filled.status.coverage_motive.as_deref(),
            Some("replacement_for_absence"),
            "无人事事件时的替班事由"
        );

        let unfilled = api
            .cancel_coverage("P1", date("2026-03-10"), ACTOR)
            .await
            .unwrap();
        assert_eq!(unfilled.status.operation_status.code(), "absence_unfilled");
        assert!(unfilled.status.coverage_guard_id.is_none());
    }

    #[tokio::test]
    async fn test_assign_coverage_requires_plan_row() {
        let (_tmp, repos, api) = setup();
        seed_guard(&repos, "G2", "钱向明");

        let err = api
            .assign_coverage("P1", date("2026-03-10"), "G2", ACTOR)
            .await
            .expect_err("无基础排班行不可指派替班");
        assert!(matches!(err, ApiError::NotFound(_)), "实际 {:?}", err);
    }

    #[tokio::test]
    async fn test_assign_coverage_rejects_inactive_guard() {
        let (_tmp, repos, api) = setup();
        seed_planned_day(&repos, &api, "P1", "G1", "2026-03-10").await;
        seed_guard(&repos, "G2", "钱向明");
        repos.guard_repo.deactivate("G2").unwrap();

        let err = api
            .assign_coverage("P1", date("2026-03-10"), "G2", ACTOR)
            .await
            .expect_err("停用保安员不可替班");
        assert!(matches!(err, ApiError::InvalidInput(_)), "实际 {:?}", err);
    }

    #[tokio::test]
    async fn test_leave_then_coverage_carries_leave_motive() {
        let (_tmp, repos, api) = setup();
        seed_planned_day(&repos, &api, "P1", "G1", "2026-03-10").await;
        seed_guard(&repos, "G2", "钱向明");
        api.record_leave_event("G1", LeaveKind::PaidLeave, date("2026-03-10"), Some(date("2026-03-10")), None, "hr")
            .await
            .unwrap();

        let outcome = api
            .assign_coverage("P1", date("2026-03-10"), "G2", ACTOR)
            .await
            .unwrap();
        assert_eq!(outcome.status.operation_status.code(), "paid_leave_filled_by_extra_shift");
        assert_eq!(
            outcome.status.coverage_motive.as_deref(),
            Some("replacement_for_paid_leave")
        );
    }

    #[tokio::test]
    async fn test_confirm_attendance_resolves_attended() {
        let (_tmp, repos, api) = setup();
        seed_planned_day(&repos, &api, "P1", "G1", "2026-03-10").await;

        let outcome = api
            .confirm_attendance("P1", date("2026-03-10"), "G1", ACTOR)
            .await
            .unwrap();
        assert_eq!(outcome.status.operation_status.code(), "attended");

        let logs = repos.action_log_repo.list_by_post("P1").unwrap();
        assert!(logs.iter().any(|l| l.action_type == "ConfirmAttendance"));
    }

    // ==========================================
    // 人事事件级联
    // ==========================================

    #[tokio::test]
    async fn test_leave_event_refreshes_planned_days_in_span() {
        let (_tmp, repos, api) = setup();
        seed_planned_day(&repos, &api, "P1", "G1", "2026-03-10").await;
        seed_planned_day(&repos, &api, "P2", "G1", "2026-03-11").await;
        seed_planned_day(&repos, &api, "P1", "G1", "2026-03-12").await;

        let report = api
            .record_leave_event(
                "G1",
                LeaveKind::MedicalLeave,
                date("2026-03-10"),
                Some(date("2026-03-11")),
                Some("骨折住院".to_string()),
                "hr",
            )
            .await
            .unwrap();
        assert_eq!(report.refreshed, 2, "只刷新事件区间内的已排班日");
        assert!(report.failures.is_empty());

        let d10 = api.get_status("P1", date("2026-03-10")).unwrap().unwrap();
        assert_eq!(d10.operation_status.code(), "medical_leave_unfilled");
        let d11 = api.get_status("P2", date("2026-03-11")).unwrap().unwrap();
        assert_eq!(d11.operation_status.code(), "medical_leave_unfilled");
        let d12 = api.get_status("P1", date("2026-03-12")).unwrap().unwrap();
        assert_eq!(d12.operation_status.code(), "absence_unfilled", "区间外不受影响");
    }

    #[tokio::test]
    async fn test_open_ended_leave_refreshes_all_future_plans() {
        let (_tmp, repos, api) = setup();
        seed_planned_day(&repos, &api, "P1", "G1", "2026-03-11").await;
        seed_planned_day(&repos, &api, "P1", "G1", "2026-03-12").await;

        let report = api
            .record_leave_event("G1", LeaveKind::Termination, date("2026-03-11"), None, None, "hr")
            .await
            .unwrap();
        assert_eq!(report.refreshed, 2, "开放事件覆盖计划表中所有后续行");

        let d11 = api.get_status("P1", date("2026-03-11")).unwrap().unwrap();
        assert_eq!(d11.operation_status.code(), "pending_coverage_unfilled", "开放离职转待补位");
    }

    #[tokio::test]
    async fn test_record_leave_requires_known_guard() {
        let (_tmp, _repos, api) = setup();
        let err = api
            .record_leave_event("G404", LeaveKind::PaidLeave, date("2026-03-10"), None, None, "hr")
            .await
            .expect_err("保安员未登记");
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    // ==========================================
    // 整日批量
    // ==========================================

    #[tokio::test]
    async fn test_apply_day_covers_all_planned_posts() {
        let (_tmp, repos, api) = setup();
        seed_planned_day(&repos, &api, "P1", "G1", "2026-03-10").await;
        seed_planned_day(&repos, &api, "P2", "G2", "2026-03-10").await;
        // P3 引用未登记保安: 解析降级为待补位并告警, 不算失败
        seed_post(&repos, "P3", "INST-01", "三号岗");
        crate::test_helpers::seed_assignment(
            &repos,
            "P3",
            date("2026-03-10"),
            PlanBase::Planned,
            Some("G404"),
        );

        let report = api.apply_day(date("2026-03-10"), ACTOR).await.unwrap();
        assert_eq!(report.applied, 3);
        assert!(report.failures.is_empty());
        assert!(
            report.warnings.iter().any(|w| w.starts_with("P3:")),
            "主数据缺失警告按岗位归集: {:?}",
            report.warnings
        );

        let statuses = api.list_statuses(date("2026-03-10")).unwrap();
        assert_eq!(statuses.len(), 3);
    }

    // ==========================================
    // 人工改写
    // ==========================================

    #[tokio::test]
    async fn test_override_status_sets_manual_origin_and_audits() {
        let (_tmp, repos, api) = setup();
        seed_planned_day(&repos, &api, "P1", "G1", "2026-03-10").await;

        let edited = api
            .override_status(
                "P1",
                date("2026-03-10"),
                OperationStatus::Attended,
                "纸质到岗单补录",
                "supervisor",
            )
            .unwrap();
        assert_eq!(edited.operation_status, OperationStatus::Attended);
        assert_eq!(edited.origin, StatusOrigin::Manual);
        assert_eq!(edited.resolved_by, "supervisor");

        let logs = repos.action_log_repo.list_by_post("P1").unwrap();
        let edit_log = logs
            .iter()
            .find(|l| l.action_type == "ManualStatusEdit")
            .expect("人工改写必须入审计");
        assert_eq!(edit_log.detail.as_deref(), Some("纸质到岗单补录"));

        // 下一次引擎解析覆盖回系统判定
        let reapplied = api.apply_status("P1", date("2026-03-10"), ACTOR).await.unwrap();
        assert_eq!(reapplied.status.operation_status.code(), "absence_unfilled");
        assert_eq!(reapplied.status.origin, StatusOrigin::System);
    }

    #[tokio::test]
    async fn test_override_status_requires_existing_row() {
        let (_tmp, _repos, api) = setup();
        let err = api
            .override_status("P1", date("2026-03-10"), OperationStatus::Attended, "补录", ACTOR)
            .expect_err("无落库行不可改写");
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_override_status_requires_reason() {
        let (_tmp, repos, api) = setup();
        seed_planned_day(&repos, &api, "P1", "G1", "2026-03-10").await;

        let err = api
            .override_status("P1", date("2026-03-10"), OperationStatus::Attended, "  ", ACTOR)
            .expect_err("改写原因必填");
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }
}
