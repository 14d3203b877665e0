//! 可观测性模块集成测试

mod metrics_tests {
    use progression_shared::observability::metrics::{
        names, record_achievement_completion, record_activity, record_badge_award,
        record_operation_duration, record_tier_promotion,
    };

    #[test]
    fn test_metric_names_share_prefix() {
        for name in [
            names::POINTS_AWARDED_TOTAL,
            names::ACTIVITIES_RECORDED_TOTAL,
            names::BADGE_AWARDS_TOTAL,
            names::ACHIEVEMENT_COMPLETIONS_TOTAL,
            names::TIER_PROMOTIONS_TOTAL,
            names::OPERATION_DURATION_SECONDS,
        ] {
            assert!(name.starts_with("progression_"), "{}", name);
        }
    }

    #[test]
    fn test_recording_without_recorder() {
        // 未安装 recorder 时所有记录都是空操作
        record_activity("MANUAL", 0);
        record_activity("GUIDE_PUBLISHED", 25);
        record_badge_award("helper", false);
        record_achievement_completion("guide_writer");
        record_tier_promotion("Master");
        record_operation_duration("award_badge", 0.25);
    }
}

mod tracing_tests {
    use progression_shared::observability::ObservabilityConfig;
    use progression_shared::observability::tracing::{env_filter, init_for_tests};

    #[test]
    fn test_env_filter_falls_back_on_invalid_level() {
        let config = ObservabilityConfig {
            log_level: "not a [valid filter".to_string(),
            ..Default::default()
        };
        // 非法过滤表达式不 panic
        let _ = env_filter(&config);
    }

    #[test]
    fn test_init_for_tests_is_reentrant() {
        init_for_tests();
        init_for_tests();
        tracing::info!("tracing initialised twice without error");
    }
}

mod guard_tests {
    use progression_shared::observability::ObservabilityGuard;

    #[test]
    fn test_empty_guard() {
        let guard = ObservabilityGuard::empty();
        assert!(!guard.metrics_enabled());
    }
}
