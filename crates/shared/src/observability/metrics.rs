//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。
//! 未启用导出时 metrics 宏为空操作，业务代码可以无条件记录。

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

use super::ObservabilityConfig;

/// 指标名称
pub mod names {
    pub const POINTS_AWARDED_TOTAL: &str = "progression_points_awarded_total";
    pub const ACTIVITIES_RECORDED_TOTAL: &str = "progression_activities_recorded_total";
    pub const BADGE_AWARDS_TOTAL: &str = "progression_badge_awards_total";
    pub const ACHIEVEMENT_COMPLETIONS_TOTAL: &str = "progression_achievement_completions_total";
    pub const TIER_PROMOTIONS_TOTAL: &str = "progression_tier_promotions_total";
    pub const OPERATION_DURATION_SECONDS: &str = "progression_operation_duration_seconds";
}

/// 初始化 Prometheus 指标导出
///
/// 在配置的端口上启动导出器自带的 HTTP 监听，暴露 `/metrics`。
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    register_common_metrics(&config.service_name);
    info!("Metrics exporter listening on {}", addr);

    Ok(())
}

/// 注册通用指标描述
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!(names::POINTS_AWARDED_TOTAL, "Total number of points credited");
    metrics::describe_counter!(
        names::ACTIVITIES_RECORDED_TOTAL,
        "Total number of activity ledger entries appended"
    );
    metrics::describe_counter!(names::BADGE_AWARDS_TOTAL, "Total number of badge award attempts");
    metrics::describe_counter!(
        names::ACHIEVEMENT_COMPLETIONS_TOTAL,
        "Total number of achievements completed"
    );
    metrics::describe_counter!(names::TIER_PROMOTIONS_TOTAL, "Total number of tier promotions");
    metrics::describe_histogram!(
        names::OPERATION_DURATION_SECONDS,
        "Progression operation duration in seconds"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录活动流水写入
#[inline]
pub fn record_activity(activity_type: &str, points: i64) {
    metrics::counter!(
        names::ACTIVITIES_RECORDED_TOTAL,
        "activity_type" => activity_type.to_string()
    )
    .increment(1);

    if points > 0 {
        metrics::counter!(names::POINTS_AWARDED_TOTAL).increment(points as u64);
    }
}

/// 记录徽章发放尝试
#[inline]
pub fn record_badge_award(badge_id: &str, awarded: bool) {
    let result = if awarded { "awarded" } else { "already_held" };
    metrics::counter!(
        names::BADGE_AWARDS_TOTAL,
        "badge_id" => badge_id.to_string(),
        "result" => result
    )
    .increment(1);
}

/// 记录成就完成
#[inline]
pub fn record_achievement_completion(achievement_id: &str) {
    metrics::counter!(
        names::ACHIEVEMENT_COMPLETIONS_TOTAL,
        "achievement_id" => achievement_id.to_string()
    )
    .increment(1);
}

/// 记录等级晋升
#[inline]
pub fn record_tier_promotion(tier: &str) {
    metrics::counter!(names::TIER_PROMOTIONS_TOTAL, "tier" => tier.to_string()).increment(1);
}

/// 记录操作耗时
#[inline]
pub fn record_operation_duration(operation: &'static str, duration_secs: f64) {
    metrics::histogram!(names::OPERATION_DURATION_SECONDS, "operation" => operation)
        .record(duration_secs);
}
