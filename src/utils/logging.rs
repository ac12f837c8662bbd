/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use tracing::info;

use crate::config::Config;

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!(
        "🚀 程序启动 - {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("🤖 模型: {}", config.gemini_model_name);
    info!(
        "⏱️ 每题 {} 秒，答题后停留 {} 毫秒",
        config.round_seconds, config.settle_delay_ms
    );
    info!("💾 进度文件: {}", config.score_store_path);
    info!("{}", "=".repeat(60));
}

/// 记录回合开始信息
///
/// # 参数
/// - `index`: 题目下标（从 0 开始）
/// - `total`: 本局题目总数
/// - `question`: 题干
pub fn log_round_start(index: usize, total: usize, question: &str) {
    info!(
        "📝 第 {}/{} 题: {}",
        index + 1,
        total,
        truncate_text(question, 60)
    );
}

/// 打印会话结束统计
pub fn log_session_summary(score: u64, total: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📊 本局结束");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 题目数: {}", total);
    info!("🏆 累计分数: {}", score);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
