use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};

use trivia_session::clients::GeminiClient;
use trivia_session::config::Config;
use trivia_session::models::language::{native_name, SUPPORTED_LANGUAGES};
use trivia_session::models::session_config::{is_category_selectable, CATEGORIES};
use trivia_session::models::{Difficulty, SessionConfig};
use trivia_session::orchestrator::{ConfigChange, SessionEngine, SessionHandle, SessionSnapshot};
use trivia_session::services::{ProgressBook, QuestionFetcher, RetryPolicy, TomlScoreStore};
use trivia_session::utils::logging::log_startup;
use trivia_session::workflow::Phase;

const OPTION_LABELS: [char; 4] = ['A', 'B', 'C', 'D'];

/// 应用主结构
///
/// 职责：
/// - 组装客户端、拉题服务、进度簿，启动会话引擎
/// - 从标准输入读命令，转成引擎操作
/// - 把快照渲染到标准输出
pub struct App {
    config: Config,
    handle: SessionHandle,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        if config.is_api_key_missing() {
            warn!("⚠️ 未设置 GEMINI_API_KEY，无法开始答题");
        }

        let client = GeminiClient::new(&config).context("创建 Gemini 客户端失败")?;
        let fetcher = Arc::new(QuestionFetcher::new(
            Arc::new(client),
            RetryPolicy::from_config(&config),
        ));

        let store = TomlScoreStore::open(&config.score_store_path)
            .with_context(|| format!("打开进度文件失败: {}", config.score_store_path))?;
        let progress = ProgressBook::new(Box::new(store));

        let handle = SessionEngine::spawn(
            fetcher,
            progress,
            config.engine_settings(),
            SessionConfig::default(),
        );

        Ok(Self { config, handle })
    }

    /// 运行应用主逻辑
    pub async fn run(self) -> Result<()> {
        print_help();
        let renderer = tokio::spawn(render_loop(self.handle.subscribe()));

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await.context("读取标准输入失败")? {
            let line = line.trim();
            if line.is_empty() {
                // 结算页回车返回配置
                if self.handle.snapshot().phase == Phase::Score {
                    self.handle.reset_session().await?;
                }
                continue;
            }
            if matches!(line, "q" | "quit" | "exit") {
                break;
            }
            if let Err(e) = self.dispatch(line).await {
                println!("❌ {}", e);
            }
        }

        self.handle.shutdown();
        renderer.abort();
        info!("👋 已退出，进度保存在 {}", self.config.score_store_path);
        Ok(())
    }

    /// 处理一行命令
    async fn dispatch(&self, line: &str) -> Result<()> {
        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (line, ""),
        };

        match command.to_lowercase().as_str() {
            "h" | "help" => print_help(),
            "s" | "start" => self.handle.start_session().await?,
            "r" | "reset" => self.handle.reset_session().await?,
            "difficulty" => {
                // 无法识别的难度按 Hard 处理，配置页会显示实际生效的难度
                let difficulty = Difficulty::parse_lenient(arg);
                self.handle
                    .update_config(ConfigChange::Difficulty(difficulty))
                    .await?;
            }
            "count" => {
                let count: u32 = arg.parse().with_context(|| format!("题目数量必须是数字: {}", arg))?;
                self.handle
                    .update_config(ConfigChange::NumQuestions(count))
                    .await?;
            }
            "lang" => {
                self.handle
                    .update_config(ConfigChange::TargetLanguage(arg.to_string()))
                    .await?
            }
            "category" => {
                self.handle
                    .update_config(ConfigChange::SelectCategory(arg.to_string()))
                    .await?
            }
            "reset-score" => self.handle.reset_score().await?,
            "unlock" => self.handle.unlock().await?,
            "wallet" => self.handle.mark_wallet_submitted().await?,
            "a" | "b" | "c" | "d" if arg.is_empty() => self.answer(command).await?,
            _ => println!("未知命令: {}（输入 help 查看帮助）", line),
        }
        Ok(())
    }

    /// 按字母选项作答，字母到选项的映射由引擎按当前题目完成
    async fn answer(&self, label: &str) -> Result<()> {
        let index = label
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .and_then(|c| OPTION_LABELS.iter().position(|l| *l == c))
            .context("无效选项")?;

        if self.handle.submit_option(index).await?.is_none() {
            if self.handle.snapshot().phase == Phase::Game {
                println!("本题已锁定");
            } else {
                println!("当前不在答题阶段");
            }
        }
        Ok(())
    }
}

/// 订阅快照并渲染，只在内容变化时输出
async fn render_loop(mut rx: watch::Receiver<SessionSnapshot>) {
    let mut last: Option<SessionSnapshot> = None;
    loop {
        let snapshot = rx.borrow_and_update().clone();
        render(&snapshot, last.as_ref());
        last = Some(snapshot);
        if rx.changed().await.is_err() {
            return;
        }
    }
}

fn render(now: &SessionSnapshot, before: Option<&SessionSnapshot>) {
    if let Some(error) = &now.last_error {
        if before.and_then(|b| b.last_error.as_ref()) != Some(error) {
            println!("❌ {}", error);
        }
    }

    let phase_changed = before.map(|b| b.phase) != Some(now.phase);
    match now.phase {
        Phase::Config => {
            if phase_changed || before.map(|b| (&b.config, b.score)) != Some((&now.config, now.score)) {
                render_config(now);
            }
        }
        Phase::Loading => {
            if phase_changed {
                println!("⏳ 正在生成题目...");
            }
        }
        Phase::Game => {
            let round_changed = phase_changed || before.map(|b| b.current_index) != Some(now.current_index);
            if round_changed {
                render_question(now);
            }
            if let Some(outcome) = &now.last_outcome {
                if before.and_then(|b| b.last_outcome.as_ref()) != Some(outcome) {
                    if outcome.is_correct {
                        println!("✅ 正确！+{} 分", outcome.points_awarded);
                    } else if outcome.timed_out() {
                        println!("⏰ 超时！正确答案: {}", outcome.correct_answer);
                    } else {
                        println!("❌ 错误！正确答案: {}", outcome.correct_answer);
                    }
                }
            } else if !round_changed
                && now.remaining_seconds != before.map(|b| b.remaining_seconds).unwrap_or(0)
                && (now.remaining_seconds <= 5 || now.remaining_seconds % 5 == 0)
            {
                println!("⏱️ 剩余 {} 秒", now.remaining_seconds);
            }
        }
        Phase::Score => {
            if phase_changed {
                println!("{}", "=".repeat(40));
                println!("🏁 本局结束，累计分数: {}", now.score);
                if now.reward_available {
                    println!("🎁 已达到奖励门槛，输入 wallet 标记已提交钱包");
                }
                println!("回车或输入 r 返回配置");
                println!("{}", "=".repeat(40));
            }
        }
    }
}

fn render_config(now: &SessionSnapshot) {
    let config = &now.config;
    println!("{}", "-".repeat(40));
    println!(
        "难度: {} ({} 分/题) | 题数: {} | 语言: {}",
        config.difficulty.name(),
        config.points_per_question(),
        config.num_questions,
        native_name(&config.target_language).unwrap_or(config.target_language.as_str())
    );
    println!("分类: {}", config.categories.join(", "));
    println!("累计分数: {}{}", now.score, if now.unlocked { " 🔓" } else { "" });
    println!("{}", "-".repeat(40));
}

fn render_question(now: &SessionSnapshot) {
    let Some(question) = &now.question else {
        return;
    };
    println!(
        "\n第 {}/{} 题（{} 秒）| 分数 {}",
        now.current_index + 1,
        now.total_questions,
        now.remaining_seconds,
        now.score
    );
    println!("{}", question.question);
    for (label, option) in OPTION_LABELS.iter().zip(&question.options) {
        println!("  {}. {}", label, option);
    }
}

fn print_help() {
    let languages: Vec<String> = SUPPORTED_LANGUAGES
        .entries()
        .map(|(code, native)| format!("{} ({})", code, native))
        .collect();
    let categories: Vec<String> = CATEGORIES
        .iter()
        .map(|c| {
            if is_category_selectable(c) {
                c.to_string()
            } else {
                format!("{} 🔒", c)
            }
        })
        .collect();

    println!("命令:");
    println!("  start | s                 开始答题");
    println!("  a / b / c / d             选择答案");
    println!("  reset | r                 返回配置");
    println!("  difficulty <easy|medium|hard>");
    println!("  count <5|10|15|20>");
    println!("  lang <语言代码>");
    for language in &languages {
        println!("      {}", language);
    }
    println!("  category <名称>");
    for category in &categories {
        println!("      {}", category);
    }
    println!("  reset-score               清零累计分数");
    println!("  unlock | wallet           标记解锁 / 已提交钱包");
    println!("  quit | q                  退出");
}
