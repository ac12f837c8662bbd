//! 会话引擎 - 编排层
//!
//! ## 职责
//!
//! - 持有状态机、倒计时器、拉题服务、进度簿
//! - 所有输入（玩家操作、计时回调、拉题结果、停留结束）都变成 `EngineEvent`，
//!   进同一个队列，由一个任务按顺序处理，任意两个处理函数不会同时执行
//! - 每处理完一个事件就发布一次 `SessionSnapshot`
//!
//! ## 挂起点
//!
//! 拉题请求、重试退避、每秒计时、答题后停留，全部是可取消的后台任务，
//! 结束时往队列里投一个事件。队列里已经排队的过期事件由状态机按票据 / 回合标识丢弃。

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::EngineSettings;
use crate::error::{ConfigError, TriviaError, TriviaResult};
use crate::infrastructure::RoundTimer;
use crate::models::difficulty::Difficulty;
use crate::models::question::Question;
use crate::models::session_config::SessionConfig;
use crate::services::score_store::REWARD_THRESHOLD;
use crate::services::{ProgressBook, QuestionFetcher};
use crate::utils::logging;
use crate::workflow::{Advance, FetchOutcome, Phase, RoundOutcome, RoundToken, SessionMachine, SessionTicket};

/// 配置阶段可做的修改
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigChange {
    Difficulty(Difficulty),
    NumQuestions(u32),
    TargetLanguage(String),
    SelectCategory(String),
}

/// 对外发布的会话快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub config: SessionConfig,
    pub current_index: usize,
    pub total_questions: usize,
    /// 当前题目（仅答题阶段）
    pub question: Option<Question>,
    pub remaining_seconds: u32,
    pub score: u64,
    pub last_error: Option<String>,
    /// 本回合结果（停留期间展示对错）
    pub last_outcome: Option<RoundOutcome>,
    pub answer_locked: bool,
    pub unlocked: bool,
    pub wallet_submitted: bool,
    /// 分数达标且尚未提交钱包
    pub reward_available: bool,
}

/// 队列中的事件
enum EngineEvent {
    // --- 玩家操作 ---
    UpdateConfig {
        change: ConfigChange,
        reply: oneshot::Sender<Result<(), ConfigError>>,
    },
    StartSession {
        reply: oneshot::Sender<Result<(), ConfigError>>,
    },
    SubmitAnswer {
        option: String,
        reply: oneshot::Sender<Option<RoundOutcome>>,
    },
    /// 按选项下标作答，由引擎对照当前题目取出选项文本
    SubmitOption {
        index: usize,
        reply: oneshot::Sender<Option<RoundOutcome>>,
    },
    ResetSession {
        reply: oneshot::Sender<()>,
    },
    ResetScore {
        reply: oneshot::Sender<Result<(), ConfigError>>,
    },
    Unlock {
        reply: oneshot::Sender<()>,
    },
    MarkWalletSubmitted {
        reply: oneshot::Sender<()>,
    },
    Shutdown,
    // --- 后台任务回报 ---
    FetchCompleted {
        ticket: SessionTicket,
        result: Result<crate::models::QuestionBatch, String>,
    },
    Tick {
        token: RoundToken,
        remaining: u32,
    },
    Expired {
        token: RoundToken,
    },
    SettleElapsed {
        token: RoundToken,
    },
}

/// 待回复的结果
///
/// 事件处理完、快照发布之后才发出，句柄拿到回复时快照已经是新状态
enum Reply {
    Config(oneshot::Sender<Result<(), ConfigError>>, Result<(), ConfigError>),
    Answer(oneshot::Sender<Option<RoundOutcome>>, Option<RoundOutcome>),
    Ack(oneshot::Sender<()>),
}

impl Reply {
    fn send(self) {
        // 调用方已放弃等待时忽略
        let _ = match self {
            Reply::Config(tx, result) => tx.send(result).map_err(drop),
            Reply::Answer(tx, outcome) => tx.send(outcome).map_err(drop),
            Reply::Ack(tx) => tx.send(()),
        };
    }
}

/// 拉题任务异常退出时给玩家看的提示
const UNEXPECTED_FAILURE: &str = "出现未知错误，请重试。";

/// 会话引擎
pub struct SessionEngine {
    machine: SessionMachine,
    fetcher: Arc<QuestionFetcher>,
    progress: ProgressBook,
    timer: RoundTimer,
    settle_task: Option<JoinHandle<()>>,
    settings: EngineSettings,
    remaining_seconds: u32,
    events: mpsc::WeakUnboundedSender<EngineEvent>,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl SessionEngine {
    /// 启动引擎任务，返回操作句柄
    ///
    /// 必须在 tokio 运行时中调用。所有句柄都被丢弃且没有后台任务时，引擎自动退出
    pub fn spawn(
        fetcher: Arc<QuestionFetcher>,
        progress: ProgressBook,
        settings: EngineSettings,
        initial_config: SessionConfig,
    ) -> SessionHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let machine = SessionMachine::new(initial_config, progress.cumulative_score());
        info!("📊 初始累计分数: {}", machine.score());

        let mut engine = Self {
            machine,
            fetcher,
            progress,
            timer: RoundTimer::new(),
            settle_task: None,
            settings,
            remaining_seconds: 0,
            events: tx.downgrade(),
            snapshots: watch::Sender::new(SessionSnapshot::empty()),
        };
        engine.snapshots.send_replace(engine.snapshot());
        let snapshots = engine.snapshots.subscribe();

        tokio::spawn(engine.run(rx));

        SessionHandle { events: tx, snapshots }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<EngineEvent>) {
        while let Some(event) = rx.recv().await {
            if matches!(event, EngineEvent::Shutdown) {
                break;
            }
            let reply = self.handle(event);
            self.snapshots.send_replace(self.snapshot());
            if let Some(reply) = reply {
                reply.send();
            }
        }

        self.timer.cancel();
        self.abort_settle();
        debug!("会话引擎已退出");
    }

    /// 处理一个事件，玩家操作返回待发送的回复
    fn handle(&mut self, event: EngineEvent) -> Option<Reply> {
        match event {
            EngineEvent::UpdateConfig { change, reply } => {
                let result = self.machine.update_config(|config| apply_change(config, change));
                return Some(Reply::Config(reply, result));
            }
            EngineEvent::StartSession { reply } => {
                let result = self.start_session();
                return Some(Reply::Config(reply, result));
            }
            EngineEvent::SubmitAnswer { option, reply } => {
                let outcome = self.submit_answer(&option);
                return Some(Reply::Answer(reply, outcome));
            }
            EngineEvent::SubmitOption { index, reply } => {
                let option = self
                    .machine
                    .current_question()
                    .and_then(|q| q.options.get(index))
                    .cloned();
                let outcome = option.and_then(|option| self.submit_answer(&option));
                return Some(Reply::Answer(reply, outcome));
            }
            EngineEvent::ResetSession { reply } => {
                self.reset_session();
                return Some(Reply::Ack(reply));
            }
            EngineEvent::ResetScore { reply } => {
                let result = self.machine.reset_score();
                if result.is_ok() {
                    self.persist_score();
                }
                return Some(Reply::Config(reply, result));
            }
            EngineEvent::Unlock { reply } => {
                if let Err(e) = self.progress.unlock() {
                    error!("保存解锁标记失败: {}", e);
                }
                return Some(Reply::Ack(reply));
            }
            EngineEvent::MarkWalletSubmitted { reply } => {
                if let Err(e) = self.progress.mark_wallet_submitted() {
                    error!("保存钱包提交标记失败: {}", e);
                }
                return Some(Reply::Ack(reply));
            }
            EngineEvent::Shutdown => {}
            EngineEvent::FetchCompleted { ticket, result } => {
                let outcome = match result {
                    Ok(batch) => self.machine.fetch_succeeded(ticket, batch),
                    Err(message) => self.machine.fetch_failed(ticket, message),
                };
                match outcome {
                    FetchOutcome::Started(token) => self.start_round(token),
                    FetchOutcome::Failed => {}
                    FetchOutcome::Stale => debug!("丢弃过期的拉题结果"),
                }
            }
            EngineEvent::Tick { token, remaining } => {
                if self.machine.current_token() == Some(token) && !self.machine.is_round_locked() {
                    self.remaining_seconds = remaining;
                }
            }
            EngineEvent::Expired { token } => {
                if let Some(outcome) = self.machine.round_expired(token) {
                    info!("⏰ 第 {} 题超时", token.index + 1);
                    self.remaining_seconds = 0;
                    self.finish_round(&outcome);
                }
            }
            EngineEvent::SettleElapsed { token } => match self.machine.settle_elapsed(token) {
                Some(Advance::NextRound(next)) => {
                    self.settle_task = None;
                    self.start_round(next);
                }
                Some(Advance::Finished { score, total }) => {
                    self.settle_task = None;
                    logging::log_session_summary(score, total);
                }
                None => debug!("忽略过期的停留事件 (第 {} 题)", token.index + 1),
            },
        }
        None
    }

    /// 作答并结束回合，本回合已锁定时返回 None
    fn submit_answer(&mut self, option: &str) -> Option<RoundOutcome> {
        let outcome = self.machine.submit_answer(option)?;
        self.finish_round(&outcome);
        Some(outcome)
    }

    fn start_session(&mut self) -> Result<(), ConfigError> {
        let ticket = self.machine.start_session(self.fetcher.is_ready())?;

        let Some(tx) = self.events.upgrade() else {
            // 没有句柄了，结果也无人接收
            return Ok(());
        };
        let fetcher = self.fetcher.clone();
        let config = self.machine.config().clone();

        tokio::spawn(async move {
            let job = tokio::spawn(async move { fetcher.fetch(&config).await });
            let result = match job.await {
                Ok(Ok(batch)) => Ok(batch),
                Ok(Err(e)) => Err(e.display_message()),
                Err(e) => {
                    error!("拉题任务异常退出: {}", e);
                    Err(UNEXPECTED_FAILURE.to_string())
                }
            };
            let _ = tx.send(EngineEvent::FetchCompleted { ticket, result });
        });

        Ok(())
    }

    /// 开始一个回合：满额倒计时
    fn start_round(&mut self, token: RoundToken) {
        let Some(tx) = self.events.upgrade() else {
            return;
        };
        if let Some(question) = self.machine.current_question() {
            logging::log_round_start(token.index, self.machine.total_questions(), &question.question);
        }

        self.remaining_seconds = self.settings.round_seconds;
        let tick_tx = tx.clone();
        self.timer.start(
            self.settings.round_seconds,
            move |remaining| {
                let _ = tick_tx.send(EngineEvent::Tick { token, remaining });
            },
            move || {
                let _ = tx.send(EngineEvent::Expired { token });
            },
        );
    }

    /// 回合结束（作答或超时）：停表、落盘、安排停留
    fn finish_round(&mut self, outcome: &RoundOutcome) {
        self.timer.cancel();
        if outcome.points_awarded > 0 {
            self.persist_score();
        }
        self.schedule_settle(outcome.token);
    }

    fn schedule_settle(&mut self, token: RoundToken) {
        self.abort_settle();
        let Some(tx) = self.events.upgrade() else {
            return;
        };
        let delay = self.settings.settle_delay;
        self.settle_task = Some(tokio::spawn(async move {
            sleep(delay).await;
            let _ = tx.send(EngineEvent::SettleElapsed { token });
        }));
    }

    fn abort_settle(&mut self) {
        if let Some(task) = self.settle_task.take() {
            task.abort();
        }
    }

    fn reset_session(&mut self) {
        self.timer.cancel();
        self.abort_settle();
        self.remaining_seconds = 0;
        self.machine.reset();
        info!("🔄 会话已重置，累计分数 {}", self.machine.score());
    }

    fn persist_score(&mut self) {
        if let Err(e) = self.progress.save_score(self.machine.score()) {
            error!("保存累计分数失败: {}", e);
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        let score = self.machine.score();
        let wallet_submitted = self.progress.wallet_submitted();
        let phase = self.machine.phase();
        SessionSnapshot {
            phase,
            config: self.machine.config().clone(),
            current_index: self.machine.current_index(),
            total_questions: self.machine.total_questions(),
            question: self.machine.current_question().cloned(),
            remaining_seconds: if phase == Phase::Game {
                self.remaining_seconds
            } else {
                0
            },
            score,
            last_error: self.machine.last_error().map(str::to_string),
            last_outcome: self.machine.last_outcome().cloned(),
            answer_locked: self.machine.is_round_locked(),
            unlocked: self.progress.is_unlocked(),
            wallet_submitted,
            reward_available: score >= REWARD_THRESHOLD && !wallet_submitted,
        }
    }
}

fn apply_change(config: &mut SessionConfig, change: ConfigChange) -> Result<(), ConfigError> {
    match change {
        ConfigChange::Difficulty(difficulty) => {
            config.difficulty = difficulty;
            Ok(())
        }
        ConfigChange::NumQuestions(count) => config.set_num_questions(count),
        ConfigChange::TargetLanguage(code) => config.set_target_language(&code),
        ConfigChange::SelectCategory(category) => config.select_category(&category),
    }
}

impl SessionSnapshot {
    fn empty() -> Self {
        Self {
            phase: Phase::Config,
            config: SessionConfig::default(),
            current_index: 0,
            total_questions: 0,
            question: None,
            remaining_seconds: 0,
            score: 0,
            last_error: None,
            last_outcome: None,
            answer_locked: false,
            unlocked: false,
            wallet_submitted: false,
            reward_available: false,
        }
    }
}

/// 会话引擎句柄
///
/// 可以随意克隆，所有操作都进入引擎队列
#[derive(Clone)]
pub struct SessionHandle {
    events: mpsc::UnboundedSender<EngineEvent>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// 修改会话参数（仅配置阶段）
    pub async fn update_config(&self, change: ConfigChange) -> TriviaResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineEvent::UpdateConfig { change, reply })?;
        Ok(rx.await.map_err(|_| TriviaError::EngineStopped)??)
    }

    /// 开始会话，参数不合法时同步返回错误
    pub async fn start_session(&self) -> TriviaResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineEvent::StartSession { reply })?;
        Ok(rx.await.map_err(|_| TriviaError::EngineStopped)??)
    }

    /// 提交答案
    ///
    /// 返回 None 表示本回合已锁定或不在答题阶段，提交被忽略
    pub async fn submit_answer(&self, option: impl Into<String>) -> TriviaResult<Option<RoundOutcome>> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineEvent::SubmitAnswer {
            option: option.into(),
            reply,
        })?;
        rx.await.map_err(|_| TriviaError::EngineStopped)
    }

    /// 按选项下标作答（0 对应 A）
    ///
    /// 下标由引擎对照处理时的当前题目解析，越界或本回合已锁定时返回 None
    pub async fn submit_option(&self, index: usize) -> TriviaResult<Option<RoundOutcome>> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineEvent::SubmitOption { index, reply })?;
        rx.await.map_err(|_| TriviaError::EngineStopped)
    }

    /// 回到配置阶段，保留累计分数
    pub async fn reset_session(&self) -> TriviaResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineEvent::ResetSession { reply })?;
        rx.await.map_err(|_| TriviaError::EngineStopped)
    }

    /// 清零累计分数（仅配置阶段）
    pub async fn reset_score(&self) -> TriviaResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineEvent::ResetScore { reply })?;
        Ok(rx.await.map_err(|_| TriviaError::EngineStopped)??)
    }

    pub async fn unlock(&self) -> TriviaResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineEvent::Unlock { reply })?;
        rx.await.map_err(|_| TriviaError::EngineStopped)
    }

    pub async fn mark_wallet_submitted(&self) -> TriviaResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineEvent::MarkWalletSubmitted { reply })?;
        rx.await.map_err(|_| TriviaError::EngineStopped)
    }

    /// 停止引擎
    pub fn shutdown(&self) {
        if self.events.send(EngineEvent::Shutdown).is_err() {
            warn!("会话引擎已经停止");
        }
    }

    /// 最新快照
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// 订阅快照变化
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// 等待满足条件的快照
    pub async fn wait_for<F>(&self, mut predicate: F) -> TriviaResult<SessionSnapshot>
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        let mut rx = self.snapshots.clone();
        let snapshot = rx
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| TriviaError::EngineStopped)?;
        Ok(snapshot.clone())
    }

    fn send(&self, event: EngineEvent) -> TriviaResult<()> {
        self.events
            .send(event)
            .map_err(|_| TriviaError::EngineStopped)
    }
}
