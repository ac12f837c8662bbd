//! 会话状态机 - 流程层
//!
//! 核心职责：定义"一局答题"的完整状态流转
//!
//! ```text
//! Config ──start──▶ Loading ──成功──▶ Game ──最后一题结束──▶ Score
//!   ▲                  │                │                      │
//!   └──────失败────────┘                └───────reset──────────┘
//! ```
//!
//! 本模块是纯同步逻辑：不持有计时器、不发请求、不 sleep。
//! 每个方法返回驱动方接下来要做的事（开始计时 / 安排停留 / 什么都不做）。

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::models::question::{Question, QuestionBatch};
use crate::models::session_config::SessionConfig;

/// 会话阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Phase {
    /// 配置中
    #[default]
    Config,
    /// 拉题中
    Loading,
    /// 答题中
    Game,
    /// 结算
    Score,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::Config => "Config",
            Phase::Loading => "Loading",
            Phase::Game => "Game",
            Phase::Score => "Score",
        }
    }
}

/// 一次拉题的票据，用来识别过期的拉题结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTicket(u64);

/// 回合标识（哪一局的第几题）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoundToken {
    pub session: u64,
    pub index: usize,
}

/// 一个回合的结果，用于在停留期间展示对错
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundOutcome {
    pub token: RoundToken,
    /// 玩家选择的选项，超时为 None
    pub chosen: Option<String>,
    pub correct_answer: String,
    pub is_correct: bool,
    pub points_awarded: u64,
}

impl RoundOutcome {
    pub fn timed_out(&self) -> bool {
        self.chosen.is_none()
    }
}

/// 拉题结果的处理结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// 进入答题，开始第一题
    Started(RoundToken),
    /// 回到配置阶段并显示错误
    Failed,
    /// 结果已过期，忽略
    Stale,
}

/// 停留结束后的去向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// 进入下一题
    NextRound(RoundToken),
    /// 全部答完
    Finished { score: u64, total: usize },
}

/// 会话状态机
pub struct SessionMachine {
    phase: Phase,
    config: SessionConfig,
    batch: Option<QuestionBatch>,
    current_index: usize,
    score: u64,
    last_error: Option<String>,
    /// 每次开始拉题递增
    session_seq: u64,
    /// 当前回合是否已锁定（已作答或已超时）
    round_locked: bool,
    last_outcome: Option<RoundOutcome>,
}

impl SessionMachine {
    /// 创建状态机，分数从外部存储读出
    pub fn new(config: SessionConfig, initial_score: u64) -> Self {
        Self {
            phase: Phase::Config,
            config,
            batch: None,
            current_index: 0,
            score: initial_score,
            last_error: None,
            session_seq: 0,
            round_locked: false,
            last_outcome: None,
        }
    }

    // ========== 只读访问 ==========

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn last_outcome(&self) -> Option<&RoundOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn is_round_locked(&self) -> bool {
        self.round_locked
    }

    /// 当前批次题目数量，没有批次时为 0
    pub fn total_questions(&self) -> usize {
        self.batch.as_ref().map(QuestionBatch::len).unwrap_or(0)
    }

    /// 当前题目（仅答题阶段）
    pub fn current_question(&self) -> Option<&Question> {
        if self.phase != Phase::Game {
            return None;
        }
        self.batch.as_ref().and_then(|b| b.get(self.current_index))
    }

    /// 当前回合标识（仅答题阶段）
    pub fn current_token(&self) -> Option<RoundToken> {
        (self.phase == Phase::Game).then_some(RoundToken {
            session: self.session_seq,
            index: self.current_index,
        })
    }

    // ========== 配置阶段 ==========

    /// 修改会话参数，只能在配置阶段进行
    pub fn update_config<F>(&mut self, change: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut SessionConfig) -> Result<(), ConfigError>,
    {
        self.ensure_config_phase()?;
        change(&mut self.config)
    }

    /// 清零累计分数，只能在配置阶段进行
    pub fn reset_score(&mut self) -> Result<(), ConfigError> {
        self.ensure_config_phase()?;
        info!("累计分数已清零 (原分数: {})", self.score);
        self.score = 0;
        Ok(())
    }

    /// 开始会话：校验通过后进入拉题阶段
    ///
    /// `transport_ready` 为 false 表示生成服务不可用（例如缺少 API Key）
    pub fn start_session(&mut self, transport_ready: bool) -> Result<SessionTicket, ConfigError> {
        self.ensure_config_phase()?;

        let checked = if transport_ready {
            self.config.validate()
        } else {
            Err(ConfigError::MissingApiKey)
        };
        if let Err(e) = checked {
            warn!("⚠️ 无法开始会话: {}", e);
            self.last_error = Some(e.to_string());
            return Err(e);
        }

        self.session_seq += 1;
        self.phase = Phase::Loading;
        self.last_error = None;
        info!("🚀 会话 #{} 开始拉题", self.session_seq);

        Ok(SessionTicket(self.session_seq))
    }

    // ========== 拉题阶段 ==========

    /// 拉题成功
    pub fn fetch_succeeded(&mut self, ticket: SessionTicket, batch: QuestionBatch) -> FetchOutcome {
        if !self.accepts_fetch(ticket) {
            return FetchOutcome::Stale;
        }

        info!("✓ 会话 #{} 拉题成功，共 {} 道题", ticket.0, batch.len());
        self.batch = Some(batch);
        self.current_index = 0;
        self.round_locked = false;
        self.last_outcome = None;
        self.phase = Phase::Game;

        FetchOutcome::Started(RoundToken {
            session: ticket.0,
            index: 0,
        })
    }

    /// 拉题失败，回到配置阶段
    pub fn fetch_failed(&mut self, ticket: SessionTicket, message: impl Into<String>) -> FetchOutcome {
        if !self.accepts_fetch(ticket) {
            return FetchOutcome::Stale;
        }

        let message = message.into();
        warn!("会话 #{} 拉题失败: {}", ticket.0, message);
        self.last_error = Some(message);
        self.phase = Phase::Config;

        FetchOutcome::Failed
    }

    fn accepts_fetch(&self, ticket: SessionTicket) -> bool {
        let fresh = self.phase == Phase::Loading && ticket.0 == self.session_seq;
        if !fresh {
            debug!(
                "忽略过期的拉题结果 (票据 #{}, 当前会话 #{}, 阶段 {})",
                ticket.0,
                self.session_seq,
                self.phase.name()
            );
        }
        fresh
    }

    // ========== 答题阶段 ==========

    /// 提交答案
    ///
    /// 每个回合只接受第一次提交，之后的提交返回 None
    pub fn submit_answer(&mut self, option: &str) -> Option<RoundOutcome> {
        let token = self.open_round()?;
        let question = self.current_question()?;

        let is_correct = question.is_correct(option);
        let points = if is_correct {
            self.config.points_per_question()
        } else {
            0
        };
        let outcome = RoundOutcome {
            token,
            chosen: Some(option.to_string()),
            correct_answer: question.correct_answer.clone(),
            is_correct,
            points_awarded: points,
        };

        self.score += points;
        debug!(
            "第 {} 题作答: {} ({}), 当前分数 {}",
            token.index + 1,
            option,
            if is_correct { "正确" } else { "错误" },
            self.score
        );

        Some(self.lock_round(outcome))
    }

    /// 倒计时到期，按答错处理
    pub fn round_expired(&mut self, token: RoundToken) -> Option<RoundOutcome> {
        if self.open_round()? != token {
            return None;
        }
        let question = self.current_question()?;

        let outcome = RoundOutcome {
            token,
            chosen: None,
            correct_answer: question.correct_answer.clone(),
            is_correct: false,
            points_awarded: 0,
        };
        debug!("第 {} 题超时", token.index + 1);

        Some(self.lock_round(outcome))
    }

    /// 停留时间结束，进入下一题或结算
    pub fn settle_elapsed(&mut self, token: RoundToken) -> Option<Advance> {
        if self.current_token()? != token || !self.round_locked {
            return None;
        }

        let total = self.total_questions();
        if self.current_index + 1 < total {
            self.current_index += 1;
            self.round_locked = false;
            self.last_outcome = None;
            Some(Advance::NextRound(RoundToken {
                session: token.session,
                index: self.current_index,
            }))
        } else {
            self.phase = Phase::Score;
            info!("🏁 会话 #{} 结束，累计分数 {}", token.session, self.score);
            Some(Advance::Finished {
                score: self.score,
                total,
            })
        }
    }

    /// 回到配置阶段，丢弃本局题目，保留累计分数
    pub fn reset(&mut self) {
        self.batch = None;
        self.current_index = 0;
        self.last_error = None;
        self.round_locked = false;
        self.last_outcome = None;
        self.phase = Phase::Config;
    }

    // ========== 内部工具 ==========

    /// 当前回合未锁定时返回其标识
    fn open_round(&self) -> Option<RoundToken> {
        if self.round_locked {
            return None;
        }
        self.current_token()
    }

    fn lock_round(&mut self, outcome: RoundOutcome) -> RoundOutcome {
        self.round_locked = true;
        self.last_outcome = Some(outcome.clone());
        outcome
    }

    fn ensure_config_phase(&self) -> Result<(), ConfigError> {
        if self.phase != Phase::Config {
            return Err(ConfigError::NotInConfigPhase {
                phase: self.phase.name(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::difficulty::Difficulty;

    fn batch(n: usize) -> QuestionBatch {
        let questions = (0..n)
            .map(|i| Question::new(format!("Q{}", i), ["a", "b", "c", "d"], "b"))
            .collect();
        QuestionBatch::new(questions).unwrap()
    }

    fn machine_in_game(difficulty: Difficulty, n: usize) -> (SessionMachine, RoundToken) {
        let mut machine = SessionMachine::new(SessionConfig::new(difficulty, 5, "English"), 0);
        let ticket = machine.start_session(true).unwrap();
        match machine.fetch_succeeded(ticket, batch(n)) {
            FetchOutcome::Started(token) => (machine, token),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_start_rejected_below_minimum() {
        let mut config = SessionConfig::default();
        config.num_questions = 4;
        let mut machine = SessionMachine::new(config, 0);

        assert!(matches!(
            machine.start_session(true),
            Err(ConfigError::TooFewQuestions { .. })
        ));
        assert_eq!(machine.phase(), Phase::Config);
        assert!(machine.last_error().is_some());
    }

    #[test]
    fn test_start_rejected_without_api_key() {
        let mut machine = SessionMachine::new(SessionConfig::default(), 0);
        assert_eq!(machine.start_session(false), Err(ConfigError::MissingApiKey));
        assert_eq!(machine.phase(), Phase::Config);
    }

    #[test]
    fn test_fetch_success_enters_game() {
        let (machine, token) = machine_in_game(Difficulty::Medium, 3);
        assert_eq!(machine.phase(), Phase::Game);
        assert_eq!(machine.current_index(), 0);
        assert_eq!(token.index, 0);
        assert_eq!(machine.current_question().unwrap().question, "Q0");
    }

    #[test]
    fn test_fetch_failure_returns_to_config() {
        let mut machine = SessionMachine::new(SessionConfig::default(), 0);
        let ticket = machine.start_session(true).unwrap();
        assert_eq!(machine.fetch_failed(ticket, "boom"), FetchOutcome::Failed);
        assert_eq!(machine.phase(), Phase::Config);
        assert_eq!(machine.last_error(), Some("boom"));

        // 可以重新开始，错误被清掉
        assert!(machine.start_session(true).is_ok());
        assert_eq!(machine.last_error(), None);
    }

    #[test]
    fn test_stale_fetch_after_reset_is_ignored() {
        let mut machine = SessionMachine::new(SessionConfig::default(), 0);
        let old = machine.start_session(true).unwrap();
        machine.reset();

        assert_eq!(machine.fetch_succeeded(old, batch(5)), FetchOutcome::Stale);
        assert_eq!(machine.phase(), Phase::Config);

        let new = machine.start_session(true).unwrap();
        assert_eq!(machine.fetch_failed(old, "late"), FetchOutcome::Stale);
        assert_eq!(machine.phase(), Phase::Loading);
        assert!(matches!(
            machine.fetch_succeeded(new, batch(5)),
            FetchOutcome::Started(_)
        ));
    }

    #[test]
    fn test_correct_answer_scores_immediately_and_locks() {
        let (mut machine, _) = machine_in_game(Difficulty::Medium, 2);

        let outcome = machine.submit_answer("b").unwrap();
        assert!(outcome.is_correct);
        assert_eq!(outcome.points_awarded, 10);
        assert_eq!(machine.score(), 10);

        assert!(machine.submit_answer("b").is_none());
        assert!(machine.submit_answer("a").is_none());
        assert_eq!(machine.score(), 10);
    }

    #[test]
    fn test_wrong_answer_scores_nothing() {
        let (mut machine, _) = machine_in_game(Difficulty::Hard, 2);
        let outcome = machine.submit_answer("a").unwrap();
        assert!(!outcome.is_correct);
        assert_eq!(outcome.correct_answer, "b");
        assert_eq!(machine.score(), 0);
    }

    #[test]
    fn test_expiry_locks_round_without_score() {
        let (mut machine, token) = machine_in_game(Difficulty::Easy, 2);

        let outcome = machine.round_expired(token).unwrap();
        assert!(outcome.timed_out());
        assert_eq!(machine.score(), 0);
        assert!(machine.submit_answer("b").is_none());
        assert!(machine.round_expired(token).is_none());
    }

    #[test]
    fn test_expiry_after_answer_is_ignored() {
        let (mut machine, token) = machine_in_game(Difficulty::Easy, 2);
        machine.submit_answer("b").unwrap();
        assert!(machine.round_expired(token).is_none());
        assert_eq!(machine.score(), 5);
    }

    #[test]
    fn test_settle_requires_locked_round() {
        let (mut machine, token) = machine_in_game(Difficulty::Easy, 2);
        assert!(machine.settle_elapsed(token).is_none());
        assert_eq!(machine.current_index(), 0);
    }

    #[test]
    fn test_full_session_to_score_and_reset() {
        let (mut machine, mut token) = machine_in_game(Difficulty::Easy, 5);

        for i in 0..5 {
            assert_eq!(machine.current_index(), i);
            machine.submit_answer("b").unwrap();
            match machine.settle_elapsed(token).unwrap() {
                Advance::NextRound(next) => token = next,
                Advance::Finished { score, total } => {
                    assert_eq!(i, 4);
                    assert_eq!(score, 25);
                    assert_eq!(total, 5);
                }
            }
        }
        assert_eq!(machine.phase(), Phase::Score);
        assert_eq!(machine.score(), 25);

        machine.reset();
        assert_eq!(machine.phase(), Phase::Config);
        assert_eq!(machine.current_index(), 0);
        assert_eq!(machine.total_questions(), 0);
        assert_eq!(machine.score(), 25);
    }

    #[test]
    fn test_stale_round_events_ignored_in_next_round() {
        let (mut machine, first) = machine_in_game(Difficulty::Easy, 3);
        machine.submit_answer("b").unwrap();
        let second = match machine.settle_elapsed(first).unwrap() {
            Advance::NextRound(t) => t,
            other => panic!("unexpected {:?}", other),
        };

        assert!(machine.round_expired(first).is_none());
        assert!(machine.settle_elapsed(first).is_none());
        assert_eq!(machine.current_token(), Some(second));
    }

    #[test]
    fn test_config_only_mutable_in_config_phase() {
        let (mut machine, _) = machine_in_game(Difficulty::Easy, 2);
        assert!(matches!(
            machine.update_config(|c| c.set_num_questions(10)),
            Err(ConfigError::NotInConfigPhase { phase: "Game" })
        ));
        assert!(machine.reset_score().is_err());

        machine.reset();
        assert!(machine.update_config(|c| c.set_num_questions(20)).is_ok());
        assert_eq!(machine.config().num_questions, 20);
    }

    #[test]
    fn test_score_seeded_and_cumulative() {
        let mut machine = SessionMachine::new(SessionConfig::new(Difficulty::Hard, 5, "English"), 40);
        let ticket = machine.start_session(true).unwrap();
        machine.fetch_succeeded(ticket, batch(1));
        machine.submit_answer("b").unwrap();
        assert_eq!(machine.score(), 60);

        machine.reset();
        machine.reset_score().unwrap();
        assert_eq!(machine.score(), 0);
    }
}
