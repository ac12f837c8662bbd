//! 倒计时器 - 基础设施层
//!
//! 持有唯一的倒计时任务，只暴露 start / cancel 能力
//!
//! 回调在持锁状态下执行，`cancel()` 也要拿同一把锁，
//! 所以 `cancel()` 返回之后不会再有任何回调。

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

const TICK: Duration = Duration::from_secs(1);

/// 倒计时状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CountdownState {
    remaining: u32,
    running: bool,
}

type SharedState = Arc<Mutex<CountdownState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, CountdownState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct ActiveCountdown {
    state: SharedState,
    handle: JoinHandle<()>,
}

/// 倒计时器
///
/// 职责：
/// - 同一时间最多一个倒计时
/// - 每秒回调一次剩余秒数
/// - 归零时回调一次到期，然后停止
/// - 不认识题目 / 分数
#[derive(Default)]
pub struct RoundTimer {
    active: Option<ActiveCountdown>,
}

impl RoundTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 开始新的倒计时，会先取消上一个
    ///
    /// 必须在 tokio 运行时中调用。回调里不能再调用本计时器的 `cancel()`
    pub fn start<T, E>(&mut self, budget_seconds: u32, mut on_tick: T, on_expire: E)
    where
        T: FnMut(u32) + Send + 'static,
        E: FnOnce() + Send + 'static,
    {
        self.cancel();

        let state: SharedState = Arc::new(Mutex::new(CountdownState {
            remaining: budget_seconds,
            running: true,
        }));
        let task_state = state.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + TICK, TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut on_expire = Some(on_expire);

            loop {
                if budget_seconds > 0 {
                    ticker.tick().await;
                }

                let mut guard = lock(&task_state);
                if !guard.running {
                    return;
                }
                guard.remaining = guard.remaining.saturating_sub(1);
                let remaining = guard.remaining;
                on_tick(remaining);

                if remaining == 0 {
                    guard.running = false;
                    if let Some(expire) = on_expire.take() {
                        expire();
                    }
                    return;
                }
            }
        });

        debug!("⏱️ 倒计时开始: {} 秒", budget_seconds);
        self.active = Some(ActiveCountdown { state, handle });
    }

    /// 取消当前倒计时，可重复调用
    pub fn cancel(&mut self) {
        if let Some(active) = self.active.take() {
            lock(&active.state).running = false;
            active.handle.abort();
        }
    }

    /// 剩余秒数，没有倒计时时为 0
    pub fn remaining_seconds(&self) -> u32 {
        self.active
            .as_ref()
            .map(|a| lock(&a.state).remaining)
            .unwrap_or(0)
    }

    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .map(|a| lock(&a.state).running)
            .unwrap_or(false)
    }
}

impl Drop for RoundTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
