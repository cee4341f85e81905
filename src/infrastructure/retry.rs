//! 通用重试策略
//!
//! 固定次数 + 固定退避，句柄创建和标记查找共用

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::sleep;
use tracing::warn;

/// 当前尝试信息（从 1 开始计数）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub number: usize,
    pub max: usize,
}

impl Attempt {
    pub fn is_first(&self) -> bool {
        self.number == 1
    }

    pub fn is_last(&self) -> bool {
        self.number >= self.max
    }
}

/// 所有尝试都失败
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: usize,
    pub last_error: E,
}

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    fn attempt(&self, number: usize) -> Attempt {
        Attempt {
            number,
            max: self.max_attempts.max(1),
        }
    }

    /// 执行操作直到成功或次数用尽，两次尝试之间等待退避时间
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, RetryExhausted<E>>
    where
        E: Display,
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut number = 1;
        loop {
            let attempt = self.attempt(number);
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt.is_last() => {
                    warn!("⚠️ {} 失败 (尝试 {}/{}): {}", label, attempt.number, attempt.max, e);
                    return Err(RetryExhausted {
                        attempts: attempt.number,
                        last_error: e,
                    });
                }
                Err(e) => {
                    warn!("⚠️ {} 失败 (尝试 {}/{}): {}", label, attempt.number, attempt.max, e);
                    sleep(self.backoff).await;
                    number += 1;
                }
            }
        }
    }

    /// 与 `run` 相同，但每次尝试都能可变借用同一个状态（如文档句柄）
    pub async fn run_with<S, T, E, F>(
        &self,
        label: &str,
        state: &mut S,
        mut op: F,
    ) -> Result<T, RetryExhausted<E>>
    where
        S: ?Sized,
        E: Display,
        F: for<'a> FnMut(&'a mut S, Attempt) -> BoxFuture<'a, Result<T, E>>,
    {
        let mut number = 1;
        loop {
            let attempt = self.attempt(number);
            match op(&mut *state, attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt.is_last() => {
                    warn!("⚠️ {} 失败 (尝试 {}/{}): {}", label, attempt.number, attempt.max, e);
                    return Err(RetryExhausted {
                        attempts: attempt.number,
                        last_error: e,
                    });
                }
                Err(e) => {
                    warn!("⚠️ {} 失败 (尝试 {}/{}): {}", label, attempt.number, attempt.max, e);
                    sleep(self.backoff).await;
                    number += 1;
                }
            }
        }
    }
}
