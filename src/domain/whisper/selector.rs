//! Whisper 选择器
//!
//! 加权候选池 + 近期记忆，保证多样性且永不因候选为空而卡住

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use std::collections::{HashSet, VecDeque};

use super::pools::{self, Fragment};
use super::{match_intent, Whisper, WhisperContext};

/// 各来源权重（通过重复加入候选池实现）
const MODE_WEIGHT: usize = 2;
const INTENT_WEIGHT: usize = 3;

/// 片段选择器
pub struct WhisperSelector {
    rng: Pcg64,
    /// 最近使用过的文本，按时间顺序（最旧在前）
    recent: VecDeque<&'static str>,
}

impl WhisperSelector {
    /// 使用固定种子创建（测试和可复现场景）
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Pcg64::seed_from_u64(seed),
            recent: VecDeque::new(),
        }
    }

    /// 使用随机种子创建
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    /// 组装加权候选池
    fn weighted_pool(context: &WhisperContext) -> Vec<&'static Fragment> {
        let mut pool: Vec<&'static Fragment> = pools::UNIVERSAL.iter().collect();

        for _ in 0..MODE_WEIGHT {
            pool.extend(pools::mode(context.mode));
        }

        pool.extend(pools::time_of_day(context.time_of_day));

        if let Some(intent) = context.user_intent.as_deref() {
            for category in match_intent(intent) {
                for _ in 0..INTENT_WEIGHT {
                    pool.extend(pools::intent(category));
                }
            }
        }

        pool
    }

    /// 选择一个片段
    pub fn select(&mut self, context: &WhisperContext) -> Whisper {
        let pool = Self::weighted_pool(context);

        let filtered: Vec<&'static Fragment> = pool
            .iter()
            .copied()
            .filter(|fragment| !self.recent.contains(&fragment.text))
            .collect();

        // 过滤后为空时回退到完整候选池
        let candidates = if filtered.is_empty() { &pool } else { &filtered };
        let fragment = candidates[self.rng.random_range(0..candidates.len())];

        self.remember(fragment.text, &pool);

        tracing::trace!(
            text = fragment.text,
            pool_size = pool.len(),
            recent = self.recent.len(),
            "Whisper selected"
        );

        Whisper::curated(fragment.text, fragment.mood)
    }

    /// 连续选择 `count` 个片段
    pub fn select_multiple(&mut self, context: &WhisperContext, count: usize) -> Vec<Whisper> {
        (0..count).map(|_| self.select(context)).collect()
    }

    /// 记忆上限：加权候选池大小的一半，且至少留出一个未用过的文本
    fn memory_limit(pool: &[&'static Fragment]) -> usize {
        let unique: HashSet<&str> = pool.iter().map(|f| f.text).collect();
        (pool.len() / 2).min(unique.len().saturating_sub(1)).max(1)
    }

    /// 记录一次选择，超出记忆上限时丢弃最旧的
    fn remember(&mut self, text: &'static str, pool: &[&'static Fragment]) {
        let limit = Self::memory_limit(pool);

        self.recent.retain(|t| *t != text);
        self.recent.push_back(text);
        while self.recent.len() > limit {
            self.recent.pop_front();
        }
    }

    /// 清空近期记忆
    pub fn reset(&mut self) {
        self.recent.clear();
    }

    pub fn recent_len(&self) -> usize {
        self.recent.len()
    }
}

impl Default for WhisperSelector {
    fn default() -> Self {
        Self::new()
    }
}
