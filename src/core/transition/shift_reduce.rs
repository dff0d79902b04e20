//! 토이 SHIFT/REDUCE 전이 시스템
//!
//! 토큰을 스택에 올리고(SHIFT) 레이블을 붙여 내리는(REDUCE) 단순한 시스템.
//! 엔진 테스트와 벤치마크용이며, 정답은 토큰이 내려져야 하는 순서와
//! 토큰별 레이블로 주어진다. 비용은 어떤 설정에서도 정의되는 동적 오라클이다.

use ndarray::{Array2, ArrayView2};

use super::{Action, Configuration, Document, TokenId, TransitionSystem, NO_TOKEN};
use crate::core::error::{ParserError, Result};

/// 스택 위 두 칸 + 버퍼 앞 두 칸
pub const N_CONTEXT: usize = 4;

pub const SHIFT: u8 = 0;
pub const REDUCE: u8 = 1;

/// 토큰 벡터와 결과 주석을 가진 문서
#[derive(Debug, Clone)]
pub struct ToyDoc {
    pub name: String,
    pub vectors: Array2<f32>,
    /// finalize가 기록하는 토큰별 레이블
    pub labels: Vec<Option<u32>>,
    /// finalize가 기록하는 REDUCE 순서
    pub pop_order: Vec<usize>,
}

impl ToyDoc {
    pub fn new(name: impl Into<String>, vectors: Array2<f32>) -> Self {
        Self {
            name: name.into(),
            vectors,
            labels: Vec::new(),
            pop_order: Vec::new(),
        }
    }
}

impl Document for ToyDoc {
    fn len(&self) -> usize {
        self.vectors.nrows()
    }

    fn token_vectors(&self) -> ArrayView2<'_, f32> {
        self.vectors.view()
    }

    fn describe(&self) -> String {
        format!("{} ({} tokens)", self.name, self.len())
    }
}

/// 스택/버퍼 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftReduceState {
    n_tokens: usize,
    stack: Vec<usize>,
    next: usize,
    labels: Vec<Option<u32>>,
    pop_order: Vec<usize>,
    history: Vec<Action>,
}

impl ShiftReduceState {
    pub fn new(n_tokens: usize) -> Self {
        Self {
            n_tokens,
            stack: Vec::new(),
            next: 0,
            labels: vec![None; n_tokens],
            pop_order: Vec::with_capacity(n_tokens),
            history: Vec::new(),
        }
    }

    pub fn stack(&self) -> &[usize] {
        &self.stack
    }

    pub fn buffer_len(&self) -> usize {
        self.n_tokens - self.next
    }

    pub fn labels(&self) -> &[Option<u32>] {
        &self.labels
    }

    pub fn pop_order(&self) -> &[usize] {
        &self.pop_order
    }

    /// 적용된 액션 이력
    pub fn history(&self) -> &[Action] {
        &self.history
    }

    fn is_popped(&self, token: usize) -> bool {
        self.labels[token].is_some()
    }
}

impl Configuration for ShiftReduceState {
    fn is_terminal(&self) -> bool {
        self.next >= self.n_tokens && self.stack.is_empty()
    }

    fn fill_context_token_ids(&self, out: &mut [TokenId]) {
        out.iter_mut().for_each(|id| *id = NO_TOKEN);
        let depth = self.stack.len();
        let context = [
            depth.checked_sub(1).map(|i| self.stack[i]),
            depth.checked_sub(2).map(|i| self.stack[i]),
            Some(self.next).filter(|&b| b < self.n_tokens),
            Some(self.next + 1).filter(|&b| b < self.n_tokens),
        ];
        for (slot, token) in out.iter_mut().zip(context.iter()) {
            if let Some(token) = token {
                *slot = *token as TokenId;
            }
        }
    }
}

/// 외부 정답: REDUCE 순서(없으면 순서 무관)와 토큰별 레이블(없으면 무관)
#[derive(Debug, Clone, Default)]
pub struct ShiftReduceGold {
    pub pop_order: Option<Vec<usize>>,
    pub labels: Vec<Option<u32>>,
}

/// 비용 계산용 정답: 토큰별 순위와 레이블
#[derive(Debug, Clone)]
pub struct ShiftReduceTarget {
    rank: Option<Vec<usize>>,
    labels: Vec<Option<u32>>,
}

/// 토이 전이 시스템
#[derive(Debug, Clone)]
pub struct ShiftReduce {
    actions: Vec<Action>,
    n_labels: u32,
}

impl ShiftReduce {
    /// SHIFT 하나와 레이블마다 REDUCE 하나
    pub fn new(n_labels: u32) -> Self {
        let n_labels = n_labels.max(1);
        let mut actions = vec![Action::new(SHIFT, 0)];
        actions.extend((0..n_labels).map(|label| Action::new(REDUCE, label)));
        Self { actions, n_labels }
    }

    pub fn n_labels(&self) -> u32 {
        self.n_labels
    }

    /// 아직 REDUCE되지 않은 토큰 중 순위가 가장 앞선 토큰
    fn expected_pop(state: &ShiftReduceState, rank: &[usize]) -> Option<usize> {
        (0..state.n_tokens)
            .filter(|&t| !state.is_popped(t))
            .min_by_key(|&t| rank[t])
    }
}

impl TransitionSystem for ShiftReduce {
    type Config = ShiftReduceState;
    type Doc = ToyDoc;
    type Gold = ShiftReduceGold;
    type Target = ShiftReduceTarget;

    fn actions(&self) -> &[Action] {
        &self.actions
    }

    fn init_batch(&self, docs: &[ToyDoc]) -> Vec<ShiftReduceState> {
        docs.iter().map(|doc| ShiftReduceState::new(doc.len())).collect()
    }

    fn set_valid(&self, is_valid: &mut [bool], config: &ShiftReduceState) {
        for (valid, action) in is_valid.iter_mut().zip(&self.actions) {
            *valid = match action.move_id {
                SHIFT => config.next < config.n_tokens,
                _ => !config.stack.is_empty(),
            };
        }
    }

    fn set_costs(
        &self,
        is_valid: &mut [bool],
        costs: &mut [f32],
        config: &ShiftReduceState,
        target: &ShiftReduceTarget,
    ) {
        self.set_valid(is_valid, config);
        let top = config.stack.last().copied();
        let expected = target
            .rank
            .as_deref()
            .and_then(|rank| Self::expected_pop(config, rank));

        for ((cost, valid), action) in costs.iter_mut().zip(is_valid.iter()).zip(&self.actions) {
            *cost = 0.0;
            if !*valid {
                continue;
            }
            match action.move_id {
                SHIFT => {
                    // 기대 토큰이 스택 꼭대기에 있으면 묻어 버리게 됨
                    if expected.is_some() && expected == top {
                        *cost = 1.0;
                    }
                }
                _ => {
                    let Some(top) = top else { continue };
                    if expected.is_some() && expected != Some(top) {
                        *cost += 1.0;
                    }
                    if matches!(target.labels[top], Some(gold) if gold != action.label) {
                        *cost += 1.0;
                    }
                }
            }
        }
    }

    fn apply(&self, config: &mut ShiftReduceState, action: Action) {
        match action.move_id {
            SHIFT => {
                debug_assert!(config.next < config.n_tokens);
                config.stack.push(config.next);
                config.next += 1;
            }
            _ => {
                debug_assert!(!config.stack.is_empty());
                if let Some(token) = config.stack.pop() {
                    config.labels[token] = Some(action.label);
                    config.pop_order.push(token);
                }
            }
        }
        config.history.push(action);
    }

    fn finalize(&self, config: &ShiftReduceState, doc: &mut ToyDoc) {
        doc.labels = config.labels.clone();
        doc.pop_order = config.pop_order.clone();
    }

    fn preprocess_gold(&self, doc: &ToyDoc, gold: &ShiftReduceGold) -> Result<ShiftReduceTarget> {
        let n = doc.len();
        let invalid = |reason: String| ParserError::InvalidGold { doc_index: 0, reason };

        if gold.labels.len() != n {
            return Err(invalid(format!(
                "expected {} labels, got {}",
                n,
                gold.labels.len()
            )));
        }
        if let Some(label) = gold.labels.iter().flatten().find(|&&l| l >= self.n_labels) {
            return Err(invalid(format!("label {} out of range", label)));
        }

        let rank = match &gold.pop_order {
            Some(order) => {
                let mut rank = vec![usize::MAX; n];
                if order.len() != n {
                    return Err(invalid(format!("pop order has {} entries for {} tokens", order.len(), n)));
                }
                for (position, &token) in order.iter().enumerate() {
                    if token >= n || rank[token] != usize::MAX {
                        return Err(invalid(format!("pop order is not a permutation at {}", position)));
                    }
                    rank[token] = position;
                }
                Some(rank)
            }
            None => None,
        };

        Ok(ShiftReduceTarget {
            rank,
            labels: gold.labels.clone(),
        })
    }
}
