//! 배치 디코딩 루프

use std::cell::RefCell;

use ndarray::ArrayView2;
use rayon::prelude::*;

use super::frontier::{Arena, Frontier, Handle};
use super::Parser;
use crate::core::error::{ParserError, Result};
use crate::core::features::FeatureCache;
use crate::core::model::UpperModel;
use crate::core::scoring::{best_valid, best_valid_grouped};
use crate::core::transition::{TokenId, TransitionSystem, NO_TOKEN};

/// 배치 디코딩 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// 입력 문서 수
    pub n_docs: usize,
    /// 실행된 라운드 수
    pub n_rounds: usize,
    /// 점수화된 상태 수 (라운드별 프런티어 크기 합)
    pub n_states: usize,
    /// 빠른 경로 사용 여부
    pub fast_path: bool,
}

/// 워커별 재사용 버퍼
#[derive(Debug, Default)]
struct Scratch {
    ids: Vec<TokenId>,
    scores: Vec<f32>,
    is_valid: Vec<bool>,
}

impl Scratch {
    fn prepare(&mut self, n_context: usize, width: usize, n_actions: usize) {
        self.ids.resize(n_context, NO_TOKEN);
        self.scores.resize(width, 0.0);
        self.is_valid.resize(n_actions, false);
    }
}

thread_local! {
    static SCRATCH: RefCell<Scratch> = RefCell::new(Scratch::default());
}

/// 병렬 구간 안에서의 실패. 문서 정보는 구간 밖에서 붙인다
enum StepFailure {
    NoValidAction { doc_index: usize, state: String },
    Error(ParserError),
}

impl<T: TransitionSystem> Parser<T> {
    /// 배치 전체를 종료 상태까지 디코딩
    ///
    /// 최종 구조를 각 문서에 기록하고, 설정을 입력 순서대로 돌려준다.
    pub fn parse_batch(&self, docs: &mut [T::Doc]) -> Result<(Vec<T::Config>, DecodeStats)> {
        let mut stats = DecodeStats {
            n_docs: docs.len(),
            fast_path: self.uses_fast_path(),
            ..DecodeStats::default()
        };
        let configs = self.moves.init_batch(docs);
        let (tokvecs, offsets, _) = self.flatten(docs)?;
        let mut arena = Arena::new(configs, &offsets)?;
        let mut frontier = Frontier::new(&arena, |_, _| true);
        let cache = FeatureCache::new(
            docs.len(),
            tokvecs.view(),
            self.lower.as_ref(),
            self.stream.as_ref(),
            0.0,
        )?;

        while !frontier.is_empty() {
            stats.n_rounds += 1;
            stats.n_states += frontier.len();
            log::trace!("decode round {}: {} active", stats.n_rounds, frontier.len());
            match &self.upper {
                None => self.fast_round(&mut arena, &frontier, &cache, stats.n_rounds, docs)?,
                Some(upper) => self.scored_round(
                    &mut arena,
                    &frontier,
                    &cache,
                    upper.as_ref(),
                    stats.n_rounds,
                    docs,
                )?,
            }
            frontier.advance(&arena);
        }

        for slot in arena.iter() {
            self.moves.finalize(&slot.config, &mut docs[slot.doc_index]);
        }
        log::debug!(
            "decoded {} docs in {} rounds ({} states)",
            stats.n_docs,
            stats.n_rounds,
            stats.n_states
        );
        Ok((arena.into_configs(), stats))
    }

    /// 설정별 독립 처리. 캐시 조각 합이 곧 액션 점수
    fn fast_round(
        &self,
        arena: &mut Arena<T::Config>,
        frontier: &Frontier,
        cache: &FeatureCache,
        round: usize,
        docs: &[T::Doc],
    ) -> Result<()> {
        let table = cache.table()?;
        let n_actions = self.moves.n_actions();
        let n_pieces = cache.n_pieces();
        let (n_context, width) = (table.n_context(), table.width());
        let moves = &self.moves;
        let debug = self.config.debug;

        let mut active = arena.slots_mut(frontier.handles());
        let outcome = self.pool.install(|| {
            active.par_iter_mut().try_for_each(|slot| {
                SCRATCH.with(|scratch| {
                    let mut scratch = scratch.borrow_mut();
                    scratch.prepare(n_context, width, n_actions);
                    let Scratch { ids, scores, is_valid } = &mut *scratch;

                    slot.fill_token_ids(&mut ids[..]);
                    scores.fill(0.0);
                    table
                        .sum_into(&ids[..], &mut scores[..])
                        .map_err(StepFailure::Error)?;
                    is_valid.fill(false);
                    moves.set_valid(&mut is_valid[..], &slot.config);

                    let best = best_valid_grouped(&scores[..], &is_valid[..], n_pieces).ok_or_else(|| {
                        StepFailure::NoValidAction {
                            doc_index: slot.doc_index,
                            state: format!("{:?}", slot.config),
                        }
                    })?;
                    let action = moves.actions()[best];
                    if debug {
                        log::debug!("round {} doc {}: {:?}", round, slot.doc_index, action);
                    }
                    moves.apply(&mut slot.config, action);
                    Ok::<(), StepFailure>(())
                })
            })
        });

        outcome.map_err(|failure| match failure {
            StepFailure::NoValidAction { doc_index, state } => {
                self.no_valid_action(docs, doc_index, round, state)
            }
            StepFailure::Error(err) => err,
        })
    }

    /// 활성 상태 전체를 한 번에 점수화한 뒤 순차 적용
    fn scored_round(
        &self,
        arena: &mut Arena<T::Config>,
        frontier: &Frontier,
        cache: &FeatureCache,
        upper: &dyn UpperModel,
        round: usize,
        docs: &[T::Doc],
    ) -> Result<()> {
        let handles = frontier.handles();
        let n_actions = self.moves.n_actions();
        let ids = arena.token_ids(handles, cache.n_context())?;
        let (vectors, _) = cache.extract(ids.view())?;
        let scores = upper.predict(vectors.view())?;
        if scores.dim() != (handles.len(), n_actions) {
            return Err(ParserError::shape(
                "action scores",
                &[handles.len(), n_actions],
                scores.shape(),
            ));
        }

        self.apply_best_valid(arena, handles, scores.view(), round, docs)
    }

    /// 원시 점수의 유효 argmax로 상태마다 액션 하나씩 적용
    pub(super) fn apply_best_valid(
        &self,
        arena: &mut Arena<T::Config>,
        handles: &[Handle],
        scores: ArrayView2<f32>,
        round: usize,
        docs: &[T::Doc],
    ) -> Result<()> {
        let n_actions = self.moves.n_actions();
        let scores: Vec<f32> = scores.iter().copied().collect();
        let mut is_valid = vec![false; n_actions];
        for (row, &handle) in scores.chunks(n_actions).zip(handles) {
            let slot = arena.get_mut(handle);
            is_valid.fill(false);
            self.moves.set_valid(&mut is_valid, &slot.config);
            let best = best_valid(row, &is_valid).ok_or_else(|| {
                self.no_valid_action(docs, slot.doc_index, round, format!("{:?}", slot.config))
            })?;
            let action = self.moves.actions()[best];
            if self.config.debug {
                log::debug!("round {} doc {}: {:?}", round, slot.doc_index, action);
            }
            self.moves.apply(&mut slot.config, action);
        }
        Ok(())
    }
}
