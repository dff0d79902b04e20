//! 동적 오라클 학습 루프
//!
//! 디코딩 루프와 같은 프런티어를 돌리되, 라운드마다 비용 기반 손실의
//! 그래디언트를 계산하고 특징 캐시 역전파는 큐에 모아 두었다가
//! 한꺼번에 토큰 그래디언트 버퍼로 흘려보낸다. 상태 전이는 추론과 같은
//! 원시 점수 argmax를 따른다.

use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::frontier::{Arena, Frontier};
use super::Parser;
use crate::core::error::{ParserError, Result};
use crate::core::features::{FeatureCache, GradientBuffer, StateBackprop};
use crate::core::model::DeviceResident;
use crate::core::scoring::{compute_loss, DropoutMask};
use crate::core::transition::TransitionSystem;

/// 한 번의 `update` 결과
#[derive(Debug)]
pub struct UpdateOutput {
    /// 평탄화된 토큰 벡터에 대한 그래디언트
    pub d_tokvecs: GradientBuffer,
    /// d_scores 제곱합
    pub loss: f32,
    /// 학습 라운드 수
    pub n_rounds: usize,
    /// 점수화된 상태 수
    pub n_states: usize,
}

struct PendingBackprop {
    backprop: StateBackprop,
    d_vectors: DeviceResident<Array2<f32>>,
}

/// 특징 캐시 역전파 지연 큐
pub struct BackpropQueue {
    pending: Vec<PendingBackprop>,
    flush_every: usize,
    n_flushes: usize,
}

impl BackpropQueue {
    pub fn new(flush_every: usize) -> Self {
        Self {
            pending: Vec::with_capacity(flush_every),
            flush_every,
            n_flushes: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// 플러시 임계값 도달 여부
    pub fn is_full(&self) -> bool {
        self.pending.len() >= self.flush_every
    }

    /// 지금까지 비워진 횟수 (빈 큐 플러시는 세지 않음)
    pub fn n_flushes(&self) -> usize {
        self.n_flushes
    }

    pub fn push(&mut self, backprop: StateBackprop, d_vectors: DeviceResident<Array2<f32>>) {
        self.pending.push(PendingBackprop { backprop, d_vectors });
    }

    /// 쌓인 역전파를 모두 실행해 `d_tokvecs`에 scatter-add
    pub fn flush(&mut self, d_tokvecs: &mut GradientBuffer) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        log::trace!("flushing {} deferred backprops", self.pending.len());
        for PendingBackprop { backprop, d_vectors } in self.pending.drain(..) {
            let d_vectors = d_vectors.into_inner()?;
            let d_features = backprop.backward(d_vectors.view())?;
            d_tokvecs.scatter_add(backprop.token_ids(), d_features.view())?;
        }
        self.n_flushes += 1;
        Ok(())
    }
}

impl<T: TransitionSystem> Parser<T> {
    /// 배치 하나로 학습 그래디언트 계산
    ///
    /// `golds[i]`가 `None`인 문서는 학습에서 제외된다. 모델 파라미터
    /// 그래디언트는 각 모델에 누적되며 `finish_update`로 반영한다.
    pub fn update(&self, docs: &[T::Doc], golds: &[Option<T::Gold>]) -> Result<UpdateOutput> {
        let upper = self.upper.as_ref().ok_or_else(|| ParserError::InvalidConfig {
            field: "upper",
            reason: "training requires an upper model".into(),
        })?;
        if golds.len() != docs.len() {
            return Err(ParserError::shape("golds", &[docs.len()], &[golds.len()]));
        }

        let targets = docs
            .iter()
            .zip(golds)
            .enumerate()
            .map(|(doc_index, (doc, gold))| match gold {
                Some(gold) => self
                    .moves
                    .preprocess_gold(doc, gold)
                    .map(Some)
                    .map_err(|err| with_doc_index(err, doc_index)),
                None => Ok(None),
            })
            .collect::<Result<Vec<_>>>()?;

        let configs = self.moves.init_batch(docs);
        let (tokvecs, offsets, lengths) = self.flatten(docs)?;
        let mut arena = Arena::new(configs, &offsets)?;
        let mut frontier = Frontier::new(&arena, |handle, _| targets[handle].is_some());
        let drop = self.config.hidden_dropout;
        let cache = FeatureCache::new(
            docs.len(),
            tokvecs.view(),
            self.lower.as_ref(),
            self.stream.as_ref(),
            drop,
        )?;

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut d_tokvecs = GradientBuffer::new(lengths, tokvecs.ncols());
        let mut queue = BackpropQueue::new(self.config.flush_every);
        let norm = if self.config.normalize_by_docs {
            docs.len().max(1) as f32
        } else {
            1.0
        };
        let n_actions = self.moves.n_actions();
        let mut loss = 0.0f32;
        let mut n_rounds = 0;
        let mut n_states = 0;

        while frontier.len() >= self.config.min_active_states {
            if self.config.max_steps.map_or(false, |max| n_rounds >= max) {
                break;
            }
            n_rounds += 1;
            let handles = frontier.handles();
            log::trace!("train round {}: {} eligible", n_rounds, handles.len());

            let ids = arena.token_ids(handles, cache.n_context())?;
            let (mut vectors, bp_vectors) = cache.extract(ids.view())?;
            let mask = DropoutMask::sample(vectors.dim(), drop, &mut rng);
            mask.apply(&mut vectors);
            let (scores, bp_scores) = upper.begin_update(vectors.view(), drop)?;
            if scores.dim() != (handles.len(), n_actions) {
                return Err(ParserError::shape(
                    "action scores",
                    &[handles.len(), n_actions],
                    scores.shape(),
                ));
            }

            let mut d_scores = {
                let states = handles
                    .iter()
                    .filter_map(|&handle| {
                        targets[handle]
                            .as_ref()
                            .map(|target| (&arena.get(handle).config, target))
                    })
                    .collect::<Vec<_>>();
                self.batch_loss(&states, scores.view())?
            };
            d_scores.mapv_inplace(|d| d / norm);
            loss += d_scores.iter().map(|d| d * d).sum::<f32>();

            let mut d_vectors = bp_scores(d_scores.view())?;
            mask.apply(&mut d_vectors);
            queue.push(bp_vectors, DeviceResident::issue(d_vectors, self.stream.as_ref()));
            if queue.is_full() {
                queue.flush(&mut d_tokvecs)?;
            }

            self.apply_best_valid(&mut arena, handles, scores.view(), n_rounds, docs)?;
            n_states += handles.len();
            frontier.advance(&arena);
        }
        queue.flush(&mut d_tokvecs)?;

        log::debug!(
            "update: {} docs, {} rounds, {} states, {} flushes, loss {:.6}",
            docs.len(),
            n_rounds,
            n_states,
            queue.n_flushes(),
            loss
        );
        Ok(UpdateOutput {
            d_tokvecs,
            loss,
            n_rounds,
            n_states,
        })
    }

    /// 상태별 비용으로 d_scores `(n_states, n_actions)` 계산
    pub fn batch_loss(
        &self,
        states: &[(&T::Config, &T::Target)],
        scores: ArrayView2<f32>,
    ) -> Result<Array2<f32>> {
        let n_actions = self.moves.n_actions();
        if scores.dim() != (states.len(), n_actions) {
            return Err(ParserError::shape(
                "action scores",
                &[states.len(), n_actions],
                scores.shape(),
            ));
        }
        let scores: Vec<f32> = scores.iter().copied().collect();
        let mut d_scores = vec![0.0f32; scores.len()];
        let mut is_valid = vec![false; n_actions];
        let mut costs = vec![0.0f32; n_actions];
        for (((config, target), row), d_row) in states
            .iter()
            .zip(scores.chunks(n_actions))
            .zip(d_scores.chunks_mut(n_actions))
        {
            is_valid.fill(false);
            costs.fill(0.0);
            self.moves.set_costs(&mut is_valid, &mut costs, config, target);
            compute_loss(
                self.config.loss,
                d_row,
                row,
                &costs,
                &is_valid,
                self.config.regression_clip,
            );
        }
        Array2::from_shape_vec((states.len(), n_actions), d_scores)
            .map_err(|_| ParserError::shape("d_scores", &[states.len(), n_actions], &[]))
    }
}

/// 전이 시스템이 모르는 배치 내 문서 인덱스를 채운다
fn with_doc_index(err: ParserError, doc_index: usize) -> ParserError {
    match err {
        ParserError::InvalidGold { reason, .. } => ParserError::InvalidGold { doc_index, reason },
        other => other,
    }
}
