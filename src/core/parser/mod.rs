//! # 배치 디코딩 / 학습 엔진
//!
//! 전이 시스템, lower/upper 점수 모델, 워커 풀을 묶어
//! 배치 단위 디코딩(`parse_batch`)과 동적 오라클 학습(`update`)을 수행한다.
//!
//! - upper 모델이 없으면 빠른 경로: 캐시 조각 합이 곧 액션 점수이며
//!   설정별로 워커 풀에서 병렬 처리한다.
//! - upper 모델이 있으면 점수 경로: 활성 상태 전체를 한 번에 점수화한 뒤
//!   순차적으로 액션을 적용한다.

pub mod decode;
pub mod frontier;
pub mod train;

use std::sync::Arc;

use ndarray::{Array2, ArrayView2, Axis};

use crate::core::config::ParserConfig;
use crate::core::error::{ParserError, Result};
use crate::core::model::{DeviceStream, LowerModel, UpperModel};
use crate::core::transition::{Document, TransitionSystem};

pub use decode::DecodeStats;
pub use frontier::{Arena, Frontier, Handle, Slot};
pub use train::{BackpropQueue, UpdateOutput};

/// 전이 기반 파서 엔진
pub struct Parser<T: TransitionSystem> {
    moves: T,
    lower: Arc<dyn LowerModel>,
    upper: Option<Arc<dyn UpperModel>>,
    stream: Option<Arc<dyn DeviceStream>>,
    config: ParserConfig,
    pool: rayon::ThreadPool,
}

impl<T: TransitionSystem> Parser<T> {
    /// 구성 검증, 모델 폭 확인, 워커 풀 생성
    pub fn new(
        moves: T,
        lower: Arc<dyn LowerModel>,
        upper: Option<Arc<dyn UpperModel>>,
        config: ParserConfig,
    ) -> Result<Self> {
        config.validate()?;
        let n_actions = moves.n_actions();
        if n_actions == 0 {
            return Err(ParserError::InvalidConfig {
                field: "moves",
                reason: "transition system has no actions".into(),
            });
        }
        match &upper {
            Some(upper) => {
                if upper.n_in() != lower.n_out() || upper.n_out() != n_actions {
                    return Err(ParserError::shape(
                        "upper model",
                        &[lower.n_out(), n_actions],
                        &[upper.n_in(), upper.n_out()],
                    ));
                }
            }
            None => {
                if lower.n_out() != n_actions {
                    return Err(ParserError::shape("lower model output", &[n_actions], &[lower.n_out()]));
                }
            }
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.n_threads)
            .thread_name(|i| format!("parser-worker-{}", i))
            .build()?;
        log::info!(
            "parser ready: {} actions, F={}, {} path, {} workers",
            n_actions,
            lower.n_context(),
            if upper.is_some() { "scored" } else { "fast" },
            config.n_threads
        );

        Ok(Self {
            moves,
            lower,
            upper,
            stream: None,
            config,
            pool,
        })
    }

    /// 비동기 디바이스 스트림 연결
    pub fn with_stream(mut self, stream: Arc<dyn DeviceStream>) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn moves(&self) -> &T {
        &self.moves
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn lower(&self) -> &Arc<dyn LowerModel> {
        &self.lower
    }

    pub fn upper(&self) -> Option<&Arc<dyn UpperModel>> {
        self.upper.as_ref()
    }

    /// upper 모델이 없어 빠른 경로로 디코딩하는지
    pub fn uses_fast_path(&self) -> bool {
        self.upper.is_none()
    }

    /// 누적된 그래디언트로 두 모델 갱신
    pub fn finish_update(&self, learn_rate: f32) {
        self.lower.finish_update(learn_rate);
        if let Some(upper) = &self.upper {
            upper.finish_update(learn_rate);
        }
    }

    /// 문서별 토큰 벡터를 하나로 이어 붙이고 문서 시작 위치를 돌려준다
    fn flatten(&self, docs: &[T::Doc]) -> Result<(Array2<f32>, Vec<usize>, Vec<usize>)> {
        let width = self.lower.n_in();
        let mut views: Vec<ArrayView2<f32>> = Vec::with_capacity(docs.len());
        let mut offsets = Vec::with_capacity(docs.len());
        let mut lengths = Vec::with_capacity(docs.len());
        let mut offset = 0;
        for doc in docs {
            let vectors = doc.token_vectors();
            if vectors.nrows() != doc.len() || vectors.ncols() != width {
                return Err(ParserError::shape(
                    "document token vectors",
                    &[doc.len(), width],
                    vectors.shape(),
                ));
            }
            offsets.push(offset);
            lengths.push(doc.len());
            offset += doc.len();
            views.push(vectors);
        }
        let tokvecs = if views.is_empty() {
            Array2::zeros((0, width))
        } else {
            ndarray::concatenate(Axis(0), &views)
                .map_err(|_| ParserError::shape("flattened token vectors", &[offset, width], &[]))?
        };
        Ok((tokvecs, offsets, lengths))
    }

    /// 선택 실패를 문서 정보가 담긴 에러로
    fn no_valid_action(&self, docs: &[T::Doc], doc_index: usize, round: usize, state: String) -> ParserError {
        ParserError::NoValidAction {
            doc_index,
            round,
            document: docs.get(doc_index).map(|doc| doc.describe()).unwrap_or_default(),
            state,
        }
    }
}

#[cfg(test)]
mod __tests__;
