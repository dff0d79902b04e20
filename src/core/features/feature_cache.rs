//! 토큰별 은닉 조각 캐시
//!
//! lower 모델을 배치당 한 번만 호출해 `(n_tokens, F, n_out * n_pieces)` 텐서를
//! 만들어 두고, 디코딩 라운드마다 상태별로 F개 조각을 더해 상태 벡터를 만든다.
//! 캐시는 배치가 끝날 때까지 읽기 전용이다.

use std::sync::Arc;

use ndarray::{s, Array2, Array3, ArrayView2, Axis};

use crate::core::error::{ParserError, Result};
use crate::core::model::{DeviceResident, DeviceStream, LowerBackprop, LowerModel};
use crate::core::transition::TokenId;

/// 미리 계산된 조각 테이블에 대한 읽기 뷰
#[derive(Clone, Copy)]
pub struct FeatureTable<'a> {
    cached: &'a Array3<f32>,
}

impl<'a> FeatureTable<'a> {
    pub fn n_tokens(&self) -> usize {
        self.cached.dim().0
    }

    pub fn n_context(&self) -> usize {
        self.cached.dim().1
    }

    /// 조각 폭 (`n_out * n_pieces`)
    pub fn width(&self) -> usize {
        self.cached.dim().2
    }

    /// 상태 하나의 문맥 id로 조각들을 `out`에 더한다. 음수 id는 건너뜀
    pub fn sum_into(&self, ids: &[TokenId], out: &mut [f32]) -> Result<()> {
        if ids.len() != self.n_context() || out.len() != self.width() {
            return Err(ParserError::shape(
                "state features",
                &[self.n_context(), self.width()],
                &[ids.len(), out.len()],
            ));
        }
        for (f, &id) in ids.iter().enumerate() {
            if id < 0 {
                continue;
            }
            let token = id as usize;
            if token >= self.n_tokens() {
                return Err(ParserError::shape("token id", &[self.n_tokens()], &[token]));
            }
            let slice = self.cached.slice(s![token, f, ..]);
            for (o, &v) in out.iter_mut().zip(slice.iter()) {
                *o += v;
            }
        }
        Ok(())
    }
}

/// 풀링 역전파에 필요한 선택 정보
#[derive(Debug, Clone)]
enum PoolMask {
    /// 조각이 하나면 ReLU
    Relu(Array2<bool>),
    /// 그룹별 argmax 조각 인덱스
    Maxout(Array2<usize>),
}

/// `extract` 한 번에 대한 역전파
#[derive(Clone)]
pub struct StateBackprop {
    token_ids: Array2<TokenId>,
    mask: PoolMask,
    n_pieces: usize,
    lower: LowerBackprop,
}

impl StateBackprop {
    /// 순전파에 쓰인 문맥 id `(n_states, F)`
    pub fn token_ids(&self) -> ArrayView2<'_, TokenId> {
        self.token_ids.view()
    }

    /// 상태 벡터 그래디언트 `(n_states, n_out)` -> 위치별 토큰 그래디언트 `(n_states, F, n_in)`
    ///
    /// 풀링 선택을 되돌린 뒤 lower 모델 역전파를 호출한다.
    /// sentinel 위치의 그래디언트는 0으로 만든다.
    pub fn backward(&self, d_state: ArrayView2<f32>) -> Result<Array3<f32>> {
        let n_states = self.token_ids.nrows();
        let d_unpooled = match &self.mask {
            PoolMask::Relu(active) => {
                if d_state.dim() != active.dim() {
                    return Err(ParserError::shape("d_state", active.shape(), d_state.shape()));
                }
                let mut d = d_state.to_owned();
                d.zip_mut_with(active, |g, &on| {
                    if !on {
                        *g = 0.0;
                    }
                });
                d
            }
            PoolMask::Maxout(which) => {
                if d_state.dim() != which.dim() {
                    return Err(ParserError::shape("d_state", which.shape(), d_state.shape()));
                }
                let n_out = which.ncols();
                let mut d = Array2::<f32>::zeros((n_states, n_out * self.n_pieces));
                for ((state, o), &piece) in which.indexed_iter() {
                    d[[state, o * self.n_pieces + piece]] = d_state[[state, o]];
                }
                d
            }
        };

        let mut d_features = (self.lower)(d_unpooled.view(), self.token_ids.view())?;
        let (rows, positions, _) = d_features.dim();
        if (rows, positions) != self.token_ids.dim() {
            return Err(ParserError::shape(
                "d_features",
                self.token_ids.shape(),
                &[rows, positions],
            ));
        }
        mask_absent(&mut d_features, self.token_ids.view());
        Ok(d_features)
    }
}

/// sentinel 문맥 위치의 그래디언트를 0으로
pub fn mask_absent(d_features: &mut Array3<f32>, token_ids: ArrayView2<TokenId>) {
    for ((state, f), &id) in token_ids.indexed_iter() {
        if id < 0 {
            d_features.slice_mut(s![state, f, ..]).fill(0.0);
        }
    }
}

/// 배치 단위 특징 캐시
pub struct FeatureCache {
    cached: DeviceResident<Array3<f32>>,
    backprop: LowerBackprop,
    batch_size: usize,
    n_tokens: usize,
    n_context: usize,
    n_out: usize,
    n_pieces: usize,
}

impl FeatureCache {
    /// lower 모델을 한 번 호출해 캐시 생성
    ///
    /// 스트림이 주어지면 호스트 전송은 발행만 하고, 첫 읽기에서 동기화한다.
    pub fn new(
        batch_size: usize,
        token_vectors: ArrayView2<f32>,
        lower: &dyn LowerModel,
        stream: Option<&Arc<dyn DeviceStream>>,
        drop: f32,
    ) -> Result<Self> {
        let n_tokens = token_vectors.nrows();
        let (n_context, n_out, n_pieces) = (lower.n_context(), lower.n_out(), lower.n_pieces());
        if n_pieces == 0 || n_out == 0 {
            return Err(ParserError::shape("lower output", &[n_out.max(1), n_pieces.max(1)], &[n_out, n_pieces]));
        }
        let (cached, backprop) = lower.begin_update(token_vectors, drop)?;
        let expected = [n_tokens, n_context, n_out * n_pieces];
        if cached.shape() != expected {
            return Err(ParserError::shape("precomputed features", &expected, cached.shape()));
        }
        log::debug!(
            "feature cache: {} docs, {} tokens, F={}, width={}x{}",
            batch_size,
            n_tokens,
            n_context,
            n_out,
            n_pieces
        );

        Ok(Self {
            cached: DeviceResident::issue(cached, stream),
            backprop,
            batch_size,
            n_tokens,
            n_context,
            n_out,
            n_pieces,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn n_tokens(&self) -> usize {
        self.n_tokens
    }

    pub fn n_context(&self) -> usize {
        self.n_context
    }

    pub fn n_out(&self) -> usize {
        self.n_out
    }

    pub fn n_pieces(&self) -> usize {
        self.n_pieces
    }

    /// 동기화 완료 여부
    pub fn is_synchronized(&self) -> bool {
        self.cached.is_ready()
    }

    /// 조각 테이블 (첫 호출에서 동기화)
    pub fn table(&self) -> Result<FeatureTable<'_>> {
        Ok(FeatureTable {
            cached: self.cached.get()?,
        })
    }

    /// 상태별 문맥 id `(n_states, F)`로 상태 벡터 `(n_states, n_out)`와 역전파 생성
    pub fn extract(&self, token_ids: ArrayView2<TokenId>) -> Result<(Array2<f32>, StateBackprop)> {
        let n_states = token_ids.nrows();
        if token_ids.ncols() != self.n_context {
            return Err(ParserError::shape(
                "token ids",
                &[n_states, self.n_context],
                token_ids.shape(),
            ));
        }
        let table = self.table()?;
        let width = self.n_out * self.n_pieces;
        let mut summed = vec![0.0f32; n_states * width];
        let mut ids_buf: Vec<TokenId> = Vec::with_capacity(self.n_context);
        for (ids, out) in token_ids.outer_iter().zip(summed.chunks_mut(width)) {
            ids_buf.clear();
            ids_buf.extend(ids.iter().copied());
            table.sum_into(&ids_buf, out)?;
        }
        let summed = Array2::from_shape_vec((n_states, width), summed)
            .map_err(|_| ParserError::shape("state vectors", &[n_states, width], &[n_states * width]))?;

        let (state_vectors, mask) = self.nonlinearity(summed);
        let backprop = StateBackprop {
            token_ids: token_ids.to_owned(),
            mask,
            n_pieces: self.n_pieces,
            lower: Arc::clone(&self.backprop),
        };
        Ok((state_vectors, backprop))
    }

    fn nonlinearity(&self, mut summed: Array2<f32>) -> (Array2<f32>, PoolMask) {
        if self.n_pieces == 1 {
            let active = summed.mapv(|v| v >= 0.0);
            summed.mapv_inplace(|v| v.max(0.0));
            return (summed, PoolMask::Relu(active));
        }
        let n_states = summed.nrows();
        let mut pooled = Array2::<f32>::zeros((n_states, self.n_out));
        let mut which = Array2::<usize>::zeros((n_states, self.n_out));
        for (state, row) in summed.axis_iter(Axis(0)).enumerate() {
            for (o, group) in row.exact_chunks(self.n_pieces).into_iter().enumerate() {
                let mut best = 0;
                for (p, &v) in group.iter().enumerate() {
                    if v > group[best] {
                        best = p;
                    }
                }
                pooled[[state, o]] = group[best];
                which[[state, o]] = best;
            }
        }
        (pooled, PoolMask::Maxout(which))
    }
}
