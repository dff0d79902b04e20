//! 문맥 위치별 가중치를 가진 선형 lower 모델 (참조 구현)
//!
//! 상태 벡터는 `sum_f W[f] · x[ids[f]]` 이므로 토큰마다 `W[f] · x`를 한 번만
//! 계산해 두면 디코딩 중에는 덧셈만 남는다.

use std::sync::Arc;

use ndarray::{s, Array2, Array3, ArrayView2, Axis};
use parking_lot::{Mutex, RwLock};
use rand::Rng;

use super::{LowerBackprop, LowerModel};
use crate::core::error::{ParserError, Result};
use crate::core::transition::TokenId;

/// PrecomputableAffine 가중치 그래디언트
#[derive(Debug, Clone)]
pub struct LowerGradients {
    /// `(F, n_out * n_pieces, n_in)`
    pub d_weights: Array3<f32>,
    /// 누적된 역전파 호출 수
    pub n_updates: usize,
}

/// 위치별 선형 lower 모델
#[derive(Debug)]
pub struct PrecomputableAffine {
    n_in: usize,
    n_context: usize,
    n_out: usize,
    n_pieces: usize,
    /// `(F, n_out * n_pieces, n_in)`
    weights: RwLock<Arc<Array3<f32>>>,
    gradients: Arc<Mutex<LowerGradients>>,
}

impl PrecomputableAffine {
    /// 균등 분포 초기화
    pub fn new<R: Rng>(
        n_in: usize,
        n_context: usize,
        n_out: usize,
        n_pieces: usize,
        rng: &mut R,
    ) -> Self {
        let width = n_out * n_pieces;
        let scale = (6.0 / (n_in * n_context + width) as f32).sqrt();
        let weights =
            Array3::from_shape_simple_fn((n_context, width, n_in), || rng.gen_range(-scale..scale));
        Self::build(n_in, n_context, n_out, n_pieces, weights)
    }

    /// 주어진 가중치로 생성
    pub fn from_weights(weights: Array3<f32>, n_out: usize, n_pieces: usize) -> Result<Self> {
        let (n_context, width, n_in) = weights.dim();
        if width != n_out * n_pieces {
            return Err(ParserError::shape(
                "lower weights",
                &[n_context, n_out * n_pieces, n_in],
                weights.shape(),
            ));
        }
        Ok(Self::build(n_in, n_context, n_out, n_pieces, weights))
    }

    fn build(n_in: usize, n_context: usize, n_out: usize, n_pieces: usize, weights: Array3<f32>) -> Self {
        let gradients = LowerGradients {
            d_weights: Array3::zeros(weights.raw_dim()),
            n_updates: 0,
        };
        Self {
            n_in,
            n_context,
            n_out,
            n_pieces,
            weights: RwLock::new(Arc::new(weights)),
            gradients: Arc::new(Mutex::new(gradients)),
        }
    }

    /// 현재 가중치 스냅샷
    pub fn weights(&self) -> Arc<Array3<f32>> {
        Arc::clone(&self.weights.read())
    }

    /// 누적된 그래디언트 스냅샷
    pub fn gradients(&self) -> LowerGradients {
        self.gradients.lock().clone()
    }
}

impl LowerModel for PrecomputableAffine {
    fn n_in(&self) -> usize {
        self.n_in
    }

    fn n_context(&self) -> usize {
        self.n_context
    }

    fn n_out(&self) -> usize {
        self.n_out
    }

    fn n_pieces(&self) -> usize {
        self.n_pieces
    }

    fn begin_update(
        &self,
        token_vectors: ArrayView2<f32>,
        _drop: f32,
    ) -> Result<(Array3<f32>, LowerBackprop)> {
        let (n_tokens, n_in) = token_vectors.dim();
        if n_in != self.n_in {
            return Err(ParserError::shape(
                "token vectors",
                &[n_tokens, self.n_in],
                &[n_tokens, n_in],
            ));
        }
        let width = self.n_out * self.n_pieces;
        let weights = self.weights();
        let mut cached = Array3::<f32>::zeros((n_tokens, self.n_context, width));
        for f in 0..self.n_context {
            let w_f = weights.index_axis(Axis(0), f);
            cached
                .slice_mut(s![.., f, ..])
                .assign(&token_vectors.dot(&w_f.t()));
        }

        let gradients = Arc::clone(&self.gradients);
        let inputs = token_vectors.to_owned();
        let n_context = self.n_context;
        let backprop: LowerBackprop = Arc::new(move |d_vector, ids| {
            let n_states = d_vector.nrows();
            if ids.dim() != (n_states, n_context) || d_vector.ncols() != width {
                return Err(ParserError::shape(
                    "lower backprop",
                    &[n_states, n_context, width],
                    &[ids.nrows(), ids.ncols(), d_vector.ncols()],
                ));
            }
            if let Some(&id) = ids.iter().find(|&&id| id >= 0 && id as usize >= inputs.nrows()) {
                return Err(ParserError::shape(
                    "lower backprop token id",
                    &[inputs.nrows()],
                    &[id as usize],
                ));
            }
            let mut d_features = Array3::<f32>::zeros((n_states, n_context, n_in));
            let mut gathered = Array2::<f32>::zeros((n_states, n_in));
            let mut grads = gradients.lock();
            for f in 0..n_context {
                let w_f = weights.index_axis(Axis(0), f);
                d_features
                    .slice_mut(s![.., f, ..])
                    .assign(&d_vector.dot(&w_f));

                gathered.fill(0.0);
                for (s, &id) in ids.column(f).iter().enumerate() {
                    if id >= 0 {
                        gathered.row_mut(s).assign(&inputs.row(id as usize));
                    }
                }
                let d_w = d_vector.t().dot(&gathered);
                grads
                    .d_weights
                    .index_axis_mut(Axis(0), f)
                    .scaled_add(1.0, &d_w);
            }
            grads.n_updates += 1;
            Ok(d_features)
        });

        Ok((cached, backprop))
    }

    /// SGD 한 스텝 적용 후 그래디언트 초기화
    fn finish_update(&self, learn_rate: f32) {
        let mut grads = self.gradients.lock();
        let mut weights = self.weights.write();
        Arc::make_mut(&mut weights).scaled_add(-learn_rate, &grads.d_weights);
        grads.d_weights.fill(0.0);
        grads.n_updates = 0;
    }
}
