//! 선형 upper 모델 (참조 구현)

use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayView2, Axis};
use parking_lot::{Mutex, RwLock};
use rand::Rng;

use super::{UpperBackprop, UpperModel};
use crate::core::error::{ParserError, Result};

/// Affine 그래디언트
#[derive(Debug, Clone)]
pub struct AffineGradients {
    pub d_weights: Array2<f32>,
    pub d_bias: Array1<f32>,
}

#[derive(Debug, Clone)]
struct AffineParams {
    weights: Arc<Array2<f32>>,
    bias: Array1<f32>,
}

/// `scores = V · Wᵀ + b`
#[derive(Debug)]
pub struct Affine {
    /// `(n_out, n_in)` 가중치와 편향
    params: RwLock<AffineParams>,
    gradients: Arc<Mutex<AffineGradients>>,
}

impl Affine {
    /// 균등 분포 초기화, 편향은 0
    pub fn new<R: Rng>(n_in: usize, n_out: usize, rng: &mut R) -> Self {
        let scale = (6.0 / (n_in + n_out) as f32).sqrt();
        let weights = Array2::from_shape_simple_fn((n_out, n_in), || rng.gen_range(-scale..scale));
        Self::build(weights, Array1::zeros(n_out))
    }

    /// 주어진 가중치와 편향으로 생성
    pub fn from_weights(weights: Array2<f32>, bias: Array1<f32>) -> Result<Self> {
        if bias.len() != weights.nrows() {
            return Err(ParserError::shape("affine bias", &[weights.nrows()], &[bias.len()]));
        }
        Ok(Self::build(weights, bias))
    }

    fn build(weights: Array2<f32>, bias: Array1<f32>) -> Self {
        let gradients = AffineGradients {
            d_weights: Array2::zeros(weights.raw_dim()),
            d_bias: Array1::zeros(bias.len()),
        };
        Self {
            params: RwLock::new(AffineParams {
                weights: Arc::new(weights),
                bias,
            }),
            gradients: Arc::new(Mutex::new(gradients)),
        }
    }

    pub fn gradients(&self) -> AffineGradients {
        self.gradients.lock().clone()
    }

    /// 현재 가중치 스냅샷
    pub fn weights(&self) -> Arc<Array2<f32>> {
        Arc::clone(&self.params.read().weights)
    }

    pub fn bias(&self) -> Array1<f32> {
        self.params.read().bias.clone()
    }

    fn check_input(&self, vectors: &ArrayView2<f32>) -> Result<()> {
        if vectors.ncols() != self.n_in() {
            return Err(ParserError::shape(
                "affine input",
                &[vectors.nrows(), self.n_in()],
                vectors.shape(),
            ));
        }
        Ok(())
    }
}

impl UpperModel for Affine {
    fn n_in(&self) -> usize {
        self.params.read().weights.ncols()
    }

    fn n_out(&self) -> usize {
        self.params.read().weights.nrows()
    }

    fn predict(&self, vectors: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_input(&vectors)?;
        let params = self.params.read();
        Ok(vectors.dot(&params.weights.t()) + &params.bias)
    }

    /// Affine 층은 드롭아웃을 쓰지 않는다
    fn begin_update(
        &self,
        vectors: ArrayView2<f32>,
        _drop: f32,
    ) -> Result<(Array2<f32>, UpperBackprop)> {
        let scores = self.predict(vectors)?;
        let inputs = vectors.to_owned();
        let weights = self.weights();
        let gradients = Arc::clone(&self.gradients);
        let backprop: UpperBackprop = Box::new(move |d_scores| {
            if d_scores.dim() != (inputs.nrows(), weights.nrows()) {
                return Err(ParserError::shape(
                    "affine d_scores",
                    &[inputs.nrows(), weights.nrows()],
                    d_scores.shape(),
                ));
            }
            let mut grads = gradients.lock();
            grads.d_weights.scaled_add(1.0, &d_scores.t().dot(&inputs));
            grads.d_bias.scaled_add(1.0, &d_scores.sum_axis(Axis(0)));
            Ok(d_scores.dot(&*weights))
        });
        Ok((scores, backprop))
    }

    /// SGD 한 스텝 적용 후 그래디언트 초기화
    fn finish_update(&self, learn_rate: f32) {
        let mut grads = self.gradients.lock();
        let mut params = self.params.write();
        Arc::make_mut(&mut params.weights).scaled_add(-learn_rate, &grads.d_weights);
        params.bias.scaled_add(-learn_rate, &grads.d_bias);
        grads.d_weights.fill(0.0);
        grads.d_bias.fill(0.0);
    }
}
