//! 파서 테스트 공용 픽스처

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ndarray::{Array1, Array2, Array3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::error::Result;
use crate::core::model::{Affine, DeviceStream, PrecomputableAffine};
use crate::core::transition::shift_reduce::N_CONTEXT;
use crate::core::transition::ToyDoc;

/// 토큰 벡터가 모두 `[1, 0]`인 문서들
pub fn flat_docs(lengths: &[usize]) -> Vec<ToyDoc> {
    lengths
        .iter()
        .enumerate()
        .map(|(i, &len)| {
            let mut vectors = Array2::<f32>::zeros((len, 2));
            vectors.column_mut(0).fill(1.0);
            ToyDoc::new(format!("doc-{}", i), vectors)
        })
        .collect()
}

/// 무작위 토큰 벡터 문서들
pub fn random_docs(lengths: &[usize], width: usize, seed: u64) -> Vec<ToyDoc> {
    let mut rng = StdRng::seed_from_u64(seed);
    lengths
        .iter()
        .enumerate()
        .map(|(i, &len)| {
            let vectors = Array2::from_shape_simple_fn((len, width), || rng.gen_range(-1.0f32..1.0));
            ToyDoc::new(format!("doc-{}", i), vectors)
        })
        .collect()
}

/// 빠른 경로용 lower: 문맥 토큰마다 SHIFT +1, REDUCE +`reduce_weight`
pub fn fast_lower(reduce_weight: f32) -> Arc<PrecomputableAffine> {
    let mut weights = Array3::<f32>::zeros((N_CONTEXT, 2, 2));
    for f in 0..N_CONTEXT {
        weights[[f, 0, 0]] = 1.0;
        weights[[f, 1, 0]] = reduce_weight;
    }
    Arc::new(PrecomputableAffine::from_weights(weights, 2, 1).unwrap())
}

/// 점수 경로용 lower: 위치마다 항등 가중치, n_out = 2
pub fn identity_lower() -> Arc<PrecomputableAffine> {
    let mut weights = Array3::<f32>::zeros((N_CONTEXT, 2, 2));
    for f in 0..N_CONTEXT {
        weights[[f, 0, 0]] = 1.0;
        weights[[f, 1, 1]] = 1.0;
    }
    Arc::new(PrecomputableAffine::from_weights(weights, 2, 1).unwrap())
}

/// 입력과 무관하게 편향만 점수가 되는 upper
pub fn bias_upper(bias: [f32; 2]) -> Arc<Affine> {
    Arc::new(Affine::from_weights(Array2::zeros((2, 2)), Array1::from(bias.to_vec())).unwrap())
}

/// 동기화 횟수를 세는 스트림
#[derive(Default)]
pub struct CountingStream {
    pub syncs: AtomicUsize,
}

impl CountingStream {
    pub fn count(&self) -> usize {
        self.syncs.load(Ordering::SeqCst)
    }
}

impl DeviceStream for CountingStream {
    fn synchronize(&self) -> Result<()> {
        self.syncs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
