//! 상태 벡터 드롭아웃 마스크
//!
//! 순전파와 역전파에 같은 마스크를 곱하기 위해 마스크를 값으로 보관한다.

use ndarray::Array2;
use rand::Rng;

/// 곱셈형 드롭아웃 마스크 (값은 0 또는 `1/(1-rate)`)
#[derive(Debug, Clone)]
pub struct DropoutMask {
    mask: Option<Array2<f32>>,
}

impl DropoutMask {
    /// 항등 마스크
    pub fn identity() -> Self {
        Self { mask: None }
    }

    /// 주어진 형상으로 마스크 샘플링. rate가 0이면 항등
    pub fn sample<R: Rng + ?Sized>(shape: (usize, usize), rate: f32, rng: &mut R) -> Self {
        if rate <= 0.0 {
            return Self::identity();
        }
        let scale = 1.0 / (1.0 - rate);
        let mask = Array2::from_shape_simple_fn(shape, || {
            if rng.gen::<f32>() < rate {
                0.0
            } else {
                scale
            }
        });
        Self { mask: Some(mask) }
    }

    pub fn is_identity(&self) -> bool {
        self.mask.is_none()
    }

    /// 배열에 마스크를 제자리 곱셈
    pub fn apply(&self, values: &mut Array2<f32>) {
        if let Some(mask) = &self.mask {
            *values *= mask;
        }
    }
}
