//! # 점수 모델 인터페이스
//!
//! 파서 엔진은 두 단계 모델을 소비한다.
//! - lower: 토큰 벡터 전체에 대해 한 번만 호출되어 토큰별 은닉 조각을 미리 계산
//! - upper: 상태 벡터를 액션 점수로 변환 (없으면 빠른 경로)
//!
//! 모델 내부 구조는 이 크레이트의 관심사가 아니며, 테스트와 벤치마크용
//! 참조 구현만 함께 제공한다.

pub mod affine;
pub mod device;
pub mod precomputable_affine;

use std::sync::Arc;

use ndarray::{Array2, Array3, ArrayView2};

use crate::core::error::Result;
use crate::core::transition::TokenId;

pub use affine::Affine;
pub use device::{DeviceResident, DeviceStream, HostStream};
pub use precomputable_affine::PrecomputableAffine;

/// lower 모델 역전파
///
/// `(d_vector (n_states, n_out * n_pieces), token_ids (n_states, F))`를 받아
/// 위치별 토큰 그래디언트 `(n_states, F, n_in)`를 돌려준다.
/// 지연 플러시에서 여러 번 호출되므로 `Fn`이다.
pub type LowerBackprop =
    Arc<dyn Fn(ArrayView2<f32>, ArrayView2<TokenId>) -> Result<Array3<f32>> + Send + Sync>;

/// upper 모델 역전파: d_scores -> d_vector
pub type UpperBackprop = Box<dyn FnOnce(ArrayView2<f32>) -> Result<Array2<f32>> + Send>;

/// 토큰별 특징 조각을 미리 계산하는 모델
pub trait LowerModel: Send + Sync {
    /// 토큰 벡터 폭
    fn n_in(&self) -> usize;
    /// 문맥 위치 수 (F)
    fn n_context(&self) -> usize;
    /// 출력 폭 (maxout 조각 제외)
    fn n_out(&self) -> usize;
    /// maxout 조각 수
    fn n_pieces(&self) -> usize;

    /// 토큰 벡터 `(n_tokens, n_in)` 전체에 대한 일괄 계산
    ///
    /// 결과 형상은 `(n_tokens, F, n_out * n_pieces)`.
    fn begin_update(
        &self,
        token_vectors: ArrayView2<f32>,
        drop: f32,
    ) -> Result<(Array3<f32>, LowerBackprop)>;

    /// 누적된 그래디언트로 파라미터 갱신 (기본: 갱신 없음)
    fn finish_update(&self, _learn_rate: f32) {}
}

/// 상태 벡터를 액션 점수로 바꾸는 모델
pub trait UpperModel: Send + Sync {
    fn n_in(&self) -> usize;
    fn n_out(&self) -> usize;

    /// 추론 전용 순전파
    fn predict(&self, vectors: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// 학습용 순전파
    fn begin_update(
        &self,
        vectors: ArrayView2<f32>,
        drop: f32,
    ) -> Result<(Array2<f32>, UpperBackprop)>;

    /// 누적된 그래디언트로 파라미터 갱신 (기본: 갱신 없음)
    fn finish_update(&self, _learn_rate: f32) {}
}
