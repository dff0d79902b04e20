//! # 특징 캐시 모듈
//!
//! lower 모델의 일괄 계산을 재사용 가능한 토큰별 은닉 조각으로 바꾸는 계층과,
//! 그 역방향인 토큰 벡터 그래디언트 누적 버퍼

pub mod feature_cache;
pub mod gradient_buffer;

pub use feature_cache::{mask_absent, FeatureCache, FeatureTable, StateBackprop};
pub use gradient_buffer::GradientBuffer;
