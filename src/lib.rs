//! 전이 기반 구조 예측기의 디코딩 / 학습 엔진
//!
//! 토큰 벡터를 한 번만 미리 계산해 캐시하고, 많은 파싱 설정을 라운드 단위로
//! 함께 전진시키며, 비용 기반 다중 정답 손실로 토큰 벡터 그래디언트를 돌려준다.

pub mod core;

// 핵심 모듈들 재수출
pub use self::core::{
    // 엔진
    DecodeStats, Parser, UpdateOutput,
    // 구성 및 에러
    LossKind, ParserConfig, ParserError, Result,
    // 협력자 계약
    Action, Configuration, Document, LowerModel, TransitionSystem, UpperModel,
    DeviceStream, TokenId, NO_TOKEN,
    // 특징 캐시
    FeatureCache, GradientBuffer,
};

// 편의 타입 별칭들
pub type ToyParser = Parser<self::core::ShiftReduce>;
