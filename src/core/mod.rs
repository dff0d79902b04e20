//! # 전이 파서 핵심 라이브러리 모듈
//!
//! 배치 디코딩, 특징 캐시, 동적 오라클 학습의 핵심 구성 요소들

pub mod config;
pub mod error;
pub mod features;
pub mod model;
pub mod parser;
pub mod scoring;
pub mod transition;

// 주요 타입들 재수출
pub use config::*;
pub use error::*;
pub use features::*;
pub use model::*;
pub use parser::*;
pub use scoring::*;
pub use transition::*;
