//! # 구성 모듈
//!
//! 디코딩/학습 엔진의 하이퍼파라미터와 실행 설정

pub mod parser_config;

pub use parser_config::{LossKind, ParserConfig};

#[cfg(test)]
mod __tests__;
