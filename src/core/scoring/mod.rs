//! # 점수 산술 모듈
//!
//! 액션 선택 규칙, cost-sensitive 손실, 드롭아웃 마스크

pub mod dropout;
pub mod loss;
pub mod tie_break;

pub use dropout::DropoutMask;
pub use loss::{compute_loss, multilabel_log_loss, regression_loss, NORMALIZER_EPSILON};
pub use tie_break::{best_gold, best_valid, best_valid_grouped, min_valid_cost};
