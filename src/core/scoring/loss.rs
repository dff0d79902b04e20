//! Cost-sensitive 손실 함수
//!
//! 점수, 비용, 유효성 마스크로부터 액션별 그래디언트를 계산한다.
//! 유효하지 않은 액션의 그래디언트는 항상 0이다.

use super::tie_break::{best_gold, best_valid};
use crate::core::config::LossKind;

/// 정규화 상수의 최소값 (퇴화된 비용 집합에서도 유한한 그래디언트 보장)
pub const NORMALIZER_EPSILON: f64 = 1e-10;

/// 다중 정답 로그 손실
///
/// 최소 유효 비용을 가진 모든 액션을 동시에 정답으로 취급한다.
/// 정답 액션: `softmax_all(i) - softmax_gold(i)`, 그 외 유효 액션: `softmax_all(i)`.
pub fn multilabel_log_loss(d_scores: &mut [f32], scores: &[f32], costs: &[f32], is_valid: &[bool]) {
    d_scores.iter_mut().for_each(|d| *d = 0.0);
    let (best, guess) = match (best_gold(scores, costs, is_valid), best_valid(scores, is_valid)) {
        (Some(best), Some(guess)) => (best, guess),
        _ => return,
    };

    let max_all = scores[guess] as f64;
    let max_gold = scores[best] as f64;
    let gold_cost = costs[best];

    let mut z = NORMALIZER_EPSILON;
    let mut gz = NORMALIZER_EPSILON;
    for i in 0..scores.len() {
        if !is_valid[i] {
            continue;
        }
        z += (scores[i] as f64 - max_all).exp();
        if costs[i] <= gold_cost {
            gz += (scores[i] as f64 - max_gold).exp();
        }
    }

    for i in 0..scores.len() {
        if !is_valid[i] {
            continue;
        }
        let p_all = (scores[i] as f64 - max_all).exp() / z;
        d_scores[i] = if costs[i] <= gold_cost {
            (p_all - (scores[i] as f64 - max_gold).exp() / gz) as f32
        } else {
            p_all as f32
        };
    }
}

/// 클리핑된 회귀 손실
///
/// 목표값은 `-cost(i)`이고 차이는 `±clip`으로 포화된다.
/// 최소 비용 액션보다 낮은 점수의 액션은 그래디언트 0.
pub fn regression_loss(
    d_scores: &mut [f32],
    scores: &[f32],
    costs: &[f32],
    is_valid: &[bool],
    clip: f32,
) {
    d_scores.iter_mut().for_each(|d| *d = 0.0);
    let best = match best_gold(scores, costs, is_valid) {
        Some(best) => best,
        None => return,
    };
    for i in 0..scores.len() {
        if !is_valid[i] || scores[i] < scores[best] {
            continue;
        }
        let diff = scores[i] - (-costs[i]);
        d_scores[i] = diff.clamp(-clip, clip);
    }
}

/// 구성된 손실 함수로 한 상태의 그래디언트 계산
pub fn compute_loss(
    kind: LossKind,
    d_scores: &mut [f32],
    scores: &[f32],
    costs: &[f32],
    is_valid: &[bool],
    regression_clip: f32,
) {
    match kind {
        LossKind::MultilabelLog => multilabel_log_loss(d_scores, scores, costs, is_valid),
        LossKind::Regression => regression_loss(d_scores, scores, costs, is_valid, regression_clip),
    }
}
