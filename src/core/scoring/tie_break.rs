//! 액션 선택 규칙
//!
//! 모든 규칙은 유효성 마스크로 걸러진 고정 길이 점수 배열 위에서 동작한다.
//! 동점은 낮은 인덱스가 이긴다 (엄격한 `>` 비교).

/// 유효한 액션 중 최고 점수 인덱스
pub fn best_valid(scores: &[f32], is_valid: &[bool]) -> Option<usize> {
    debug_assert_eq!(scores.len(), is_valid.len());
    let mut best: Option<usize> = None;
    for (i, (&score, &valid)) in scores.iter().zip(is_valid).enumerate() {
        if !valid {
            continue;
        }
        match best {
            Some(b) if score <= scores[b] => {}
            _ => best = Some(i),
        }
    }
    best
}

/// 최소 비용을 가진 유효 액션들 중 최고 점수 인덱스
pub fn best_gold(scores: &[f32], costs: &[f32], is_valid: &[bool]) -> Option<usize> {
    debug_assert_eq!(scores.len(), costs.len());
    debug_assert_eq!(scores.len(), is_valid.len());
    let min_cost = min_valid_cost(costs, is_valid)?;

    let mut best: Option<usize> = None;
    for i in 0..scores.len() {
        if !is_valid[i] || costs[i] > min_cost {
            continue;
        }
        match best {
            Some(b) if scores[i] <= scores[b] => {}
            _ => best = Some(i),
        }
    }
    best
}

/// maxout 배치 `(n_classes, group_size)`에서 그룹 최대 점수가 가장 높은 유효 클래스
pub fn best_valid_grouped(scores: &[f32], is_valid: &[bool], group_size: usize) -> Option<usize> {
    debug_assert_eq!(scores.len(), is_valid.len() * group_size);
    let mut best: Option<usize> = None;
    let mut best_score = f32::NEG_INFINITY;
    for (class, group) in scores.chunks_exact(group_size).enumerate() {
        if !is_valid[class] {
            continue;
        }
        for &score in group {
            if best.is_none() || score > best_score {
                best = Some(class);
                best_score = score;
            }
        }
    }
    best
}

/// 유효 액션의 최소 비용 (유효 액션이 없으면 `None`)
pub fn min_valid_cost(costs: &[f32], is_valid: &[bool]) -> Option<f32> {
    costs
        .iter()
        .zip(is_valid)
        .filter(|(_, &valid)| valid)
        .map(|(&cost, _)| cost)
        .fold(None, |acc: Option<f32>, cost| match acc {
            Some(m) if m <= cost => Some(m),
            _ => Some(cost),
        })
}
