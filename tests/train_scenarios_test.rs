use std::sync::Arc;

use approx::assert_abs_diff_eq;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use transition_parser::core::shift_reduce::{N_CONTEXT, SHIFT};
use transition_parser::core::{Affine, PrecomputableAffine, ShiftReduce, ShiftReduceGold, ToyDoc};
use transition_parser::{Action, Document, Parser, ParserConfig, TransitionSystem};

fn build(seed: u64) -> Parser<ShiftReduce> {
    let mut rng = StdRng::seed_from_u64(seed);
    let lower = Arc::new(PrecomputableAffine::new(4, N_CONTEXT, 6, 2, &mut rng));
    let upper = Arc::new(Affine::new(6, 4, &mut rng));
    let config = ParserConfig::new().with_threads(2).with_seed(seed);
    Parser::new(ShiftReduce::new(3), lower, Some(upper), config).unwrap()
}

fn docs(lengths: &[usize], seed: u64) -> Vec<ToyDoc> {
    let mut rng = StdRng::seed_from_u64(seed);
    lengths
        .iter()
        .map(|&len| ToyDoc::new("train", Array2::from_shape_simple_fn((len, 4), || rng.gen_range(-1.0f32..1.0))))
        .collect()
}

#[test]
fn 모호한_정답_유효액션_균일_그래디언트_테스트() {
    let parser = build(1);
    let moves = parser.moves();
    let batch = docs(&[3, 2], 2);
    let gold = |doc: &ToyDoc| ShiftReduceGold {
        pop_order: None,
        labels: vec![None; doc.len()],
    };

    let mut configs = moves.init_batch(&batch);
    // 문서 0: SHIFT 후 모든 액션 유효, 문서 1: 초기 상태 그대로
    moves.apply(&mut configs[0], Action::new(SHIFT, 0));
    let targets: Vec<_> = batch.iter().map(|doc| moves.preprocess_gold(doc, &gold(doc)).unwrap()).collect();
    let states: Vec<_> = configs.iter().zip(&targets).collect();

    let mut rng = StdRng::seed_from_u64(3);
    let scores = Array2::from_shape_simple_fn((2, moves.n_actions()), || rng.gen_range(-3.0f32..3.0));
    let d_scores = parser.batch_loss(&states, scores.view()).unwrap();

    let mut is_valid = vec![false; moves.n_actions()];
    for (row, config) in d_scores.outer_iter().zip(&configs) {
        moves.set_valid(&mut is_valid, config);
        let first_valid = row[is_valid.iter().position(|&v| v).unwrap()];
        for (&d, &valid) in row.iter().zip(&is_valid) {
            if valid {
                assert_abs_diff_eq!(d, first_valid, epsilon = 1e-6);
            } else {
                assert_eq!(d, 0.0);
            }
        }
    }
}

#[test]
fn test_ambiguous_batch_update_is_flat() {
    let parser = build(4);
    let batch = docs(&[4, 3, 5, 6], 5);
    let golds: Vec<_> = batch
        .iter()
        .map(|doc| {
            Some(ShiftReduceGold {
                pop_order: None,
                labels: vec![None; doc.len()],
            })
        })
        .collect();
    let out = parser.update(&batch, &golds).unwrap();
    assert!(out.n_rounds > 0);
    assert_abs_diff_eq!(out.loss, 0.0, epsilon = 1e-10);
    assert!(out.d_tokvecs.view().iter().all(|v| v.abs() < 1e-6));
}

#[test]
fn 학습_손실_감소_테스트() {
    let parser = build(6);
    let batch = docs(&[5, 6, 4, 7, 5, 6], 7);
    let golds: Vec<_> = batch
        .iter()
        .map(|doc| {
            Some(ShiftReduceGold {
                pop_order: Some((0..doc.len()).rev().collect()),
                labels: vec![Some(2); doc.len()],
            })
        })
        .collect();

    let first = parser.update(&batch, &golds).unwrap().loss;
    parser.finish_update(0.05);
    let mut last = first;
    for _ in 0..40 {
        last = parser.update(&batch, &golds).unwrap().loss;
        parser.finish_update(0.05);
    }
    assert!(first > 0.0);
    assert!(last < first, "loss did not decrease: {} -> {}", first, last);
}
