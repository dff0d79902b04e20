use std::sync::Arc;

use ndarray::{Array1, Array2, Array3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use transition_parser::core::shift_reduce::{N_CONTEXT, REDUCE, SHIFT};
use transition_parser::core::{Affine, PrecomputableAffine, ShiftReduce, ToyDoc};
use transition_parser::{Configuration, Parser, ParserConfig};

fn docs(lengths: &[usize], width: usize, seed: u64) -> Vec<ToyDoc> {
    let mut rng = StdRng::seed_from_u64(seed);
    lengths
        .iter()
        .enumerate()
        .map(|(i, &len)| {
            let vectors = Array2::from_shape_simple_fn((len, width), || rng.gen_range(-1.0f32..1.0));
            ToyDoc::new(format!("doc-{}", i), vectors)
        })
        .collect()
}

#[test]
fn 첫_라운드_SHIFT_강제_테스트() {
    // 모든 문맥 위치에서 REDUCE 점수가 SHIFT보다 훨씬 큼
    let mut weights = Array3::<f32>::zeros((N_CONTEXT, 2, 1));
    for f in 0..N_CONTEXT {
        weights[[f, 0, 0]] = 1.0;
        weights[[f, 1, 0]] = 100.0;
    }
    let lower = Arc::new(PrecomputableAffine::from_weights(weights, 2, 1).unwrap());
    let parser = Parser::new(ShiftReduce::new(1), lower, None, ParserConfig::new().with_threads(1)).unwrap();

    let mut batch = vec![ToyDoc::new("three", Array2::from_elem((3, 1), 1.0))];
    let (configs, _) = parser.parse_batch(&mut batch).unwrap();
    let history = configs[0].history();
    assert_eq!(history[0].move_id, SHIFT);
    assert_eq!(history[1].move_id, REDUCE);
    assert!(configs[0].is_terminal());
}

#[test]
fn 다섯_문서_종료_순서_테스트() {
    let lengths = [6, 1, 9, 3, 4];
    let mut rng = StdRng::seed_from_u64(1);
    let lower = Arc::new(PrecomputableAffine::new(5, N_CONTEXT, 8, 3, &mut rng));
    let upper = Arc::new(Affine::new(8, 3, &mut rng));
    let parser = Parser::new(ShiftReduce::new(2), lower, Some(upper), ParserConfig::new()).unwrap();

    let mut batch = docs(&lengths, 5, 2);
    let (configs, stats) = parser.parse_batch(&mut batch).unwrap();

    assert_eq!(stats.n_docs, 5);
    assert_eq!(stats.n_rounds, 18);
    for ((config, doc), &len) in configs.iter().zip(&batch).zip(&lengths) {
        assert!(config.is_terminal());
        assert_eq!(config.history().len(), 2 * len);
        assert_eq!(config.pop_order(), doc.pop_order.as_slice());
        assert!(doc.labels.iter().all(|label| label.is_some()));
    }
}

#[test]
fn 병렬_빠른경로_단일워커_일치_테스트() {
    let lengths: Vec<usize> = (0..40).map(|i| (i * 7) % 13).collect();
    let mut rng = StdRng::seed_from_u64(8);
    let lower = Arc::new(PrecomputableAffine::new(6, N_CONTEXT, 5, 3, &mut rng));

    let decode = |n_threads: usize| {
        let parser = Parser::new(
            ShiftReduce::new(4),
            lower.clone(),
            None,
            ParserConfig::new().with_threads(n_threads),
        )
        .unwrap();
        let mut batch = docs(&lengths, 6, 13);
        let (configs, _) = parser.parse_batch(&mut batch).unwrap();
        configs
    };

    let single = decode(1);
    for n_threads in [2, 3, 8] {
        assert_eq!(decode(n_threads), single);
    }
}

#[test]
fn test_fast_and_scored_paths_agree_for_identity_upper() {
    // upper가 항등이고 lower 조각이 1개이며 점수가 모두 양수면 ReLU는 무의미하다
    let mut weights = Array3::<f32>::zeros((N_CONTEXT, 2, 2));
    for f in 0..N_CONTEXT {
        weights[[f, 0, 0]] = 1.0 + f as f32;
        weights[[f, 1, 1]] = 4.0 - f as f32;
    }
    let lower = Arc::new(PrecomputableAffine::from_weights(weights, 2, 1).unwrap());
    let identity = Arc::new(Affine::from_weights(Array2::eye(2), Array1::zeros(2)).unwrap());

    let fast = Parser::new(ShiftReduce::new(1), lower.clone(), None, ParserConfig::new()).unwrap();
    let scored = Parser::new(ShiftReduce::new(1), lower, Some(identity), ParserConfig::new()).unwrap();

    let lengths = [5, 2, 7];
    let mut rng = StdRng::seed_from_u64(4);
    let make = |rng: &mut StdRng| -> Vec<ToyDoc> {
        lengths
            .iter()
            .map(|&len| ToyDoc::new("pos", Array2::from_shape_simple_fn((len, 2), || rng.gen_range(0.1f32..1.0))))
            .collect()
    };
    let mut a = make(&mut rng);
    let mut b = a.clone();
    let (fast_configs, _) = fast.parse_batch(&mut a).unwrap();
    let (scored_configs, _) = scored.parse_batch(&mut b).unwrap();
    assert_eq!(fast_configs, scored_configs);
}
