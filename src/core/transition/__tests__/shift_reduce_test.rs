use crate::core::error::ParserError;
use crate::core::transition::shift_reduce::{REDUCE, SHIFT};
use crate::core::transition::{
    Action, Configuration, Document, ShiftReduce, ShiftReduceGold, ToyDoc, TransitionSystem,
    NO_TOKEN,
};
use ndarray::Array2;

fn doc(n: usize) -> ToyDoc {
    ToyDoc::new(format!("doc{}", n), Array2::zeros((n, 2)))
}

fn valid_of(moves: &ShiftReduce, state: &<ShiftReduce as TransitionSystem>::Config) -> Vec<bool> {
    let mut valid = vec![false; moves.n_actions()];
    moves.set_valid(&mut valid, state);
    valid
}

#[test]
fn 액션_목록_테스트() {
    let moves = ShiftReduce::new(2);
    assert_eq!(moves.n_actions(), 3);
    assert_eq!(moves.actions()[0], Action::new(SHIFT, 0));
    assert_eq!(moves.actions()[2], Action::new(REDUCE, 1));
}

#[test]
fn 초기상태_SHIFT만_허용_테스트() {
    let moves = ShiftReduce::new(1);
    let states = moves.init_batch(&[doc(3)]);
    assert_eq!(valid_of(&moves, &states[0]), vec![true, false]);
    assert!(!states[0].is_terminal());
}

#[test]
fn 빈_문서_종료상태_테스트() {
    let moves = ShiftReduce::new(1);
    let states = moves.init_batch(&[doc(0)]);
    assert!(states[0].is_terminal());
}

#[test]
fn 문맥토큰_채우기_테스트() {
    let moves = ShiftReduce::new(1);
    let mut state = moves.init_batch(&[doc(3)]).remove(0);
    let mut ids = [0; 4];

    state.fill_context_token_ids(&mut ids);
    assert_eq!(ids, [NO_TOKEN, NO_TOKEN, 0, 1]);

    moves.apply(&mut state, Action::new(SHIFT, 0));
    moves.apply(&mut state, Action::new(SHIFT, 0));
    state.fill_context_token_ids(&mut ids);
    assert_eq!(ids, [1, 0, 2, NO_TOKEN]);

    // 짧은 버퍼는 앞부분만 채운다
    let mut short = [7; 2];
    state.fill_context_token_ids(&mut short);
    assert_eq!(short, [1, 0]);
}

#[test]
fn 적용_및_마무리_테스트() {
    let moves = ShiftReduce::new(2);
    let mut d = doc(2);
    let mut state = moves.init_batch(std::slice::from_ref(&d)).remove(0);
    for action in [
        Action::new(SHIFT, 0),
        Action::new(REDUCE, 1),
        Action::new(SHIFT, 0),
        Action::new(REDUCE, 0),
    ] {
        moves.apply(&mut state, action);
    }
    assert!(state.is_terminal());
    assert_eq!(state.history().len(), 4);

    moves.finalize(&state, &mut d);
    assert_eq!(d.labels, vec![Some(1), Some(0)]);
    assert_eq!(d.pop_order, vec![0, 1]);
}

#[test]
fn 비용_REDUCE순서_추종_테스트() {
    let moves = ShiftReduce::new(2);
    let d = doc(3);
    let gold = ShiftReduceGold {
        pop_order: Some(vec![1, 0, 2]),
        labels: vec![Some(0), Some(1), None],
    };
    let target = moves.preprocess_gold(&d, &gold).unwrap();
    let mut state = moves.init_batch(std::slice::from_ref(&d)).remove(0);
    let mut valid = vec![false; 3];
    let mut costs = vec![0.0; 3];

    moves.apply(&mut state, Action::new(SHIFT, 0));
    moves.set_costs(&mut valid, &mut costs, &state, &target);
    // 스택 [0], 기대 토큰 1은 버퍼에 있음: SHIFT가 정답
    assert_eq!(valid, vec![true, true, true]);
    assert_eq!(costs[0], 0.0);
    assert!(costs[1] >= 1.0 && costs[2] >= 1.0);

    moves.apply(&mut state, Action::new(SHIFT, 0));
    moves.set_costs(&mut valid, &mut costs, &state, &target);
    // 스택 [0, 1], 꼭대기가 기대 토큰: REDUCE(레이블 1)만 비용 0
    assert_eq!(costs, vec![1.0, 1.0, 0.0]);
}

#[test]
fn 모호한_정답_영비용_테스트() {
    let moves = ShiftReduce::new(3);
    let d = doc(4);
    let gold = ShiftReduceGold {
        pop_order: None,
        labels: vec![None; 4],
    };
    let target = moves.preprocess_gold(&d, &gold).unwrap();
    let mut state = moves.init_batch(std::slice::from_ref(&d)).remove(0);
    moves.apply(&mut state, Action::new(SHIFT, 0));

    let mut valid = vec![false; 4];
    let mut costs = vec![9.0; 4];
    moves.set_costs(&mut valid, &mut costs, &state, &target);
    assert!(valid.iter().all(|&v| v));
    assert!(costs.iter().all(|&c| c == 0.0));
}

#[test]
fn 잘못된_정답_거부_테스트() {
    let moves = ShiftReduce::new(2);
    let d = doc(3);
    let cases = [
        ShiftReduceGold { pop_order: None, labels: vec![None; 2] },
        ShiftReduceGold { pop_order: None, labels: vec![Some(5), None, None] },
        ShiftReduceGold { pop_order: Some(vec![0, 0, 1]), labels: vec![None; 3] },
        ShiftReduceGold { pop_order: Some(vec![0, 1]), labels: vec![None; 3] },
    ];
    for gold in cases.iter() {
        assert!(matches!(
            moves.preprocess_gold(&d, gold),
            Err(ParserError::InvalidGold { .. })
        ));
    }
}

#[test]
fn test_describe_names_document() {
    assert_eq!(doc(3).describe(), "doc3 (3 tokens)");
}
