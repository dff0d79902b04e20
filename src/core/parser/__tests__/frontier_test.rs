use crate::core::parser::{Arena, Frontier};
use crate::core::transition::shift_reduce::{N_CONTEXT, SHIFT};
use crate::core::transition::{Action, Configuration, ShiftReduce, ShiftReduceState, TransitionSystem, NO_TOKEN};

fn arena(lengths: &[usize]) -> Arena<ShiftReduceState> {
    let mut offsets = Vec::new();
    let mut offset = 0;
    for &len in lengths {
        offsets.push(offset);
        offset += len;
    }
    let configs = lengths.iter().map(|&len| ShiftReduceState::new(len)).collect();
    Arena::new(configs, &offsets).unwrap()
}

#[test]
fn 토큰id_배치_오프셋_테스트() {
    let arena = arena(&[2, 3]);
    let ids = arena.token_ids(&[0, 1], N_CONTEXT).unwrap();
    // 빈 스택: S0, S1 없음, B0, B1만 존재
    assert_eq!(ids.row(0).to_vec(), vec![NO_TOKEN, NO_TOKEN, 0, 1]);
    assert_eq!(ids.row(1).to_vec(), vec![NO_TOKEN, NO_TOKEN, 2, 3]);
}

#[test]
fn 아레나_길이_불일치_거부_테스트() {
    let configs = vec![ShiftReduceState::new(1)];
    assert!(Arena::new(configs, &[0, 1]).is_err());
}

#[test]
fn 프런티어_종료_필터_제외_테스트() {
    let arena = arena(&[0, 2, 3, 1]);
    let frontier = Frontier::new(&arena, |handle, _| handle != 2);
    // 문서 0은 시작부터 종료
    assert_eq!(frontier.handles(), &[1, 3]);
}

#[test]
fn 프런티어_전진_종료제거_테스트() {
    let moves = ShiftReduce::new(1);
    let mut arena = arena(&[1, 2]);
    let mut frontier = Frontier::new(&arena, |_, _| true);
    assert_eq!(frontier.len(), 2);

    for handle in [0, 1] {
        moves.apply(&mut arena.get_mut(handle).config, Action::new(SHIFT, 0));
    }
    moves.apply(&mut arena.get_mut(0).config, moves.actions()[1]);
    assert!(arena.get(0).config.is_terminal());

    frontier.advance(&arena);
    assert_eq!(frontier.handles(), &[1]);
    frontier.advance(&arena);
    assert_eq!(frontier.handles(), &[1]);
}

#[test]
fn test_slots_mut_returns_requested_slots_only() {
    let mut arena = arena(&[1, 1, 1, 1]);
    let slots = arena.slots_mut(&[1, 3]);
    let indices: Vec<usize> = slots.iter().map(|slot| slot.doc_index).collect();
    assert_eq!(indices, vec![1, 3]);
}

#[test]
fn 설정_입력순서_유지_테스트() {
    let arena = arena(&[3, 1, 2]);
    let configs = arena.into_configs();
    let lengths: Vec<usize> = configs.iter().map(|c| c.buffer_len()).collect();
    assert_eq!(lengths, vec![3, 1, 2]);
}
