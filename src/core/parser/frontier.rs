//! 배치 설정 아레나와 라운드 동기 프런티어
//!
//! 설정은 아레나에 한 번 놓인 뒤 배치가 끝날 때까지 움직이지 않는다.
//! 프런티어는 아레나 핸들만 들고 있으며 "이번 라운드" / "다음 라운드"
//! 두 버퍼를 라운드마다 교체한다.

use ndarray::Array2;

use crate::core::error::{ParserError, Result};
use crate::core::transition::{Configuration, TokenId, NO_TOKEN};

/// 아레나 내 설정 위치
pub type Handle = usize;

/// 설정 하나와 배치 내 위치 정보
#[derive(Debug)]
pub struct Slot<C> {
    pub config: C,
    /// 입력 문서 인덱스
    pub doc_index: usize,
    /// 평탄화된 토큰 배열에서 문서 시작 위치
    pub offset: usize,
}

impl<C: Configuration> Slot<C> {
    /// 문맥 id를 평탄화된 배치 기준으로 채운다
    pub fn fill_token_ids(&self, out: &mut [TokenId]) {
        out.fill(NO_TOKEN);
        self.config.fill_context_token_ids(out);
        let offset = self.offset as TokenId;
        for id in out.iter_mut().filter(|id| **id >= 0) {
            *id += offset;
        }
    }
}

/// 입력 순서대로 설정을 보관하는 아레나. 핸들 = 입력 인덱스
#[derive(Debug)]
pub struct Arena<C> {
    slots: Vec<Slot<C>>,
}

impl<C: Configuration> Arena<C> {
    /// `configs[i]`는 `offsets[i]`에서 시작하는 문서 `i`의 설정
    pub fn new(configs: Vec<C>, offsets: &[usize]) -> Result<Self> {
        if configs.len() != offsets.len() {
            return Err(ParserError::shape("configurations", &[offsets.len()], &[configs.len()]));
        }
        let slots = configs
            .into_iter()
            .zip(offsets)
            .enumerate()
            .map(|(doc_index, (config, &offset))| Slot { config, doc_index, offset })
            .collect();
        Ok(Self { slots })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, handle: Handle) -> &Slot<C> {
        &self.slots[handle]
    }

    pub fn get_mut(&mut self, handle: Handle) -> &mut Slot<C> {
        &mut self.slots[handle]
    }

    /// 오름차순 핸들 목록에 해당하는 슬롯들의 가변 참조
    ///
    /// 각 슬롯은 많아야 한 번 나오므로 병렬 워커에 그대로 나눠줄 수 있다.
    pub fn slots_mut(&mut self, handles: &[Handle]) -> Vec<&mut Slot<C>> {
        let mut wanted = handles.iter().peekable();
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(handle, slot)| {
                if wanted.peek() == Some(&&handle) {
                    wanted.next();
                    Some(slot)
                } else {
                    None
                }
            })
            .collect()
    }

    /// 핸들 목록의 문맥 id를 `(n_states, n_context)` 배열로 모은다
    pub fn token_ids(&self, handles: &[Handle], n_context: usize) -> Result<Array2<TokenId>> {
        let mut ids = vec![0; handles.len() * n_context];
        if n_context > 0 {
            for (row, &handle) in ids.chunks_mut(n_context).zip(handles) {
                self.get(handle).fill_token_ids(row);
            }
        }
        Array2::from_shape_vec((handles.len(), n_context), ids)
            .map_err(|_| ParserError::shape("token ids", &[handles.len(), n_context], &[]))
    }

    /// 입력 순서대로 설정 반환
    pub fn into_configs(self) -> Vec<C> {
        self.slots.into_iter().map(|slot| slot.config).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot<C>> {
        self.slots.iter()
    }
}

/// 이중 버퍼 프런티어
#[derive(Debug, Default)]
pub struct Frontier {
    current: Vec<Handle>,
    next: Vec<Handle>,
}

impl Frontier {
    /// `keep`을 만족하는 핸들로 시작. 핸들은 오름차순으로 유지된다
    pub fn new<C: Configuration>(arena: &Arena<C>, mut keep: impl FnMut(Handle, &Slot<C>) -> bool) -> Self {
        let current = arena
            .iter()
            .enumerate()
            .filter(|(handle, slot)| !slot.config.is_terminal() && keep(*handle, slot))
            .map(|(handle, _)| handle)
            .collect();
        Self {
            current,
            next: Vec::new(),
        }
    }

    pub fn handles(&self) -> &[Handle] {
        &self.current
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// 종료된 설정을 걸러 다음 라운드 버퍼에 담고 교체
    pub fn advance<C: Configuration>(&mut self, arena: &Arena<C>) {
        self.next.clear();
        self.next.extend(
            self.current
                .iter()
                .copied()
                .filter(|&handle| !arena.get(handle).config.is_terminal()),
        );
        std::mem::swap(&mut self.current, &mut self.next);
    }
}
