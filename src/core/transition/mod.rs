//! # 전이 시스템 인터페이스
//!
//! 파서 엔진이 소비하는 협력자 계약: 설정(configuration), 문서, 전이 시스템.
//! 액션 목록의 의미와 설정의 내부 표현은 전이 시스템이 소유한다.

pub mod shift_reduce;

use std::fmt::Debug;

use ndarray::ArrayView2;

use crate::core::error::Result;

pub use shift_reduce::{ShiftReduce, ShiftReduceGold, ShiftReduceState, ShiftReduceTarget, ToyDoc};

/// 평탄화된 배치 내 토큰 위치
pub type TokenId = i32;

/// 문맥 위치에 토큰이 없음을 뜻하는 sentinel
pub const NO_TOKEN: TokenId = -1;

/// `{ move, label }` 액션 레코드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Action {
    /// 전이 시스템이 정의하는 이동 종류
    pub move_id: u8,
    /// 레이블
    pub label: u32,
}

impl Action {
    pub const fn new(move_id: u8, label: u32) -> Self {
        Self { move_id, label }
    }
}

/// 문서 하나에 대한 부분 구조 상태
pub trait Configuration: Debug + Send {
    /// 더 적용할 액션이 없는지
    fn is_terminal(&self) -> bool;

    /// 문맥 위치별 문서 내 토큰 인덱스를 채운다. 없는 위치는 `NO_TOKEN`
    fn fill_context_token_ids(&self, out: &mut [TokenId]);
}

/// 입력 문서
pub trait Document {
    /// 토큰 수
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 토큰 벡터 `(len, width)`
    fn token_vectors(&self) -> ArrayView2<'_, f32>;

    /// 오류 보고용 문서 식별/내용
    fn describe(&self) -> String {
        format!("<document with {} tokens>", self.len())
    }
}

/// 고정 크기 액션 목록을 가진 전이 시스템
pub trait TransitionSystem: Send + Sync {
    type Config: Configuration;
    type Doc: Document;
    /// 외부 정답 구조
    type Gold;
    /// 전이 시스템 고유의 비용 계산용 정답 표현
    type Target: Send + Sync;

    /// 액션 목록 (인덱스가 점수 단위)
    fn actions(&self) -> &[Action];

    fn n_actions(&self) -> usize {
        self.actions().len()
    }

    /// 문서마다 초기 설정 생성
    fn init_batch(&self, docs: &[Self::Doc]) -> Vec<Self::Config>;

    /// 유효 액션 마스크
    fn set_valid(&self, is_valid: &mut [bool], config: &Self::Config);

    /// 유효 마스크와 액션별 비용 (학습 전용)
    fn set_costs(
        &self,
        is_valid: &mut [bool],
        costs: &mut [f32],
        config: &Self::Config,
        target: &Self::Target,
    );

    /// 액션 적용
    fn apply(&self, config: &mut Self::Config, action: Action);

    /// 최종 구조를 문서에 기록
    fn finalize(&self, config: &Self::Config, doc: &mut Self::Doc);

    /// 정답 전처리
    fn preprocess_gold(&self, doc: &Self::Doc, gold: &Self::Gold) -> Result<Self::Target>;
}

#[cfg(test)]
mod __tests__;
