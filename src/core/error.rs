//! 파서 엔진 에러 타입

/// 파서 엔진 결과 타입
pub type Result<T> = std::result::Result<T, ParserError>;

/// 파서 엔진 에러
///
/// 모두 치명적 오류이며 재시도 대상이 아니다. 협력자 계약이 지켜지면
/// 발생할 수 없거나, 호출 측 프로그래밍 결함을 뜻한다.
#[derive(Debug, thiserror::Error)]
pub enum ParserError {
    /// 종료되지 않은 설정에 유효한 액션이 하나도 없음
    #[error("no valid action for document {doc_index} at round {round}: document={document}, state={state}")]
    NoValidAction {
        /// 배치 내 문서 인덱스
        doc_index: usize,
        /// 디코딩 라운드
        round: usize,
        /// 문서 식별/내용
        document: String,
        /// 설정의 디버그 표현
        state: String,
    },

    /// 배열 형상과 선언된 특징/액션 수가 맞지 않음
    #[error("shape mismatch for '{what}': expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// 어떤 배열인지
        what: &'static str,
        /// 기대 형상
        expected: Vec<usize>,
        /// 실제 형상
        got: Vec<usize>,
    },

    /// 정답 구조를 전이 시스템 표현으로 바꿀 수 없음
    #[error("invalid gold for document {doc_index}: {reason}")]
    InvalidGold {
        /// 배치 내 문서 인덱스
        doc_index: usize,
        /// 사유
        reason: String,
    },

    /// 설정 값 오류
    #[error("invalid config '{field}': {reason}")]
    InvalidConfig {
        /// 필드 이름
        field: &'static str,
        /// 사유
        reason: String,
    },

    /// 지연된 디바이스 동기화 실패
    #[error("device synchronization failed: {reason}")]
    DeviceSync {
        /// 사유
        reason: String,
    },

    /// 워커 풀 생성 실패
    #[error("worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl ParserError {
    /// 형상 불일치 에러 생성 헬퍼
    pub fn shape(what: &'static str, expected: &[usize], got: &[usize]) -> Self {
        ParserError::ShapeMismatch {
            what,
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }
}
