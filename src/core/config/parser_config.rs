//! 파서 엔진 구성

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::error::{ParserError, Result};

/// 학습 손실 함수 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    /// 다중 정답 cost-sensitive 로그 손실
    MultilabelLog,
    /// 클리핑된 회귀 손실 (보조 경로)
    Regression,
}

impl Default for LossKind {
    fn default() -> Self {
        LossKind::MultilabelLog
    }
}

/// 파서 엔진 전체 구성
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// 빠른 경로 워커 풀 크기
    pub n_threads: usize,
    /// 학습 시 상태 벡터 드롭아웃 비율
    pub hidden_dropout: f32,
    /// 지연 역전파 플러시 임계값
    pub flush_every: usize,
    /// 학습 루프를 계속하기 위한 최소 활성 상태 수
    pub min_active_states: usize,
    /// 업데이트당 최대 학습 라운드
    pub max_steps: Option<usize>,
    /// 손실 함수
    pub loss: LossKind,
    /// 회귀 손실 클리핑 값
    pub regression_clip: f32,
    /// d_scores를 문서 수로 나눌지 여부
    pub normalize_by_docs: bool,
    /// 드롭아웃 RNG 시드
    pub seed: Option<u64>,
    /// 라운드별 액션 추적 로그
    pub debug: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            n_threads: num_cpus::get(),
            hidden_dropout: 0.0,
            flush_every: 50,
            min_active_states: 3,
            max_steps: None,
            loss: LossKind::MultilabelLog,
            regression_clip: 2.0,
            normalize_by_docs: true,
            seed: None,
            debug: false,
        }
    }
}

impl ParserConfig {
    /// 새 구성 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// JSON 문자열에서 구성 로드
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json).context("parser config JSON 파싱 실패")?;
        config.validate()?;
        Ok(config)
    }

    /// JSON 파일에서 구성 로드
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("parser config 읽기 실패: {}", path.display()))?;
        Self::from_json_str(&content)
    }

    /// 값 범위 검증
    pub fn validate(&self) -> Result<()> {
        if self.n_threads == 0 {
            return Err(ParserError::InvalidConfig {
                field: "n_threads",
                reason: "must be at least 1".into(),
            });
        }
        if !(0.0..1.0).contains(&self.hidden_dropout) {
            return Err(ParserError::InvalidConfig {
                field: "hidden_dropout",
                reason: format!("must be in [0, 1), got {}", self.hidden_dropout),
            });
        }
        if self.flush_every == 0 {
            return Err(ParserError::InvalidConfig {
                field: "flush_every",
                reason: "must be at least 1".into(),
            });
        }
        if self.min_active_states == 0 {
            return Err(ParserError::InvalidConfig {
                field: "min_active_states",
                reason: "must be at least 1".into(),
            });
        }
        if !(self.regression_clip > 0.0) {
            return Err(ParserError::InvalidConfig {
                field: "regression_clip",
                reason: format!("must be positive, got {}", self.regression_clip),
            });
        }
        Ok(())
    }

    /// 워커 수 설정
    pub fn with_threads(mut self, n_threads: usize) -> Self {
        self.n_threads = n_threads;
        self
    }

    /// 드롭아웃 비율 설정
    pub fn with_hidden_dropout(mut self, rate: f32) -> Self {
        self.hidden_dropout = rate;
        self
    }

    /// 플러시 임계값 설정
    pub fn with_flush_every(mut self, flush_every: usize) -> Self {
        self.flush_every = flush_every;
        self
    }

    /// 최소 활성 상태 수 설정
    pub fn with_min_active_states(mut self, n: usize) -> Self {
        self.min_active_states = n;
        self
    }

    /// 최대 라운드 설정
    pub fn with_max_steps(mut self, max_steps: Option<usize>) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// 손실 함수 설정
    pub fn with_loss(mut self, loss: LossKind) -> Self {
        self.loss = loss;
        self
    }

    /// 문서 수 정규화 설정
    pub fn with_normalize_by_docs(mut self, normalize: bool) -> Self {
        self.normalize_by_docs = normalize;
        self
    }

    /// 시드 설정
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// 디버그 추적 설정
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}
