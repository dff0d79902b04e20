//! 토큰 벡터 그래디언트 누적 버퍼
//!
//! 평탄화된 배치 토큰 벡터와 같은 형상. scatter-add로만 누적되며
//! sentinel 위치는 기여하지 않는다.

use ndarray::{s, Array2, ArrayView2, ArrayView3};

use crate::core::error::{ParserError, Result};
use crate::core::transition::TokenId;

#[derive(Debug, Clone)]
pub struct GradientBuffer {
    data: Array2<f32>,
    doc_lengths: Vec<usize>,
}

impl GradientBuffer {
    /// 문서별 토큰 수와 벡터 폭으로 0 버퍼 생성
    pub fn new(doc_lengths: Vec<usize>, width: usize) -> Self {
        let n_tokens = doc_lengths.iter().sum();
        Self {
            data: Array2::zeros((n_tokens, width)),
            doc_lengths,
        }
    }

    pub fn n_tokens(&self) -> usize {
        self.data.nrows()
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    pub fn into_inner(self) -> Array2<f32> {
        self.data
    }

    /// 위치별 그래디언트 `(n_states, F, width)`를 `ids` 위치에 더한다
    pub fn scatter_add(
        &mut self,
        token_ids: ArrayView2<TokenId>,
        d_features: ArrayView3<f32>,
    ) -> Result<()> {
        let (n_states, n_context) = token_ids.dim();
        let expected = [n_states, n_context, self.width()];
        if d_features.shape() != expected {
            return Err(ParserError::shape("scatter gradient", &expected, d_features.shape()));
        }
        for ((state, f), &id) in token_ids.indexed_iter() {
            if id < 0 {
                continue;
            }
            let token = id as usize;
            if token >= self.n_tokens() {
                return Err(ParserError::shape("token id", &[self.n_tokens()], &[token]));
            }
            self.data
                .row_mut(token)
                .scaled_add(1.0, &d_features.slice(s![state, f, ..]));
        }
        Ok(())
    }

    /// 문서별 그래디언트로 분할
    pub fn split(&self) -> Vec<Array2<f32>> {
        let mut start = 0;
        self.doc_lengths
            .iter()
            .map(|&len| {
                let part = self.data.slice(s![start..start + len, ..]).to_owned();
                start += len;
                part
            })
            .collect()
    }
}
