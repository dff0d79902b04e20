//! # parser 모듈 테스트

pub mod fixtures;
pub mod frontier_test;
