use crate::core::config::{LossKind, ParserConfig};
use crate::core::error::ParserError;
use std::io::Write;

#[test]
fn 파서구성_기본값_테스트() {
    let config = ParserConfig::default();

    assert!(config.n_threads >= 1, "워커 수는 최소 1");
    assert_eq!(config.hidden_dropout, 0.0, "드롭아웃 기본값");
    assert_eq!(config.flush_every, 50, "플러시 임계값 기본값");
    assert_eq!(config.min_active_states, 3, "최소 활성 상태 기본값");
    assert_eq!(config.max_steps, None);
    assert_eq!(config.loss, LossKind::MultilabelLog);
    assert_eq!(config.regression_clip, 2.0);
    assert!(config.normalize_by_docs);
    assert!(!config.debug);
    assert!(config.validate().is_ok());
}

#[test]
fn 파서구성_체이닝_테스트() {
    let config = ParserConfig::new()
        .with_threads(2)
        .with_hidden_dropout(0.25)
        .with_flush_every(8)
        .with_min_active_states(1)
        .with_max_steps(Some(100))
        .with_loss(LossKind::Regression)
        .with_seed(7)
        .with_debug(true);

    assert_eq!(config.n_threads, 2);
    assert_eq!(config.hidden_dropout, 0.25);
    assert_eq!(config.flush_every, 8);
    assert_eq!(config.min_active_states, 1);
    assert_eq!(config.max_steps, Some(100));
    assert_eq!(config.loss, LossKind::Regression);
    assert_eq!(config.seed, Some(7));
    assert!(config.debug);
}

#[test]
fn 파서구성_범위밖_거부_테스트() {
    let bad = [
        ParserConfig::new().with_threads(0),
        ParserConfig::new().with_hidden_dropout(1.0),
        ParserConfig::new().with_hidden_dropout(-0.1),
        ParserConfig::new().with_flush_every(0),
        ParserConfig::new().with_min_active_states(0),
    ];
    for config in bad.iter() {
        match config.validate() {
            Err(ParserError::InvalidConfig { .. }) => {}
            other => panic!("잘못된 구성이 통과함: {:?} -> {:?}", config, other),
        }
    }
}

#[test]
fn 부분_JSON_기본값_테스트() {
    let config = ParserConfig::from_json_str(r#"{ "n_threads": 3, "loss": "regression" }"#)
        .expect("부분 JSON 로드");
    assert_eq!(config.n_threads, 3);
    assert_eq!(config.loss, LossKind::Regression);
    assert_eq!(config.flush_every, 50);
}

#[test]
fn test_json_file_roundtrip_and_invalid_values() {
    let config = ParserConfig::new().with_threads(4).with_seed(11);
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", serde_json::to_string(&config).unwrap()).unwrap();

    let loaded = ParserConfig::from_json_file(file.path()).unwrap();
    assert_eq!(loaded, config);

    assert!(ParserConfig::from_json_str(r#"{ "flush_every": 0 }"#).is_err());
    assert!(ParserConfig::from_json_file("/nonexistent/parser.json").is_err());
}
