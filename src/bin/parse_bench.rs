use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use transition_parser::core::shift_reduce::N_CONTEXT;
use transition_parser::core::{
    Affine, LowerModel, ParserConfig, PrecomputableAffine, ShiftReduce, ShiftReduceGold, ToyDoc,
    UpperModel,
};
use transition_parser::{Document, Parser};

fn main() {
    env_logger::init();

    let common = [
        Arg::new("docs")
            .long("docs")
            .value_name("COUNT")
            .help("배치 문서 수")
            .value_parser(value_parser!(usize))
            .default_value("64"),
        Arg::new("max-len")
            .long("max-len")
            .value_name("TOKENS")
            .help("문서 최대 토큰 수")
            .value_parser(value_parser!(usize))
            .default_value("40"),
        Arg::new("width")
            .long("width")
            .value_name("DIM")
            .help("토큰 벡터 폭")
            .value_parser(value_parser!(usize))
            .default_value("32"),
        Arg::new("labels")
            .long("labels")
            .value_name("COUNT")
            .help("REDUCE 레이블 수")
            .value_parser(value_parser!(u32))
            .default_value("8"),
        Arg::new("hidden")
            .long("hidden")
            .value_name("DIM")
            .help("상태 벡터 폭 (upper 모델 사용 시)")
            .value_parser(value_parser!(usize))
            .default_value("64"),
        Arg::new("pieces")
            .long("pieces")
            .value_name("COUNT")
            .help("maxout 조각 수")
            .value_parser(value_parser!(usize))
            .default_value("2"),
        Arg::new("seed")
            .long("seed")
            .value_name("SEED")
            .help("난수 시드")
            .value_parser(value_parser!(u64))
            .default_value("0"),
        Arg::new("config")
            .long("config")
            .short('c')
            .value_name("FILE")
            .help("ParserConfig JSON 파일"),
    ];

    let matches = Command::new("parse_bench")
        .version("0.1.0")
        .about("전이 파서 엔진 벤치마크")
        .subcommand(
            Command::new("decode")
                .about("배치 디코딩 벤치마크")
                .args(common.clone())
                .arg(
                    Arg::new("upper")
                        .long("upper")
                        .help("upper 모델로 점수 경로 사용")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("iterations")
                        .long("iterations")
                        .short('i')
                        .value_name("COUNT")
                        .help("반복 횟수")
                        .value_parser(value_parser!(usize))
                        .default_value("10"),
                ),
        )
        .subcommand(
            Command::new("train")
                .about("학습 업데이트 벤치마크")
                .args(common)
                .arg(
                    Arg::new("updates")
                        .long("updates")
                        .short('u')
                        .value_name("COUNT")
                        .help("업데이트 횟수")
                        .value_parser(value_parser!(usize))
                        .default_value("20"),
                )
                .arg(
                    Arg::new("learn-rate")
                        .long("learn-rate")
                        .value_name("RATE")
                        .help("SGD 학습률")
                        .value_parser(value_parser!(f32))
                        .default_value("0.01"),
                ),
        )
        .get_matches();

    let result = match matches.subcommand() {
        Some(("decode", sub_matches)) => handle_decode(sub_matches),
        Some(("train", sub_matches)) => handle_train(sub_matches),
        _ => {
            println!("❌ 명령을 지정해주세요. --help를 참조하세요.");
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("❌ 오류: {:#}", e);
        std::process::exit(1);
    }
}

fn arg<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, name: &str) -> Result<T> {
    matches
        .get_one::<T>(name)
        .cloned()
        .with_context(|| format!("인자 누락: {}", name))
}

fn load_config(matches: &ArgMatches) -> Result<ParserConfig> {
    match matches.get_one::<String>("config") {
        Some(path) => ParserConfig::from_json_file(path),
        None => Ok(ParserConfig::default()),
    }
}

/// 무작위 토큰 벡터 문서 생성
fn random_docs(rng: &mut StdRng, n_docs: usize, max_len: usize, width: usize) -> Vec<ToyDoc> {
    (0..n_docs)
        .map(|i| {
            let len = rng.gen_range(1..=max_len.max(1));
            let vectors = Array2::from_shape_simple_fn((len, width), || rng.gen_range(-1.0f32..1.0));
            ToyDoc::new(format!("bench-{}", i), vectors)
        })
        .collect()
}

/// 왼쪽부터 내리는 정답, 레이블은 무작위
fn random_golds(rng: &mut StdRng, docs: &[ToyDoc], n_labels: u32) -> Vec<Option<ShiftReduceGold>> {
    docs.iter()
        .map(|doc| {
            Some(ShiftReduceGold {
                pop_order: Some((0..doc.len()).collect()),
                labels: (0..doc.len()).map(|_| Some(rng.gen_range(0..n_labels.max(1)))).collect(),
            })
        })
        .collect()
}

fn handle_decode(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;
    let n_docs: usize = arg(matches, "docs")?;
    let max_len: usize = arg(matches, "max-len")?;
    let width: usize = arg(matches, "width")?;
    let n_labels: u32 = arg(matches, "labels")?;
    let hidden: usize = arg(matches, "hidden")?;
    let pieces: usize = arg(matches, "pieces")?;
    let iterations: usize = arg(matches, "iterations")?;
    let use_upper = matches.get_flag("upper");
    let mut rng = StdRng::seed_from_u64(arg(matches, "seed")?);

    let moves = ShiftReduce::new(n_labels);
    let n_actions = 1 + moves.n_labels() as usize;
    let (lower, upper): (Arc<dyn LowerModel>, Option<Arc<dyn UpperModel>>) = if use_upper {
        let lower = PrecomputableAffine::new(width, N_CONTEXT, hidden, pieces, &mut rng);
        let upper: Arc<dyn UpperModel> = Arc::new(Affine::new(hidden, n_actions, &mut rng));
        (Arc::new(lower), Some(upper))
    } else {
        let lower = PrecomputableAffine::new(width, N_CONTEXT, n_actions, pieces, &mut rng);
        (Arc::new(lower), None)
    };
    let parser = Parser::new(moves, lower, upper, config)?;

    println!("⚡ 디코딩 벤치마크:");
    println!("   경로: {}", if parser.uses_fast_path() { "fast" } else { "scored" });
    println!("   문서: {} (최대 {} 토큰, 폭 {})", n_docs, max_len, width);
    println!("   워커: {}", parser.config().n_threads);

    let mut total_tokens = 0usize;
    let mut total_rounds = 0usize;
    let start = Instant::now();
    for _ in 0..iterations {
        let mut docs = random_docs(&mut rng, n_docs, max_len, width);
        total_tokens += docs.iter().map(|doc| doc.len()).sum::<usize>();
        let (_, stats) = parser.parse_batch(&mut docs)?;
        total_rounds += stats.n_rounds;
    }
    let elapsed = start.elapsed().as_secs_f64();

    println!("\n🏆 완료:");
    println!("   총 토큰: {}", total_tokens);
    println!("   평균 라운드: {:.1}", total_rounds as f64 / iterations.max(1) as f64);
    println!("   처리량: {:.0} tokens/s", total_tokens as f64 / elapsed.max(1e-9));
    Ok(())
}

fn handle_train(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;
    let n_docs: usize = arg(matches, "docs")?;
    let max_len: usize = arg(matches, "max-len")?;
    let width: usize = arg(matches, "width")?;
    let n_labels: u32 = arg(matches, "labels")?;
    let hidden: usize = arg(matches, "hidden")?;
    let pieces: usize = arg(matches, "pieces")?;
    let updates: usize = arg(matches, "updates")?;
    let learn_rate: f32 = arg(matches, "learn-rate")?;
    let mut rng = StdRng::seed_from_u64(arg(matches, "seed")?);

    let moves = ShiftReduce::new(n_labels);
    let n_actions = 1 + moves.n_labels() as usize;
    let lower = Arc::new(PrecomputableAffine::new(width, N_CONTEXT, hidden, pieces, &mut rng));
    let upper: Arc<dyn UpperModel> = Arc::new(Affine::new(hidden, n_actions, &mut rng));
    let parser = Parser::new(moves, lower, Some(upper), config)?;

    let docs = random_docs(&mut rng, n_docs, max_len, width);
    let golds = random_golds(&mut rng, &docs, n_labels);

    println!("🎯 학습 벤치마크: {} 문서, {} 업데이트", n_docs, updates);
    let progress = ProgressBar::new(updates as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>4}/{len:4} {msg}")?
            .progress_chars("█▉▊▋▌▍▎▏ "),
    );

    let start = Instant::now();
    let mut first_loss = None;
    let mut last_loss = 0.0f32;
    for _ in 0..updates {
        let out = parser.update(&docs, &golds)?;
        parser.finish_update(learn_rate);
        first_loss.get_or_insert(out.loss);
        last_loss = out.loss;
        progress.set_message(format!("loss {:.5} ({} rounds)", out.loss, out.n_rounds));
        progress.inc(1);
    }
    progress.finish_with_message("완료");

    println!("\n🏆 학습 완료:");
    println!("   초기 loss: {:.6}", first_loss.unwrap_or_default());
    println!("   최종 loss: {:.6}", last_loss);
    println!("   소요 시간: {:.2}초", start.elapsed().as_secs_f64());
    Ok(())
}
