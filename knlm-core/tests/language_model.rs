use knlm_core::io::{build_output_path, read_corpus};
use knlm_core::model::tuning::sweep_discounts;
use knlm_core::{Aggregator, Estimator, GenerationConfig, Generator, KnlmError, LanguageModel, Table};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;

const CORPUS: &str = "\
the cat sat on the mat
the dog sat on the log
a cat chased the dog
the dog chased a cat
a bird sat on the cat
";

const HELD_OUT: &str = "\
the cat sat on the log
a dog chased the bird
the mat sat
";

fn train(order: usize, text: &str) -> LanguageModel {
	let mut aggregator = Aggregator::new(order).unwrap();
	for line in text.lines() {
		let tokens: Vec<&str> = line.split_whitespace().collect();
		aggregator.observe_sentence(&tokens).unwrap();
	}
	aggregator.finalize().unwrap()
}

fn split(text: &str) -> Vec<Vec<String>> {
	text.lines().map(|l| l.split_whitespace().map(str::to_owned).collect()).collect()
}

#[test]
fn two_sentence_bigram_scenario() {
	let model = train(2, "a b a\na b c\n");
	assert_eq!(model.count_of(Table::FullCount, &["<s>", "a"]), Some(2));
	assert_eq!(model.count_of(Table::FullCount, &["a", "b"]), Some(2));
	assert_eq!(model.count_of(Table::PrefixContinuations, &["<s>"]), Some(1));
	assert_eq!(model.vocab_tokens().collect::<Vec<_>>(), vec!["a", "<s>", "b", "c"]);

	let estimator = Estimator::new(&model, 0.75).unwrap();
	assert!(estimator.probability(&["a", "b"]) > estimator.probability(&["a", "c"]));
}

#[test]
fn every_context_is_a_proper_distribution() {
	let model = train(3, CORPUS);
	let estimator = Estimator::new(&model, 0.6).unwrap();
	let mut rng = StdRng::seed_from_u64(2024);
	let vocab = model.vocab().to_vec();
	for _ in 0..50 {
		let context = [vocab[rng.random_range(0..vocab.len())], vocab[rng.random_range(0..vocab.len())]];
		let total = estimator.distribution(&context).total_mass();
		assert!((total - 1.0).abs() < 1e-9, "{:?} sums to {}", model.render(&context), total);
	}
}

#[test]
fn unseen_tokens_keep_a_positive_floor() {
	let model = train(3, CORPUS);
	let estimator = Estimator::new(&model, 0.75).unwrap();
	let p = estimator.probability(&["the", "cat", "platypus"]);
	assert!(p > 0.0);
	assert!(p <= estimator.uniform());
}

#[test]
fn perplexity_sweep_has_no_degenerate_values() {
	let model = train(3, CORPUS);
	let held_out = split(HELD_OUT);
	let scores = sweep_discounts(&model, &held_out, 20).unwrap();
	assert_eq!(scores.len(), 20);
	for score in &scores {
		assert!(score.perplexity.is_finite() && score.perplexity >= 1.0, "{score:?}");
	}
	let best = scores.iter().map(|s| s.perplexity).fold(f64::INFINITY, f64::min);
	assert!(best < model.vocab().len() as f64 * 2.0);
}

#[test]
fn perplexity_needs_sentences() {
	let model = train(2, CORPUS);
	let none: Vec<Vec<String>> = Vec::new();
	assert!(matches!(model.perplexity(&none, 0.75), Err(KnlmError::EmptyEvaluationSet)));
}

#[test]
fn json_and_binary_models_round_trip() {
	let model = train(4, CORPUS);
	let dir = tempfile::tempdir().unwrap();
	let json_path = dir.path().join("lm.json");
	let bin_path = build_output_path(&json_path, "bin").unwrap();

	model.save(&json_path).unwrap();
	model.save(&bin_path).unwrap();

	let from_json = LanguageModel::load(&json_path).unwrap();
	let from_bin = LanguageModel::load(&bin_path).unwrap();
	let record = model.to_record().unwrap();
	assert_eq!(from_json.to_record().unwrap(), record);
	assert_eq!(from_bin.to_record().unwrap(), record);

	let held_out = split(HELD_OUT);
	let expected = model.perplexity(&held_out, 0.75).unwrap();
	let reloaded = from_json.perplexity(&held_out, 0.75).unwrap();
	assert!((expected - reloaded).abs() < 1e-9);
}

#[test]
fn persisted_json_has_the_documented_shape() {
	let model = train(2, "a b\n");
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("lm.json");
	model.save(&path).unwrap();

	let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
	let object = value.as_object().unwrap();
	for field in ["n", "eos", "c_abc", "c_abx", "u_abx", "u_xbc", "u_xbx", "r_xbx", "vocab"] {
		assert!(object.contains_key(field), "missing {field}");
	}
	assert_eq!(value["n"], 2);
	assert_eq!(value["eos"], "<s>");
	assert_eq!(value["c_abc"]["a|b"], 1);
}

#[test]
fn malformed_model_fails_at_load() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("broken.json");
	fs::write(
		&path,
		r#"{"n": 2, "eos": "<s>", "c_abc": {}, "c_abx": {}, "u_abx": {}, "u_xbc": {}, "u_xbx": {}, "r_xbx": {}, "vocab": []}"#,
	)
	.unwrap();
	assert!(matches!(LanguageModel::load(&path), Err(KnlmError::InvalidRecord(_))));

	fs::write(&path, r#"{"n": 2, "eos": "<s>"}"#).unwrap();
	assert!(matches!(LanguageModel::load(&path), Err(KnlmError::Json(_))));
}

#[test]
fn training_from_a_corpus_file() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("train.txt");
	fs::write(&path, CORPUS).unwrap();

	let mut aggregator = Aggregator::new(3).unwrap();
	for sentence in read_corpus(&path).unwrap() {
		aggregator.observe_sentence(&sentence).unwrap();
	}
	let from_file = aggregator.finalize().unwrap();
	assert_eq!(from_file.to_record().unwrap(), train(3, CORPUS).to_record().unwrap());
}

#[test]
fn seeded_generation_is_reproducible() {
	let mut config = GenerationConfig::default();
	config.seed = Some(11);

	let mut first = Generator::new(train(3, CORPUS), config.clone()).unwrap();
	let mut second = Generator::new(train(3, CORPUS), config).unwrap();
	assert_eq!(first.generate_sentences(20).unwrap(), second.generate_sentences(20).unwrap());
}

#[test]
fn estimators_with_different_discounts_share_a_model() {
	let model = train(3, CORPUS);
	let low = Estimator::new(&model, 0.1).unwrap();
	let high = Estimator::new(&model, 0.9).unwrap();
	let seen = ["the", "cat", "sat"];
	// less discounting keeps more mass on a seen trigram
	assert!(low.probability(&seen) > high.probability(&seen));
	assert!((low.discount() - 0.1).abs() < f64::EPSILON);
}
