use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use env_logger::Env;
use log::info;

use knlm_core::io::{BINARY_EXTENSION, build_output_path, read_corpus};
use knlm_core::model::config::{
	DEFAULT_BOUNDARY, DEFAULT_DISCOUNT, DEFAULT_MAX_LENGTH, DEFAULT_ORDER, DEFAULT_SWEEP_STEPS,
};
use knlm_core::model::tuning::{best_discount, sweep_discounts};
use knlm_core::{Aggregator, GenerationConfig, Generator, LanguageModel, TrainingConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Kneser-Ney n-gram language model", long_about = None)]
struct Cli {
	/// Increase verbosity (-v, -vv)
	#[arg(short = 'v', long, global = true, action = ArgAction::Count)]
	verbose: u8,

	/// Decrease verbosity (-q, -qq)
	#[arg(short = 'q', long, global = true, action = ArgAction::Count)]
	quiet: u8,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Count a tokenized corpus into a model file
	Train(TrainArgs),
	/// Report held-out perplexity over a sweep of discounts
	Valid(ValidArgs),
	/// Sample sentences from a model
	Generate(GenerateArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
	/// Maximum n-gram order
	#[arg(long, default_value_t = DEFAULT_ORDER)]
	n: usize,

	/// Training corpus, one whitespace-tokenized sentence per line
	#[arg(long, value_name = "PATH", default_value = "train.txt")]
	train: PathBuf,

	/// Output model path (`.bin` selects the binary encoding)
	#[arg(long, value_name = "PATH", default_value = "lm.json")]
	lm: PathBuf,

	/// Sentence boundary marker
	#[arg(long, default_value = DEFAULT_BOUNDARY)]
	eos: String,

	/// Also write a binary copy next to the model
	#[arg(long)]
	binary: bool,
}

#[derive(Args, Debug)]
struct ValidArgs {
	/// Model to evaluate
	#[arg(long, value_name = "PATH", default_value = "lm.json")]
	lm: PathBuf,

	/// Held-out corpus
	#[arg(long, value_name = "PATH", default_value = "valid.txt")]
	valid: PathBuf,

	/// Number of discounts tried in (0, 1]
	#[arg(long, default_value_t = DEFAULT_SWEEP_STEPS)]
	iters: usize,

	/// Print every discount instead of the best one
	#[arg(long)]
	all: bool,

	/// Evaluate this single discount instead of sweeping
	#[arg(long, value_name = "D")]
	d: Option<f64>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
	/// Model to sample from
	#[arg(long, value_name = "PATH", default_value = "lm.json")]
	lm: PathBuf,

	/// Discount
	#[arg(long, default_value_t = DEFAULT_DISCOUNT)]
	d: f64,

	/// Number of sentences
	#[arg(long, default_value_t = 20)]
	iters: usize,

	/// Maximum tokens per sentence
	#[arg(long = "max-len", default_value_t = DEFAULT_MAX_LENGTH)]
	max_len: usize,

	/// Random seed, for reproducible output
	#[arg(long)]
	seed: Option<u64>,
}

fn main() -> Result<()> {
	let cli = Cli::parse();
	init_logging(cli.verbose, cli.quiet);

	match cli.command {
		Commands::Train(args) => run_train(args),
		Commands::Valid(args) => run_valid(args),
		Commands::Generate(args) => run_generate(args),
	}
}

fn init_logging(verbose: u8, quiet: u8) {
	use log::LevelFilter;

	let level = match (quiet, verbose) {
		(0, 0) => LevelFilter::Info,
		(0, 1) => LevelFilter::Debug,
		(0, _) => LevelFilter::Trace,
		(1, _) => LevelFilter::Warn,
		_ => LevelFilter::Error,
	};

	let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
	builder.format_timestamp_millis();
	builder.filter_level(level);
	let _ = builder.try_init();
}

fn run_train(args: TrainArgs) -> Result<()> {
	let mut config = TrainingConfig::new(args.n)?;
	config.set_boundary(&args.eos)?;

	let corpus = read_corpus(&args.train)
		.with_context(|| format!("failed to read corpus {}", args.train.display()))?;
	info!("Training order-{} model on {} sentences", config.order(), corpus.len());

	let mut aggregator = Aggregator::with_config(&config);
	for (line, sentence) in corpus.iter().enumerate() {
		aggregator
			.observe_sentence(sentence)
			.with_context(|| format!("{}:{}", args.train.display(), line + 1))?;
	}
	let model = aggregator.finalize()?;

	model
		.save(&args.lm)
		.with_context(|| format!("failed to write model {}", args.lm.display()))?;
	if args.binary {
		let binary_path = build_output_path(&args.lm, BINARY_EXTENSION)?;
		model
			.save(&binary_path)
			.with_context(|| format!("failed to write model {}", binary_path.display()))?;
	}
	Ok(())
}

fn load_model(path: &Path) -> Result<LanguageModel> {
	LanguageModel::load(path).with_context(|| format!("failed to load model {}", path.display()))
}

fn run_valid(args: ValidArgs) -> Result<()> {
	let model = load_model(&args.lm)?;
	let data = read_corpus(&args.valid)
		.with_context(|| format!("failed to read held-out set {}", args.valid.display()))?;

	if let Some(d) = args.d {
		println!("{:.4}\t{}", d, model.perplexity(&data, d)?);
	} else if args.all {
		for score in sweep_discounts(&model, &data, args.iters)? {
			println!("{:.4}\t{}", score.discount, score.perplexity);
		}
	} else {
		let best = best_discount(&model, &data, args.iters)?;
		println!("{:.4}\t{}", best.discount, best.perplexity);
	}
	Ok(())
}

fn run_generate(args: GenerateArgs) -> Result<()> {
	let mut config = GenerationConfig::default();
	config.set_discount(args.d)?;
	config.set_max_length(args.max_len)?;
	config.seed = args.seed;

	let mut generator = Generator::new(load_model(&args.lm)?, config)?;
	for sentence in generator.generate_sentences(args.iters)? {
		println!("{}", sentence.join(" "));
	}
	Ok(())
}
