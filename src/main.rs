//! edam-match CLI: annotate packages with EDAM ontology terms.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::Result;

use edam_match::batch::iterative::RefinementPass;
use edam_match::batch::{BatchRunner, IterativeRefiner, JsonDirSink, RunSummary, load_records};
use edam_match::config::MatcherConfig;
use edam_match::matcher::OntologyMatcher;
use edam_match::oracle::OpenAiOracle;
use edam_match::ranker::RelevanceRanker;
use edam_match::validate::Validator;
use edam_match::vocab::VocabularyStore;

#[derive(Parser)]
#[command(name = "edam-match", version, about = "Match software packages to EDAM ontology terms")]
struct Cli {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Index and accept vocabulary synonyms.
    #[arg(long, global = true)]
    synonyms: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match every package in a JSON file and write annotated results.
    Run {
        /// Vocabulary CSV (e.g. EDAM.csv).
        #[arg(long)]
        vocab: PathBuf,

        /// JSON array of objects with "name" and "description".
        #[arg(long)]
        packages: PathBuf,

        /// Directory for batch files and consolidated results.
        #[arg(long, default_value = "edam_results")]
        out_dir: PathBuf,

        /// Packages per persisted batch (overrides the config file).
        #[arg(long)]
        batch_size: Option<usize>,

        /// Two passes: label-only for all, full definitions for the top N.
        #[arg(long)]
        iterative: bool,

        /// Results rerun in the detailed pass.
        #[arg(long, default_value = "10")]
        top_n: usize,

        /// Reuse batch files already present in the output directory.
        #[arg(long)]
        resume: bool,
    },

    /// Validate an id/label pair and show its repair.
    Check {
        #[arg(long)]
        vocab: PathBuf,

        /// Term id, e.g. http://edamontology.org/topic_0203.
        id: String,

        /// Term label or synonym.
        label: String,
    },

    /// Show the candidate terms ranked for a description.
    Rank {
        #[arg(long)]
        vocab: PathBuf,

        description: String,

        #[arg(long, default_value = "10")]
        top_k: usize,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    if cli.synonyms {
        config.use_synonyms = true;
    }

    match cli.command {
        Commands::Run {
            vocab,
            packages,
            out_dir,
            batch_size,
            iterative,
            top_n,
            resume,
        } => {
            if let Some(size) = batch_size {
                config.batch_size = size;
            }
            if resume {
                config.resume = true;
            }
            config.validate()?;

            let store = VocabularyStore::load(&vocab, &config.vocabulary_options())?;
            let items = load_records(&packages)?;
            let oracle = OpenAiOracle::from_config(config.oracle.clone())?;
            tracing::info!(
                terms = store.active_len(),
                packages = items.len(),
                model = oracle.model(),
                "loaded inputs"
            );

            let matcher = OntologyMatcher::new(&store, oracle, &config);
            let sink = JsonDirSink::create(&out_dir)?;
            let results = if iterative {
                IterativeRefiner::new(&matcher, top_n).run(
                    &items,
                    config.batch_size,
                    |pass: RefinementPass| sink.with_prefix(pass.prefix()),
                )?
            } else {
                BatchRunner::new(&matcher, sink.clone()).run(&items, config.batch_size)?
            };

            let summary = RunSummary::from_records(
                &results,
                items.len().saturating_sub(results.len()),
                config.confidence_threshold,
            );
            print!("{summary}");
            println!("Results written to {}", sink.consolidated_path().display());
        }

        Commands::Check { vocab, id, label } => {
            let store = VocabularyStore::load(&vocab, &config.vocabulary_options())?;
            let validator = Validator::new(&store);
            let outcome = validator.validate(&id, &label);
            println!("{}: {}", if outcome.is_valid { "valid" } else { "invalid" }, outcome.message);
            if !outcome.is_valid {
                let (fixed_id, fixed_label) = validator.fix(&id, &label);
                let verdict = if validator.validate(&fixed_id, &fixed_label).is_valid {
                    "repaired"
                } else {
                    "unrepairable"
                };
                println!("{verdict}: {fixed_id} \"{fixed_label}\"");
            }
        }

        Commands::Rank {
            vocab,
            description,
            top_k,
        } => {
            let store = VocabularyStore::load(&vocab, &config.vocabulary_options())?;
            let ranker = RelevanceRanker::new(
                &store,
                config.candidates.scoring,
                config.candidate_format(config.simple_mode),
            );
            let ranked = ranker.rank_terms(&description, top_k);
            if ranked.is_empty() {
                println!("No terms share a word with the description.");
            }
            for scored in ranked {
                println!(
                    "{:>6.3}  {}  {}",
                    scored.score, scored.term.id, scored.term.preferred_label
                );
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<MatcherConfig> {
    match path {
        Some(path) => Ok(MatcherConfig::load(path)?),
        None => Ok(MatcherConfig::default()),
    }
}
