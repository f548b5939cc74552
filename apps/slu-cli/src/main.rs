use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use intent_graph::{to_fst, to_intent_fsts, FstOptions, GraphBuilder, IntentGraph, TrainConfig};
use intent_recognizer::{self as slu, Converters, RecognizerConfig};
use template_grammar::{load_ini_paths, LoadOptions};

#[derive(Parser, Debug)]
#[command(
    name = "slu",
    version,
    about = "Template-based spoken language understanding",
    disable_help_subcommand = true
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile ini grammars into an intent graph (JSON)
    Compile {
        /// Ini files or directories of them
        #[arg(required = true)]
        grammars: Vec<PathBuf>,
        /// Output path; stdout when omitted
        #[arg(long, short)]
        out: Option<PathBuf>,
        /// YAML training settings (casing, replace_numbers, ...)
        #[arg(long)]
        train_config: Option<PathBuf>,
        /// Slot values as NAME=FILE, one value per line
        #[arg(long = "slot", value_name = "NAME=FILE")]
        slots: Vec<String>,
        /// Only compile these intents
        #[arg(long = "intent")]
        intents: Vec<String>,
        /// Skip grammar paths that do not exist
        #[arg(long, action = ArgAction::SetTrue)]
        skip_missing: bool,
    },
    /// Export a compiled graph as text FST plus symbol tables
    Fst {
        #[arg(long)]
        graph: PathBuf,
        /// Output directory
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// One FST per intent sharing the symbol tables
        #[arg(long, action = ArgAction::SetTrue)]
        per_intent: bool,
        /// Leave edge weights out
        #[arg(long, action = ArgAction::SetTrue)]
        no_weights: bool,
    },
    /// Recognize text (arguments, or one sentence per stdin line)
    Recognize {
        #[arg(long)]
        graph: PathBuf,
        /// YAML recognizer settings
        #[arg(long)]
        config: Option<PathBuf>,
        /// Exact matching only
        #[arg(long, action = ArgAction::SetTrue)]
        strict: bool,
        /// Extra stop words
        #[arg(long = "stop-word")]
        stop_words: Vec<String>,
        /// Pretty-print JSON
        #[arg(long, action = ArgAction::SetTrue)]
        pretty: bool,
        text: Vec<String>,
    },
    /// Print every sentence a graph accepts, with its interpretation
    Sample {
        #[arg(long)]
        graph: PathBuf,
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.debug);

    match cli.command {
        Commands::Compile {
            grammars,
            out,
            train_config,
            slots,
            intents,
            skip_missing,
        } => compile(
            &grammars,
            out.as_deref(),
            train_config.as_deref(),
            &slots,
            intents,
            skip_missing,
        ),
        Commands::Fst {
            graph,
            out_dir,
            per_intent,
            no_weights,
        } => export_fst(&graph, &out_dir, per_intent, !no_weights),
        Commands::Recognize {
            graph,
            config,
            strict,
            stop_words,
            pretty,
            text,
        } => recognize(&graph, config.as_deref(), strict, stop_words, pretty, &text),
        Commands::Sample { graph, limit } => sample(&graph, limit),
    }
}

fn setup_tracing(debug: bool) {
    let filter = if debug && std::env::var_os("RUST_LOG").is_none() {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::from_default_env()
    };
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn load_graph(path: &Path) -> Result<IntentGraph> {
    IntentGraph::load(path).with_context(|| format!("loading graph {}", path.display()))
}

fn parse_slot_arg(arg: &str) -> Result<(String, Vec<String>)> {
    let (name, file) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("expected NAME=FILE, got {arg:?}"))?;
    let text =
        fs::read_to_string(file).with_context(|| format!("reading slot values from {file}"))?;
    let values = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect();
    Ok((name.trim().to_string(), values))
}

fn compile(
    grammars: &[PathBuf],
    out: Option<&Path>,
    train_config: Option<&Path>,
    slots: &[String],
    intents: Vec<String>,
    skip_missing: bool,
) -> Result<()> {
    let mut options = LoadOptions::default().skip_missing(skip_missing);
    if !intents.is_empty() {
        options = options.with_intent_filter(move |name| intents.iter().any(|i| i == name));
    }
    let corpus = load_ini_paths(grammars, &options).context("loading grammars")?;

    let config: TrainConfig = match train_config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_yaml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
        }
        None => TrainConfig::default(),
    };
    let mut builder = GraphBuilder::new(config);
    for arg in slots {
        let (name, values) = parse_slot_arg(arg)?;
        builder = builder.with_slot_values(&name, values);
    }
    let graph = builder.build(corpus)?;

    match out {
        Some(path) => {
            graph.save(path)?;
            info!(path = %path.display(), states = graph.num_states(), "wrote graph");
        }
        None => println!("{}", graph.to_json()?),
    }
    Ok(())
}

fn export_fst(graph_path: &Path, out_dir: &Path, per_intent: bool, weights: bool) -> Result<()> {
    let graph = load_graph(graph_path)?;
    fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    let options = FstOptions {
        include_weights: weights,
        ..FstOptions::default()
    };
    let isyms = out_dir.join("input.syms");
    let osyms = out_dir.join("output.syms");

    if per_intent {
        let (fsts, input_symbols, output_symbols) = to_intent_fsts(&graph, &options)?;
        for (intent, text) in &fsts {
            let path = out_dir.join(format!("{intent}.fst.txt"));
            fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
        }
        fs::write(&isyms, input_symbols.to_text())?;
        fs::write(&osyms, output_symbols.to_text())?;
        println!("wrote {} intent FSTs to {}", fsts.len(), out_dir.display());
    } else {
        let fst = to_fst(&graph, &options)?;
        fst.write(out_dir.join("intent.fst.txt"), &isyms, &osyms)?;
        println!(
            "wrote {} ({} input, {} output symbols)",
            out_dir.join("intent.fst.txt").display(),
            fst.input_symbols.len(),
            fst.output_symbols.len()
        );
    }
    Ok(())
}

fn recognize(
    graph_path: &Path,
    config: Option<&Path>,
    strict: bool,
    stop_words: Vec<String>,
    pretty: bool,
    text: &[String],
) -> Result<()> {
    let graph = load_graph(graph_path)?;
    let mut config = match config {
        Some(path) => RecognizerConfig::load(path)?,
        None => RecognizerConfig::default(),
    };
    if strict {
        config.fuzzy = false;
    }
    config.stop_words.extend(stop_words);
    let options = config.options();
    let converters = Converters::default();

    let mut stdout = io::stdout().lock();
    let mut run = |line: &str| -> Result<()> {
        let results = slu::recognize_text(line, &graph, &options, &converters)?;
        let json = if pretty {
            serde_json::to_string_pretty(&results)?
        } else {
            serde_json::to_string(&results)?
        };
        writeln!(stdout, "{json}")?;
        Ok(())
    };

    if !text.is_empty() {
        return run(&text.join(" "));
    }
    for line in io::stdin().lock().lines() {
        let line = line.context("reading stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        run(&line)?;
    }
    Ok(())
}

fn sample(graph_path: &Path, limit: Option<usize>) -> Result<()> {
    if limit == Some(0) {
        bail!("--limit must be at least 1");
    }
    let graph = load_graph(graph_path)?;
    let samples = slu::sample_by_intent(&graph, limit, &Converters::default())?;
    println!("{}", serde_json::to_string_pretty(&samples)?);
    Ok(())
}
