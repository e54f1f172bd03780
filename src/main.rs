//! `corpusvec` CLI: thin shell around the library's index/classify/query
//! core. Subcommand dispatch, socket plumbing, and filesystem traversal are
//! out of scope for the core per spec.md §1 — this binary exists only to
//! exercise it from a terminal.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use rand::thread_rng;

use corpusvec::barrel::Barrel;
use corpusvec::build::{build_barrel_from_directory, build_barrel_from_list_file};
use corpusvec::classbarrel::build_class_barrel;
use corpusvec::config::{EventModel, SessionConfig};
use corpusvec::feature_selection::{foil_gain, information_gain, odds_ratio, select_top_n_hide};
use corpusvec::persist::{load_data_dir, save_data_dir};
use corpusvec::query::{run_query, ScoringMode};
use corpusvec::query_server::QuerySession;
use corpusvec::scoring::{smart::SmartConfig, ClassBarrelScorer, Scorer};
use corpusvec::session::Session;
use corpusvec::smoothing::SmoothingMethod;
use corpusvec::split::{assign_tags, TagSpec};
use corpusvec::wordvector::WordVector;

#[derive(Parser)]
#[command(name = "corpusvec", about = "Inverted-index retrieval and vector-per-class text classification", version)]
struct Cli {
    /// Data directory holding `vocabulary`/`barrel`/`pv`. Defaults to
    /// `$HOME/.corpusvec`, matching the original rainbow front-end's
    /// per-user data directory convention (§6).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EventModelArg {
    Word,
    Document,
    DocumentThenWord,
}

impl From<EventModelArg> for EventModel {
    fn from(v: EventModelArg) -> Self {
        match v {
            EventModelArg::Word => EventModel::Word,
            EventModelArg::Document => EventModel::Document,
            EventModelArg::DocumentThenWord => EventModel::DocumentThenWord,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SmoothingArg {
    Laplace,
    MEstimate,
    WittenBell,
    GoodTuring,
    Dirichlet,
    Shrinkage,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScorerArg {
    NbMultinomial,
    NbBernoulli,
    Tfidf,
    Knn,
    Prind,
    Kl,
    Evidence,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FeatureSelectionArg {
    InfoGain,
    FoilGain,
    OddsRatio,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index from a directory of per-class subdirectories, or
    /// (with `--list-file`) from a `filepath class...` listing.
    Index {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        list_file: Option<PathBuf>,
        /// Two-pass prune-by-occurrence: drop terms occurring fewer than
        /// this many times before the final index build (§4.4).
        #[arg(long)]
        prune_below: Option<u64>,
        /// Keep only the top-N terms by information gain, hiding the rest
        /// in WI2DVF rather than rewriting ids (§4.9).
        #[arg(long)]
        feature_select_top: Option<usize>,
        #[arg(long, value_enum, default_value = "info-gain")]
        feature_select_method: FeatureSelectionArg,
        #[arg(long, value_enum, default_value = "word")]
        event_model: EventModelArg,
        /// Fraction of non-ignore documents to hold out as `test`, with the
        /// remainder tagged `train` (§4.5's class-proportional rule).
        #[arg(long)]
        test_fraction: Option<f64>,
        #[arg(long, default_value_t = 42)]
        split_seed: u64,
    },
    /// Run a phrase/boolean query against a built index (§4.10, §6).
    Query {
        query: String,
        #[arg(long, default_value_t = 10)]
        num_hits: usize,
        #[arg(long)]
        score_is_raw_count: bool,
        #[arg(long)]
        print_all: bool,
    },
    /// Score a query against a class barrel derived from the index (§4.8).
    Classify {
        query: String,
        #[arg(long, value_enum, default_value = "nb-multinomial")]
        scorer: ScorerArg,
        #[arg(long, value_enum, default_value = "laplace")]
        smoothing: SmoothingArg,
        #[arg(long, default_value_t = 1.0)]
        m_estimate_m: f64,
        #[arg(long, default_value_t = 0.5)]
        m_estimate_pw: f64,
        #[arg(long, default_value_t = 5)]
        good_turing_k: u32,
        #[arg(long)]
        dirichlet_alpha_file: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "word")]
        event_model: EventModelArg,
        #[arg(long, default_value_t = 30)]
        knn_neighbors: usize,
        #[arg(long, default_value = "ltc.ltc")]
        knn_smart: String,
        #[arg(long, default_value_t = 5)]
        num_classes_to_show: usize,
    },
    /// Serve the line-based query protocol over TCP (§6). Single-threaded:
    /// one connection is served to completion before the next is accepted,
    /// which sidesteps the original's per-fork `lseek` workaround entirely
    /// (§9 design notes) since there is only ever one active read cursor.
    Serve {
        #[arg(long, default_value_t = 8431)]
        port: u16,
        #[arg(long, default_value_t = 10)]
        default_hits: usize,
        #[arg(long)]
        score_is_raw_count: bool,
    },
}

fn data_dir(cli: &Cli) -> PathBuf {
    cli.data_dir.clone().unwrap_or_else(|| {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Path::new(&home).join(".corpusvec")
    })
}

fn smoothing_method(
    kind: SmoothingArg,
    m: f64,
    p_w: f64,
    k: u32,
    dirichlet_alpha_file: Option<&Path>,
    session: &Session,
) -> Result<SmoothingMethod, String> {
    Ok(match kind {
        SmoothingArg::Laplace => SmoothingMethod::Laplace,
        SmoothingArg::MEstimate => SmoothingMethod::MEstimate { m, p_w },
        SmoothingArg::WittenBell => SmoothingMethod::WittenBell,
        SmoothingArg::GoodTuring => SmoothingMethod::GoodTuring { k },
        SmoothingArg::Shrinkage => SmoothingMethod::Shrinkage,
        SmoothingArg::Dirichlet => {
            let path = dirichlet_alpha_file
                .ok_or_else(|| "--dirichlet-alpha-file is required for dirichlet smoothing".to_string())?;
            let alpha = corpusvec::smoothing::load_dirichlet_alpha_file(path, |term| session.dictionary.lookup(term))?;
            SmoothingMethod::Dirichlet { alpha }
        }
    })
}

fn run_index(cli: &Cli, cmd: Commands) -> Result<(), String> {
    let Commands::Index {
        input,
        list_file,
        prune_below,
        feature_select_top,
        feature_select_method,
        event_model,
        test_fraction,
        split_seed,
    } = cmd
    else {
        unreachable!()
    };

    let mut config = SessionConfig::default();
    config.event_model = event_model.into();
    config.split_seed = split_seed;
    let mut session = Session::new(config);

    let mut barrel = match (input, list_file) {
        (Some(dir), None) => build_barrel_from_directory(&mut session, &dir, prune_below)?,
        (None, Some(list)) => {
            let mut rng = thread_rng();
            build_barrel_from_list_file(&mut session, &mut rng, &list)?
        }
        _ => return Err("exactly one of --input or --list-file is required".to_string()),
    };

    if let Some(fraction) = test_fraction {
        let specs = vec![
            TagSpec::ClassProportional { tag: corpusvec::barrel::Tag::Test, fraction, from_untagged: false },
            TagSpec::Remaining { tag: corpusvec::barrel::Tag::Train },
        ];
        assign_tags(&mut barrel, &specs, split_seed);
    } else {
        for cdoc in &mut barrel.cdocs {
            if cdoc.tag == corpusvec::barrel::Tag::Untagged {
                cdoc.tag = corpusvec::barrel::Tag::Train;
            }
        }
    }

    if let Some(n) = feature_select_top {
        let model: EventModel = event_model.into();
        let scores = match feature_select_method {
            FeatureSelectionArg::InfoGain => information_gain(&barrel, model),
            FeatureSelectionArg::FoilGain => foil_gain(&barrel, model),
            FeatureSelectionArg::OddsRatio => odds_ratio(&barrel, model),
        };
        select_top_n_hide(&mut barrel.index, &scores, n);
        eprintln!("feature selection kept top {n} of {} visible terms", session.dictionary.size());
    }

    save_data_dir(&data_dir(cli), &mut session, &barrel, "corpusvec")
        .map_err(|e| format!("saving index: {e}"))?;
    eprintln!(
        "indexed {} documents, {} classes, {} terms",
        barrel.cdocs.len(),
        barrel.num_classes(),
        session.dictionary.size()
    );
    Ok(())
}

fn run_query_cmd(cli: &Cli, cmd: Commands) -> Result<(), String> {
    let Commands::Query { query, num_hits, score_is_raw_count, print_all } = cmd else { unreachable!() };
    let (session, barrel, _method) =
        load_data_dir(&data_dir(cli), SessionConfig::default()).map_err(|e| format!("loading index: {e}"))?;
    let mode = if score_is_raw_count { ScoringMode::Raw } else { ScoringMode::Log };
    let (hits, truncated) = run_query(&session, &barrel, &query, session.config.max_query_atoms, mode);
    if truncated {
        eprintln!("warning: query truncated to {} atoms", session.config.max_query_atoms);
    }
    println!(",HITCOUNT {}", hits.len());
    let shown = if print_all { hits.len() } else { num_hits };
    for hit in hits.into_iter().take(shown) {
        let filename = barrel.cdocs.get(hit.doc as usize).map(|c| c.filename.as_str()).unwrap_or("");
        println!("{} {} {}", filename, hit.score, hit.matching_words.join(","));
    }
    println!(".");
    Ok(())
}

fn run_classify(cli: &Cli, cmd: Commands) -> Result<(), String> {
    let Commands::Classify {
        query,
        scorer,
        smoothing,
        m_estimate_m,
        m_estimate_pw,
        good_turing_k,
        dirichlet_alpha_file,
        event_model,
        knn_neighbors,
        knn_smart,
        num_classes_to_show,
    } = cmd
    else {
        unreachable!()
    };

    let (mut session, doc_barrel, _method) =
        load_data_dir(&data_dir(cli), SessionConfig::default()).map_err(|e| format!("loading index: {e}"))?;
    let vocab_size = session.dictionary.size();
    let method = smoothing_method(smoothing, m_estimate_m, m_estimate_pw, good_turing_k, dirichlet_alpha_file.as_deref(), &session)?;
    let model: EventModel = event_model.into();

    let query_vector = WordVector::from_text(&mut session, &query);
    if query_vector.is_empty() {
        println!("no known terms in query; empty result");
        return Ok(());
    }

    let scorer_impl = match scorer {
        ScorerArg::NbMultinomial => Scorer::NaiveBayesMultinomial { smoothing: method },
        ScorerArg::NbBernoulli => Scorer::NaiveBayesBernoulli { smoothing: method },
        ScorerArg::Tfidf => Scorer::TfIdfCosine,
        ScorerArg::Knn => {
            let smart: SmartConfig = knn_smart.parse()?;
            Scorer::Knn { neighbors: knn_neighbors, smart }
        }
        ScorerArg::Prind => Scorer::PrInd { smoothing: method, normalize: true },
        ScorerArg::Kl => Scorer::Kl { smoothing: method },
        ScorerArg::Evidence => Scorer::Evidence { smoothing: method },
    };

    let score_barrel: Barrel = if matches!(scorer, ScorerArg::Knn) {
        doc_barrel
    } else {
        build_class_barrel(&doc_barrel, model, session.config.pseudo_document_length, false, None)
    };

    let ranked = scorer_impl.score(&score_barrel, vocab_size, &query_vector, num_classes_to_show);
    if ranked.is_empty() {
        println!("no class received a finite score");
        return Ok(());
    }
    for (class, score) in ranked {
        let name = score_barrel.classes.as_ref().and_then(|c| c.name(class)).unwrap_or("?");
        println!("{name}\t{score:.6}");
    }
    Ok(())
}

fn run_serve(cli: &Cli, cmd: Commands) -> Result<(), String> {
    let Commands::Serve { port, default_hits, score_is_raw_count } = cmd else { unreachable!() };
    let (session, barrel, _method) =
        load_data_dir(&data_dir(cli), SessionConfig::default()).map_err(|e| format!("loading index: {e}"))?;
    let mode = if score_is_raw_count { ScoringMode::Raw } else { ScoringMode::Log };

    let listener = TcpListener::bind(("127.0.0.1", port)).map_err(|e| format!("binding port {port}: {e}"))?;
    eprintln!("listening on 127.0.0.1:{port}");
    for stream in listener.incoming() {
        let mut stream = match stream {
            Ok(s) => s,
            Err(e) => {
                eprintln!("accept error: {e}");
                continue;
            }
        };
        let peer = stream.peer_addr().map(|a| a.to_string()).unwrap_or_default();
        eprintln!("connection from {peer}");
        let mut qs = QuerySession::new(default_hits, mode, session.config.max_query_atoms);
        let reader = BufReader::new(stream.try_clone().map_err(|e| format!("cloning socket: {e}"))?);
        for line in reader.lines() {
            let line = match line {
                Ok(l) => l,
                Err(_) => break,
            };
            let response = qs.handle_line(&session, &barrel, &line);
            if !response.is_empty() && stream.write_all(response.as_bytes()).is_err() {
                break;
            }
            if qs.should_quit {
                break;
            }
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let result = match &cli.command {
        Commands::Index { .. } => run_index(&cli, cli_command_clone(&cli)),
        Commands::Query { .. } => run_query_cmd(&cli, cli_command_clone(&cli)),
        Commands::Classify { .. } => run_classify(&cli, cli_command_clone(&cli)),
        Commands::Serve { .. } => run_serve(&cli, cli_command_clone(&cli)),
    };
    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// `Commands` doesn't derive `Clone` (it would force every field, including
/// `PathBuf`s, into an unused clone on the hot path); the dispatcher instead
/// destructures a moved-out copy per arm. `Cli::command` is consumed here
/// once, up front, since `main` only ever runs a single subcommand.
fn cli_command_clone(cli: &Cli) -> Commands {
    match &cli.command {
        Commands::Index {
            input,
            list_file,
            prune_below,
            feature_select_top,
            feature_select_method,
            event_model,
            test_fraction,
            split_seed,
        } => Commands::Index {
            input: input.clone(),
            list_file: list_file.clone(),
            prune_below: *prune_below,
            feature_select_top: *feature_select_top,
            feature_select_method: *feature_select_method,
            event_model: *event_model,
            test_fraction: *test_fraction,
            split_seed: *split_seed,
        },
        Commands::Query { query, num_hits, score_is_raw_count, print_all } => Commands::Query {
            query: query.clone(),
            num_hits: *num_hits,
            score_is_raw_count: *score_is_raw_count,
            print_all: *print_all,
        },
        Commands::Classify {
            query,
            scorer,
            smoothing,
            m_estimate_m,
            m_estimate_pw,
            good_turing_k,
            dirichlet_alpha_file,
            event_model,
            knn_neighbors,
            knn_smart,
            num_classes_to_show,
        } => Commands::Classify {
            query: query.clone(),
            scorer: *scorer,
            smoothing: *smoothing,
            m_estimate_m: *m_estimate_m,
            m_estimate_pw: *m_estimate_pw,
            good_turing_k: *good_turing_k,
            dirichlet_alpha_file: dirichlet_alpha_file.clone(),
            event_model: *event_model,
            knn_neighbors: *knn_neighbors,
            knn_smart: knn_smart.clone(),
            num_classes_to_show: *num_classes_to_show,
        },
        Commands::Serve { port, default_hits, score_is_raw_count } => {
            Commands::Serve { port: *port, default_hits: *default_hits, score_is_raw_count: *score_is_raw_count }
        }
    }
}
