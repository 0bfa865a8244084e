use std::io::{BufRead, Write};

use cdpqa::{
    AnswerEngine,
    ConfigDb,
    DataDir,
    EngineConfig,
    Index,
    IndexDb,
    cli::{self, Cli, Command, ConfigAction},
    compose::{Answer, Status},
    corpus,
    error::{self, Error},
    mcp,
    topic::ALIAS_TABLE_VERSION,
    web,
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Words that end a chat session.
const EXIT_WORDS: &[&str] = &["exit", "quit", "bye", "goodbye"];

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("CDPQA_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let config_db = ConfigDb::open(&data_dir.config_db())?;

    match cli.command {
        Command::Rebuild(args) => {
            let config = EngineConfig::resolve(&config_db)?;
            cmd_rebuild(&data_dir, &config, &args)?;
        }
        Command::Ask(args) => {
            let mut config = EngineConfig::resolve(&config_db)?;
            if let Some(top_k) = args.top_k {
                config.top_k = top_k;
            }
            if let Some(threshold) = args.threshold {
                config.rejection_threshold = threshold;
            }
            config.validate()?;

            let engine = require_engine(&data_dir, config)?;
            let answer = engine.answer(&args.question);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                print_answer(&answer);
            }
        }
        Command::Chat => {
            let config = EngineConfig::resolve(&config_db)?;
            let engine = require_engine(&data_dir, config)?;
            cmd_chat(&engine)?;
        }
        Command::Status(args) => {
            cmd_status(&data_dir, args.json)?;
        }
        Command::Config { action } => {
            cmd_config(&config_db, action)?;
        }
        Command::Mcp => {
            let config = EngineConfig::resolve(&config_db)?;
            mcp::run_mcp(open_engine(&data_dir, config)?)?;
        }
        Command::Serve(args) => {
            let config = EngineConfig::resolve(&config_db)?;
            web::run_server(open_engine(&data_dir, config)?, &args.addr)?;
        }
        Command::Completions(_) => {}
    }

    Ok(())
}

fn load_index(data_dir: &DataDir) -> error::Result<Option<Index>> {
    IndexDb::open(&data_dir.index_db())?.load()
}

/// An engine over the stored index, or an unready one when none exists.
fn open_engine(
    data_dir: &DataDir,
    config: EngineConfig,
) -> error::Result<AnswerEngine> {
    let engine = AnswerEngine::new(config);
    match load_index(data_dir)? {
        Some(index) => engine.install(index),
        None => tracing::warn!(
            "no index found in {}; run `cdpqa rebuild`",
            data_dir.root().display()
        ),
    }
    Ok(engine)
}

fn require_engine(
    data_dir: &DataDir,
    config: EngineConfig,
) -> error::Result<AnswerEngine> {
    let index = load_index(data_dir)?.ok_or_else(|| Error::NotFound {
        kind: "index",
        name: format!(
            "{} (run `cdpqa rebuild` first)",
            data_dir.index_db().display()
        ),
    })?;
    Ok(AnswerEngine::with_index(config, index))
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.text);
    if answer.status != Status::Answered {
        eprintln!("({})", answer.status);
    }
}

fn cmd_rebuild(
    data_dir: &DataDir,
    config: &EngineConfig,
    args: &cli::RebuildArgs,
) -> error::Result<()> {
    let docs = args.docs.clone().unwrap_or_else(|| data_dir.docs_dir());
    if !docs.is_dir() {
        return Err(Error::Config(format!(
            "docs directory does not exist: {}",
            docs.display()
        )));
    }

    eprintln!("Loading docs from {}...", docs.display());
    let report =
        corpus::load_docs_dir(&docs, &args.pattern, config.split_options())?;
    eprintln!(
        "  Read {} pages ({} skipped) into {} chunks",
        report.pages,
        report.skipped_pages,
        report.chunks.len()
    );

    let index = Index::build(report.chunks)?;
    let index_db = IndexDb::open(&data_dir.index_db())?;
    if index_db.has_index()? {
        eprintln!("  Replacing the stored index");
    }
    index_db.save(&index)?;

    let stats = index.stats();
    eprintln!(
        "  Indexed {} chunks ({} excluded), {} terms",
        stats.indexed_chunks, stats.excluded_chunks, stats.vocabulary
    );
    eprintln!("Rebuild complete.");
    Ok(())
}

fn cmd_chat(engine: &AnswerEngine) -> error::Result<()> {
    println!(
        "Ask how to do something in Segment, mParticle, Lytics or Zeotap. \
         Type 'exit' to quit."
    );

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let mut line = String::new();

    loop {
        print!("> ");
        stdout.flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&question.to_lowercase().as_str()) {
            break;
        }

        print_answer(&engine.answer(question));
        println!();
    }

    println!("Goodbye!");
    Ok(())
}

fn cmd_status(data_dir: &DataDir, json: bool) -> error::Result<()> {
    let stats = load_index(data_dir)?.map(|index| index.stats());

    if json {
        println!(
            "{}",
            serde_json::json!({
                "data_dir": data_dir.root(),
                "data_dir_origin": data_dir.origin().to_string(),
                "ready": stats.is_some(),
                "alias_table_version": ALIAS_TABLE_VERSION,
                "index": stats,
            })
        );
        return Ok(());
    }

    println!(
        "Data directory: {} (from {})",
        data_dir.root().display(),
        data_dir.origin()
    );
    println!("Alias table: v{ALIAS_TABLE_VERSION}");
    match stats {
        Some(stats) => {
            println!("Chunks: {}", stats.chunks);
            println!("  Indexed: {}", stats.indexed_chunks);
            println!("  Excluded: {}", stats.excluded_chunks);
            println!("Vocabulary: {} terms", stats.vocabulary);
            for (topic, count) in &stats.per_topic {
                println!("  {topic}: {count} chunks");
            }
        }
        None => println!("No index. Run `cdpqa rebuild`."),
    }
    Ok(())
}

fn cmd_config(config_db: &ConfigDb, action: ConfigAction) -> error::Result<()> {
    match action {
        ConfigAction::Set { key, value } => {
            let mut config = EngineConfig::resolve(config_db)?;
            config.set(&key, &value)?;
            config.validate()?;
            config_db.set_setting(&key, value.trim())?;
            println!("{key} = {}", value.trim());
        }
        ConfigAction::Get { key } => {
            let config = EngineConfig::resolve(config_db)?;
            println!("{}", config.get(&key)?);
        }
        ConfigAction::List { json } => {
            let config = EngineConfig::resolve(config_db)?;
            if json {
                println!("{}", serde_json::to_string(&config)?);
            } else {
                let stored = config_db.list_settings()?;
                for key in EngineConfig::KEYS {
                    let marker = if stored.iter().any(|(k, _)| k == key) {
                        "\t(stored)"
                    } else {
                        ""
                    };
                    println!("{key}\t{}{marker}", config.get(key)?);
                }
            }
        }
        ConfigAction::Unset { key } => {
            // reject typos before touching the database
            EngineConfig::default().get(&key)?;
            if !config_db.remove_setting(&key)? {
                return Err(Error::NotFound {
                    kind: "stored setting",
                    name: key,
                });
            }
            println!("Unset {key}");
        }
    }
    Ok(())
}
