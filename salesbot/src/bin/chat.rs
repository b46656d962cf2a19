//! Salesbot Chat CLI
//!
//! Interactive REPL over the query-resolution engine. Loads the sales
//! dataset from a JSON file, builds the domain index, wires the OpenAI
//! provider and the stand-in oracle, then reads one query per line.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use salesbot::compose;
use salesbot::config::EngineConfig;
use salesbot::dispatch::RollingAverageOracle;
use salesbot::domain::{SalesRecord, SalesTable};
use salesbot::llm::OpenAiLlmProvider;
use salesbot::{ChatEngine, ConversationContext};

#[derive(Parser, Debug)]
#[command(name = "salesbot-chat")]
struct Args {
    /// Path to the sales dataset (JSON array of records).
    #[arg(long, default_value = "sales_data.json")]
    data: String,

    /// Override the confidence threshold from the environment.
    #[arg(long)]
    threshold: Option<f64>,

    /// Override the model name from the environment.
    #[arg(long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = EngineConfig::from_env().context("startup configuration")?;
    if let Some(threshold) = args.threshold {
        config.confidence_threshold = threshold;
    }
    if let Some(model) = args.model {
        config.llm.model = model;
    }

    let raw = std::fs::read_to_string(&args.data)
        .with_context(|| format!("reading dataset {}", args.data))?;
    let records: Vec<SalesRecord> =
        serde_json::from_str(&raw).with_context(|| format!("parsing dataset {}", args.data))?;
    let table = Arc::new(SalesTable::new(records));

    let provider = Arc::new(OpenAiLlmProvider::new(config.llm.clone())?);
    let engine = ChatEngine::new(
        provider,
        table,
        Arc::new(RollingAverageOracle),
        config.confidence_threshold,
    )?;

    println!(
        "Salesbot ready: {} items, data from {} to {}.",
        engine.domain().item_ids.len(),
        engine.domain().min_date,
        engine.domain().max_date
    );
    println!("{}", compose::help_message(engine.domain()));
    println!("Type 'help' for this message again, 'quit' to exit.\n");

    let mut ctx = ConversationContext::new();
    let stdin = io::stdin();
    loop {
        print!("you> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        match input.to_ascii_lowercase().as_str() {
            "quit" | "exit" | "bye" => break,
            "help" | "?" => {
                println!("{}\n", compose::help_message(engine.domain()));
                continue;
            }
            _ => {}
        }

        match engine.handle_turn(&mut ctx, input).await {
            Ok(reply) => println!("bot> {}\n", reply.text),
            Err(e) => {
                tracing::warn!(error = %e, "turn failed");
                println!("bot> {}\n", compose::error_message(&e));
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}
