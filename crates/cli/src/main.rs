use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use ballot_agents::AssistantAgent;
use ballot_core::{AssistantConfig, ChatInput, SelectionPolicy};
use ballot_llm::{Escalator, OpenAiSettings};
use ballot_observability::{init_tracing, AppMetrics};
use ballot_retrieval::KnowledgeBase;
use ballot_storage::Store;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "ballot")]
#[command(about = "Ballot assistant CLI")]
struct Cli {
    #[arg(long, env = "BALLOT_KB_ROOT", default_value = "kb")]
    kb_root: PathBuf,

    /// random, round_robin or first
    #[arg(long)]
    selection: Option<SelectionPolicy>,

    #[arg(long, env = "BALLOT_DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive conversation on stdin.
    Chat {
        #[arg(long)]
        admin: bool,
    },
    /// Answer a single message.
    Ask {
        text: String,
        #[arg(long)]
        admin: bool,
    },
    /// Show the category a message would be routed to.
    Classify {
        text: String,
        #[arg(long)]
        admin: bool,
    },
    /// Print the ordered intent table.
    Intents,
    Kb {
        #[command(subcommand)]
        command: KbCommand,
    },
}

#[derive(Debug, Subcommand)]
enum KbCommand {
    Search {
        query: String,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("ballot_cli");
    let cli = Cli::parse();

    let agent = build_agent(&cli).await?;

    match cli.command {
        Command::Chat { admin } => run_chat(agent, admin).await?,
        Command::Ask { text, admin } => {
            let reply = agent
                .handle_chat(ChatInput {
                    session_id: None,
                    text,
                    is_admin: admin,
                    user_id: None,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&reply)?);
        }
        Command::Classify { text, admin } => {
            let classification = agent.classify(&text, admin);
            println!("{}", serde_json::to_string_pretty(&classification)?);
        }
        Command::Intents => {
            println!("{}", serde_json::to_string_pretty(agent.intents())?);
        }
        Command::Kb { command } => match command {
            KbCommand::Search { query, limit } => {
                let hits = agent.kb_search(&query, limit);
                println!("{}", serde_json::to_string_pretty(&hits)?);
            }
        },
    }

    Ok(())
}

async fn run_chat(agent: AssistantAgent<Store>, is_admin: bool) -> Result<()> {
    let mut session_id: Option<String> = None;

    let role = if is_admin { "admin" } else { "voter" };
    println!("Ballot assistant chat mode ({role}). type 'exit' to quit.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }

        if message.is_empty() {
            continue;
        }

        let reply = agent
            .handle_chat(ChatInput {
                session_id: session_id.clone(),
                text: message.to_string(),
                is_admin,
                user_id: None,
            })
            .await?;

        session_id = Some(reply.session_id);
        println!("\n{}\n", reply.reply_text);
    }

    Ok(())
}

async fn build_agent(cli: &Cli) -> Result<AssistantAgent<Store>> {
    let config = AssistantConfig::from_env_with_selection(cli.selection)
        .context("invalid assistant configuration")?;

    let knowledge = Arc::new(
        KnowledgeBase::from_kb_dir_or_builtin(&cli.kb_root).with_context(|| {
            format!(
                "failed loading knowledge base from {}",
                cli.kb_root.display()
            )
        })?,
    );

    let store = match cli.database_url.as_deref() {
        Some(database_url) => Store::sqlite(database_url).await?,
        None => Store::memory(),
    };

    let escalator = Arc::new(Escalator::from_settings(&OpenAiSettings::from_env()));

    Ok(AssistantAgent::new(
        knowledge,
        escalator,
        Arc::new(store),
        AppMetrics::shared(),
        config,
    ))
}
