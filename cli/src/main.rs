use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use troupe_core::{RunResult, Runner, config, providers};

mod onboard;
mod pipelines;
mod templates;

use pipelines::PipelineKind;

#[derive(Parser)]
#[command(name = "troupe")]
#[command(about = "troupe - compose completion units into pipelines", long_about = None)]
struct Cli {
    #[arg(long, global = true, help = "Print the session state after each run")]
    debug: bool,

    #[arg(short, long, global = true, help = "Log at debug level (overridden by RUST_LOG)")]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Onboard,
    #[command(about = "Ask a single assistant unit")]
    Ask {
        #[arg(required = true)]
        question: Vec<String>,
    },
    #[command(about = "Coordinator with Researcher and Summariser units as tools")]
    Research {
        #[arg(required = true)]
        topic: Vec<String>,
    },
    #[command(about = "Outline, write and edit a blog post")]
    Blog {
        #[arg(required = true)]
        topic: Vec<String>,
    },
    #[command(about = "Interactive session; every line is a fresh run")]
    Chat {
        #[arg(short, long, value_enum, default_value_t = PipelineKind::Ask)]
        pipeline: PipelineKind,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_runner(kind: PipelineKind) -> Result<Runner> {
    let mut config = config::Config::load_or_init()?;
    config.resolve_api_key();

    let client = providers::create_client(&config)?;
    debug!(provider = %config.provider, model = %config.model, ?kind, "building pipeline");
    let mut runner = Runner::new(pipelines::build(kind, &client))
        .with_context(|| format!("Invalid {kind:?} pipeline"))?;
    if let Some(deadline) = config.deadline() {
        runner = runner.with_deadline(deadline);
    }
    Ok(runner)
}

fn render(result: &RunResult, debug: bool) {
    termimad::print_text(&result.text);

    if debug {
        println!();
        println!("{}", style(format!("run {}", result.run_id)).dim());
        for (key, value) in &result.state {
            println!("{} {}", style(format!("{key}:")).cyan().bold(), value);
        }
    }
}

async fn run_once(kind: PipelineKind, words: &[String], debug: bool) -> Result<()> {
    let runner = build_runner(kind)?;
    let query = words.join(" ");

    eprintln!("{}", style("Thinking...").dim());
    let result = runner.execute_debug(&query).await?;
    render(&result, debug);
    Ok(())
}

async fn chat(kind: PipelineKind, debug: bool) -> Result<()> {
    let runner = build_runner(kind)?;
    let history_path = config::ensure_troupe_dir()?.join("history");

    let mut editor = DefaultEditor::new().context("Failed to start line editor")?;
    let _ = editor.load_history(&history_path);

    println!(
        "{} {}",
        style("troupe").cyan().bold(),
        style(format!("({kind:?} pipeline, Ctrl+D to exit)")).dim()
    );

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);

                match runner.execute_debug(line).await {
                    Ok(result) => render(&result, debug),
                    Err(e) => eprintln!("{} {}", style("Error:").red().bold(), e),
                }
                println!();
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("Failed to read input"),
        }
    }

    let _ = editor.save_history(&history_path);
    println!("{}", style("Goodbye!").dim());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let command = cli.command.unwrap_or_else(|| {
        if !config::config_exists() {
            Commands::Onboard
        } else {
            Commands::Chat {
                pipeline: PipelineKind::Ask,
            }
        }
    });

    match command {
        Commands::Onboard => {
            let onboard_config = onboard::run_onboard().map_err(|e| {
                eprintln!("{} Onboarding failed: {}", style("✗").red(), e);
                anyhow::anyhow!("Onboarding failed: {}", e)
            })?;
            config::save_config(&onboard_config)?;
        }
        Commands::Ask { question } => run_once(PipelineKind::Ask, &question, cli.debug).await?,
        Commands::Research { topic } => {
            run_once(PipelineKind::Research, &topic, cli.debug).await?
        }
        Commands::Blog { topic } => run_once(PipelineKind::Blog, &topic, cli.debug).await?,
        Commands::Chat { pipeline } => chat(pipeline, cli.debug).await?,
    }

    Ok(())
}
