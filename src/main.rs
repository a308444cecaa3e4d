//! Stepwise - tool-using agent loop
//!
//! Main entry point for the CLI application.

use clap::Parser;
use stepwise::agent::SynthesisMode;
use stepwise::cli::EventPrinter;
use stepwise::core::config::TerminationMode;
use stepwise::tools::{builtin::math_tools, ToolRegistry};
use stepwise::{Agent, Config, Repl};
use tracing_subscriber::{fmt, EnvFilter};

/// Stepwise - step-bounded, tool-using agent loop
#[derive(Parser, Debug)]
#[command(name = "stepwise")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model for every role (chat, tool selection, evaluation)
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long)]
    base_url: Option<String>,

    /// Hard ceiling on agent steps
    #[arg(long)]
    max_steps: Option<usize>,

    /// Stop when the evaluator scores a response at least this high (0-5)
    #[arg(long, value_name = "N")]
    score: Option<u8>,

    /// Synthesize responses through structured extraction
    #[arg(long)]
    structured: bool,

    /// Run without the built-in arithmetic tools
    #[arg(long)]
    no_tools: bool,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,

    /// Enable debug output
    #[arg(long, short = 'd')]
    debug: bool,

    /// Single prompt mode (non-interactive)
    #[arg(long, short = 'p')]
    prompt: Option<String>,
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("stepwise=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if let Some(ref model) = args.model {
        config.set_model(model.clone());
    }

    if let Some(ref base_url) = args.base_url {
        config.api.base_url = base_url.clone();
    }

    if let Some(max_steps) = args.max_steps {
        config.agent.max_steps = max_steps;
    }

    if let Some(score) = args.score {
        config.agent.termination = TerminationMode::Score;
        config.agent.min_score = score;
    }

    if args.structured {
        config.agent.synthesis = SynthesisMode::Structured;
    }

    if args.debug {
        config.agent.debug = true;
    }

    init_tracing(config.agent.debug);
    config.validate()?;

    let registry = if args.no_tools {
        ToolRegistry::empty()
    } else {
        ToolRegistry::new(math_tools())?
    };
    let mut agent = Agent::from_config(config, registry)?;

    // Single prompt mode
    if let Some(prompt) = args.prompt {
        let mut printer = EventPrinter::new(args.json, agent.config().agent.debug);
        agent.process(&prompt, |event| printer.print(event)).await?;
        return Ok(());
    }

    // Interactive REPL mode
    let mut repl = Repl::new(agent, args.json);
    repl.run().await?;

    Ok(())
}
