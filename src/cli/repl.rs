//! Interactive REPL for Stepwise
//!
//! Provides the main user interaction loop and the event printer shared
//! with single-prompt mode.

use std::io::{self, BufRead, Write};

use crate::agent::Agent;
use crate::cli::commands::{handle_command, CommandResult};
use crate::core::{Event, EventPayload, Result};

/// Writes agent events to stdout as they arrive
#[derive(Debug, Default)]
pub struct EventPrinter {
    /// One JSON object per line instead of text
    json: bool,
    /// Show evaluations and step boundaries
    verbose: bool,
    /// Step of the last printed event
    step: usize,
}

impl EventPrinter {
    pub fn new(json: bool, verbose: bool) -> Self {
        Self {
            json,
            verbose,
            step: 0,
        }
    }

    /// Print one event
    pub fn print(&mut self, event: &Event) {
        if let Some(text) = self.render(event) {
            let mut stdout = io::stdout();
            let _ = write!(stdout, "{}", text);
            let _ = stdout.flush();
        }
    }

    /// Text printed for an event, if any
    pub fn render(&mut self, event: &Event) -> Option<String> {
        if self.json {
            return serde_json::to_string(event).ok().map(|line| line + "\n");
        }

        let mut out = String::new();
        if self.verbose && event.step != self.step {
            out.push_str(&format!("\n[Step {}]\n", event.step));
        }
        self.step = event.step;

        match &event.payload {
            EventPayload::ToolCall(record) => out.push_str(&format!("→ {}\n", record)),
            EventPayload::ToolOutput(output) if output.failed => {
                out.push_str(&format!("✗ {}: {}\n", output.name, output.context_text()))
            }
            EventPayload::ToolOutput(output) => {
                out.push_str(&format!("✓ {}: {}\n", output.name, output.output))
            }
            EventPayload::MessageStream(fragment) => out.push_str(fragment),
            EventPayload::Message(_) => out.push('\n'),
            EventPayload::Evaluation(evaluation) if self.verbose => {
                let score = evaluation
                    .score
                    .map(|s| format!(" (score {})", s))
                    .unwrap_or_default();
                out.push_str(&format!(
                    "[evaluation] final: {}{}\n",
                    if evaluation.is_final { "yes" } else { "no" },
                    score
                ));
            }
            EventPayload::Evaluation(_) => {}
        }

        (!out.is_empty()).then_some(out)
    }
}

/// Interactive REPL (Read-Eval-Print Loop)
pub struct Repl {
    agent: Agent,
    json: bool,
}

impl Repl {
    /// Create a REPL around an agent
    pub fn new(agent: Agent, json: bool) -> Self {
        Self { agent, json }
    }

    /// Run the REPL
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            // Print prompt
            print!("You: ");
            stdout.flush()?;

            // Read input
            let mut input = String::new();
            match stdin.lock().read_line(&mut input) {
                Ok(0) => {
                    // EOF (Ctrl+D)
                    println!("\nGoodbye!");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    continue;
                }
            }

            let input = input.trim();

            if input.is_empty() {
                continue;
            }

            // Handle commands
            match handle_command(input, &mut self.agent) {
                Ok(CommandResult::Exit) => {
                    println!("\nGoodbye!");
                    break;
                }
                Ok(CommandResult::Clear) => {
                    println!("Conversation cleared.\n");
                    continue;
                }
                Ok(CommandResult::Handled(output)) => {
                    println!("{}\n", output);
                    continue;
                }
                Ok(CommandResult::Continue(input)) => {
                    println!("\nAssistant:");
                    let mut printer = EventPrinter::new(self.json, self.agent.config().agent.debug);
                    match self.agent.process(&input, |event| printer.print(event)).await {
                        Ok(_) => println!(),
                        Err(e) => eprintln!("\nError: {}\n", e),
                    }
                }
                Err(e) => {
                    eprintln!("Command error: {}\n", e);
                }
            }
        }

        Ok(())
    }

    /// Print the startup banner
    fn print_banner(&self) {
        let config = self.agent.config();
        let tools = self.agent.agent_loop().registry().names();

        println!();
        println!("Stepwise - tool-using agent loop");
        println!("API:        {}", config.api.base_url);
        println!("Model:      {}", config.models.chat);
        println!("Max steps:  {}", self.agent.agent_loop().max_steps());
        if tools.is_empty() {
            println!("Tools:      none");
        } else {
            println!("Tools:      {}", tools.join(", "));
        }
        println!();
        println!("Commands: help, clear, tools, status, exit");
        println!("───────────────────────────────────────────────────────────");
    }
}
