//! CLI commands
//!
//! Special commands that can be executed in the REPL.

use crate::agent::{Agent, TerminationPolicy};
use crate::core::Result;

/// Result of parsing a command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Continue processing as normal input
    Continue(String),
    /// Command was handled, show output
    Handled(String),
    /// Exit the REPL
    Exit,
    /// Clear history
    Clear,
}

/// Parse and handle special commands
pub fn handle_command(input: &str, agent: &mut Agent) -> Result<CommandResult> {
    let input = input.trim();
    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    let cmd = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match cmd.as_str() {
        "exit" | "quit" | "q" => Ok(CommandResult::Exit),

        "clear" | "reset" => {
            agent.clear_history();
            Ok(CommandResult::Clear)
        }

        "help" | "?" => Ok(CommandResult::Handled(help_text())),

        "set" => handle_set_command(args, agent),

        "status" => Ok(CommandResult::Handled(status_text(agent))),

        "tools" => {
            let definitions = agent.agent_loop().registry().definitions();
            if definitions.is_empty() {
                return Ok(CommandResult::Handled("No tools registered.".to_string()));
            }
            let lines: Vec<String> = definitions
                .iter()
                .map(|d| format!("  {:<10} {}", d.name, d.description))
                .collect();
            Ok(CommandResult::Handled(format!("Tools:\n{}", lines.join("\n"))))
        }

        "debug" => {
            let new_state = !agent.config().agent.debug;
            agent.set_debug(new_state);
            Ok(CommandResult::Handled(format!(
                "Debug mode: {}",
                if new_state { "ON" } else { "OFF" }
            )))
        }

        _ => {
            // Not a command, treat as normal input
            if input.starts_with('/') {
                Ok(CommandResult::Handled(format!(
                    "Unknown command: {}. Type 'help' for available commands.",
                    cmd
                )))
            } else {
                Ok(CommandResult::Continue(input.to_string()))
            }
        }
    }
}

/// Handle 'set' subcommands
fn handle_set_command(args: &str, agent: &mut Agent) -> Result<CommandResult> {
    let parts: Vec<&str> = args.splitn(2, ' ').collect();

    if parts[0].is_empty() {
        return Ok(CommandResult::Handled(
            "Usage: set <max_steps|model> <value>\n\
             Examples:\n\
               set max_steps 5\n\
               set model gpt-4o-mini"
                .to_string(),
        ));
    }

    let key = parts[0].to_lowercase();
    let value = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match key.as_str() {
        "max_steps" | "steps" => {
            if value.is_empty() {
                return Ok(CommandResult::Handled(format!(
                    "Current max steps: {}",
                    agent.agent_loop().max_steps()
                )));
            }
            let steps: usize = match value.parse() {
                Ok(steps) => steps,
                Err(_) => {
                    return Ok(CommandResult::Handled(format!(
                        "Not a number: {}",
                        value
                    )))
                }
            };
            agent.set_max_steps(steps)?;
            Ok(CommandResult::Handled(format!("Max steps set to: {}", steps)))
        }

        "model" => {
            if value.is_empty() {
                return Ok(CommandResult::Handled(format!(
                    "Current model: {}",
                    agent.config().models.chat
                )));
            }
            agent.set_model(value)?;
            Ok(CommandResult::Handled(format!("Model set to: {}", value)))
        }

        _ => Ok(CommandResult::Handled(format!(
            "Unknown setting: {}. Available: max_steps, model",
            key
        ))),
    }
}

fn status_text(agent: &Agent) -> String {
    let config = agent.config();
    let termination = match agent.agent_loop().termination() {
        TerminationPolicy::Judgment => "judgment".to_string(),
        TerminationPolicy::ScoreThreshold { min_score } => format!("score >= {}", min_score),
    };

    format!(
        "Stepwise Status:\n\
         ─────────────────────────────\n\
         API:          {}\n\
         Chat model:   {}\n\
         Selector:     {}\n\
         Evaluator:    {}\n\
         Max steps:    {}\n\
         Termination:  {}\n\
         Synthesis:    {:?}\n\
         Tools:        {}\n\
         History:      {} messages\n\
         Debug:        {}",
        config.api.base_url,
        config.models.chat,
        config.models.tool_selector,
        config.models.evaluator,
        agent.agent_loop().max_steps(),
        termination,
        agent.agent_loop().synthesis(),
        agent.agent_loop().registry().len(),
        agent.conversation().len(),
        if config.agent.debug { "on" } else { "off" }
    )
}

/// Generate help text
fn help_text() -> String {
    r#"Stepwise Commands:
─────────────────────────────────────────────
  help, ?          Show this help message
  exit, quit, q    Exit Stepwise
  clear, reset     Clear conversation history
  status           Show current configuration
  tools            List registered tools
  debug            Toggle debug output

  set max_steps <n>      Set the step ceiling
  set model <name>       Use one model for every role

Keyboard Shortcuts:
  Ctrl+C           Cancel current operation
  Ctrl+D           Exit Stepwise
─────────────────────────────────────────────"#
        .to_string()
}
