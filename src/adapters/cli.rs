//! CLI adapter: single-shot and interactive terminal sessions.
//!
//! The conversation persists across inputs for the lifetime of the channel.
//! A failed input is not recorded, and `reset` starts over.

use std::io::{self, BufRead, Write};

use crate::agent::{AgentLoop, Conversation, DecisionSource, Outcome};
use crate::ui;
use crate::Result;

/// Input that ends an interactive session.
pub const EXIT_SENTINEL: &str = "x";
/// Input that clears the conversation.
pub const RESET_COMMAND: &str = "reset";

/// CLI channel for terminal sessions.
pub struct CliChannel<D: DecisionSource> {
    agent: AgentLoop<D>,
    conversation: Conversation,
}

impl<D: DecisionSource> CliChannel<D> {
    /// Create a new CLI channel.
    pub fn new(agent: AgentLoop<D>) -> Self {
        Self {
            agent,
            conversation: Conversation::new(),
        }
    }

    /// Run a single message and return the outcome. On error the
    /// conversation is left as it was before `message`.
    pub async fn run_once(&mut self, message: &str) -> Result<Outcome> {
        self.agent.run_turn(&mut self.conversation, message).await
    }

    /// Run the interactive loop on stdin.
    pub async fn run_interactive(&mut self) -> Result<()> {
        let stdin = io::stdin();
        self.run_interactive_with(stdin.lock()).await
    }

    /// Run the interactive loop on any line source. Returns on the exit
    /// sentinel or end of input.
    pub async fn run_interactive_with<R: BufRead>(&mut self, mut input: R) -> Result<()> {
        let mut stdout = io::stdout();
        let mut prompt = "Your request";

        loop {
            ui::print_separator();
            print!("{prompt} ({EXIT_SENTINEL} to exit): ");
            stdout.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                break;
            }

            let text = line.trim();
            if text.eq_ignore_ascii_case(EXIT_SENTINEL) {
                break;
            }
            if text.is_empty() {
                prompt = "Please enter a request";
                continue;
            }
            prompt = "Your request";

            if text.eq_ignore_ascii_case(RESET_COMMAND) {
                let cleared = self.history_len();
                self.clear_history();
                ui::print_step(&format!("Conversation cleared ({cleared} turns)"));
                continue;
            }

            match self.run_once(text).await {
                Ok(outcome) => {
                    for call in &outcome.invocations {
                        ui::print_tool_use(&call.name, &call.input);
                    }
                    ui::print_model_response(&outcome.response);
                }
                Err(e) => ui::print_error(e.kind(), &e.to_string()),
            }
        }

        Ok(())
    }

    /// Clear conversation history.
    pub fn clear_history(&mut self) {
        self.conversation = Conversation::new();
    }

    /// Get current history length.
    pub fn history_len(&self) -> usize {
        self.conversation.len()
    }
}
