//! Line-oriented chat and review loops.

use std::io::{self, Write};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::Mutex;
use tracing::warn;

use concierge_core::ConversationKey;
use concierge_dispatch::{user_message, DevSession, Dispatcher, IntentReviewer, TurnOutcome};
use concierge_memory::transcript;

pub const GOODBYE: &str = "Goodbye!";
pub const RETRY_HINT: &str = "Please try again with a different query.";

/// Consecutive unreadable lines tolerated before the input is treated as closed.
const MAX_READ_FAILURES: u32 = 3;

/// One line typed at the `You: ` prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    Empty,
    Exit,
    Save,
    Reset,
    History,
    Message(String),
    /// The line could not be read (e.g. invalid UTF-8).
    Unreadable(String),
}

impl ReplInput {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed.to_lowercase().as_str() {
            "" => ReplInput::Empty,
            "exit" | "quit" => ReplInput::Exit,
            "/save" => ReplInput::Save,
            "/reset" => ReplInput::Reset,
            "/history" => ReplInput::History,
            _ => ReplInput::Message(trimmed.to_string()),
        }
    }
}

type BoxedInput = Box<dyn AsyncBufRead + Unpin + Send>;

/// Prompted line input plus the output it is echoed to.
pub struct Console {
    lines: Mutex<Lines<BoxedInput>>,
    out: StdMutex<Box<dyn Write + Send>>,
}

impl Console {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), std::io::stdout())
    }

    pub fn new(
        input: impl AsyncBufRead + Unpin + Send + 'static,
        output: impl Write + Send + 'static,
    ) -> Self {
        let input: BoxedInput = Box::new(input);
        Self {
            lines: Mutex::new(input.lines()),
            out: StdMutex::new(Box::new(output)),
        }
    }

    pub fn say(&self, text: &str) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(out, "{text}") {
            warn!(error = %e, "Failed to write to console");
        }
    }

    /// Print `prompt` without a newline and read one line. `Ok(None)` at end of input.
    pub async fn ask(&self, prompt: &str) -> io::Result<Option<String>> {
        {
            let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = write!(out, "{prompt}").and_then(|_| out.flush());
        }
        self.lines.lock().await.next_line().await.inspect_err(|e| {
            warn!(error = %e, "Failed to read input");
        })
    }

    /// Next line at the `You: ` prompt. End of input, or a run of unreadable
    /// lines, reads as `exit`.
    async fn next_input(&self, failures: &mut u32) -> ReplInput {
        match self.ask("You: ").await {
            Ok(Some(line)) => {
                *failures = 0;
                ReplInput::parse(&line)
            }
            Ok(None) => ReplInput::Exit,
            Err(e) => {
                *failures += 1;
                if *failures >= MAX_READ_FAILURES {
                    ReplInput::Exit
                } else {
                    ReplInput::Unreadable(e.to_string())
                }
            }
        }
    }
}

/// Commands shared by both loops. Returns `false` when the loop should stop.
async fn session_command(
    console: &Console,
    dispatcher: &Dispatcher,
    key: &ConversationKey,
    input: &ReplInput,
) -> bool {
    let sessions = dispatcher.sessions();
    match input {
        ReplInput::Exit => {
            if let Err(e) = sessions.persist(key).await {
                console.say(&format!("Error: {}", user_message(&e)));
            }
            console.say(GOODBYE);
            false
        }
        ReplInput::Save => {
            match sessions.persist(key).await {
                Ok(path) => console.say(&format!("Transcript saved to {}", path.display())),
                Err(e) => console.say(&format!("Error: {}", user_message(&e))),
            }
            true
        }
        ReplInput::Reset => {
            sessions.clear(key).await;
            console.say("Conversation history cleared.");
            true
        }
        ReplInput::History => {
            let messages = sessions.get_history(key).await.snapshot().await;
            if messages.is_empty() {
                console.say("(no messages yet)");
            } else {
                console.say(transcript::render(&messages).trim_end());
            }
            true
        }
        ReplInput::Unreadable(reason) => {
            console.say(&format!("Error: could not read that line ({reason})"));
            console.say(RETRY_HINT);
            true
        }
        ReplInput::Empty | ReplInput::Message(_) => true,
    }
}

/// The customer chat loop. End of input behaves like `exit`.
pub async fn run_chat(console: &Console, dispatcher: &Dispatcher, key: &ConversationKey) {
    let mut failures = 0;
    loop {
        match console.next_input(&mut failures).await {
            ReplInput::Empty => continue,
            ReplInput::Message(text) => match dispatcher.handle_turn(key, &text).await {
                TurnOutcome::Delivered(reply) => console.say(&format!("Bot: {reply}")),
                TurnOutcome::Rejected { message, .. } => {
                    console.say(&format!("Error: {message}"));
                    console.say(RETRY_HINT);
                }
            },
            command => {
                if !session_command(console, dispatcher, key, &command).await {
                    break;
                }
            }
        }
    }
}

/// Reviewer answering on the same console as the chat.
pub struct ConsoleReviewer {
    console: Arc<Console>,
}

impl ConsoleReviewer {
    pub fn new(console: Arc<Console>) -> Self {
        Self { console }
    }
}

#[async_trait]
impl IntentReviewer for ConsoleReviewer {
    async fn confirm(&self, predicted: &str) -> String {
        self.console.say(&format!("Predicted intention: {predicted}"));
        self.console
            .ask("It's correct? [Y/N]: ")
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    async fn choose_intention(&self, options: &[String]) -> Option<String> {
        for (i, option) in options.iter().enumerate() {
            self.console.say(&format!("{}. {}", i + 1, option));
        }
        loop {
            let answer = match self.console.ask("Select a new intention: ").await {
                Ok(Some(answer)) => answer,
                Ok(None) => return None,
                Err(_) => {
                    self.console.say("Invalid input. Please enter a number.");
                    continue;
                }
            };
            match answer.trim().parse::<usize>() {
                Ok(n) if (1..=options.len()).contains(&n) => return Some(options[n - 1].clone()),
                Ok(_) => self.console.say("Invalid choice. Please try again."),
                Err(_) => self.console.say("Invalid input. Please enter a number."),
            }
        }
    }
}

/// The review loop: every classified message is confirmed before dispatch.
pub async fn run_dev(console: &Console, dev: &DevSession, key: &ConversationKey) {
    let mut failures = 0;
    loop {
        match console.next_input(&mut failures).await {
            ReplInput::Empty => continue,
            ReplInput::Message(text) => match dev.process(key, &text).await {
                Ok(reply) => console.say(&format!("Bot: {reply}")),
                Err(e) => {
                    console.say(&format!("Error: {}", user_message(&e)));
                    console.say(RETRY_HINT);
                }
            },
            command => {
                if !session_command(console, dev.dispatcher(), key, &command).await {
                    break;
                }
            }
        }
    }
}
