//! Console front end: one command per stdin line, questions answered in place.

use concierge_core::{Answer, AnswerSource, CommandPipeline, CoreConfig};
use concierge_skills::Runtime;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::Mutex;

/// Line-oriented console shared by the command loop and the parameter dialogue.
struct Console<R> {
    lines: Mutex<Lines<R>>,
    out: std::sync::Mutex<Box<dyn Write + Send>>,
}

impl<R> Console<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    fn new(reader: R, out: Box<dyn Write + Send>) -> Self {
        Self {
            lines: Mutex::new(reader.lines()),
            out: std::sync::Mutex::new(out),
        }
    }

    fn say(&self, text: &str) {
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{}", text);
            let _ = out.flush();
        }
    }

    fn prompt(&self, marker: &str) {
        if let Ok(mut out) = self.out.lock() {
            let _ = write!(out, "{}", marker);
            let _ = out.flush();
        }
    }

    /// Next input line; `None` on EOF, read error, or Ctrl-C.
    async fn read_line(&self) -> Option<String> {
        let mut lines = self.lines.lock().await;
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(target: "concierge::daemon", error = %e, "stdin read failed");
                    None
                }
            },
            _ = tokio::signal::ctrl_c() => None,
        }
    }
}

#[async_trait::async_trait]
impl<R> AnswerSource for Console<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn ask(&self, question: &str) -> Answer {
        self.say(question);
        self.prompt("? ");
        match self.read_line().await {
            Some(line) => Answer::Text(line),
            None => {
                self.say("(cancelled)");
                Answer::Cancelled
            }
        }
    }
}

fn is_exit(command: &str) -> bool {
    command.eq_ignore_ascii_case("exit") || command.eq_ignore_ascii_case("quit")
}

/// Runs commands until `exit`/`quit` or end of input. Returns how many commands ran.
async fn run_session<R>(pipeline: &CommandPipeline, console: &Console<R>) -> usize
where
    R: AsyncBufRead + Unpin + Send,
{
    let mut processed = 0;
    loop {
        console.prompt("> ");
        let Some(line) = console.read_line().await else {
            break;
        };
        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        if is_exit(command) {
            break;
        }
        let response = pipeline.process_interactive(command, None, console).await;
        tracing::debug!(
            target: "concierge::daemon",
            intent = %response.intent,
            status = response.status(),
            "Command finished"
        );
        console.say(&response.message());
        processed += 1;
    }
    processed
}

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[concierge-daemon] .env not loaded: {} (using system environment)", e);
    }

    // stdout carries the conversation; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with_writer(std::io::stderr)
        .init();

    let config = match CoreConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Config load failed: {}", e);
            std::process::exit(1);
        }
    };
    let runtime = Runtime::start(config).await;
    let catalog = runtime.registry.catalog();
    println!(
        "{} ready ({} operations, llm_mode={}). Type 'exit' to quit.",
        runtime.config.app_name,
        catalog.len(),
        runtime.config.llm_mode
    );

    let console = Console::new(BufReader::new(tokio::io::stdin()), Box::new(std::io::stdout()));
    let processed = run_session(&runtime.pipeline, &console).await;
    tracing::info!(target: "concierge::daemon", processed, "Session ended");
}
