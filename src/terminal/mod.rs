// Terminal module
// Interactive question/answer loop on stdin/stdout


use std::io::{BufRead, Write};
use std::time::Instant;

use anyhow::{Context, Result};
use console::style;
use tracing::{debug, error};

use crate::chat::debug::format_chat_history;
use crate::chat::prompts::{BANNER, INPUT_PROMPT, SYSTEM_PROMPT};
use crate::chat::{ChatHistory, DebugObserver, RagChain};
use crate::config::ChatConfig;
use crate::llm::{ChatMessage, LlmObserver};

/// Input that ends the session
pub const QUIT_COMMAND: &str = "q";

/// Run the chat loop until the user quits or input ends
///
/// An empty line starts a new conversation. Chain failures are reported and
/// the loop carries on.
#[inline]
pub async fn run_chat_loop<R, W>(
    chain: &RagChain,
    settings: &ChatConfig,
    mut input: R,
    mut output: W,
) -> Result<()>
where
    R: BufRead + Send,
    W: Write + Send,
{
    let observer = settings
        .debug
        .then(|| DebugObserver::new(settings.truncate_length));
    let mut history = ChatHistory::new();

    write_banner(&mut output)?;

    loop {
        write!(output, "\n{}", style(INPUT_PROMPT).yellow())?;
        output.flush()?;

        let mut line = String::new();
        let read = input
            .read_line(&mut line)
            .context("Failed to read question")?;
        let question = line.trim();

        if read == 0 || question == QUIT_COMMAND {
            writeln!(output, "Bye!")?;
            break;
        }

        if question.is_empty() {
            write_banner(&mut output)?;
            history.reset();
            writeln!(
                output,
                "{}",
                style("Starting a new conversation...\n").yellow()
            )?;
            continue;
        }

        let started = Instant::now();
        let result = chain
            .invoke(
                question,
                history.messages(),
                observer.as_ref().map(|o| o as &dyn LlmObserver),
            )
            .await;

        match result {
            Ok(response) => {
                history.push_turn(question, &response.answer);
                debug!("History now holds {} messages", history.len());

                writeln!(output, "\n{}\n", style("Answer:").yellow())?;
                writeln!(output, "{}", response.answer)?;

                if settings.debug {
                    writeln!(
                        output,
                        "\n(Processing time: {:.2} seconds)",
                        started.elapsed().as_secs_f64()
                    )?;
                    let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];
                    messages.extend(history.iter().cloned());
                    writeln!(
                        output,
                        "{}",
                        format_chat_history(&messages, settings.truncate_length)
                    )?;
                }
            }
            Err(e) => {
                error!("Chain execution failed: {:#}", e);
                writeln!(output, "Error during chain execution: {:#}", e)?;
            }
        }
    }

    output.flush()?;
    Ok(())
}

fn write_banner<W: Write>(output: &mut W) -> Result<()> {
    writeln!(output, "{}", style(BANNER).green().bold())?;
    Ok(())
}
