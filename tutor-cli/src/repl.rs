//! Interactive chat loop over stdin/stdout.

use std::io::Write as _;
use std::path::PathBuf;

use anyhow::Result;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tutor_client::{ChatSession, ImageAttachment};

use crate::commands;

const HELP: &str = "\
Commands:
  /subject NAME   switch subject (loads its history)
  /image PATH     attach an image to the next message
  /clear-image    drop the attached image
  /quiz           start a quiz
  /history        show this subject's history
  /quit           exit
Anything else is sent as a message.";

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Message(String),
    Subject(String),
    Image(PathBuf),
    ClearImage,
    Quiz,
    History,
    Help,
    Quit,
    /// Slash command that is unknown or missing its argument
    Invalid(String),
}

impl ReplCommand {
    /// Parse a line; blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if !line.starts_with('/') {
            return Some(Self::Message(line.to_string()));
        }

        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (line, ""),
        };
        let command = match (name, arg.is_empty()) {
            ("/subject", false) => Self::Subject(arg.to_string()),
            ("/image", false) => Self::Image(PathBuf::from(arg)),
            ("/clear-image", _) => Self::ClearImage,
            ("/quiz", _) => Self::Quiz,
            ("/history", _) => Self::History,
            ("/help", _) => Self::Help,
            ("/quit" | "/exit", _) => Self::Quit,
            ("/subject" | "/image", true) => Self::Invalid(format!("{name} needs an argument")),
            _ => Self::Invalid(format!("Unknown command {name}; try /help")),
        };
        Some(command)
    }
}

fn prompt(session: &ChatSession) {
    let subject = session.subject().map_or("-", |s| s.as_str());
    let marker = if session.pending_image().is_some() { " [img]" } else { "" };
    print!("{subject}{marker}> ");
    let _ = std::io::stdout().flush();
}

/// Run until `/quit`, end of input or Ctrl-C.
///
/// Failed commands are reported and the loop continues.
pub async fn run(session: &mut ChatSession, max_image_bytes: u64) -> Result<()> {
    println!("Type /help for commands.");
    let mut lines = BufReader::new(io::stdin()).lines();

    loop {
        prompt(session);
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        let Some(line) = line else { break };
        let Some(command) = ReplCommand::parse(&line) else {
            continue;
        };

        let outcome = match command {
            ReplCommand::Quit => break,
            ReplCommand::Help => {
                println!("{HELP}");
                Ok(())
            }
            ReplCommand::Invalid(reason) => {
                println!("{reason}");
                Ok(())
            }
            ReplCommand::Message(text) => commands::send(session, &text).await,
            ReplCommand::Quiz => commands::start_quiz(session).await,
            ReplCommand::Subject(name) => match session.select_subject(&name) {
                Ok(log) => {
                    println!("Switched to {name} ({} messages)", log.len());
                    Ok(())
                }
                Err(e) => Err(e.into()),
            },
            ReplCommand::Image(path) => match ImageAttachment::load(&path, max_image_bytes).await {
                Ok(image) => {
                    println!("Attached {} ({})", image.filename(), image.mime());
                    session.attach_image(image);
                    Ok(())
                }
                Err(e) => Err(e.into()),
            },
            ReplCommand::ClearImage => {
                session.clear_image();
                println!("Image removed");
                Ok(())
            }
            ReplCommand::History => {
                commands::print_history(session.log().turns());
                Ok(())
            }
        };

        if let Err(e) = outcome {
            println!("{e}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("hello there", ReplCommand::Message("hello there".into()))]
    #[test_case("  /subject physics ", ReplCommand::Subject("physics".into()))]
    #[test_case("/image ./scans/eq 1.png", ReplCommand::Image(PathBuf::from("./scans/eq 1.png")))]
    #[test_case("/clear-image", ReplCommand::ClearImage)]
    #[test_case("/quiz", ReplCommand::Quiz)]
    #[test_case("/history", ReplCommand::History)]
    #[test_case("/exit", ReplCommand::Quit)]
    fn parses(line: &str, expected: ReplCommand) {
        assert_eq!(ReplCommand::parse(line), Some(expected));
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(ReplCommand::parse("   "), None);
    }

    #[test_case("/subject" ; "missing subject")]
    #[test_case("/image   " ; "missing path")]
    #[test_case("/frobnicate" ; "unknown")]
    fn invalid_commands(line: &str) {
        assert!(matches!(ReplCommand::parse(line), Some(ReplCommand::Invalid(_))));
    }
}
