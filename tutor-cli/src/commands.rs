//! Subcommand handlers.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tutor_client::{
    failure_message, mask_key, transfer, ChatReply, ChatSession, ImageAttachment, Role, Subject,
};
use tutor_common::TutorConfig;

use crate::repl;

pub async fn chat(
    session: &mut ChatSession,
    config: &TutorConfig,
    subject: &str,
    message: Option<String>,
    image: Option<PathBuf>,
) -> Result<()> {
    session.select_subject(subject)?;
    if let Some(path) = image {
        let attachment = ImageAttachment::load(&path, config.image.max_bytes).await?;
        session.attach_image(attachment);
    }

    match message {
        Some(text) => send(session, &text).await,
        None => repl::run(session, config.image.max_bytes).await,
    }
}

pub async fn quiz(session: &mut ChatSession, subject: &str) -> Result<()> {
    session.select_subject(subject)?;
    start_quiz(session).await
}

/// Send one message and print the reply.
pub async fn send(session: &mut ChatSession, text: &str) -> Result<()> {
    match session.send_message(text).await {
        Ok(reply) => {
            print_reply(&reply);
            Ok(())
        }
        Err(e) => bail!(failure_message("send message", &e)),
    }
}

pub async fn start_quiz(session: &mut ChatSession) -> Result<()> {
    match session.start_quiz().await {
        Ok(reply) => {
            print_reply(&reply);
            Ok(())
        }
        Err(e) => bail!(failure_message("start quiz", &e)),
    }
}

fn print_reply(reply: &ChatReply) {
    if let Some(ocr) = reply.ocr() {
        println!("[Recognized text]\n{ocr}\n");
    }
    println!("{}", reply.response);
}

pub async fn show_memory(session: &ChatSession, subject: &str) -> Result<()> {
    let subject = Subject::parse(subject)?;
    let memory = session
        .api()
        .get_memory(&subject)
        .await
        .context("Failed to get memory")?;
    println!("{}", serde_json::to_string_pretty(&memory)?);
    Ok(())
}

pub async fn export_memory(session: &ChatSession, subject: &str, out: &Path) -> Result<()> {
    let subject = Subject::parse(subject)?;
    let path = transfer::export_memory(session.api(), &subject, out)
        .await
        .context("Failed to export memory")?;
    println!("Exported {}", path.display());
    Ok(())
}

pub async fn export_wrong(session: &ChatSession, subject: &str, out: &Path) -> Result<()> {
    let subject = Subject::parse(subject)?;
    let path = transfer::export_wrong_questions(session.api(), &subject, out)
        .await
        .context("Failed to get wrong questions")?;
    println!("Exported {}", path.display());
    Ok(())
}

pub async fn import(session: &ChatSession, file: &Path) -> Result<()> {
    match transfer::import_file(session.api(), file).await {
        Ok(summary) => {
            println!("{summary}");
            Ok(())
        }
        Err(e) => bail!("Import failed: {e}"),
    }
}

pub fn list_keys(session: &ChatSession) -> Result<()> {
    let entries = session.keys().entries();
    if entries.is_empty() {
        println!("No API keys configured. Add one with `tutor keys set NAME VALUE`.");
        return Ok(());
    }
    for (name, key) in entries {
        println!("{name:<16} {}", mask_key(&key));
    }
    Ok(())
}

pub fn set_key(session: &ChatSession, name: &str, value: &str) -> Result<()> {
    let (name, value) = (name.trim(), value.trim());
    if name.is_empty() || value.is_empty() {
        bail!("Key name and value must not be empty");
    }
    session
        .keys()
        .set(name, value)
        .context("Failed to save API key")?;
    println!("Saved key '{name}' ({})", mask_key(value));
    Ok(())
}

pub fn remove_key(session: &ChatSession, name: &str) -> Result<()> {
    let removed = session
        .keys()
        .remove(name)
        .context("Failed to save API keys")?;
    if removed {
        println!("Removed key '{name}'");
    } else {
        println!("No key named '{name}'");
    }
    Ok(())
}

pub fn show_history(session: &mut ChatSession, subject: &str) -> Result<()> {
    let log = session.select_subject(subject)?;
    print_history(log.turns());
    Ok(())
}

pub fn print_history<'a>(turns: impl Iterator<Item = &'a tutor_client::ConversationTurn>) {
    let mut empty = true;
    for turn in turns {
        empty = false;
        let label = match turn.role() {
            Role::User => "you",
            Role::Assistant => "tutor",
        };
        println!("{label:>5}: {}", turn.content());
    }
    if empty {
        println!("(no history)");
    }
}

pub fn clear_history(session: &mut ChatSession, subject: &str) -> Result<()> {
    session.select_subject(subject)?;
    session.clear_history()?;
    println!("Cleared history for {subject}");
    Ok(())
}
