// Terminal front end for the intake session.
// Shares the SessionController with the web UI; numbers pick from the
// severity grid or the feeling chips, anything else is sent as typed text.

use std::fmt::Write as _;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::classifier::RenderMode;
use crate::constants::{PENDING_MESSAGE, SEVERITY_OPTIONS};
use crate::session::{SendOutcome, SessionController, SessionView};
use crate::summary::SummaryView;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Send(String),
    RetryWithKey(String),
    Listen,
    Speak,
    Dismiss,
    Quit,
    Invalid(&'static str),
    Nothing,
}

/// Maps one line of terminal input to an intent for the current view.
pub fn interpret(line: &str, view: &SessionView) -> ChatInput {
    let line = line.trim();
    match line {
        "" => return ChatInput::Nothing,
        "/quit" | "/exit" => return ChatInput::Quit,
        "/listen" => return ChatInput::Listen,
        "/speak" => return ChatInput::Speak,
        "/dismiss" => return ChatInput::Dismiss,
        _ => {}
    }
    if let Some(key) = line.strip_prefix("/key ") {
        return ChatInput::RetryWithKey(key.trim().to_string());
    }

    let choice = line.parse::<usize>().ok().filter(|n| *n >= 1);
    match view.mode {
        RenderMode::PhysicalScale => match choice.and_then(|n| SEVERITY_OPTIONS.get(n - 1)) {
            Some(option) => ChatInput::Send(option.reply()),
            None => ChatInput::Invalid("Choose a severity from 1 to 5."),
        },
        RenderMode::MentalFeelings => match choice.and_then(|n| view.feeling_options.get(n - 1)) {
            Some(feeling) => ChatInput::Send((*feeling).to_string()),
            None => ChatInput::Send(line.to_string()),
        },
        RenderMode::FreeText | RenderMode::StructuredSummary => ChatInput::Send(line.to_string()),
    }
}

/// Renders the current turn and its affordance as plain text.
pub fn render_view(view: &SessionView) -> String {
    let mut out = String::new();
    if let Some(error) = &view.error {
        let _ = writeln!(out, "! {error}");
        if view.show_key_input {
            let _ = writeln!(out, "  Enter /key <API KEY> to retry.");
        }
    }
    if let Some(notice) = &view.notice {
        let _ = writeln!(out, "* {notice}");
    }
    if view.pending {
        let _ = writeln!(out, "{PENDING_MESSAGE}");
        return out;
    }

    match (&view.mode, &view.summary) {
        (RenderMode::StructuredSummary, Some(SummaryView::Card(record))) => {
            let _ = writeln!(out, "{record}");
        }
        (RenderMode::StructuredSummary, Some(SummaryView::PlainText { text })) => {
            let _ = writeln!(out, "{text}");
        }
        _ => {
            let _ = writeln!(out, "\n{}\n", view.prompt.replace("**", ""));
        }
    }

    match view.mode {
        RenderMode::PhysicalScale => {
            let _ = writeln!(out, "Severity Level (1-5)");
            for option in &view.severity_options {
                let _ = write!(out, "  [{}] {} {}", option.value, option.icon, option.label);
            }
            let _ = writeln!(out);
        }
        RenderMode::MentalFeelings => {
            for (i, feeling) in view.feeling_options.iter().enumerate() {
                let _ = write!(out, "  [{}] {}", i + 1, feeling);
            }
            let _ = writeln!(out);
            let _ = writeln!(out, "Pick a number or type your answer.");
        }
        RenderMode::FreeText => {
            let _ = writeln!(out, "Type your answer...");
        }
        RenderMode::StructuredSummary => {}
    }
    out
}

pub async fn run_chat(controller: SessionController) -> Result<()> {
    info!("Starting intake chat...");
    println!("Connecting...");
    if let SendOutcome::Failed(message) = controller.start().await {
        info!("Handshake failed: {}", message);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}", render_view(&controller.view().await));
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let view = controller.view().await;
        match interpret(&line, &view) {
            ChatInput::Quit => break,
            ChatInput::Nothing => {}
            ChatInput::Invalid(hint) => println!("{hint}"),
            ChatInput::Dismiss => controller.dismiss_error().await,
            ChatInput::Listen => {
                // Failures surface through the view's notice.
                let _ = controller.start_voice_input().await;
            }
            ChatInput::Speak => {
                let _ = controller.speak_latest().await;
            }
            ChatInput::RetryWithKey(key) => {
                println!("Connecting...");
                controller.retry_with_key(&key).await;
            }
            ChatInput::Send(text) => {
                println!("{PENDING_MESSAGE}");
                if let SendOutcome::Ignored(reason) = controller.send_text(&text).await {
                    println!("(not sent: {reason:?})");
                }
            }
        }
    }

    controller.stop_voice_input();
    controller.stop_speaking();
    info!("Intake chat finished.");
    Ok(())
}
