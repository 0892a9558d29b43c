//! One-shot subcommands: run a single request and print the result

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use colored::*;

use gempop_core::mode::{language_index, DEFAULT_LANGUAGE};
use gempop_core::{
    acquire_location, execute, ChatController, Gateway, LocationProvider, Mode, ModeController,
    ModeRequest, RequestStatus, StreamUpdate, Tone, LANGUAGES,
};

pub async fn chat(gateway: &dyn Gateway, message: &str) -> Result<()> {
    let mut chat = ChatController::new(gateway);
    let Some(turn) = chat.begin(message) else {
        bail!("Message is empty");
    };

    println!("{}", "Gemini:".bold().yellow());

    // Print only what each update adds
    let mut printed = 0;
    let result = turn
        .run(gateway, |update| {
            if let StreamUpdate::Text(text) = update {
                print!("{}", &text[printed..]);
                let _ = io::stdout().flush();
                printed = text.len();
            }
        })
        .await;
    println!();

    if let Err(e) = result {
        println!("{}", Mode::Chat.error_message().red());
        return Err(e.into());
    }
    Ok(())
}

/// Resolve a `--to` argument against the supported languages
pub fn resolve_language(requested: Option<&str>) -> Result<&'static str> {
    let name = requested.unwrap_or(DEFAULT_LANGUAGE);
    language_index(name)
        .map(|idx| LANGUAGES[idx])
        .ok_or_else(|| anyhow!("Unsupported language '{}'. Choose one of: {}", name, LANGUAGES.join(", ")))
}

pub fn resolve_tone(requested: Option<&str>) -> Result<Tone> {
    match requested {
        None => Ok(Tone::default()),
        Some(name) => Tone::from_str(name).ok_or_else(|| {
            let choices: Vec<&str> = Tone::all().iter().map(Tone::as_str).collect();
            anyhow!("Unknown tone '{}'. Choose one of: {}", name, choices.join(", "))
        }),
    }
}

/// Look up a location for a place search, unless disabled
pub async fn find_request(
    query: &str,
    locator: Option<&dyn LocationProvider>,
    timeout: Duration,
) -> ModeRequest {
    let location = match locator {
        Some(provider) => {
            println!("{}", "Locating you...".dimmed());
            acquire_location(provider, timeout).await
        }
        None => None,
    };
    ModeRequest::Find {
        query: query.to_string(),
        location,
    }
}

pub async fn run(gateway: &dyn Gateway, request: ModeRequest) -> Result<()> {
    let mode = request.mode();
    let mut controller = ModeController::new(mode);
    if !controller.begin(request.input()) {
        bail!("Nothing to {}: input is empty", mode.as_str());
    }

    println!("🤖 {} with {}...\n", mode.display_name().bold(), gateway.model_name().magenta());
    controller.complete(execute(gateway, &request).await);

    let Some(output) = controller.output() else {
        bail!("No result");
    };

    if controller.status() == RequestStatus::Error {
        println!("{}", output.text().red());
        bail!("{} request failed", mode.display_name());
    }

    println!("{}", "Result:".bold().green());
    println!("{}", output.text());

    let sources = output.sources();
    if !sources.is_empty() {
        let heading = if mode == Mode::Find { "Places:" } else { "Sources:" };
        println!("\n{}", heading.bold().blue());
        for (i, source) in sources.iter().enumerate() {
            println!(
                "{}. {} - {}",
                (i + 1).to_string().bold().blue(),
                source.title.yellow(),
                source.uri.dimmed()
            );
        }
    }

    Ok(())
}
