//! Instruction templates sent to the gateway, one per mode

use crate::mode::Tone;

pub const CHAT_SYSTEM_INSTRUCTION: &str = "You are a helpful, concise, and intelligent assistant. \
Keep your answers brief and to the point, suitable for a small popup window.";

pub fn summarize_prompt(text: &str) -> String {
    format!(
        "Summarize the following text concisely in 3-5 bullet points:\n\n{}",
        text
    )
}

pub fn rewrite_prompt(text: &str, tone: Tone) -> String {
    format!(
        "Rewrite the following text to sound {}. Keep the meaning the same but change the style:\n\n\"{}\"",
        tone.as_str(),
        text
    )
}

pub fn translate_prompt(text: &str, language: &str) -> String {
    format!(
        "Translate the following text into {}. Only provide the translation, no introductory text:\n\n\"{}\"",
        language, text
    )
}
