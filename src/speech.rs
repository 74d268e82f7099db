use anyhow::{Context, Result, anyhow};
use std::process::Stdio;
use tokio::process::Command;

use crate::languages;

/// Pronounces `word` with the voice mapped to the target language.
/// Callers treat failures as best-effort diagnostics.
pub async fn speak_word(word: &str, language: &str) -> Result<()> {
    let voice = languages::espeak_voice(language);
    let status = Command::new("espeak")
        .arg("-v")
        .arg(voice)
        .arg(word)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .with_context(|| "failed to run espeak")?;
    if !status.success() {
        return Err(anyhow!("espeak exited with status {}", status));
    }
    Ok(())
}
