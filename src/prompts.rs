use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tera::{Context as TeraContext, Tera};

use crate::settings::Difficulty;

/// Selection guidance shown to the model per difficulty tier.
fn selection_criteria(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Beginner => "Favor short, common, everyday words.",
        Difficulty::Intermediate => "Favor moderately common words of medium length.",
        Difficulty::Advanced => "Favor long, rare, or technical words.",
    }
}

pub fn render_selection_prompt(
    difficulty: Difficulty,
    target_count: usize,
    language: &str,
    candidates: &[String],
) -> Result<String> {
    let template = load_prompt_template("selection_prompt.tera")?;
    let mut context = TeraContext::new();
    context.insert("difficulty", difficulty.as_str());
    context.insert("target_count", &target_count);
    context.insert("language", language);
    context.insert("criteria", selection_criteria(difficulty));
    context.insert("candidates", &candidates.join(", "));

    Tera::one_off(&template, &context, false)
        .with_context(|| "failed to render selection prompt")
}

pub fn render_example_prompt(
    original: &str,
    translation: &str,
    language: &str,
    context_text: &str,
) -> Result<String> {
    let template = load_prompt_template("example_prompt.tera")?;
    let mut context = TeraContext::new();
    context.insert("original", original);
    context.insert("translation", translation);
    context.insert("language", language);
    context.insert("context", context_text.trim());

    Tera::one_off(&template, &context, false)
        .with_context(|| "failed to render example prompt")
}

fn load_prompt_template(name: &str) -> Result<String> {
    let path = prompt_path(name);
    fs::read_to_string(&path).with_context(|| format!("failed to read prompt: {}", path.display()))
}

fn prompt_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("src")
        .join("prompts")
        .join(name)
}
