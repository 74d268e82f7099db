use std::io::{self, IsTerminal, Read};

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "word-immersion-rust",
    version,
    about = "Replace words on a web page with translations for incidental language learning"
)]
struct Cli {
    /// Target language code (overrides the stored settings)
    #[arg(short = 'l', long = "lang")]
    lang: Option<String>,

    /// Difficulty: beginner, intermediate or advanced
    #[arg(short = 'd', long = "difficulty")]
    difficulty: Option<String>,

    /// HTML page to process (defaults to stdin)
    #[arg(short = 'i', long = "input")]
    input: Option<String>,

    /// Strip replacement markers instead of adding them
    #[arg(long = "revert")]
    revert: bool,

    /// Run the settings-synchronization server on this address
    #[arg(long = "serve")]
    serve: Option<String>,

    /// Check whether a settings server is reachable at this base URL
    #[arg(long = "ping")]
    ping: Option<String>,

    /// OpenAI-compatible model endpoint (overrides settings and env)
    #[arg(long = "model-endpoint")]
    model_endpoint: Option<String>,

    /// Model name used at the endpoint
    #[arg(long = "model-name")]
    model_name: Option<String>,

    /// API key for the model endpoint
    #[arg(long = "model-key")]
    model_key: Option<String>,

    /// Settings server base URL for the best-effort word log
    #[arg(long = "log-endpoint")]
    log_endpoint: Option<String>,

    /// Read settings from this TOML file instead of the home location
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Show supported target languages and exit
    #[arg(long = "show-languages")]
    show_languages: bool,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    word_immersion_rust::logging::init(cli.verbose)?;

    let needs_stdin =
        cli.input.is_none() && cli.serve.is_none() && cli.ping.is_none() && !cli.show_languages;
    let input = if needs_stdin && !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Some(buffer)
    } else {
        None
    };

    let output = word_immersion_rust::run(
        word_immersion_rust::Config {
            lang: cli.lang,
            difficulty: cli.difficulty,
            input: cli.input,
            revert: cli.revert,
            serve: cli.serve,
            ping: cli.ping,
            model_endpoint: cli.model_endpoint,
            model_name: cli.model_name,
            model_key: cli.model_key,
            log_endpoint: cli.log_endpoint,
            settings_path: cli.read_settings,
            show_languages: cli.show_languages,
            verbose: cli.verbose,
        },
        input,
    )
    .await?;

    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}
