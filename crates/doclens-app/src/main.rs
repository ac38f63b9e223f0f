#![warn(missing_docs)]
//! # doclens binary
//!
//! Command-line entry point for the doclens document-analysis client.

use doclens_app::{App, AppConfig, AppError, Command, USAGE, app_version, init_tracing};

/// CLI entry point.
#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if matches!(args.first().map(String::as_str), Some("help" | "--help" | "-h")) {
        println!("doclens {}\n\n{USAGE}", app_version());
        return;
    }

    match run(args).await {
        Ok(output) => println!("{output}"),
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    }
}

async fn run(args: Vec<String>) -> Result<String, AppError> {
    let command = Command::parse(args)?;
    let mut config = AppConfig::from_env()?;
    init_tracing(&config.log_filter);

    if let Some(language) = command.language_override() {
        config.language = Some(language.to_string());
    }

    let app = App::from_config(&config).await?;
    app.run(command).await
}
