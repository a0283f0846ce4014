//! Standalone validator for bot configuration files.
//!
//! Checks the texts, links and administrator list of a `bot.json` file
//! before the bot is started with it.

use std::process::ExitCode;

use clap::Parser;

use task_bot::config::BotConfig;
use task_bot::feed::truncate;

/// Bot configuration validator.
#[derive(Parser, Debug)]
#[command(name = "validate_config")]
#[command(about = "Validates configuration files for the task bot")]
#[command(version)]
struct Args {
    /// Path to the JSON configuration file to validate.
    #[arg(short, long, default_value = "bot.json")]
    file: String,

    /// Generate an example configuration file at the specified path.
    #[arg(long)]
    generate_example: Option<String>,

    /// Show every loaded value.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(output_path) = args.generate_example {
        return generate_example(&output_path);
    }

    validate_config(&args.file, args.verbose)
}

fn generate_example(output_path: &str) -> ExitCode {
    let example = BotConfig::example();

    match example.save_to_file(output_path) {
        Ok(()) => {
            println!("✓ Example configuration written to: {output_path}");
            println!("\nReplace the administrator id with your own Telegram user id.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Failed to write example file: {e}");
            ExitCode::FAILURE
        }
    }
}

fn validate_config(path: &str, verbose: bool) -> ExitCode {
    println!("Validating: {path}\n");

    let config = match BotConfig::load_from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("✗ Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    if verbose {
        println!("welcome_message:   \"{}\"", truncate(&config.welcome_message, 40));
        println!("understand_button: \"{}\"", config.understand_button);
        println!("support_link:      {}", config.support_link);
        println!("main_channel:      {}", config.main_channel);
        println!("registration_link: {}", config.registration_link);
        println!("currency:          {}", config.currency);
        println!("auto_approve:      {}", config.auto_approve);
        println!("admin_ids:         {:?}\n", config.admin_ids);
    }

    let results = config.validate_all();
    let errors: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();

    for e in &errors {
        println!("  ✗ Error: {e}");
    }

    if errors.is_empty() {
        println!("✓ Configuration is valid ({} checks passed)", results.len());
        if config.auto_approve {
            println!("  ⚠ Warning: auto_approve is not used; screenshots are reviewed manually");
        }
        ExitCode::SUCCESS
    } else {
        println!(
            "\n✗ Validation failed: {} error(s) in {} checks",
            errors.len(),
            results.len()
        );
        ExitCode::FAILURE
    }
}
