use anyhow::{Context, Result};
use console::style;
use dialoguer::{Input, Select};
use troupe_core::config::{self, Config};

const BANNER: &str = r"
    ---------------------------------

     _
    | |_ _ __ ___  _   _ _ __   ___
    | __| '__/ _ \| | | | '_ \ / _ \
    | |_| | | (_) | |_| | |_) |  __/
     \__|_|  \___/ \__,_| .__/ \___|
                        |_|

    ---------------------------------
";

struct ProviderChoice {
    id: &'static str,
    label: &'static str,
    models: &'static [&'static str],
}

const PROVIDERS: &[ProviderChoice] = &[
    ProviderChoice {
        id: "gemini",
        label: "Google Gemini",
        models: &["gemini-2.5-flash-lite", "gemini-2.5-flash", "gemini-2.5-pro"],
    },
    ProviderChoice {
        id: "openai",
        label: "OpenAI (or compatible)",
        models: &["gpt-4o-mini", "gpt-4o", "gpt-5-mini"],
    },
];

fn print_step(step: usize, total: usize, title: &str) {
    println!();
    println!(
        "{}",
        style(format!("[{}/{}] {}", step, total, title))
            .cyan()
            .bold()
    );
    println!();
}

fn setup_provider() -> Result<&'static ProviderChoice> {
    let labels: Vec<&str> = PROVIDERS.iter().map(|p| p.label).collect();

    let selection = Select::new()
        .with_prompt("Select your completion service")
        .items(&labels)
        .default(0)
        .interact()
        .context("Failed to select provider")?;

    Ok(&PROVIDERS[selection])
}

fn setup_api_key(provider: &ProviderChoice) -> Result<String> {
    let env_vars = config::api_key_env_vars(provider.id);
    let api_key: String = Input::new()
        .with_prompt(format!(
            "Enter your {} API key (leave empty to use {})",
            provider.label,
            env_vars.join(" / ")
        ))
        .allow_empty(true)
        .interact_text()
        .context("Failed to read API key")?;

    Ok(api_key.trim().to_string())
}

fn setup_model(provider: &ProviderChoice) -> Result<String> {
    let selection = Select::new()
        .with_prompt("Select your model")
        .items(provider.models)
        .default(0)
        .interact()
        .context("Failed to select model")?;

    Ok(provider.models[selection].to_string())
}

pub fn run_onboard() -> Result<Config> {
    println!("{}", style(BANNER).cyan().bold());

    println!("  {}", style("Welcome to troupe!").white().bold());
    println!(
        "  {}",
        style("This wizard configures the completion service your pipelines use.").dim()
    );
    println!();

    print_step(1, 3, "Completion Service");
    let provider = setup_provider()?;

    print_step(2, 3, "API Key Setup");
    let api_key = setup_api_key(provider)?;
    if api_key.is_empty() {
        println!(
            "  {} No key stored; it will be read from the environment at run time.",
            style("!").yellow()
        );
    }

    print_step(3, 3, "Model Selection");
    let model = setup_model(provider)?;

    let config = Config {
        provider: provider.id.to_string(),
        api_key,
        model,
        ..Default::default()
    };

    println!();
    println!("  {} Configuration complete!", style("✓").green().bold());
    println!(
        "  {} Config saved to {}",
        style("→").green(),
        style(config::get_config_path().display()).cyan()
    );
    println!();
    println!(
        "  {} You can now run: {}",
        style("→").green(),
        style("troupe ask \"What is Rust?\"").cyan().bold()
    );
    println!();

    Ok(config)
}
