use anyhow::{Context, Result};
use console::style;
use dialoguer::{Input, Select};
use sage_core::config::Config;
use sage_core::providers::ProviderId;

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

fn model_choices(provider: ProviderId) -> &'static [&'static str] {
    match provider {
        ProviderId::OpenAI => &["gpt-4o", "gpt-4o-mini", "gpt-4.1", "gpt-4.1-mini"],
        ProviderId::Gemini => &["gemini-pro", "gemini-1.5-pro", "gemini-1.5-flash"],
        ProviderId::Ollama => &["llama3.2", "qwen2.5-coder", "mistral"],
    }
}

fn setup_provider() -> Result<ProviderId> {
    let names: Vec<&str> = ProviderId::ALL.iter().map(|p| p.display_name()).collect();

    let selection = Select::new()
        .with_prompt("Select your provider")
        .items(&names)
        .default(0)
        .interact()
        .context("Failed to select provider")?;

    Ok(ProviderId::ALL[selection])
}

fn setup_api_key(provider: ProviderId) -> Result<String> {
    let api_key: String = Input::new()
        .with_prompt(format!(
            "Enter your {} API key (leave empty to use {})",
            provider.display_name(),
            provider.env_vars().join(" / ")
        ))
        .allow_empty(true)
        .interact_text()
        .context("Failed to read API key")?;

    Ok(api_key.trim().to_string())
}

fn setup_model(provider: ProviderId) -> Result<String> {
    let models = model_choices(provider);

    let selection = Select::new()
        .with_prompt("Select your model")
        .items(models)
        .default(0)
        .interact()
        .context("Failed to select model")?;

    Ok(models[selection].to_string())
}

pub fn run_onboard() -> Result<Config> {
    println!();
    println!("  {}", style("Welcome to sage!").white().bold());
    println!(
        "  {}",
        style("This wizard picks a model backend and stores it in your config.").dim()
    );

    print_step(1, 3, "Provider");
    let provider = setup_provider()?;

    print_step(2, 3, "API Key");
    let api_key = if provider.requires_credential() {
        setup_api_key(provider)?
    } else {
        println!(
            "  {} {} runs locally, no key needed",
            style("✓").green(),
            provider.display_name()
        );
        String::new()
    };

    print_step(3, 3, "Model Selection");
    let model = setup_model(provider)?;

    let mut config = Config {
        provider: provider.config_prefix().to_string(),
        ..Default::default()
    };
    match provider {
        ProviderId::OpenAI => {
            config.openai_key = api_key;
            config.openai_model = model;
        }
        ProviderId::Gemini => {
            config.gemini_key = api_key;
            config.gemini_model = model;
        }
        ProviderId::Ollama => config.ollama_model = model,
    }

    println!();
    println!("  {} Configuration complete!", style("✓").green().bold());
    println!(
        "  {} Config saved to {}",
        style("→").green(),
        style(sage_core::config::get_config_path().display()).cyan()
    );
    println!(
        "  {} You can now run: {}",
        style("→").green(),
        style("sage chat").cyan().bold()
    );
    println!();

    Ok(config)
}
