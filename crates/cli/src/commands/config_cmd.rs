//! `stepwise config` — Configuration management commands.

use stepwise_config::{AppConfig, StoreBackend};

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   Config parsed successfully");

    let warnings = warnings(&config);
    if warnings.is_empty() {
        println!("   All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   warning: {w}");
        }
    }

    println!();
    println!("   Provider:   {}", config.default_provider);
    println!("   Model:      {}", config.default_model);
    println!("   Max turns:  {}", config.agent.max_turns);
    println!("   Window:     {} messages", config.agent.context_window);
    match config.store.backend {
        StoreBackend::File => println!("   Store:      {}", config.store.resolved_path().display()),
        StoreBackend::Memory => println!("   Store:      memory (not persisted)"),
    }
    Ok(())
}

/// Non-fatal problems worth pointing out before the first chat.
fn warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if !config.has_api_key() && config.api_url.is_none() {
        warnings.push(
            "No API key set (set STEPWISE_API_KEY, OPENROUTER_API_KEY or OPENAI_API_KEY)".into(),
        );
    }
    let registry = stepwise_tools::default_registry();
    for name in &config.agent.enabled_tools {
        if registry.get(name).is_none() {
            warnings.push(format!("agent.enabled_tools names unknown tool '{name}'"));
        }
    }
    if config.store.backend == StoreBackend::Memory {
        warnings.push("Memory store selected; conversations are lost on exit".into());
    }
    warnings
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config()?;
    if config.api_key.is_some() {
        config.api_key = Some("[REDACTED]".into());
    }
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::config_path().display());
    Ok(())
}

pub async fn init(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = AppConfig::config_path();
    if path.exists() && !force {
        return Err(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )
        .into());
    }
    std::fs::create_dir_all(AppConfig::config_dir())?;
    std::fs::write(&path, AppConfig::default_toml())?;
    println!("Wrote {}", path.display());
    Ok(())
}
