use crate::ui;
use anyhow::Result;
use pulse_engine::{parse_config_from_file, Environment, PluginSelection};
use std::path::PathBuf;

pub async fn execute(config_file: PathBuf) -> Result<()> {
    ui::print_header("=== Validating Config ===");
    println!("File: {}", config_file.display());

    let settings = match parse_config_from_file(&config_file)
        .await
        .and_then(|config| config.validate())
    {
        Ok(settings) => settings,
        Err(e) => {
            println!();
            ui::print_error("Config is invalid!");
            println!("\nError: {}", e);
            return Err(e.into());
        }
    };

    println!();
    ui::print_success("Config is valid!");

    let namespace = Environment::from_env().namespace(&settings);
    println!("\nConfig Details:");
    println!("  App: {}", settings.app);
    println!("  Namespace: {}", namespace);
    println!("  Flush Every: {:?}", settings.flush_every);

    match &settings.plugins {
        PluginSelection::All => println!("  Plugins: all defaults"),
        PluginSelection::Only(plugins) => {
            let plugins: Vec<&str> = plugins.iter().map(String::as_str).collect();
            println!("  Plugins: {}", plugins.join(", "));
            if !settings.plugins.custom_counters() {
                println!();
                ui::print_warning("No default aggregators will be installed");
            }
        }
    }

    println!("  Services: {}", settings.services.len());
    for (i, service) in settings.services.iter().enumerate() {
        println!("    {}: {} ({})", i + 1, service.name, service.pattern);
    }

    Ok(())
}
