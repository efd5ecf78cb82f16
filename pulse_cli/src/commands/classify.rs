use anyhow::Result;
use colored::Colorize;
use pulse_engine::parse_config_from_file;
use std::path::PathBuf;

pub async fn execute(config_file: PathBuf, target: String) -> Result<()> {
    let settings = parse_config_from_file(&config_file).await?.validate()?;
    let classifier = settings.classifier()?;

    match classifier.classify(&target) {
        Some(service) => println!("{} {}", target, format!("-> {}", service).green()),
        None => println!("{} {}", target, "-> unmatched".yellow()),
    }

    Ok(())
}
