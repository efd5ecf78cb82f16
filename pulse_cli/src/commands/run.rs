use crate::ui;
use anyhow::Result;
use colored::Colorize;
use pulse_core::DynTransport;
use pulse_engine::{parse_config_from_file, DatadogTransport, Environment, LogTransport};
use pulse_plugins::{CallInterceptor, FetchRequest, ReqwestFetch, GLOBAL_FETCH};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub async fn execute(
    config_file: PathBuf,
    heartbeat: Option<String>,
    ping: Option<String>,
) -> Result<()> {
    ui::print_header("=== Pulse Metrics ===");
    println!("Loading config: {}", config_file.display());

    let config = parse_config_from_file(&config_file).await?;
    let settings = config.validate()?;
    let heartbeat = heartbeat
        .map(|interval| humantime::parse_duration(&interval))
        .transpose()?;

    let env = Environment::from_env();
    let api_key = env.api_key.clone();
    let engine = pulse_engine::global();

    engine.init(config, &env, move |namespace| {
        let transport: DynTransport = match api_key {
            Some(key) => Arc::new(DatadogTransport::new(key, namespace.clone())),
            None => Arc::new(LogTransport::new(namespace.clone())),
        };
        transport
    })?;

    let restore = if settings.services.is_empty() && ping.is_none() {
        None
    } else {
        GLOBAL_FETCH.provide(Arc::new(ReqwestFetch::new()));
        let interceptor = CallInterceptor::new(settings.classifier()?)
            .on_uninstrumented(|request| debug!("Uninstrumented fetch to {}", request.url));
        engine.instrument_fetch(&GLOBAL_FETCH, interceptor)?
    };

    if let Some(namespace) = engine.namespace() {
        println!("\n{}", "Engine Details:".bold());
        println!("  Namespace: {}", namespace.to_string().green());
        println!("  Flush Every: {:?}", settings.flush_every);
        println!("  Aggregators: {}", engine.registry().list().join(", "));
    }

    if let Some(interval) = heartbeat {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                engine.count("hit.counter");

                if let Some(url) = &ping {
                    match GLOBAL_FETCH.fetch(FetchRequest::get(url.as_str())).await {
                        Ok(response) => debug!("Ping {} -> {:?}", url, response.status),
                        Err(e) => warn!("Ping {} failed: {}", url, e),
                    }
                }
            }
        });
    }

    println!("\n{}", "Running, press Ctrl-C to stop".yellow());
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    engine.shutdown();
    if let Some(delivery) = engine.flush() {
        delivery.await?;
    }
    if let Some(handle) = restore {
        handle.restore();
    }

    ui::print_success("Final metrics flushed");
    Ok(())
}
