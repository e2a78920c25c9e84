//! CLI `health` command: check each provider once, or watch them.

use std::sync::Arc;

use anyhow::Result;

use mnemos::config::MnemosConfig;
use mnemos::embedding::EmbeddingProbe;
use mnemos::reasoning::ReasoningProbe;
use mnemos::resilience::health::{HealthMonitor, HealthState, MonitorSettings};

pub async fn health(config: &MnemosConfig, watch: bool) -> Result<()> {
    let settings = MonitorSettings::from(&config.health);
    let mut monitors = Vec::new();

    match mnemos::embedding::create_provider(&config.embedding) {
        Ok(p) => monitors.push(HealthMonitor::new(Arc::new(EmbeddingProbe(p)), settings.clone())),
        Err(e) => println!("{:<12} unavailable ({e:#})", config.embedding.provider),
    }
    match mnemos::reasoning::create_provider(&config.reasoning) {
        Ok(p) => monitors.push(HealthMonitor::new(Arc::new(ReasoningProbe(p)), settings)),
        Err(e) => println!("{:<12} unavailable ({e:#})", config.reasoning.provider),
    }

    if !watch {
        for monitor in &monitors {
            print_state(&monitor.check_now().await);
        }
        return Ok(());
    }

    for monitor in &monitors {
        monitor.on_transition(|t| {
            println!(
                "{} {:<12} {} -> {} (consecutive failures: {})",
                t.at.format("%H:%M:%S"),
                t.provider_name,
                t.from,
                t.to,
                t.consecutive_failures
            );
        });
        monitor.start();
    }
    eprintln!(
        "Watching {} provider(s) every {}s. Ctrl-C to stop.",
        monitors.len(),
        config.health.interval_secs
    );

    tokio::signal::ctrl_c().await?;
    for monitor in &monitors {
        monitor.stop();
        print_state(&monitor.get_status());
    }
    Ok(())
}

fn print_state(state: &HealthState) {
    let detail = state
        .recent_checks
        .last()
        .and_then(|c| c.message.as_deref())
        .unwrap_or("");
    println!(
        "{:<12} {:<12} uptime {:>5.1}%  {}",
        state.provider_name, state.status, state.uptime_percent, detail
    );
}
