//! `aicleaner providers`: configured providers and their circuit state

use aicleaner_config::RuntimeSettings;
use aicleaner_providers::{ProviderHealth, ProviderSelector, ProviderSummary};
use async_trait::async_trait;
use serde::Serialize;

use crate::commands::{load_runtime_config, Command};
use crate::error::CliResult;
use crate::output::{self, OutputStyle};

const COLUMNS: &[(&str, usize)] = &[
    ("ID", 16),
    ("KIND", 10),
    ("PRIORITY", 8),
    ("ENABLED", 7),
    ("MODEL", 28),
    ("CIRCUIT", 9),
    ("FAILURES", 8),
];

#[derive(Serialize)]
struct ProviderRow<'a> {
    #[serde(flatten)]
    summary: &'a ProviderSummary,
    health: &'a ProviderHealth,
}

pub struct ProvidersCommand {
    settings: RuntimeSettings,
    /// Run each provider's health check
    check: bool,
    json: bool,
}

impl ProvidersCommand {
    pub fn new(settings: RuntimeSettings, check: bool, json: bool) -> Self {
        Self {
            settings,
            check,
            json,
        }
    }

    fn print_table(&self, style: &OutputStyle, selector: &ProviderSelector) {
        output::print_plain(&style.table_header(COLUMNS));
        for (summary, health) in selector.providers().iter().zip(selector.health()) {
            let cells = [
                summary.id.clone(),
                summary.kind.to_string(),
                summary.priority.to_string(),
                if summary.enabled { "yes" } else { "no" }.to_string(),
                summary.model.clone(),
            ];
            let mut line: Vec<String> = cells
                .iter()
                .zip(COLUMNS)
                .map(|(cell, (_, width))| style.cell(cell, *width))
                .collect();
            // Pad the plain label first so color codes do not shift the next column
            let circuit = style.cell(&health.state.to_string(), COLUMNS[5].1);
            line.push(circuit.replacen(
                &health.state.to_string(),
                &style.circuit(health.state),
                1,
            ));
            line.push(health.consecutive_failures.to_string());
            output::print_plain(&line.join(" "));
        }
    }
}

#[async_trait]
impl Command for ProvidersCommand {
    async fn execute(&self) -> CliResult<()> {
        let style = OutputStyle::default();
        let runtime = load_runtime_config(&self.settings).await?;
        for warning in &runtime.warnings {
            output::print_warning(warning);
        }
        let selector = runtime.selector()?;

        if self.json {
            let summaries = selector.providers();
            let health = selector.health();
            let rows: Vec<ProviderRow<'_>> = summaries
                .iter()
                .zip(health.iter())
                .map(|(summary, health)| ProviderRow { summary, health })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
            return Ok(());
        }

        output::print_plain(&style.key_value("configuration", &runtime.source.to_string()));
        if selector.providers().is_empty() {
            output::print_warning("No usable providers configured");
            return Ok(());
        }
        output::print_plain("");
        self.print_table(&style, &selector);
        output::print_plain("");
        output::print_plain(&style.key_value("device status", &style.device_status(selector.device_status())));

        if self.check {
            output::print_plain(&style.section("Health checks"));
            for (id, result) in selector.health_check_all().await {
                let line = match result {
                    Ok(true) => style.success(&id),
                    Ok(false) => style.warning(&format!("{}: not ready", id)),
                    Err(e) => style.error(&format!("{}: {}", id, e)),
                };
                output::print_plain(&line);
            }
        }
        Ok(())
    }
}
