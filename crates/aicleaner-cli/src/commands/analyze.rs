//! `aicleaner analyze`: send one snapshot through the provider selector

use std::path::PathBuf;

use aicleaner_config::RuntimeSettings;
use aicleaner_providers::{CleaningRequest, HealthEvent, ImagePayload};
use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use crate::commands::{load_runtime_config, Command};
use crate::error::{CliError, CliResult};
use crate::output::{self, OutputStyle};

pub struct AnalyzeCommand {
    settings: RuntimeSettings,
    image: PathBuf,
    prompt: String,
    zone: Option<String>,
    json: bool,
}

impl AnalyzeCommand {
    pub fn new(
        settings: RuntimeSettings,
        image: PathBuf,
        prompt: String,
        zone: Option<String>,
        json: bool,
    ) -> Self {
        Self {
            settings,
            image,
            prompt,
            zone,
            json,
        }
    }

    async fn request(&self) -> CliResult<CleaningRequest> {
        let data = tokio::fs::read(&self.image).await.map_err(|e| CliError::InvalidArgument {
            message: format!("cannot read image {}: {}", self.image.display(), e),
        })?;
        let mut request = CleaningRequest::new(ImagePayload::sniff(data), self.prompt.clone());
        if let Some(zone) = &self.zone {
            request = request.with_zone(zone.clone());
        }
        Ok(request)
    }
}

fn log_event(event: &HealthEvent) {
    info!(
        provider = %event.provider_id,
        change = ?event.change,
        device_status = %event.device_status,
        "Provider health changed"
    );
}

#[async_trait]
impl Command for AnalyzeCommand {
    async fn execute(&self) -> CliResult<()> {
        let request = self.request().await?;
        let runtime = load_runtime_config(&self.settings).await?;
        let selector = runtime.selector()?;

        let mut events = selector.subscribe();
        let listener = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => log_event(&event),
                    Err(RecvError::Lagged(skipped)) => debug!(skipped, "Health events dropped"),
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let outcome = selector.select_and_invoke(&request).await;
        drop(selector);
        let _ = listener.await;
        let result = outcome?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
            return Ok(());
        }

        let style = OutputStyle::default();
        output::print_plain(&result.description);
        if !result.tasks.is_empty() {
            output::print_plain(&style.section("Tasks"));
            for task in &result.tasks {
                output::print_plain(&style.list_item(task));
            }
        }
        output::print_detail(&format!("by {} ({})", result.provider_id, result.model));
        Ok(())
    }
}
