//! dashlink: hierarchical dashboard aggregation daemon
//!
//! Runs one aggregating node together with an in-process topology of
//! simulated branches (from config), schedules periodic aggregation, and
//! logs each summary. Mostly a demonstration harness for the engine; real
//! deployments plug in their own [`dashlink::Transport`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use serde_json::{Map, Value};
use tracing::{info, warn};

use dashlink::config::Config;
use dashlink::transport::MemoryHub;
use dashlink::{AggregationEngine, DataProvider, Level, Result as DashlinkResult};

#[derive(Parser)]
#[command(name = "dashlink")]
#[command(about = "Hierarchical dashboard data-aggregation daemon")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "dashlink.toml")]
    config: String,

    /// Node ID (overrides config file)
    #[arg(long, env = "DASHLINK_NODE_ID")]
    node_id: Option<String>,
}

/// Serves the static metrics a simulated branch was configured with.
struct StaticProvider {
    metrics: Map<String, Value>,
}

#[async_trait]
impl DataProvider for StaticProvider {
    async fn provide(
        &self,
        _data_type: &str,
        _filter_criteria: Option<&str>,
    ) -> DashlinkResult<Map<String, Value>> {
        Ok(self.metrics.clone())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dashlink=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    info!("Starting dashlink");
    info!("Config file: {}", cli.config);

    let mut config: Config = if std::path::Path::new(&cli.config).exists() {
        let content = std::fs::read_to_string(&cli.config)?;
        toml::from_str(&content)?
    } else {
        info!("Config file not found, using defaults");
        Config::default()
    };

    if let Some(node_id) = cli.node_id {
        config.node.id = node_id;
    }

    info!("Node ID: {}", config.node.id);
    info!("Level: {}", config.node.level);

    let hub = MemoryHub::new();

    // Attach the simulated branches and give each a static provider.
    let data_type = config.aggregation.data_type.clone();
    for branch in &config.branches {
        let (transport, inbound) = hub.attach(Level::Branch, branch.id.clone());
        let engine = AggregationEngine::new(transport);
        let metrics: Map<String, Value> = branch
            .metrics
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        engine.register_data_provider(data_type.as_str(), Arc::new(StaticProvider { metrics }));
        tokio::spawn(Arc::clone(&engine).run_inbound(inbound));
        info!(branch = %branch.id, "simulated branch online");
    }

    // Attach the aggregating node itself.
    let (transport, inbound) = hub.attach(config.node.level, config.node.id.clone());
    let engine = AggregationEngine::new(transport);
    tokio::spawn(Arc::clone(&engine).run_inbound(inbound));

    // One eager pass: query every branch individually and merge the results,
    // the multi-target pattern the periodic path does not cover.
    let branch_ids: Vec<String> = config.branches.iter().map(|b| b.id.clone()).collect();
    let deadline = Duration::from_millis(config.aggregation.request_timeout_ms);
    let mut transfers = Vec::new();
    for branch_id in &branch_ids {
        match engine
            .request_and_aggregate_data(
                &data_type,
                None,
                Level::Branch,
                std::slice::from_ref(branch_id),
                deadline,
            )
            .await
        {
            Ok(transfer) => transfers.push(transfer),
            Err(e) => warn!(branch = %branch_id, error = %e, "initial branch query failed"),
        }
    }
    if let Some(summary) = engine.aggregate_data(&transfers) {
        info!(
            data_type = %summary.data_type,
            sources = transfers.len(),
            data = %serde_json::Value::Object(summary.data.clone()),
            "initial network summary"
        );
    }

    // Periodic re-aggregation, logging each summary.
    let handler: dashlink::AggregationHandler = Arc::new(|transfer| {
        info!(
            data_type = %transfer.data_type,
            source = %transfer.source_id,
            data = %serde_json::Value::Object(transfer.data.clone()),
            "periodic summary"
        );
    });
    let schedule_id = engine.schedule_periodic_aggregation(
        data_type.as_str(),
        Level::Branch,
        Duration::from_millis(config.aggregation.interval_ms),
        handler,
    );
    info!(schedule_id = %schedule_id, "periodic aggregation running, ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    engine.cancel_periodic_aggregation(&schedule_id);
    info!("Shutting down");

    Ok(())
}
