//! Command implementations and shared wiring.

pub mod ask;
pub mod serve;

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

use tabletalk_agent::{system_instructions, LoopConfig, PromptAssembler, ReasoningLoop};
use tabletalk_config::AppConfig;
use tabletalk_core::grounding::{MetadataSource, TableId};
use tabletalk_core::model::GenerationConfig;
use tabletalk_grounding::GroundingProvider;
use tabletalk_model::HttpModelClient;
use tabletalk_session::InMemorySessionStore;
use tabletalk_tools::{default_registry, DispatchPolicy, ToolDispatcher};

use crate::demo::DemoWarehouse;

/// Everything a command needs to talk to the agent.
pub struct AgentRuntime {
    pub runner: Arc<ReasoningLoop>,
    pub grounding: Arc<GroundingProvider>,
    pub config: AppConfig,
}

/// Wire the full agent from configuration.
///
/// The warehouse side is the in-process demo backend; swap it for a real
/// `MetadataSource`/`QueryEngine` pair to point at actual data.
pub async fn build_runtime() -> anyhow::Result<AgentRuntime> {
    let config = AppConfig::load().context("Failed to load configuration")?;

    let api_key = config
        .model
        .api_key
        .clone()
        .context("No model API key configured. Set TABLETALK_API_KEY or model.api_key in tabletalk.toml")?;

    let model = Arc::new(HttpModelClient::new(
        "openai-compat",
        &config.model.api_url,
        api_key,
        &config.model.model,
        &config.agent.clarification_marker,
        Duration::from_secs(config.model.timeout_secs),
    )?);

    if config.grounding.profiles_table_id.is_empty() {
        tracing::info!("No data-profiles table configured; sample rows will provide value context");
    }

    let warehouse = Arc::new(DemoWarehouse::new());
    let grounding = Arc::new(GroundingProvider::new(
        warehouse.clone(),
        config.grounding.ttl(),
        config.grounding.sample_row_limit,
    ));

    let registry = Arc::new(default_registry(grounding.clone(), warehouse.clone()));
    tracing::debug!(tools = ?registry.names(), "Tool registry built");
    let dispatcher = Arc::new(ToolDispatcher::new(
        registry,
        DispatchPolicy {
            timeout: config.agent.tool_timeout(),
            retry_attempts: config.agent.tool_retry_attempts,
            retry_base_delay: config.agent.tool_retry_base_delay(),
        },
    ));

    let store = Arc::new(InMemorySessionStore::new());

    let tables: Vec<TableId> = if config.grounding.table_names.is_empty() {
        grounding.source().list_tables().await?
    } else {
        config
            .grounding
            .table_names
            .iter()
            .map(|n| TableId::from(n))
            .collect()
    };
    tracing::info!(tables = tables.len(), "Grounding against tables");

    let assembler = PromptAssembler::new(
        system_instructions(&config.agent.clarification_marker),
        config.agent.prompt_budget_tokens,
    );

    let loop_config = LoopConfig {
        max_steps: config.agent.max_steps,
        max_tool_calls_per_turn: config.agent.max_tool_calls_per_turn,
        model_timeout: Duration::from_secs(config.model.timeout_secs),
        generation: GenerationConfig {
            temperature: config.model.temperature,
            top_p: config.model.top_p,
            max_output_tokens: config.model.max_output_tokens,
        },
        tables,
    };

    let runner = Arc::new(ReasoningLoop::new(
        model,
        dispatcher,
        grounding.clone(),
        store,
        assembler,
        loop_config,
    ));

    Ok(AgentRuntime {
        runner,
        grounding,
        config,
    })
}
