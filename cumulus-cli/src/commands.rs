//! Subcommand implementations.

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use cumulus_compute::{
    predicates, BulkCreationResult, ComputeContext, ComputeService, ContextBuilder,
    CreateNetworkOptions, MockFailure, MockProvider, MockProviderFactory, MockTemplateOptions,
    OfferingFilter, Template,
};

use crate::cli::Command;
use crate::config::Config;

/// VLAN and addressing of the experiment network.
const EXPERIMENT_VLAN: &str = "2";
const EXPERIMENT_START_IP: &str = "192.168.1.2";
const EXPERIMENT_NETMASK: &str = "255.255.255.0";
const EXPERIMENT_GATEWAY: &str = "192.168.1.1";

/// Build a context against `provider` and run `command`.
pub async fn execute(config: &Config, command: Command, provider: Arc<MockProvider>) -> Result<()> {
    let context = ContextBuilder::new(
        MockProviderFactory::with_provider(provider.clone()),
        config.to_properties(),
    )
    .build()
    .context("Failed to build compute context")?;

    info!(
        provider = %context.provider_name(),
        node_store = context.node_store().kind(),
        "Compute context ready"
    );

    match command {
        Command::Locations => locations(&context).await,
        Command::Run {
            group,
            count,
            fail_ordinals,
            teardown,
        } => {
            for ordinal in fail_ordinals {
                provider.fail_attempt(ordinal, MockFailure::Reject("injected failure".to_string()))?;
            }
            run(&context, &group, count, teardown).await
        }
        Command::Experiment { group, count } => experiment(&context, &group, count).await,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn locations(context: &ComputeContext) -> Result<()> {
    let locations = context.compute_service().list_assignable_locations().await?;
    print_json(&locations)
}

async fn run(context: &ComputeContext, group: &str, count: u32, teardown: bool) -> Result<()> {
    let compute = context.compute_service();
    let template = compute.template_builder().build().await?;

    let result = compute.create_nodes_in_group(group, count, &template).await?;
    print_json(&result)?;

    if teardown || !result.is_success() {
        let report = compute
            .destroy_nodes_matching(predicates::in_group(group))
            .await?;
        print_json(&report)?;
    }

    result.into_result()?;
    Ok(())
}

async fn experiment(context: &ComputeContext, group: &str, count: u32) -> Result<()> {
    let compute = context.compute_service();
    let network = context
        .network()
        .context("Provider has no network support")?
        .clone();

    let mut template = compute.template_builder().build().await?;
    let zone_id = template.location().id.clone();

    let offerings = network
        .list_network_offerings(&OfferingFilter::specify_vlan(true).zone_id(&zone_id))
        .await?;
    let offering = offerings
        .first()
        .with_context(|| format!("No VLAN network offering in zone {}", zone_id))?;

    let created = network
        .create_network_in_zone(
            &zone_id,
            &offering.id,
            group,
            group,
            &CreateNetworkOptions::vlan(EXPERIMENT_VLAN)
                .start_ip(EXPERIMENT_START_IP)
                .netmask(EXPERIMENT_NETMASK)
                .gateway(EXPERIMENT_GATEWAY),
        )
        .await?;
    info!(network_id = %created.id, zone = %zone_id, offering = %offering.name, "Network created");

    let outcome = create_on_network(&compute, &mut template, &created.id, group, count).await;
    match &outcome {
        Ok(result) => print_json(result)?,
        Err(e) => error!(error = %e, "Node creation failed"),
    }

    // Teardown runs whatever happened above.
    let reclaimed = compute
        .destroy_nodes_matching(predicates::in_group(group))
        .await;
    match &reclaimed {
        Ok(report) => print_json(report)?,
        Err(e) => warn!(error = %e, "Failed to reclaim group"),
    }
    let deleted = network.delete_network(&created.id).await;
    if let Err(e) = &deleted {
        warn!(network_id = %created.id, error = %e, "Failed to delete network");
    }

    outcome?.into_result()?;
    let report = reclaimed?;
    if !report.is_clean() {
        anyhow::bail!("{} node(s) could not be destroyed", report.failed.len());
    }
    deleted?;
    Ok(())
}

async fn create_on_network(
    compute: &ComputeService,
    template: &mut Template,
    network_id: &str,
    group: &str,
    count: u32,
) -> cumulus_compute::Result<BulkCreationResult> {
    template
        .options_mut()
        .as_provider_mut::<MockTemplateOptions>()?
        .network_id(network_id);
    compute.create_nodes_in_group(group, count, template).await
}
