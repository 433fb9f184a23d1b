//! Integration tests for bulk node creation and reclamation.
//!
//! These tests drive a full context wired to the mock provider.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use cumulus_compute::{
    predicates, BulkOutcome, ComputeContext, ComputeError, ComputeProvider, ContextBuilder, CreateNetworkOptions,
    MockFailure, MockProvider, MockProviderFactory, MockTemplateOptions, NodeState, NodeStore,
    OfferingFilter, Properties, YamlNodeStore, PROPERTY_MAX_PARALLEL, PROPERTY_NODE_STORE_PATH,
    PROPERTY_NODE_TIMEOUT_SECS,
};

fn properties() -> Properties {
    Properties::new()
        .with("mock.identity", "admin")
        .with("mock.credential", "secret")
}

fn context_with(provider: &Arc<MockProvider>, properties: Properties) -> ComputeContext {
    ContextBuilder::new(MockProviderFactory::with_provider(provider.clone()), properties)
        .build()
        .expect("Failed to build context")
}

fn context(provider: &Arc<MockProvider>) -> ComputeContext {
    context_with(provider, properties())
}

/// A rejected attempt is reported by ordinal and the rest of the group is created.
#[tokio::test]
async fn test_partial_failure_then_group_reclaim() {
    let provider = Arc::new(MockProvider::new());
    provider
        .fail_attempt(2, MockFailure::Reject("no capacity in zone".into()))
        .unwrap();

    let context = context(&provider);
    let compute = context.compute_service();
    let template = compute.template_builder().build().await.unwrap();

    let result = compute.create_nodes_in_group("web", 3, &template).await.unwrap();

    assert_eq!(result.outcome(), BulkOutcome::Partial);
    assert_eq!(result.successes.len(), 2);
    assert_eq!(result.errors.keys().copied().collect::<Vec<_>>(), vec![2]);
    assert!(result.errors[&2].node_id.is_none());
    assert!(result.successes.iter().all(|n| n.group == "web"));
    assert_eq!(result.attempted(), result.requested);
    assert_eq!(context.node_store().list().unwrap().len(), 2);

    let report = compute
        .destroy_nodes_matching(predicates::in_group("web"))
        .await
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(report.destroyed.len(), 2);
    assert_eq!(provider.node_count().unwrap(), 0);
    assert!(context.node_store().list().unwrap().is_empty());
}

/// A node that fails after provisioning is reported with its id and still reclaimed.
#[tokio::test]
async fn test_bootstrap_failure_is_reclaimable() {
    let provider = Arc::new(MockProvider::new());
    provider
        .fail_attempt(3, MockFailure::Bootstrap("ssh never came up".into()))
        .unwrap();

    let context = context(&provider);
    let compute = context.compute_service();
    let template = compute.template_builder().build().await.unwrap();

    let result = compute.create_nodes_in_group("db", 3, &template).await.unwrap();

    assert_eq!(result.successes.len(), 2);
    let leaked = result.errors[&3].node_id.clone().expect("node id of failed node");
    assert!(!result.successes.iter().any(|n| n.id == leaked));
    assert_eq!(result.nodes_to_reclaim().len(), 3);
    assert!(context.node_store().get(&leaked).unwrap().is_some());

    let in_group = compute
        .list_nodes_matching(predicates::in_group("db"))
        .await
        .unwrap();
    assert_eq!(in_group.len(), 3);
    assert!(in_group.iter().any(|n| n.id == leaked && n.state == NodeState::Error));

    let report = compute
        .destroy_nodes_matching(predicates::with_ids(result.nodes_to_reclaim()))
        .await
        .unwrap();
    assert_eq!(report.destroyed, result.nodes_to_reclaim());
    assert_eq!(provider.node_count().unwrap(), 0);
}

/// A fatal provider error stops further attempts.
#[tokio::test]
async fn test_quota_exhaustion_skips_remaining_attempts() {
    let provider = Arc::new(MockProvider::new());
    provider.set_quota(Some(1)).unwrap();

    let context = context_with(&provider, properties().with(PROPERTY_MAX_PARALLEL, "1"));
    let compute = context.compute_service();
    let template = compute.template_builder().build().await.unwrap();

    let result = compute.create_nodes_in_group("batch", 5, &template).await.unwrap();

    assert_eq!(result.successes.len(), 1);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.skipped, 3);
    assert!(!result.is_complete());
    assert!(matches!(result.fatal_error(), Some(ComputeError::QuotaExceeded(_))));

    let err = result.into_result().unwrap_err();
    assert_eq!(err.successful_nodes().len(), 1);
    assert!(err.node_errors().contains_key(&2));
}

/// A hung attempt fails on its own timeout without holding up the others.
#[tokio::test]
async fn test_hung_attempt_times_out() {
    let provider = Arc::new(MockProvider::new());
    provider.fail_attempt(2, MockFailure::Hang).unwrap();

    let context = context_with(&provider, properties().with(PROPERTY_NODE_TIMEOUT_SECS, "1"));
    let compute = context.compute_service();
    let template = compute.template_builder().build().await.unwrap();

    let result = compute.create_nodes_in_group("slow", 3, &template).await.unwrap();

    assert_eq!(result.successes.len(), 2);
    assert!(matches!(result.errors[&2].cause, ComputeError::Timeout(_)));
    assert_eq!(result.skipped, 0);
}

/// One node that refuses to die does not stop the rest of the group.
#[tokio::test]
async fn test_destroy_failures_are_isolated() {
    let provider = Arc::new(MockProvider::new());
    let context = context(&provider);
    let compute = context.compute_service();
    let template = compute.template_builder().build().await.unwrap();

    let nodes = compute
        .create_nodes_in_group("api", 3, &template)
        .await
        .unwrap()
        .into_result()
        .unwrap();
    provider.fail_destroy(&nodes[0].id, "volume busy").unwrap();

    let report = compute
        .destroy_nodes_matching(predicates::in_group("api"))
        .await
        .unwrap();

    assert_eq!(report.matched(), 3);
    assert_eq!(report.destroyed.len(), 2);
    assert!(report.failed.contains_key(&nodes[0].id));
    assert_eq!(provider.node_count().unwrap(), 1);
    assert!(context.node_store().get(&nodes[0].id).unwrap().is_some());
}

/// A destroy that never answers is reported as a timeout and the reclaim returns.
#[tokio::test]
async fn test_hung_destroy_times_out() {
    let provider = Arc::new(MockProvider::new());
    let context = context_with(&provider, properties().with(PROPERTY_NODE_TIMEOUT_SECS, "1"));
    let compute = context.compute_service();
    let template = compute.template_builder().build().await.unwrap();

    let nodes = compute
        .create_nodes_in_group("web", 3, &template)
        .await
        .unwrap()
        .into_result()
        .unwrap();
    provider.hang_destroy(&nodes[0].id).unwrap();

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        compute.destroy_nodes_matching(predicates::in_group("web")),
    )
    .await
    .expect("reclaim should not wait on a hung destroy")
    .unwrap();

    assert_eq!(report.destroyed.len(), 2);
    assert!(matches!(report.failed[&nodes[0].id], ComputeError::Timeout(_)));
    assert_eq!(provider.node_count().unwrap(), 1);
    assert!(context.node_store().get(&nodes[0].id).unwrap().is_some());
}

/// Dropping a bulk request mid-flight leaves every created node findable by group.
#[tokio::test]
async fn test_cancelled_creation_is_reclaimable() {
    let provider = Arc::new(MockProvider::new());
    provider.set_attempt_delay(3, Duration::from_secs(5)).unwrap();
    provider.set_attempt_delay(4, Duration::from_secs(5)).unwrap();

    let context = context_with(&provider, properties().with(PROPERTY_MAX_PARALLEL, "4"));
    let compute = context.compute_service();
    let template = compute.template_builder().build().await.unwrap();

    let cancelled = tokio::time::timeout(
        Duration::from_millis(500),
        compute.create_nodes_in_group("g", 4, &template),
    )
    .await;
    assert!(cancelled.is_err());

    let in_group: BTreeSet<String> = compute
        .list_nodes_matching(predicates::in_group("g"))
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();
    let on_provider: BTreeSet<String> = provider
        .list_nodes()
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(in_group, on_provider);
    assert_eq!(in_group.len(), 2);
    assert_eq!(context.node_store().list().unwrap().len(), 2);

    let report = compute
        .destroy_nodes_matching(predicates::in_group("g"))
        .await
        .unwrap();
    assert!(report.is_clean());
    assert_eq!(provider.node_count().unwrap(), 0);
}

/// Nodes removed out of band are dropped from the store on the next reclaim.
#[tokio::test]
async fn test_reclaim_purges_stale_store_entries() {
    let provider = Arc::new(MockProvider::new());
    let context = context(&provider);
    let compute = context.compute_service();
    let template = compute.template_builder().build().await.unwrap();

    let result = compute.create_nodes_in_group("cache", 2, &template).await.unwrap();
    provider.destroy_node(&result.successes[0].id).await.unwrap();

    let report = compute
        .destroy_nodes_matching(predicates::in_group("cache"))
        .await
        .unwrap();
    assert_eq!(report.destroyed.len(), 1);
    assert!(context.node_store().list().unwrap().is_empty());
}

/// Creation records every node in the YAML store named by the context properties.
#[tokio::test]
async fn test_yaml_node_store_survives_context() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("nodes.yaml");

    let provider = Arc::new(MockProvider::new());
    let context = context_with(
        &provider,
        properties().with(PROPERTY_NODE_STORE_PATH, path.to_string_lossy()),
    );
    let compute = context.compute_service();
    let template = compute.template_builder().build().await.unwrap();
    compute.create_nodes_in_group("web", 2, &template).await.unwrap();
    drop(context);

    let reopened = YamlNodeStore::open(&path).unwrap();
    let nodes = reopened.list().unwrap();
    assert_eq!(nodes.len(), 2);
    assert!(nodes.iter().all(|n| n.group == "web"));
}

#[tokio::test]
async fn test_invalid_requests() {
    let provider = Arc::new(MockProvider::new());
    let compute = context(&provider).compute_service();
    let template = compute.template_builder().build().await.unwrap();

    let err = compute.create_nodes_in_group("web", 0, &template).await.unwrap_err();
    assert!(matches!(err, ComputeError::InvalidRequest(_)));

    let err = compute.create_nodes_in_group(" ", 1, &template).await.unwrap_err();
    assert!(matches!(err, ComputeError::InvalidRequest(_)));
    assert_eq!(provider.node_count().unwrap(), 0);
}

/// Full network experiment: VLAN network, nodes attached through the
/// provider options view, teardown of nodes and network.
#[tokio::test]
async fn test_network_experiment_lifecycle() {
    let provider = Arc::new(MockProvider::new());
    let context = context(&provider);
    let compute = context.compute_service();
    let network = context.network().expect("mock binds a network provider");

    let mut template = compute.template_builder().build().await.unwrap();
    let zone_id = template.location().id.clone();

    let offerings = network
        .list_network_offerings(&OfferingFilter::specify_vlan(true).zone_id(&zone_id))
        .await
        .unwrap();
    let offering = offerings.first().expect("vlan offering in zone");

    let created = network
        .create_network_in_zone(
            &zone_id,
            &offering.id,
            "experiment",
            "experiment",
            &CreateNetworkOptions::vlan("2")
                .start_ip("192.168.1.2")
                .netmask("255.255.255.0")
                .gateway("192.168.1.1"),
        )
        .await
        .unwrap();

    template
        .options_mut()
        .as_provider_mut::<MockTemplateOptions>()
        .unwrap()
        .network_id(&created.id);
    assert_eq!(
        template
            .options()
            .as_provider::<MockTemplateOptions>()
            .unwrap()
            .network_id
            .as_deref(),
        Some(created.id.as_str())
    );

    let result = compute.create_nodes_in_group("experiment", 1, &template).await.unwrap();
    assert!(result.is_success());
    assert_eq!(result.successes[0].network_ids, vec![created.id.clone()]);

    let report = compute
        .destroy_nodes_matching(predicates::in_group("experiment"))
        .await
        .unwrap();
    assert!(report.is_clean());

    network.delete_network(&created.id).await.unwrap();
    assert_eq!(provider.network_count().unwrap(), 0);
}

#[tokio::test]
async fn test_options_view_of_wrong_provider_type() {
    #[derive(Debug, Clone)]
    struct OtherCloudOptions;

    let provider = Arc::new(MockProvider::new());
    let compute = context(&provider).compute_service();
    let template = compute.template_builder().build().await.unwrap();

    let err = template
        .options()
        .as_provider::<OtherCloudOptions>()
        .unwrap_err();
    assert!(matches!(err, ComputeError::OptionsTypeMismatch { .. }));
}
