use std::sync::Arc;

use provisioner_dispatcher::{DistributionScheduler, DistributionService, VersionResolver};
use provisioner_domain::{ArtifactDescriptor, ProvisionError, Release, TargetRole};
use provisioner_testing_utils::{
    test_config, three_node_cluster, ClusterBuilder, FileGroupBuilder, MockCatalogClient,
    MockConnector,
};
use provisioner_worker::{NodeWorker, WorkerSettings};

fn fetched(connector: &MockConnector, node: &str) -> Vec<String> {
    connector
        .commands(node)
        .iter()
        .filter_map(|command| command.rsplit("/tmp/").next())
        .map(|name| name.trim_end_matches('\'').to_string())
        .collect()
}

fn scheduler(connector: &MockConnector) -> DistributionScheduler {
    DistributionScheduler::new(NodeWorker::new(
        Arc::new(connector.clone()),
        WorkerSettings::from_config(&test_config()),
    ))
}

fn gpdb_catalog() -> MockCatalogClient {
    MockCatalogClient::new()
        .with_product(
            "pivotal-gpdb",
            vec![
                Release::new(10, "4.3.7.3"),
                Release::new(11, "4.3.8.1"),
                Release::new(12, "4.3.6.2"),
            ],
        )
        .with_release_files(
            "pivotal-gpdb",
            11,
            vec![
                FileGroupBuilder::new("Database Server")
                    .with_file("Red Hat Enterprise Linux 5, 6", "product/gpdb/greenplum-db.zip")
                    .with_file("SuSE Linux", "product/gpdb/greenplum-db-suse.zip")
                    .build(),
                FileGroupBuilder::new("Clients")
                    .with_file(
                        "Clients for Red Hat Enterprise Linux x86_64",
                        "product/gpdb/clients.zip",
                    )
                    .build(),
                FileGroupBuilder::new("Documentation")
                    .with_file("Admin Guide", "product/gpdb/admin.pdf")
                    .build(),
            ],
        )
}

#[tokio::test]
async fn test_three_node_role_targeted_fetch() {
    let connector = MockConnector::new();
    let cluster = three_node_cluster("pivotal-gpdb");
    let artifacts = Arc::new(vec![
        ArtifactDescriptor::new("https://catalog.test/core", "core.tar", TargetRole::Master),
        ArtifactDescriptor::new("https://catalog.test/common", "common.tar", TargetRole::ClusterWide),
    ]);

    let deliveries = scheduler(&connector)
        .distribute(&cluster, artifacts)
        .await
        .unwrap();

    assert_eq!(deliveries.len(), 3);
    assert_eq!(deliveries[0].node_name, "mdw");
    assert_eq!(fetched(&connector, "mdw"), vec!["core.tar", "common.tar"]);
    assert_eq!(fetched(&connector, "access1"), vec!["common.tar"]);
    assert_eq!(fetched(&connector, "sdw1"), vec!["common.tar"]);
    assert_eq!(connector.open_sessions(), 0);
}

#[tokio::test]
async fn test_cluster_wide_reaches_every_role() {
    let connector = MockConnector::new();
    let cluster = ClusterBuilder::new("pivotal-gpdb")
        .with_node("mdw", "master")
        .with_node("smdw", "standby")
        .with_node("etl1", "etl")
        .with_node("sdw1", "worker")
        .build();
    let artifacts = Arc::new(vec![ArtifactDescriptor::new(
        "https://catalog.test/common",
        "common.tar",
        TargetRole::ClusterWide,
    )]);

    scheduler(&connector).distribute(&cluster, artifacts).await.unwrap();

    for node in &cluster.nodes {
        assert_eq!(fetched(&connector, &node.node_name), vec!["common.tar"]);
    }
}

#[tokio::test]
async fn test_master_artifact_only_on_master_substring() {
    let connector = MockConnector::new();
    let cluster = ClusterBuilder::new("pivotal-gpdb")
        .with_node("mdw", "master")
        .with_node("mdw-access", "master-access")
        .with_node("sdw1", "worker")
        .with_node("access1", "access")
        .build();
    let artifacts = Arc::new(vec![ArtifactDescriptor::new(
        "https://catalog.test/madlib",
        "madlib.tar.gz",
        TargetRole::Master,
    )]);

    scheduler(&connector).distribute(&cluster, artifacts).await.unwrap();

    assert_eq!(fetched(&connector, "mdw"), vec!["madlib.tar.gz"]);
    assert_eq!(fetched(&connector, "mdw-access"), vec!["madlib.tar.gz"]);
    assert!(fetched(&connector, "sdw1").is_empty());
    assert!(fetched(&connector, "access1").is_empty());
}

#[tokio::test]
async fn test_exhausted_node_fails_run_without_stopping_others() {
    let connector = MockConnector::new().always_fail("sdw1");
    let cluster = three_node_cluster("pivotal-gpdb");
    let artifacts = Arc::new(vec![ArtifactDescriptor::new(
        "https://catalog.test/common",
        "common.tar",
        TargetRole::ClusterWide,
    )]);

    let error = scheduler(&connector)
        .distribute(&cluster, artifacts)
        .await
        .unwrap_err();

    assert_eq!(error.failed_nodes(), vec!["sdw1"]);
    match &error {
        ProvisionError::DistributionFailed { failures } => {
            assert!(matches!(
                failures[0].error,
                ProvisionError::ConnectionExhausted { attempts: 2, .. }
            ));
        }
        other => panic!("期望 DistributionFailed，实际: {other:?}"),
    }
    assert_eq!(connector.attempts("sdw1"), 2);
    assert_eq!(fetched(&connector, "mdw"), vec!["common.tar"]);
    assert_eq!(fetched(&connector, "access1"), vec!["common.tar"]);
    assert_eq!(connector.open_sessions(), 0);
}

#[tokio::test]
async fn test_panicked_node_task_is_attributed_to_its_node() {
    let connector = MockConnector::new().panic_on_connect("sdw1");
    let cluster = three_node_cluster("pivotal-gpdb");
    let artifacts = Arc::new(vec![ArtifactDescriptor::new(
        "https://catalog.test/common",
        "common.tar",
        TargetRole::ClusterWide,
    )]);

    let error = scheduler(&connector)
        .distribute(&cluster, artifacts)
        .await
        .unwrap_err();

    assert_eq!(error.failed_nodes(), vec!["sdw1"]);
    match &error {
        ProvisionError::DistributionFailed { failures } => {
            assert_eq!(failures[0].external_ip, "10.0.0.3");
            assert!(matches!(failures[0].error, ProvisionError::Internal(_)));
        }
        other => panic!("期望 DistributionFailed，实际: {other:?}"),
    }
    assert_eq!(fetched(&connector, "mdw"), vec!["common.tar"]);
    assert_eq!(fetched(&connector, "access1"), vec!["common.tar"]);
}

#[tokio::test]
async fn test_panicked_command_task_is_attributed_to_its_node() {
    let connector = MockConnector::new().panic_on_connect("sdw2");
    let cluster = ClusterBuilder::new("pivotal-gpdb")
        .with_node("sdw1", "worker")
        .with_node("sdw2", "worker")
        .build();

    let error = scheduler(&connector)
        .run_commands(&cluster, "worker", Arc::new(vec!["uptime".to_string()]))
        .await
        .unwrap_err();

    assert_eq!(error.failed_nodes(), vec!["sdw2"]);
    assert_eq!(connector.commands("sdw1"), vec!["uptime"]);
}

#[tokio::test]
async fn test_service_run_end_to_end() {
    let catalog = Arc::new(gpdb_catalog());
    let connector = MockConnector::new();
    let service = DistributionService::new(
        catalog.clone(),
        Arc::new(connector.clone()),
        &test_config(),
    );
    let cluster = three_node_cluster("pivotal-gpdb");

    let report = service.run(&cluster).await.unwrap();

    assert_eq!(report.release.id, 11);
    assert_eq!(catalog.eula_acceptances(), vec![("pivotal-gpdb".to_string(), 11)]);

    let names: Vec<_> = report.artifacts.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["greenplum-db.zip", "clients.zip"]);

    let by_role = report.artifacts_by_role();
    assert_eq!(by_role[&TargetRole::ClusterWide][0].name, "greenplum-db.zip");
    assert_eq!(by_role[&TargetRole::Access][0].name, "clients.zip");
    assert!(!by_role.contains_key(&TargetRole::Master));

    assert_eq!(fetched(&connector, "mdw"), vec!["greenplum-db.zip"]);
    assert_eq!(
        fetched(&connector, "access1"),
        vec!["greenplum-db.zip", "clients.zip"]
    );
    assert_eq!(report.deliveries.len(), 3);
}

#[tokio::test]
async fn test_service_skips_eula_when_disabled() {
    let catalog = Arc::new(gpdb_catalog());
    let mut config = test_config();
    config.catalog.accept_eula = false;
    let service = DistributionService::new(catalog.clone(), Arc::new(MockConnector::new()), &config);

    service.run(&three_node_cluster("pivotal-gpdb")).await.unwrap();

    assert!(catalog.eula_acceptances().is_empty());
}

#[tokio::test]
async fn test_service_empty_classification_still_connects() {
    let catalog = Arc::new(
        MockCatalogClient::new().with_product("pivotal-gpdb", vec![Release::new(1, "4.3.8.1")]),
    );
    let connector = MockConnector::new();
    let service = DistributionService::new(catalog, Arc::new(connector.clone()), &test_config());

    let report = service.run(&three_node_cluster("pivotal-gpdb")).await.unwrap();

    assert!(report.artifacts.is_empty());
    assert_eq!(connector.sessions_opened(), 3);
    assert!(connector.commands("mdw").is_empty());
}

#[tokio::test]
async fn test_resolve_artifacts_does_not_accept_eula() {
    let catalog = Arc::new(gpdb_catalog());
    let service = DistributionService::new(
        catalog.clone(),
        Arc::new(MockConnector::new()),
        &test_config(),
    );

    let (_, release, artifacts) = service
        .resolve_artifacts(&three_node_cluster("pivotal-gpdb"))
        .await
        .unwrap();

    assert_eq!(release.id, 11);
    assert_eq!(artifacts.len(), 2);
    assert!(catalog.eula_acceptances().is_empty());
}

#[tokio::test]
async fn test_classification_is_idempotent() {
    let service = DistributionService::new(
        Arc::new(gpdb_catalog()),
        Arc::new(MockConnector::new()),
        &test_config(),
    );
    let cluster = three_node_cluster("pivotal-gpdb");

    let (_, _, first) = service.resolve_artifacts(&cluster).await.unwrap();
    let (_, _, second) = service.resolve_artifacts(&cluster).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_product_not_found() {
    let resolver = VersionResolver::new(Arc::new(gpdb_catalog()));

    let error = resolver.resolve_latest_release("pivotal-hdb").await.unwrap_err();
    assert!(matches!(error, ProvisionError::ProductNotFound { ref slug } if slug == "pivotal-hdb"));
}

#[tokio::test]
async fn test_catalog_unavailable_propagates() {
    let resolver = VersionResolver::new(Arc::new(MockCatalogClient::unavailable()));

    let error = resolver.resolve_latest_release("pivotal-gpdb").await.unwrap_err();
    assert!(matches!(error, ProvisionError::CatalogUnavailable(_)));
}

#[tokio::test]
async fn test_last_matching_product_is_used() {
    let catalog = Arc::new(
        MockCatalogClient::new()
            .with_product("pivotal-gpdb-legacy", vec![Release::new(1, "1.0")])
            .with_product("pivotal-gpdb", vec![Release::new(2, "4.3")]),
    );
    let resolver = VersionResolver::new(catalog.clone());

    let (entry, release) = resolver.resolve_latest_release("pivotal-gpdb").await.unwrap();
    assert_eq!(entry.slug, "pivotal-gpdb");
    assert_eq!(release.id, 2);
    assert_eq!(catalog.release_requests(), vec!["pivotal-gpdb"]);
}

#[tokio::test]
async fn test_run_commands_targets_role() {
    let connector = MockConnector::new().fail_connect("sdw1", 3);
    let service = DistributionService::new(
        Arc::new(MockCatalogClient::new()),
        Arc::new(connector.clone()),
        &test_config(),
    );
    let cluster = ClusterBuilder::new("pivotal-gpdb")
        .with_node("mdw", "master")
        .with_node("sdw1", "worker")
        .with_node("sdw2", "worker")
        .build();

    let completed = service
        .run_commands(&cluster, "worker", vec!["yum -y install wget".to_string()])
        .await
        .unwrap();

    assert_eq!(completed, 2);
    assert!(connector.commands("mdw").is_empty());
    assert_eq!(connector.commands("sdw2"), vec!["yum -y install wget"]);
    assert_eq!(connector.attempts("sdw1"), 4);
}
