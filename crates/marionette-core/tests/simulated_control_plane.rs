//! End-to-end control plane runs against a simulated fleet.

use marionette_abntest::{
    AbnTestOutcome, ExperimentCancellation, InstanceAddress, SystemConfigurationsGenerator,
    VariationPointsExtractor,
};
use marionette_core::{
    BehaviourChangeRequest, ControlPlane, ControlPlaneError, ControlPlaneSettings, Gateways,
    SettingsError, SimulatedFleet,
    SimulationConfig,
};
use marionette_domain::ServiceStatus;
use marionette_registry::ConfigRegistry;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn settings() -> ControlPlaneSettings {
    let mut settings = ControlPlaneSettings::default();
    settings.metrics.queries = SimulatedFleet::metric_queries();
    settings.experiment.total_time_secs = 600;
    settings
}

fn fleet() -> Arc<SimulatedFleet> {
    let config = SimulationConfig {
        seed: 7,
        services: 2,
        methods_per_class: 2,
        max_behaviours: 3,
        ..SimulationConfig::default()
    };
    Arc::new(SimulatedFleet::generate(&config).unwrap())
}

fn instance(service: &str, index: usize) -> InstanceAddress {
    InstanceAddress::new(format!("http://{service}-{index}.sim:8080"))
}

/// Every instance of every service runs what the registry says
fn assert_fleet_matches_registry(fleet: &SimulatedFleet, registry: &ConfigRegistry) {
    for service in fleet.service_names() {
        let config = registry.runtime_configuration(&service).unwrap();
        for (class, method, method_config) in config.methods() {
            for i in 0..2 {
                assert_eq!(
                    fleet.active_behaviour(&instance(service.as_str(), i), class, method).as_ref(),
                    Some(method_config.current_behaviour()),
                    "{service}-{i} {class}#{method}"
                );
            }
        }
    }
}

#[tokio::test]
async fn discovery_registers_the_whole_fleet() {
    let fleet = fleet();
    let plane = ControlPlane::new(settings(), Gateways::simulated(Arc::clone(&fleet))).unwrap();

    let report = plane.discover().await.unwrap();

    assert_eq!(report.registered, fleet.service_names());
    assert_eq!(plane.registry().len(), 2);

    fleet.set_offline(&fleet.service_names()[1], true);
    let quick = plane.refresh_availability().await.unwrap();
    assert_eq!(quick.unavailable, [fleet.service_names()[1].clone()]);
    assert_eq!(
        plane
            .registry()
            .service_metadata(&fleet.service_names()[1])
            .unwrap()
            .status,
        ServiceStatus::Unavailable
    );
}

#[tokio::test(start_paused = true)]
async fn experiment_ranks_every_configuration() {
    let fleet = fleet();
    let plane = ControlPlane::new(settings(), Gateways::simulated(Arc::clone(&fleet))).unwrap();
    plane.discover().await.unwrap();

    let points = VariationPointsExtractor::extract(&plane.registry().all_runtime_configurations());
    let expected = SystemConfigurationsGenerator::count(&points).unwrap();

    let outcome = plane.run_experiment(&ExperimentCancellation::new()).await.unwrap();

    if expected == 0 {
        assert!(matches!(outcome, AbnTestOutcome::Skipped { .. }));
        assert!(plane.latest_result().is_none());
        return;
    }
    assert!(matches!(
        outcome,
        AbnTestOutcome::Completed { index: 0, configurations, complete: true, .. } if configurations == expected
    ));

    let result = plane.latest_result().unwrap();
    assert_eq!(result.ranking.len(), expected);
    assert_eq!(
        result.ranking.iter().map(|r| r.rank).collect::<Vec<_>>(),
        (1..=expected).collect::<Vec<_>>()
    );
    let best = result.best().unwrap();
    assert!(best.system_metrics.iter().any(|m| m.name == "latency_ms"));
    let latencies: Vec<f64> = result
        .ranking
        .iter()
        .filter_map(|r| r.system_metrics.iter().find(|m| m.name == "latency_ms"))
        .map(|m| m.value)
        .collect();
    assert!(latencies.windows(2).all(|w| w[0] <= w[1]));

    assert_fleet_matches_registry(&fleet, plane.registry());
    assert_eq!(plane.result(0).map(|r| r.run_id), Some(result.run_id));
}

#[tokio::test]
async fn manual_change_and_reset_reach_the_instances() {
    let fleet = fleet();
    let plane = ControlPlane::new(settings(), Gateways::simulated(Arc::clone(&fleet))).unwrap();
    plane.discover().await.unwrap();

    let service = fleet.service_names()[0].clone();
    let config = plane.registry().runtime_configuration(&service).unwrap();
    let Some((class, method, method_config)) = config
        .methods()
        .find(|(_, _, m)| m.is_variation_point())
    else {
        return;
    };
    let target = method_config
        .available_behaviours()
        .iter()
        .find(|b| *b != method_config.current_behaviour())
        .cloned()
        .unwrap();

    let report = plane
        .change_behaviour(&BehaviourChangeRequest::new(
            service.as_str(),
            class.as_str(),
            method.as_str(),
            target.as_str(),
        ))
        .await
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(fleet.active_behaviour(&instance(service.as_str(), 0), class, method), Some(target));
    assert!(plane.registry().is_service_modified(&service));

    let reports = plane.reset_to_template(service.as_str()).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert!(!plane.registry().is_service_modified(&service));
    assert_fleet_matches_registry(&fleet, plane.registry());
}

#[tokio::test]
async fn unreachable_instance_is_reported_in_propagation() {
    let fleet = fleet();
    let plane = ControlPlane::new(settings(), Gateways::simulated(Arc::clone(&fleet))).unwrap();
    plane.discover().await.unwrap();

    let service = fleet.service_names()[0].clone();
    fleet.set_unreachable(&instance(service.as_str(), 1), true);
    let config = plane.registry().runtime_configuration(&service).unwrap();
    let (class, method, method_config) = config.methods().next().unwrap();

    let report = plane
        .change_behaviour(&BehaviourChangeRequest::new(
            service.as_str(),
            class.as_str(),
            method.as_str(),
            method_config.default_behaviour().as_str(),
        ))
        .await
        .unwrap();

    assert_eq!((report.total, report.succeeded), (2, 1));
    assert_eq!(report.failures[0].instance, instance(service.as_str(), 1));
}

#[tokio::test]
async fn invalid_settings_are_rejected() {
    let mut settings = settings();
    settings.experiment.max_in_flight_notifications = 0;

    let err = ControlPlane::new(settings, Gateways::simulated(fleet())).unwrap_err();
    assert!(matches!(err, ControlPlaneError::Settings(SettingsError::Invalid(_))));
    assert!(!err.is_validation());
}

#[tokio::test(start_paused = true)]
async fn background_loops_discover_and_stop_on_shutdown() {
    let fleet = fleet();
    let mut settings = settings();
    settings.experiment.interval_secs = Some(3600);
    let plane = ControlPlane::new(settings, Gateways::simulated(Arc::clone(&fleet))).unwrap();

    let shutdown = ExperimentCancellation::new();
    let tasks = plane.spawn_background(&shutdown);
    assert_eq!(tasks.len(), 3);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(plane.registry().len(), 2);
    assert!(plane.registry().last_discovery().is_some());

    shutdown.cancel();
    tasks.join().await;
    assert!(plane.results().is_empty());
}

#[tokio::test]
async fn disabled_discovery_spawns_nothing() {
    let mut settings = settings();
    settings.discovery.enabled = false;
    let plane = ControlPlane::new(settings, Gateways::simulated(fleet())).unwrap();

    let shutdown = ExperimentCancellation::new();
    let tasks = plane.spawn_background(&shutdown);
    assert!(tasks.is_empty());
    tasks.join().await;
}
