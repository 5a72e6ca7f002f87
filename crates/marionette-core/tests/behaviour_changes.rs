//! Manual behaviour changes and template resets.

use marionette_abntest::BehaviourPropagator;
use marionette_core::{BehaviourChangeRequest, BehaviourChangeService, ControlPlaneError};
use marionette_domain::ServiceStatus;
use marionette_registry::{ConfigRegistry, RegistryError};
use marionette_test_utils::{
    behaviour, class_name, method_name, registry_with, service_config, service_name, FixedLocator,
    RecordingGateway,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn setup() -> (BehaviourChangeService, Arc<ConfigRegistry>, Arc<RecordingGateway>) {
    let registry = registry_with([service_config(
        "checkout",
        &[
            ("Pricing", "quote", &["flat", "tiered", "dynamic"]),
            ("Pricing", "round", &["up", "down"]),
        ],
    )]);
    let gateway = RecordingGateway::new();
    let propagator = BehaviourPropagator::new(FixedLocator::new(3), gateway.clone(), 2);
    (
        BehaviourChangeService::new(Arc::clone(&registry), propagator),
        registry,
        gateway,
    )
}

#[tokio::test]
async fn change_updates_registry_and_every_instance() {
    let (service, registry, gateway) = setup();

    let report = service
        .change_behaviour(&BehaviourChangeRequest::new("checkout", "Pricing", "quote", "tiered"))
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.total, 3);
    assert_eq!(
        registry
            .current_behaviour(&service_name("checkout"), &class_name("Pricing"), &method_name("quote"))
            .unwrap(),
        behaviour("tiered")
    );
    let sent = gateway.notifications();
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().all(|n| n.behaviour == behaviour("tiered") && n.method == method_name("quote")));
    assert!(registry.is_service_modified(&service_name("checkout")));
    assert_eq!(
        registry.service_metadata(&service_name("checkout")).unwrap().status,
        ServiceStatus::Modified
    );
}

#[tokio::test]
async fn unavailable_behaviour_is_a_validation_error() {
    let (service, registry, gateway) = setup();

    let err = service
        .change_behaviour(&BehaviourChangeRequest::new("checkout", "Pricing", "quote", "free"))
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert!(matches!(err, ControlPlaneError::Registry(RegistryError::Config(_))));
    assert!(!registry.is_service_modified(&service_name("checkout")));
    assert_eq!(gateway.count(), 0);
}

#[tokio::test]
async fn blank_and_unknown_targets_are_rejected() {
    let (service, _, gateway) = setup();

    let blank = service
        .change_behaviour(&BehaviourChangeRequest::new("checkout", " ", "quote", "flat"))
        .await
        .unwrap_err();
    assert!(matches!(blank, ControlPlaneError::Config(_)));

    let unknown = service
        .change_behaviour(&BehaviourChangeRequest::new("billing", "Pricing", "quote", "flat"))
        .await
        .unwrap_err();
    assert!(matches!(
        unknown,
        ControlPlaneError::Registry(RegistryError::UnknownService(_))
    ));

    let missing_method = service
        .change_behaviour(&BehaviourChangeRequest::new("checkout", "Pricing", "refund", "flat"))
        .await
        .unwrap_err();
    assert!(missing_method.is_validation());
    assert_eq!(gateway.count(), 0);
}

#[tokio::test]
async fn reset_propagates_only_changed_methods() {
    let (service, registry, gateway) = setup();
    service
        .change_behaviour(&BehaviourChangeRequest::new("checkout", "Pricing", "quote", "dynamic"))
        .await
        .unwrap();
    gateway.clear();

    let reports = service.reset_to_template("checkout").await.unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].change.method, method_name("quote"));
    assert_eq!(reports[0].change.behaviour, behaviour("flat"));
    assert_eq!(gateway.count(), 3);
    assert!(!registry.is_service_modified(&service_name("checkout")));
    assert_eq!(
        registry.service_metadata(&service_name("checkout")).unwrap().status,
        ServiceStatus::ResetToTemplate
    );
}

#[tokio::test]
async fn reset_of_pristine_service_sends_nothing() {
    let (service, _, gateway) = setup();

    let reports = service.reset_to_template("checkout").await.unwrap();

    assert!(reports.is_empty());
    assert_eq!(gateway.count(), 0);
}

#[tokio::test]
async fn reset_of_unknown_service_fails() {
    let (service, _, _) = setup();

    let err = service.reset_to_template("billing").await.unwrap_err();
    assert!(matches!(
        err,
        ControlPlaneError::Registry(RegistryError::UnknownService(name)) if name == service_name("billing")
    ));
}
