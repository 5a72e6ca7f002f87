//! Variation point extraction and configuration space enumeration.

use im::OrdMap;
use marionette_abntest::{ConfigurationId, SystemConfigurationsGenerator, VariationPointsExtractor};
use marionette_domain::{ClassConfig, ClassName, MethodConfig, MethodName, ServiceConfig, ServiceName};
use marionette_test_utils::{behaviour, class_name, method_name, service_config, service_name};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn runtime(services: impl IntoIterator<Item = ServiceConfig>) -> OrdMap<ServiceName, ServiceConfig> {
    services.into_iter().map(|s| (s.name().clone(), s)).collect()
}

fn service_with_counts(name: &str, counts: &[usize]) -> ServiceConfig {
    let methods = counts.iter().enumerate().map(|(i, &count)| {
        let behaviours: Vec<String> = (0..count).map(|b| format!("b{b}")).collect();
        (
            MethodName::new(format!("op{i}")).unwrap(),
            MethodConfig::parse("b0", "b0", &behaviours).unwrap(),
        )
    });
    ServiceConfig::new(
        ServiceName::new(name).unwrap(),
        [ClassConfig::new(ClassName::new("Component").unwrap(), methods).unwrap()],
    )
    .unwrap()
}

#[test]
fn two_binary_points_give_four_configurations() {
    let services = runtime([
        service_config("svc-a", &[("Cache", "get", &["fifo", "lru"])]),
        service_config("svc-b", &[("Store", "write", &["async", "sync"])]),
    ]);
    let points = VariationPointsExtractor::extract(&services);
    assert_eq!(points.len(), 2);

    let configurations = SystemConfigurationsGenerator::new().generate(&points).unwrap();
    let ids: Vec<String> = configurations.iter().map(|c| c.id().to_string()).collect();
    assert_eq!(ids, ["conf-0", "conf-1", "conf-2", "conf-3"]);

    let assignments: Vec<(String, String)> = configurations
        .iter()
        .map(|c| {
            (
                c.selections()[0].behaviour().to_string(),
                c.selections()[1].behaviour().to_string(),
            )
        })
        .collect();
    assert_eq!(
        assignments,
        [
            ("fifo".to_string(), "async".to_string()),
            ("fifo".to_string(), "sync".to_string()),
            ("lru".to_string(), "async".to_string()),
            ("lru".to_string(), "sync".to_string()),
        ]
    );
}

#[test]
fn single_behaviour_methods_are_not_variation_points() {
    let services = runtime([service_config(
        "svc",
        &[("Handler", "a", &["v1", "v2"]), ("Handler", "b", &["v1"])],
    )]);
    let points = VariationPointsExtractor::extract(&services);

    assert_eq!(points.len(), 1);
    assert_eq!(points[0].service(), &service_name("svc"));
    assert_eq!(points[0].class(), &class_name("Handler"));
    assert_eq!(points[0].method(), &method_name("a"));
    assert_eq!(points[0].available_behaviours(), [behaviour("v1"), behaviour("v2")]);
}

#[test]
fn fleet_without_choices_has_empty_space() {
    let services = runtime([service_config("svc", &[("Handler", "only", &["v1"])])]);
    let points = VariationPointsExtractor::extract(&services);
    assert!(points.is_empty());
    assert_eq!(SystemConfigurationsGenerator::count(&points), Some(0));
    assert_eq!(SystemConfigurationsGenerator::new().generate(&points).unwrap().len(), 0);
}

#[test]
fn selected_behaviour_resolves_by_point() {
    let services = runtime([service_config("svc", &[("Cache", "get", &["fifo", "lru"])])]);
    let points = VariationPointsExtractor::extract(&services);
    let last = SystemConfigurationsGenerator::new()
        .generate(&points)
        .unwrap()
        .pop()
        .unwrap();

    assert_eq!(last.id(), ConfigurationId::from_index(1));
    assert_eq!(
        last.selected_behaviour(&service_name("svc"), &class_name("Cache"), &method_name("get")),
        Some(&behaviour("lru"))
    );
}

proptest! {
    #[test]
    fn space_size_is_product_of_choices(
        fleet in prop::collection::vec(prop::collection::vec(1_usize..4, 0..4), 1..4)
    ) {
        let services = runtime(
            fleet
                .iter()
                .enumerate()
                .map(|(i, counts)| service_with_counts(&format!("svc-{i}"), counts)),
        );
        let expected_points = fleet.iter().flatten().filter(|&&c| c > 1).count();
        let expected_size = if expected_points == 0 {
            0
        } else {
            fleet.iter().flatten().filter(|&&c| c > 1).product::<usize>()
        };

        let points = VariationPointsExtractor::extract(&services);
        prop_assert_eq!(points.len(), expected_points);

        let configurations = SystemConfigurationsGenerator::new().generate(&points).unwrap();
        prop_assert_eq!(configurations.len(), expected_size);

        let distinct: BTreeSet<Vec<String>> = configurations
            .iter()
            .map(|c| c.selections().iter().map(|s| s.behaviour().to_string()).collect())
            .collect();
        prop_assert_eq!(distinct.len(), expected_size);

        for (i, configuration) in configurations.iter().enumerate() {
            prop_assert_eq!(configuration.id().index(), i);
            prop_assert_eq!(configuration.selections().len(), expected_points);
        }
    }
}
