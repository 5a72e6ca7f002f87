//! Registry behaviour under concurrent writers and readers.

use marionette_domain::{
    BehaviourId, ClassConfig, ClassName, MethodConfig, MethodName, ServiceConfig, ServiceName,
};
use marionette_registry::ConfigRegistry;
use proptest::prelude::*;
use std::sync::Arc;

const BEHAVIOURS: [&str; 3] = ["a", "b", "c"];

fn service(name: &str, methods: usize) -> ServiceConfig {
    let methods = (0..methods).map(|i| {
        (
            MethodName::new(format!("m{i}")).unwrap(),
            MethodConfig::parse("a", "a", BEHAVIOURS).unwrap(),
        )
    });
    ServiceConfig::new(
        ServiceName::new(name).unwrap(),
        [ClassConfig::new(ClassName::new("Worker").unwrap(), methods).unwrap()],
    )
    .unwrap()
}

fn seeded(services: &[&str], methods: usize) -> Arc<ConfigRegistry> {
    let registry = Arc::new(ConfigRegistry::new());
    for name in services {
        registry
            .add_discovered_service(ServiceName::new(name).unwrap(), service(name, methods), "local")
            .unwrap();
    }
    registry
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_never_corrupt_entries() {
    let names = ["alpha", "beta", "gamma"];
    let registry = seeded(&names, 4);
    let class = ClassName::new("Worker").unwrap();

    let mut writers = Vec::new();
    for worker in 0..8_usize {
        let registry = Arc::clone(&registry);
        let class = class.clone();
        writers.push(tokio::spawn(async move {
            for step in 0..200_usize {
                let service = ServiceName::new(names[(worker + step) % names.len()]).unwrap();
                let method = MethodName::new(format!("m{}", step % 4)).unwrap();
                let behaviour = BehaviourId::new(BEHAVIOURS[(worker * step) % 3]).unwrap();
                registry
                    .modify_current_behaviour_for_method(&service, &class, &method, behaviour)
                    .unwrap();
                if step % 50 == 0 {
                    registry.add_discovered_service(
                        service.clone(),
                        service_template(&service),
                        "rediscovered",
                    )
                    .unwrap();
                }
                tokio::task::yield_now().await;
            }
        }));
    }

    let reader = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            for _ in 0..500 {
                let snapshot = registry.snapshot();
                assert_eq!(snapshot.len(), 3);
                for config in snapshot.runtime().values() {
                    assert_eq!(config.method_count(), 4);
                    for (_, _, method) in config.methods() {
                        assert!(method.offers(method.current_behaviour()));
                    }
                }
                tokio::task::yield_now().await;
            }
        })
    };

    for writer in writers {
        writer.await.unwrap();
    }
    reader.await.unwrap();

    for name in names {
        let name = ServiceName::new(name).unwrap();
        assert_eq!(registry.template_configuration(&name), Some(service_template(&name)));
    }
}

fn service_template(name: &ServiceName) -> ServiceConfig {
    service(name.as_str(), 4)
}

#[test]
fn snapshot_serializes_as_maps() {
    let registry = seeded(&["alpha"], 1);
    let json = serde_json::to_value(registry.snapshot()).unwrap();

    assert!(json["runtime"]["alpha"].is_object());
    assert_eq!(json["metadata"]["alpha"]["status"], "DISCOVERED");
    assert!(json["taken_at"].is_string());
}

proptest! {
    #[test]
    fn prop_reset_clears_modified_flag(edits in prop::collection::vec((0..3_usize, 0..3_usize), 0..12)) {
        let registry = seeded(&["alpha"], 3);
        let alpha = ServiceName::new("alpha").unwrap();
        let class = ClassName::new("Worker").unwrap();

        for (method, behaviour) in edits {
            registry
                .modify_current_behaviour_for_method(
                    &alpha,
                    &class,
                    &MethodName::new(format!("m{method}")).unwrap(),
                    BehaviourId::new(BEHAVIOURS[behaviour]).unwrap(),
                )
                .unwrap();
        }

        prop_assert!(registry.reset_to_template(&alpha).is_some());
        prop_assert!(!registry.is_service_modified(&alpha));
    }
}
