//! Property tests for method behaviour invariants.

use marionette_domain::{
    BehaviourId, ClassConfig, ClassName, ConfigError, MethodConfig, MethodName, ServiceConfig,
    ServiceName,
};
use proptest::prelude::*;

fn behaviour_set() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[a-z]{1,6}", 1..6).prop_map(|s| s.into_iter().collect())
}

proptest! {
    #[test]
    fn prop_construction_requires_membership(
        available in behaviour_set(),
        default in "[a-z]{1,6}",
        current in "[a-z]{1,6}",
    ) {
        let result = MethodConfig::parse(&default, &current, &available);
        let valid = available.contains(&default) && available.contains(&current);
        prop_assert_eq!(result.is_ok(), valid);
    }

    #[test]
    fn prop_transition_accepts_exactly_available(
        available in behaviour_set(),
        target in "[a-z]{1,6}",
    ) {
        let config = MethodConfig::parse(&available[0], &available[0], &available).unwrap();
        let target_id = BehaviourId::new(&target).unwrap();

        match config.with_current_behaviour(target_id.clone()) {
            Ok(changed) => {
                prop_assert!(available.contains(&target));
                prop_assert_eq!(changed.current_behaviour(), &target_id);
            }
            Err(ConfigError::InvalidBehaviour { behaviour, .. }) => {
                prop_assert!(!available.contains(&target));
                prop_assert_eq!(behaviour, target_id);
                prop_assert_eq!(config.current_behaviour().as_str(), available[0].as_str());
            }
            Err(other) => prop_assert!(false, "unexpected error {other}"),
        }
    }

    #[test]
    fn prop_service_mutation_reflected_on_next_read(
        available in behaviour_set(),
        pick in any::<prop::sample::Index>(),
    ) {
        let class = ClassName::new("C").unwrap();
        let method = MethodName::new("m").unwrap();
        let config = MethodConfig::parse(&available[0], &available[0], &available).unwrap();
        let service = ServiceConfig::new(
            ServiceName::new("s").unwrap(),
            [ClassConfig::new(class.clone(), [(method.clone(), config)]).unwrap()],
        )
        .unwrap();

        let target = BehaviourId::new(pick.get(&available)).unwrap();
        let changed = service
            .with_current_behaviour(&class, &method, target.clone())
            .unwrap();

        prop_assert_eq!(changed.current_behaviour(&class, &method), Some(&target));
        prop_assert_eq!(changed.reset_to_defaults(), service);
    }
}
