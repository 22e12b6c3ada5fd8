//! Unit tests for requirement editing

use super::*;
use modgraph_registry::MemoryRegistry;

fn mv(s: &str) -> ModuleVersion {
    s.parse().unwrap()
}

fn lazy(roots: &[&str]) -> Requirements {
    Requirements::new(Depth::Lazy, roots.iter().map(|s| mv(s)).collect(), BTreeSet::new())
}

fn edit(
    registry: &MemoryRegistry,
    rs: &Requirements,
    try_upgrade: &[&str],
    must_select: &[&str],
) -> ModResult<EditOutcome> {
    let target = ModuleVersion::target("example.com/app");
    let ctx = EditContext::new(&target, registry, registry);
    let try_upgrade: Vec<ModuleVersion> = try_upgrade.iter().map(|s| mv(s)).collect();
    let must_select: Vec<ModuleVersion> = must_select.iter().map(|s| mv(s)).collect();
    edit_requirements(&ctx, rs, &try_upgrade, &must_select)
}

#[test]
fn test_upgrade_conflicting_with_pin_is_rejected() {
    let registry = MemoryRegistry::new();
    registry.add("a@v1.0.0", &[], Depth::Lazy).unwrap();
    registry.add("a@v2.0.0", &["b@v3.0.0"], Depth::Lazy).unwrap();
    registry.add("b@v2.0.0", &[], Depth::Lazy).unwrap();
    registry.add("b@v3.0.0", &[], Depth::Lazy).unwrap();

    let rs = lazy(&["a@v1.0.0"]);
    let err = edit(&registry, &rs, &["a@v2.0.0"], &["b@v2.0.0"]).unwrap_err();

    match &err {
        ModError::Conflict { conflicts } => {
            assert_eq!(
                conflicts,
                &vec![Conflict {
                    source: mv("a@v2.0.0"),
                    dep: mv("b@v3.0.0"),
                    constraint: mv("b@v2.0.0"),
                }]
            );
        },
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(
        err.to_string(),
        "version constraints conflict:\n\ta@v2.0.0 requires b@v3.0.0, but b@v2.0.0 is requested"
    );
    assert_eq!(rs.root_modules(), &[mv("a@v1.0.0")]);
}

#[test]
fn test_lazy_upgrade_changes_roots() {
    let registry = MemoryRegistry::new();
    registry.add("a@v1.0.0", &[], Depth::Lazy).unwrap();
    registry.add("a@v2.0.0", &["b@v1.0.0"], Depth::Lazy).unwrap();
    registry.add("b@v1.0.0", &[], Depth::Lazy).unwrap();

    let rs = Requirements::new(Depth::Lazy, vec![mv("a@v1.0.0")], BTreeSet::from(["a".to_string()]));
    let outcome = edit(&registry, &rs, &["a@v2.0.0"], &[]).unwrap();

    assert!(outcome.changed);
    assert_eq!(outcome.requirements.root_modules(), &[mv("a@v2.0.0")]);
    assert!(outcome.requirements.is_direct("a"));
    assert_eq!(outcome.requirements.depth(), Depth::Lazy);
}

#[test]
fn test_lazy_edit_without_requests_is_unchanged() {
    let registry = MemoryRegistry::new();
    registry.add("a@v1.0.0", &["b@v1.0.0"], Depth::Lazy).unwrap();
    registry.add("b@v1.0.0", &[], Depth::Lazy).unwrap();

    let rs = lazy(&["a@v1.0.0", "b@v1.0.0"]);
    let outcome = edit(&registry, &rs, &[], &[]).unwrap();

    assert!(!outcome.changed);
    assert_eq!(outcome.requirements, rs);
}

#[test]
fn test_upgrade_of_target_is_ignored() {
    let registry = MemoryRegistry::new();
    registry.add("a@v1.0.0", &[], Depth::Lazy).unwrap();

    let rs = lazy(&["a@v1.0.0"]);
    let outcome = edit(&registry, &rs, &["example.com/app@v9.0.0"], &[]).unwrap();

    assert!(!outcome.changed);
}

#[test]
fn test_must_select_pins_version() {
    let registry = MemoryRegistry::new();
    registry.add("a@v1.0.0", &["b@v1.0.0"], Depth::Lazy).unwrap();
    registry.add("b@v1.0.0", &[], Depth::Lazy).unwrap();
    registry.add("b@v2.0.0", &[], Depth::Lazy).unwrap();

    let rs = lazy(&["a@v1.0.0", "b@v1.0.0"]);
    let outcome = edit(&registry, &rs, &[], &["b@v2.0.0"]).unwrap();

    assert!(outcome.changed);
    assert_eq!(outcome.requirements.root_modules(), &[mv("a@v1.0.0"), mv("b@v2.0.0")]);
}

#[test]
fn test_must_select_none_drops_root() {
    let registry = MemoryRegistry::new();
    registry.add("a@v1.0.0", &[], Depth::Lazy).unwrap();
    registry.add("b@v1.0.0", &[], Depth::Lazy).unwrap();

    let rs = Requirements::new(
        Depth::Lazy,
        vec![mv("a@v1.0.0"), mv("b@v1.0.0")],
        BTreeSet::from(["a".to_string(), "b".to_string()]),
    );
    let outcome = edit(&registry, &rs, &[], &["b@none"]).unwrap();

    assert!(outcome.changed);
    assert_eq!(outcome.requirements.root_modules(), &[mv("a@v1.0.0")]);
    assert!(!outcome.requirements.is_direct("b"));
}

#[test]
fn test_upgrade_settles_below_conflicting_version() {
    // a@v2.0.0 needs c@v2.0.0, which needs more of b than the root allows
    let registry = MemoryRegistry::new();
    registry.add("a@v1.0.0", &["c@v1.0.0"], Depth::Lazy).unwrap();
    registry.add("a@v1.5.0", &["c@v1.0.0"], Depth::Lazy).unwrap();
    registry.add("a@v2.0.0", &["c@v2.0.0"], Depth::Lazy).unwrap();
    registry.add("b@v2.0.0", &[], Depth::Lazy).unwrap();
    registry.add("c@v1.0.0", &[], Depth::Lazy).unwrap();
    registry.add("c@v2.0.0", &["b@v3.0.0"], Depth::Lazy).unwrap();

    let rs = lazy(&["a@v1.0.0", "b@v2.0.0", "c@v1.0.0"]);
    let outcome = edit(&registry, &rs, &["a@v2.0.0"], &[]).unwrap();

    assert!(outcome.changed);
    assert_eq!(
        outcome.requirements.root_modules(),
        &[mv("a@v1.5.0"), mv("b@v2.0.0"), mv("c@v1.0.0")]
    );
}

#[test]
fn test_unreadable_must_select_fails() {
    let registry = MemoryRegistry::new();
    registry.add("a@v1.0.0", &[], Depth::Lazy).unwrap();
    registry.break_module(&mv("b@v2.0.0"), "corrupt summary");

    let rs = lazy(&["a@v1.0.0"]);
    let err = edit(&registry, &rs, &[], &["b@v2.0.0"]).unwrap_err();

    assert!(matches!(err, ModError::BuildList { .. }));
}

#[test]
fn test_eager_upgrade_minimizes_roots() {
    let registry = MemoryRegistry::new();
    registry.add("a@v1.0.0", &["b@v1.0.0"], Depth::Eager).unwrap();
    registry.add("a@v2.0.0", &["b@v2.0.0"], Depth::Eager).unwrap();
    registry.add("b@v1.0.0", &[], Depth::Eager).unwrap();
    registry.add("b@v2.0.0", &[], Depth::Eager).unwrap();

    let rs = Requirements::new(Depth::Eager, vec![mv("a@v1.0.0")], BTreeSet::new());
    let outcome = edit(&registry, &rs, &["a@v2.0.0"], &[]).unwrap();

    assert!(outcome.changed);
    assert_eq!(outcome.requirements.root_modules(), &[mv("a@v2.0.0")]);
    assert_eq!(outcome.requirements.depth(), Depth::Eager);
}

#[test]
fn test_eager_edit_without_requests_is_unchanged() {
    let registry = MemoryRegistry::new();
    registry.add("a@v1.0.0", &["b@v1.0.0"], Depth::Eager).unwrap();
    registry.add("b@v1.0.0", &[], Depth::Eager).unwrap();

    let rs = Requirements::new(Depth::Eager, vec![mv("a@v1.0.0")], BTreeSet::new());
    let outcome = edit(&registry, &rs, &[], &[]).unwrap();

    assert!(!outcome.changed);
    assert_eq!(outcome.requirements, rs);
}

#[test]
fn test_eager_must_select_keeps_pinned_root() {
    let registry = MemoryRegistry::new();
    registry.add("a@v1.0.0", &["b@v1.0.0"], Depth::Eager).unwrap();
    registry.add("b@v1.0.0", &[], Depth::Eager).unwrap();

    let rs = Requirements::new(Depth::Eager, vec![mv("a@v1.0.0")], BTreeSet::new());
    let outcome = edit(&registry, &rs, &[], &["b@v1.0.0"]).unwrap();

    assert!(!outcome.changed);
    assert_eq!(outcome.requirements.root_modules(), &[mv("a@v1.0.0"), mv("b@v1.0.0")]);
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn version(n: u8) -> String {
        format!("v1.{}.0", n)
    }

    /// a@v1.i requires b@v1.i; b has no requirements
    fn chain_registry() -> MemoryRegistry {
        let registry = MemoryRegistry::new();
        for i in 0..6u8 {
            let b = format!("b@{}", version(i));
            registry.add(&format!("a@{}", version(i)), &[b.as_str()], Depth::Lazy).unwrap();
            registry.add(&b, &[], Depth::Lazy).unwrap();
        }
        registry
    }

    proptest! {
        #[test]
        fn upgrades_never_lower_roots(
            ra in 0u8..6,
            extra in 0u8..6,
            upgrade_a in proptest::option::of(0u8..6),
            upgrade_b in proptest::option::of(0u8..6),
        ) {
            let registry = chain_registry();
            let rb = (ra + extra).min(5);
            let rs = lazy(&[&format!("a@{}", version(ra)), &format!("b@{}", version(rb))]);

            let mut upgrades = Vec::new();
            if let Some(n) = upgrade_a {
                upgrades.push(format!("a@{}", version(n)));
            }
            if let Some(n) = upgrade_b {
                upgrades.push(format!("b@{}", version(n)));
            }
            let upgrades: Vec<&str> = upgrades.iter().map(String::as_str).collect();

            let outcome = edit(&registry, &rs, &upgrades, &[]).unwrap();
            for old in rs.root_modules() {
                let new = outcome.requirements.root_selected(&old.path);
                prop_assert!(new.is_some());
                prop_assert_ne!(
                    modgraph_core::types::compare_versions(new.unwrap(), &old.version),
                    std::cmp::Ordering::Less
                );
            }
        }
    }
}
