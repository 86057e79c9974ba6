//! # Property-Based Tests
//!
//! Invariants that must hold after any sequence of clicks on a randomly
//! wired control graph.

use proptest::collection::vec;
use proptest::prelude::*;
use trimline_core::{
    ControlId, ControlSpec, Configurator, EngineConfig, GroupMode, Layout, OptionRegistry,
    PageKind, QueryString, Relation, Trigger, UnlockScope,
};

const COLORS_PER_GROUP: usize = 3;
const COLOR_GROUPS: usize = 2;
const OPTIONS: usize = 6;
const CONTROLS: usize = COLORS_PER_GROUP * COLOR_GROUPS + OPTIONS;

fn color_key(i: usize) -> String {
    format!("c{}", i)
}

fn option_key(i: usize) -> String {
    format!("o{}", i)
}

/// A random edge: relation index, source index, target index.
type EdgeSeed = (u8, usize, usize);

/// Build a registry with two color groups and one option group, wired by
/// the given seeds. Seeds may create cycles and self references.
fn build(seeds: &[EdgeSeed]) -> OptionRegistry {
    let mut layout = Layout::new();
    let colors = layout.add_page("Colors", PageKind::Colors);
    let equipment = layout.add_page("Equipment - 1", PageKind::Equipment);

    let mut color_specs: Vec<ControlSpec> = (0..COLORS_PER_GROUP * COLOR_GROUPS)
        .map(|i| {
            let field = format!("tab-1-color-{}", i / COLORS_PER_GROUP + 1);
            ControlSpec::color(color_key(i), &field, format!("Color {}", i))
        })
        .collect();
    let mut option_specs: Vec<ControlSpec> = (0..OPTIONS)
        .map(|i| {
            let spec = ControlSpec::option(
                option_key(i),
                &format!("option-{}", i + 1),
                &format!("Option {}", i),
                &format!("C{}", i),
            );
            if i % 2 == 0 {
                spec.with_second_code(&format!("D{}", i))
            } else {
                spec
            }
        })
        .collect();

    for &(relation, source, target) in seeds {
        let c_src = source % color_specs.len();
        let o_src = source % option_specs.len();
        let c_tgt = color_key(target % color_specs.len());
        let o_tgt = option_key(target % option_specs.len());
        match relation % 7 {
            0 => {
                color_specs[c_src] =
                    color_specs[c_src].clone().with_edge(Relation::Deactivates, [c_tgt]);
            }
            1 => {
                color_specs[c_src] =
                    color_specs[c_src].clone().with_edge(Relation::RelatedOptions, [o_tgt]);
            }
            2 => {
                option_specs[o_src] = option_specs[o_src]
                    .clone()
                    .with_edge(Relation::MutuallyExclusiveWith, [o_tgt]);
            }
            3 => {
                option_specs[o_src] =
                    option_specs[o_src].clone().with_edge(Relation::ActivatedBy, [o_tgt]);
            }
            4 => {
                option_specs[o_src] = option_specs[o_src]
                    .clone()
                    .with_edge(Relation::SecondCodeActivatedBy, [o_tgt]);
            }
            5 => {
                option_specs[o_src] =
                    option_specs[o_src].clone().with_edge(Relation::ColorFilter, [c_tgt]);
            }
            _ => {
                option_specs[o_src] =
                    option_specs[o_src].clone().with_edge(Relation::Requires, [o_tgt]);
            }
        }
    }

    let groups: Vec<_> = (0..COLOR_GROUPS)
        .map(|g| {
            layout
                .add_group(colors, GroupMode::Exclusive, format!("Group {}", g))
                .expect("group")
        })
        .collect();
    for (i, spec) in color_specs.into_iter().enumerate() {
        layout
            .add_control(groups[i / COLORS_PER_GROUP], spec)
            .expect("control");
    }
    let options = layout
        .add_group(equipment, GroupMode::Multiple, "Equipment - 1")
        .expect("group");
    for spec in option_specs {
        layout.add_control(options, spec).expect("control");
    }

    OptionRegistry::build(&layout).expect("build")
}

fn scope_strategy() -> impl Strategy<Value = UnlockScope> {
    prop_oneof![Just(UnlockScope::Scoped), Just(UnlockScope::Global)]
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// At most one member of an exclusive group is active, and the group's
    /// field holds that member's value.
    #[test]
    fn exclusivity_holds(
        seeds in vec((0u8..7, 0usize..CONTROLS, 0usize..CONTROLS), 0..16),
        clicks in vec(0usize..CONTROLS, 1..40),
        scope in scope_strategy(),
    ) {
        let registry = build(&seeds);
        let mut c = Configurator::new(registry, QueryString::new(), EngineConfig { unlock_scope: scope });

        for click in clicks {
            c.click(ControlId(click), Trigger::User).expect("click");

            for group in c.registry().groups().iter().filter(|g| g.is_exclusive()) {
                let active: Vec<ControlId> = group
                    .members
                    .iter()
                    .copied()
                    .filter(|&m| c.state().is_active(m))
                    .collect();
                prop_assert!(active.len() <= 1);

                let field = c.registry().control(group.members[0]).binding.field.clone();
                let expected = active
                    .first()
                    .map(|&m| c.registry().control(m).binding.value.clone())
                    .unwrap_or_default();
                prop_assert_eq!(c.outputs().form_value(field.as_str()), Some(expected.as_str()));
            }
        }
    }

    /// Form and query always equal the fold of the state table.
    #[test]
    fn snapshot_matches_fold(
        seeds in vec((0u8..7, 0usize..CONTROLS, 0usize..CONTROLS), 0..16),
        clicks in vec(0usize..CONTROLS, 1..40),
    ) {
        let registry = build(&seeds);
        let mut c = Configurator::new(registry, QueryString::parse("id=boat"), EngineConfig::default());

        for click in clicks {
            c.click(ControlId(click), Trigger::User).expect("click");
            prop_assert!(c.is_consistent());
            prop_assert_eq!(c.outputs().query().get("id"), Some("boat"));
        }
    }

    /// Cascades terminate: no control is clicked twice, so the effect list
    /// stays bounded by the graph size.
    #[test]
    fn cascades_terminate(
        seeds in vec((0u8..7, 0usize..CONTROLS, 0usize..CONTROLS), 0..48),
        clicks in vec(0usize..CONTROLS, 1..20),
    ) {
        let registry = build(&seeds);
        let bound = 4 * CONTROLS * CONTROLS;
        let mut c = Configurator::new(registry, QueryString::new(), EngineConfig::default());

        for click in clicks {
            let report = c.click(ControlId(click), Trigger::User).expect("click");
            prop_assert!(report.effects.len() <= bound);
            let activations = report.activated();
            let mut unique = activations.clone();
            unique.sort();
            unique.dedup();
            prop_assert_eq!(unique.len(), activations.len());
        }
    }

    /// User clicks never activate a locked control directly.
    #[test]
    fn locked_controls_refuse_user_clicks(
        seeds in vec((0u8..7, 0usize..CONTROLS, 0usize..CONTROLS), 0..16),
        clicks in vec(0usize..CONTROLS, 1..30),
    ) {
        let registry = build(&seeds);
        let mut c = Configurator::new(registry, QueryString::new(), EngineConfig::default());

        for click in clicks {
            let id = ControlId(click);
            let was_locked = c.state().is_locked(id);
            let before = c.state().clone();
            let report = c.click(id, Trigger::User).expect("click");
            if was_locked {
                prop_assert!(report.refused());
                prop_assert_eq!(c.state(), &before);
            }
        }
    }
}
