//! Storage-level properties checked through the public API only.

use std::collections::HashSet;

use bitecs::prelude::*;

/// xorshift64*, enough to shuffle component assignments reproducibly.
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn chance(&mut self, one_in: u64) -> bool {
        self.next_u64() % one_in == 0
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct Score(u64);

struct A;
struct B;
struct C;

fn world_with(capacity: usize) -> World {
    World::with_config(WorldConfig::default().with_max_entities(capacity)).unwrap()
}

/// Everything observable about a slot range, for before/after comparisons.
fn snapshot(world: &World, score: Component<Score>, tables: &[TableId]) -> Vec<(u32, Vec<bool>, u64)> {
    (0..world.capacity() as u32)
        .map(|index| {
            let generation = world.generation(index).unwrap();
            let id = EntityId::from_raw_parts(index, generation);
            if !world.is_valid(id) {
                return (generation, Vec::new(), 0);
            }
            let bits = tables
                .iter()
                .map(|t| world.has_component(id, *t).unwrap())
                .collect();
            (generation, bits, world.get_component(id, score).unwrap().0)
        })
        .collect()
}

#[test]
fn indices_unique_without_destroy() {
    let mut world = world_with(1_000);
    let mut seen = HashSet::new();
    for _ in 0..1_000 {
        let e = world.create_entity().unwrap();
        assert!(seen.insert(e.index()));
        assert_eq!(e.generation(), 0);
    }
}

#[test]
fn generations_only_grow() {
    let mut world = world_with(4);
    let mut last = None;
    for _ in 0..50 {
        let e = world.create_entity().unwrap();
        assert_eq!(e.index(), 0);
        if let Some(prev) = last {
            assert!(e.generation() > prev);
        }
        last = Some(e.generation());
        world.destroy_entity(e).unwrap();
        assert!(!world.is_valid(e));
    }
}

#[test]
fn random_archetypes_match_brute_force() {
    for seed in [1, 7, 0xDEAD_BEEF] {
        let mut rng = Rng::new(seed);
        let mut world = world_with(500);
        let a = world.register_flag::<A>().unwrap();
        let b = world.register_flag::<B>().unwrap();
        let c = world.register_flag::<C>().unwrap();

        let mut expected = Vec::new();
        let mut alive = Vec::new();
        for _ in 0..400 {
            let e = world.create_entity().unwrap();
            let (has_a, has_b, has_c) = (rng.chance(2), rng.chance(2), rng.chance(3));
            if has_a {
                world.add_flag(e, a).unwrap();
            }
            if has_b {
                world.add_flag(e, b).unwrap();
            }
            if has_c {
                world.add_flag(e, c).unwrap();
            }
            alive.push(e);
        }
        // Punch holes so the scan crosses free slots and recycled generations.
        for e in alive.iter_mut().filter(|_| rng.chance(5)) {
            world.destroy_entity(*e).unwrap();
            *e = world.create_entity().unwrap();
            world.add_flag(*e, a).unwrap();
            world.add_flag(*e, b).unwrap();
        }
        for e in &alive {
            let matches = world.has_component(*e, a).unwrap()
                && world.has_component(*e, b).unwrap()
                && !world.has_component(*e, c).unwrap();
            if matches {
                expected.push(*e);
            }
        }
        expected.sort();

        let mut visited = Vec::new();
        world
            .for_archetype(&[a, b], &[c], |e| visited.push(e))
            .unwrap();
        let unique: HashSet<_> = visited.iter().copied().collect();
        assert_eq!(unique.len(), visited.len(), "seed {seed}: visited twice");
        assert_eq!(visited, expected, "seed {seed}");
        assert_eq!(world.count_archetype(&[a, b], &[c]).unwrap(), expected.len());
    }
}

#[test]
fn rejected_calls_leave_storage_untouched() {
    let mut world = world_with(64);
    let score = world.register::<Score>().unwrap();
    let a = world.register_flag::<A>().unwrap();
    let tables = [TableId::ACTIVE, score.id(), a];

    let ids: Vec<_> = (0..10).map(|_| world.create_entity().unwrap()).collect();
    for (i, e) in ids.iter().enumerate() {
        world.add_component(*e, score, Score(i as u64 * 11)).unwrap();
    }
    world.add_flag(ids[3], a).unwrap();
    let stale = ids[5];
    world.destroy_entity(stale).unwrap();

    let before = snapshot(&world, score, &tables);
    let count_before = world.entity_count();

    assert!(world.add_component(stale, score, Score(999)).is_err());
    assert!(world.add_flag(stale, a).is_err());
    assert!(world.remove_flag(stale, a).is_err());
    assert!(world.remove_component(stale, score.id()).is_err());
    assert!(world.set_active(stale, false).is_err());
    assert!(world.destroy_entity(stale).is_err());
    assert!(world.add_component_bytes(ids[0], score.id(), &[1, 2]).is_err());
    assert!(world.add_flag(ids[0], TableId::from_raw(50)).is_err());
    assert!(
        world
            .query((score.write(), score.read()), &Filter::new(), |_, _| {})
            .is_err()
    );

    assert_eq!(snapshot(&world, score, &tables), before);
    assert_eq!(world.entity_count(), count_before);
}

#[test]
fn exhaustion_boundary() {
    for capacity in [1, 31, 32, 33, 100] {
        let mut world = world_with(capacity);
        let ids: Vec<_> = (0..capacity).map(|_| world.create_entity().unwrap()).collect();
        assert_eq!(
            world.create_entity(),
            Err(EcsError::StorageExhausted { capacity })
        );
        assert_eq!(world.entity_count(), capacity);

        let victim = ids[capacity / 2];
        world.destroy_entity(victim).unwrap();
        let again = world.create_entity().unwrap();
        assert_eq!(again.index(), victim.index());
        assert_eq!(again.generation(), victim.generation() + 1);
        assert!(world.create_entity().is_err());
    }
}

#[test]
fn query_sees_what_for_archetype_sees() {
    let mut rng = Rng::new(42);
    let mut world = world_with(300);
    let score = world.register::<Score>().unwrap();
    let c = world.register_flag::<C>().unwrap();

    for i in 0..300 {
        let e = world.create_entity_with(!rng.chance(4)).unwrap();
        if rng.chance(2) {
            world.add_component(e, score, Score(i)).unwrap();
        }
        if rng.chance(3) {
            world.add_flag(e, c).unwrap();
        }
    }

    let expected = world.collect_archetype(&[score.id()], &[c]).unwrap();
    let mut seen = Vec::new();
    world
        .query((score.write(),), &Filter::new().without(c), |e, (s,)| {
            assert_eq!(s.0, e.index() as u64);
            s.0 += 1_000;
            seen.push(e);
        })
        .unwrap();
    assert_eq!(seen, expected);
    for e in &expected {
        assert_eq!(world.get_component(*e, score).unwrap().0, e.index() as u64 + 1_000);
    }
}

#[test]
fn config_from_json_builds_world() {
    let config = WorldConfig::from_json_str(
        r#"{ "max_entities": 48, "max_component_types": 8, "recycle_policy": "clear" }"#,
    )
    .unwrap();
    let mut world = World::with_config(config).unwrap();
    assert_eq!(world.capacity(), 48);

    let score = world.register::<Score>().unwrap();
    let e = world.create_entity().unwrap();
    world.add_component(e, score, Score(5)).unwrap();
    world.destroy_entity(e).unwrap();
    let recycled = world.create_entity().unwrap();
    assert!(!world.has_component(recycled, score.id()).unwrap());
}

#[test]
fn repeated_churn_keeps_recycling() {
    let mut world = world_with(300);
    let mut ids: Vec<_> = (0..300).map(|_| world.create_entity().unwrap()).collect();

    for round in 1..=3u32 {
        for e in ids.iter_mut().step_by(3) {
            world.destroy_entity(*e).unwrap();
            let recycled = world.create_entity().unwrap();
            assert_eq!(recycled.index(), e.index());
            assert_eq!(recycled.generation(), round);
            *e = recycled;
        }
        assert_eq!(world.entity_count(), 300);
        assert!(ids.iter().all(|e| world.is_valid(*e)));
    }

    // Handles kept from before the churn are all stale.
    let first = EntityId::from_raw_parts(0, 0);
    assert_eq!(
        world.destroy_entity(first),
        Err(EcsError::StaleHandle { entity: first })
    );
}
