//! Particles — a headless fountain simulation on bitecs storage.
//!
//! Spawns particles with position, velocity and lifetime, integrates them for
//! a few hundred ticks, and retires the expired ones. Dead particles are
//! collected during the scan and destroyed afterwards, and new ones recycle
//! their slots.
//!
//! Run with: `RUST_LOG=debug cargo run -p bitecs --example particles`

use bitecs::prelude::*;
use glam::Vec3;

// ── Components ───────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Position(Vec3);

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Velocity(Vec3);

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Lifetime {
    remaining: f32,
}

// ── Markers ──────────────────────────────────────────────────────────────

/// Particles that stopped on the ground.
struct Resting;

const GRAVITY: Vec3 = Vec3::new(0.0, -9.81, 0.0);
const DT: f32 = 1.0 / 60.0;
const TICKS: u32 = 600;
const SPAWN_PER_TICK: usize = 12;

struct Handles {
    pos: Component<Position>,
    vel: Component<Velocity>,
    life: Component<Lifetime>,
    resting: TableId,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = WorldConfig::default()
        .with_max_entities(4_096)
        .with_recycle_policy(RecyclePolicy::Clear);
    let mut world = World::with_config(config)?;
    let handles = Handles {
        pos: world.register::<Position>()?,
        vel: world.register::<Velocity>()?,
        life: world.register::<Lifetime>()?,
        resting: world.register_flag::<Resting>()?,
    };

    let mut seed = 0x9E37_79B9_u32;
    for tick in 0..TICKS {
        spawn(&mut world, &handles, &mut seed)?;
        integrate(&mut world, &handles)?;
        let retired = retire(&mut world, &handles)?;

        if tick % 120 == 0 {
            log::info!(
                "tick {tick}: {} alive, {} resting, {retired} retired",
                world.entity_count(),
                world.count_archetype(&[handles.resting], &[])?
            );
        }
    }

    println!("{}", world.stats().to_json_pretty()?);
    Ok(())
}

fn spawn(world: &mut World, h: &Handles, seed: &mut u32) -> EcsResult<()> {
    for _ in 0..SPAWN_PER_TICK {
        let e = match world.create_entity() {
            Ok(e) => e,
            Err(EcsError::StorageExhausted { .. }) => return Ok(()),
            Err(e) => return Err(e),
        };
        let spread = Vec3::new(jitter(seed), 0.0, jitter(seed)) * 2.0;
        world.add_component(e, h.pos, Position(Vec3::ZERO))?;
        world.add_component(e, h.vel, Velocity(Vec3::new(0.0, 8.0, 0.0) + spread))?;
        world.add_component(e, h.life, Lifetime { remaining: 3.0 + jitter(seed).abs() })?;
    }
    Ok(())
}

fn integrate(world: &mut World, h: &Handles) -> EcsResult<()> {
    let moving = Filter::new().without(h.resting);
    let mut landed = Vec::new();
    world.query((h.pos.write(), h.vel.write()), &moving, |e, (p, v)| {
        v.0 += GRAVITY * DT;
        p.0 += v.0 * DT;
        if p.0.y <= 0.0 && v.0.y < 0.0 {
            p.0.y = 0.0;
            landed.push(e);
        }
    })?;
    for e in landed {
        world.add_flag(e, h.resting)?;
    }

    world.query((h.life.write(),), &Filter::new(), |_, (life,)| {
        life.remaining -= DT;
    })
}

fn retire(world: &mut World, h: &Handles) -> EcsResult<usize> {
    let mut expired = Vec::new();
    world.query((h.life.read(),), &Filter::new(), |e, (life,)| {
        if life.remaining <= 0.0 {
            expired.push(e);
        }
    })?;
    for e in &expired {
        world.destroy_entity(*e)?;
    }
    Ok(expired.len())
}

/// Cheap xorshift in [-1, 1].
fn jitter(state: &mut u32) -> f32 {
    *state ^= *state << 13;
    *state ^= *state >> 17;
    *state ^= *state << 5;
    (*state as f32 / u32::MAX as f32) * 2.0 - 1.0
}
