//! Physics properties of the force kernel, exercised on the CPU backend.
//!
//! The CPU kernel runs the same formulas the generated WGSL does, so these
//! are the behavioral contract for both backends.

use nbpe::prelude::*;

fn gravity_only(mass_constant: f32) -> Physics {
    Physics {
        force_constant: 1.0,
        mass_constant,
        charge_constant: 0.0,
        nuclear_constant: 0.0,
        min_distance: 0.1,
        ..Physics::default()
    }
}

fn sim_with(side: u32, particles: Vec<Particle>, physics: Physics) -> Simulation {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut sim = Simulation::new(side).with_physics(physics.clone());
    sim.setup(particles, physics).unwrap();
    sim.attach_cpu_kernel().unwrap();
    sim
}

#[test]
fn two_bodies_attract_symmetrically() {
    let mut sim = sim_with(
        4,
        vec![
            Particle::new(1.0, 0.0, 0.0, Vec3::ZERO),
            Particle::new(1.0, 0.0, 0.0, Vec3::new(10.0, 0.0, 0.0)),
        ],
        gravity_only(1.0),
    );
    sim.step().unwrap();
    sim.drain().unwrap();

    let p = sim.store().particles();
    // Inverse-square at d=10: each picks up 1*1*1/100 toward the other.
    assert!((p[0].velocity.x - 0.01).abs() < 1e-7);
    assert_eq!(p[0].velocity.x, -p[1].velocity.x);
    assert_eq!(p[0].velocity.y, 0.0);
    assert_eq!(p[1].velocity.y, 0.0);
    assert!(p[0].velocity.x > 0.0);
    assert!(p[1].velocity.x < 0.0);
}

#[test]
fn pair_momentum_is_conserved_without_collisions() {
    let mut sim = sim_with(
        4,
        vec![
            Particle::new(1.0, 0.0, 0.0, Vec3::new(-10.0, 0.0, 0.0)),
            Particle::new(3.0, 0.0, 0.0, Vec3::new(10.0, 0.0, 0.0)),
        ],
        gravity_only(1.0),
    );
    for _ in 0..20 {
        sim.step().unwrap();
    }
    sim.drain().unwrap();

    let p = sim.store().particles();
    let momentum = p[0].velocity * p[0].mass + p[1].velocity * p[1].mass;
    assert!(momentum.length() < 1e-4, "drift: {momentum:?}");
    // And they actually moved toward each other.
    assert!(p[0].position.x > -10.0);
    assert!(p[1].position.x < 10.0);
}

#[test]
fn collision_applies_the_reduced_mass_exchange() {
    let physics = Physics {
        force_constant: 1.0,
        min_distance: 0.5,
        ..gravity_only(1.0)
    };
    let mut a = Particle::new(1.0, 0.0, 0.0, Vec3::ZERO);
    a.velocity = Vec3::new(1.0, 0.0, 0.0);
    let mut b = Particle::new(3.0, 0.0, 0.0, Vec3::new(0.3, 0.0, 0.0));
    b.velocity = Vec3::new(-2.0, 0.0, 0.0);
    let mut sim = sim_with(4, vec![a, b], physics);

    sim.step().unwrap();
    sim.drain().unwrap();
    let p = sim.store().particles();

    // s = 2*m1*m2/(m1+m2) = 1.5; dv projected on the 0.3-long separation.
    let d = 0.3f32;
    let d2 = d * d;
    let expected_a = 1.0 + (1.5 * (-3.0 * d) / d2) * d / 1.0;
    let expected_b = -2.0 + (1.5 * (3.0 * -d) / d2) * -d / 3.0;
    assert!((p[0].velocity.x - expected_a).abs() < 1e-5);
    assert!((p[1].velocity.x - expected_b).abs() < 1e-5);

    // Momentum is exchanged, not created.
    let before = 1.0 * 1.0 + 3.0 * -2.0;
    let after = 1.0 * p[0].velocity.x + 3.0 * p[1].velocity.x;
    assert!((before - after).abs() < 1e-5);

    // Each side detected exactly one collision event.
    assert_eq!(p[0].collisions, 1.0);
    assert_eq!(p[1].collisions, 1.0);
}

#[test]
fn zero_combined_mass_pairs_never_collide() {
    let physics = Physics {
        min_distance: 1.0,
        ..gravity_only(0.0)
    };
    let a = Particle::new(2.0, 0.0, 0.0, Vec3::ZERO);
    let b = Particle::new(-2.0, 0.0, 0.0, Vec3::new(0.5, 0.0, 0.0));
    let mut sim = sim_with(4, vec![a, b], physics);
    sim.step().unwrap();
    sim.drain().unwrap();
    let p = sim.store().particles();
    assert_eq!(p[0].collisions, 0.0);
    assert_eq!(p[1].collisions, 0.0);
    assert_eq!(p[0].velocity, Vec3::ZERO);
}

#[test]
fn sphere_boundary_reflects_and_damps() {
    let physics = Physics {
        boundary_distance: 10.0,
        boundary_damping: 0.5,
        ..gravity_only(0.0)
    };
    let mut p = Particle::new(1.0, 0.0, 0.0, Vec3::new(9.5, 0.0, 0.0));
    p.velocity = Vec3::new(0.55, 0.0, 0.0);
    let mut sim = Simulation::new(4)
        .with_physics(physics.clone())
        .with_options(KernelOptions {
            boundary_enabled: true,
            ..KernelOptions::default()
        });
    sim.setup(vec![p], physics).unwrap();
    sim.attach_cpu_kernel().unwrap();

    sim.step().unwrap();
    sim.drain().unwrap();
    let p = &sim.store().particles()[0];
    // Predicted crossing lands inside the tolerance band: reflected about
    // +x and halved.
    assert!((p.velocity.x + 0.275).abs() < 1e-6);
    assert!(p.position.x < 9.5);
}

#[test]
fn runaway_particles_are_captured_onto_the_boundary() {
    let physics = Physics {
        boundary_distance: 10.0,
        boundary_damping: 0.5,
        ..gravity_only(0.0)
    };
    let mut p = Particle::new(1.0, 0.0, 0.0, Vec3::new(20.0, 0.0, 0.0));
    p.velocity = Vec3::new(0.1, 0.0, 0.0);
    let mut sim = Simulation::new(4)
        .with_physics(physics.clone())
        .with_options(KernelOptions {
            boundary_enabled: true,
            ..KernelOptions::default()
        });
    sim.setup(vec![p], physics).unwrap();
    sim.attach_cpu_kernel().unwrap();

    sim.step().unwrap();
    sim.drain().unwrap();
    let p = &sim.store().particles()[0];
    // Velocity zeroed outright, position renormalized onto the sphere.
    assert_eq!(p.velocity, Vec3::ZERO);
    assert!((p.position.length() - 10.0).abs() < 1e-5);
}

#[test]
fn probes_do_not_perturb_the_scene() {
    let seed = vec![
        Particle::new(1.0, 1.0, 1.0, Vec3::new(-3.0, 1.0, 0.0)),
        Particle::new(2.0, -1.0, 2.0, Vec3::new(3.0, -1.0, 0.0)),
    ];
    let physics = Physics {
        mass_constant: 1.0,
        charge_constant: 0.5,
        ..Physics::default()
    };

    let mut bare = sim_with(4, seed.clone(), physics.clone());
    let mut probed = sim_with(4, seed, physics);
    probed
        .setup_probes(
            ProbeGrid {
                layout: ProbeLayout::Cube,
                dims: [2, 2, 2],
                extent: 20.0,
                mass: 5.0,
                charge: 5.0,
                nuclear_charge: 1.0,
            },
            Vec3::ZERO,
        )
        .unwrap();

    for _ in 0..15 {
        bare.step().unwrap();
        probed.step().unwrap();
    }
    bare.drain().unwrap();
    probed.drain().unwrap();

    for (a, b) in bare
        .store()
        .particles()
        .iter()
        .zip(probed.store().particles())
    {
        assert_eq!(a.position, b.position);
        assert_eq!(a.velocity, b.velocity);
    }
}

#[test]
fn probe_velocity_reports_the_field_force() {
    let attractor = Particle::new_fixed(50.0, 0.0, 0.0, Vec3::ZERO);
    let probe = Particle::new_probe(1.0, 0.0, 0.0, Vec3::new(5.0, 0.0, 0.0));
    let mut sim = sim_with(4, vec![attractor, probe], gravity_only(1.0));

    sim.step().unwrap();
    sim.drain().unwrap();
    let p = &sim.store().particles()[1];
    // 1*50/25 toward the origin, reported directly, not integrated.
    assert!((p.velocity.x + 2.0).abs() < 1e-5);
    assert_eq!(p.position, Vec3::new(5.0, 0.0, 0.0));

    // A second step reports the same field, it does not accumulate.
    sim.step().unwrap();
    sim.drain().unwrap();
    let p = &sim.store().particles()[1];
    assert!((p.velocity.x + 2.0).abs() < 1e-5);
}

#[test]
fn color_mixing_inverts_opposed_nuclear_pairs() {
    let physics = Physics {
        force_constant: 1.0,
        mass_constant: 0.0,
        charge_constant: 0.0,
        nuclear_constant: 1.0,
        nuclear_range: 4.0,
        min_distance: 0.5,
        color_mixing: true,
        ..Physics::default()
    };
    let run = |nc2: f32| {
        let mut sim = sim_with(
            4,
            vec![
                Particle::new(1.0, 0.0, 1.0, Vec3::ZERO),
                Particle::new(1.0, 0.0, nc2, Vec3::new(1.0, 0.0, 0.0)),
            ],
            physics.clone(),
        );
        sim.step().unwrap();
        sim.drain().unwrap();
        sim.store().particles()[0].velocity
    };

    // Same color: affinity +1 on a product of 1. Opposed color: the doubled
    // charge product times the -0.5 affinity lands on the exact negation.
    let same = run(1.0);
    let opposed = run(2.0);
    assert!(same.x != 0.0);
    assert!((same.x + opposed.x).abs() < 1e-6);
}

#[test]
fn upload_readback_round_trip_is_exact() {
    for count in [0usize, 1, 7, 16] {
        let mut spawner = Spawner::new(99);
        let mut particles = spawner.plasma_ball(count, 30.0);
        for (i, p) in particles.iter_mut().enumerate() {
            p.velocity = Vec3::new(i as f32 * 0.1, -0.5, 2.0);
            p.nuclear_charge = (i % 4) as f32;
        }
        let mut sim = Simulation::new(4);
        sim.setup(particles, Physics::default()).unwrap();
        let before = sim.store().particles().to_vec();

        sim.attach_cpu_kernel().unwrap();
        sim.drain().unwrap();

        let after = sim.store().particles();
        assert_eq!(after.len(), count);
        for (a, b) in before.iter().zip(after) {
            assert_eq!(a.mass, b.mass);
            assert_eq!(a.charge, b.charge);
            assert_eq!(a.nuclear_charge, b.nuclear_charge);
            assert_eq!(a.position, b.position);
            assert_eq!(a.velocity, b.velocity);
            assert_eq!(a.kind, b.kind);
        }
    }
}

#[test]
fn overfilling_leaves_kernel_state_intact() {
    let mut sim = Simulation::new(2);
    sim.setup(
        Spawner::new(5).dust_cloud(4, 10.0),
        gravity_only(1.0),
    )
    .unwrap();
    sim.attach_cpu_kernel().unwrap();

    // A fifth particle does not fit in the 2x2 grid.
    let result = sim.edit(|store| store.add(Particle::new(1.0, 0.0, 0.0, Vec3::ZERO)));
    assert!(matches!(
        result,
        Ok(Err(CoreError::CapacityExceeded { .. }))
    ));
    assert_eq!(sim.store().len(), 4);

    // The kernel still steps and reads back the original four.
    sim.step().unwrap();
    sim.drain().unwrap();
    assert_eq!(sim.store().len(), 4);
}

#[test]
fn two_d_mode_pins_the_z_axis() {
    let physics = gravity_only(1.0);
    let mut a = Particle::new(1.0, 0.0, 0.0, Vec3::new(-2.0, 0.0, 3.0));
    a.velocity = Vec3::new(0.0, 0.0, 1.0);
    let b = Particle::new(1.0, 0.0, 0.0, Vec3::new(2.0, 0.0, -3.0));
    let mut sim = Simulation::new(4)
        .with_physics(physics.clone())
        .with_options(KernelOptions {
            space: SimSpace::Two,
            ..KernelOptions::default()
        });
    sim.setup(vec![a, b], physics).unwrap();
    sim.attach_cpu_kernel().unwrap();

    for _ in 0..5 {
        sim.step().unwrap();
    }
    sim.drain().unwrap();
    for p in sim.store().particles() {
        assert_eq!(p.velocity.z, 0.0);
        assert_eq!(p.position.z, 0.0);
    }
}

#[test]
fn inverse_linear_falloff_strengthens_distant_pairs() {
    let seed = vec![
        Particle::new(1.0, 0.0, 0.0, Vec3::ZERO),
        Particle::new(1.0, 0.0, 0.0, Vec3::new(10.0, 0.0, 0.0)),
    ];
    let mut square = sim_with(4, seed.clone(), gravity_only(1.0));
    let mut linear = Simulation::new(4).with_physics(gravity_only(1.0)).with_options(
        KernelOptions {
            falloff: DistanceFalloff::InverseLinear,
            ..KernelOptions::default()
        },
    );
    linear.setup(seed, gravity_only(1.0)).unwrap();
    linear.attach_cpu_kernel().unwrap();

    square.step().unwrap();
    linear.step().unwrap();
    square.drain().unwrap();
    linear.drain().unwrap();

    let vs = square.store().particles()[0].velocity.x;
    let vl = linear.store().particles()[0].velocity.x;
    // 1/d beats 1/d^2 at d=10.
    assert!((vs - 0.01).abs() < 1e-7);
    assert!((vl - 0.1).abs() < 1e-6);
}
