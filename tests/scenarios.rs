//! End-to-end physics and state machine scenarios.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spoutfill::integrator::{integrate, StepParams};
use spoutfill::spatial::{GridDims, SpatialHash};
use spoutfill::{ColorSource, Motion, Phase, Rgb, Scheduler, SceneConfig, SpoutConfig, SpoutLayout, Vec2};
use std::f64::consts::PI;
use std::time::{Duration, Instant};

/// Color is a function of the pixel position.
struct Gradient;

impl ColorSource for Gradient {
    fn dimensions(&self) -> (u32, u32) {
        (400, 100)
    }

    fn sample(&self, x: u32, y: u32) -> Rgb {
        [(x % 256) as u8, y as u8, 7]
    }
}

#[test]
fn ten_particles_settle_on_the_floor_and_are_captured() {
    const WIDTH: u32 = 400;
    const HEIGHT: u32 = 100;
    const RADIUS: f32 = 5.0;
    let floor = HEIGHT as f32 - RADIUS;

    // Exactly ten particles fit below the threshold: 9.5 discs of area.
    let disc = PI * (RADIUS as f64).powi(2);
    let threshold = (9.5 * disc / (WIDTH as f64 * HEIGHT as f64)) as f32;

    let config = SceneConfig::default()
        .with_canvas(WIDTH, HEIGHT)
        .with_particle_radius(RADIUS)
        .with_gravity(0.0)
        .with_max_particles(100)
        .with_fill_threshold(threshold)
        .with_settle_secs(5.0, 1.0)
        .with_settle_motion(Motion::SETTLE)
        .with_capture_path(None)
        .with_spouts(SpoutConfig {
            count: 1,
            layout: SpoutLayout::Explicit(vec![[RADIUS, floor]]),
            angle_degrees: 0.0,
            speed: 600.0,
        });
    config.validate().unwrap();

    let tick = config.tick_interval();
    let settle = Duration::from_secs_f32(config.settle_secs);
    let mut scheduler = Scheduler::new(config, Some(Box::new(Gradient)));
    let t0 = Instant::now();
    let mut i = 0u32;

    while scheduler.phase() == Phase::Filling {
        assert!(i < 50, "filling never finished");
        scheduler.tick(t0 + tick * i).unwrap();
        i += 1;
    }
    assert_eq!(scheduler.phase(), Phase::Settling1);
    assert_eq!(scheduler.world().len(), 10);
    let settle_started = t0 + tick * (i - 1);

    // Run the settle up to, but not including, the capture tick.
    while (t0 + tick * i).duration_since(settle_started) < settle {
        assert_eq!(scheduler.tick(t0 + tick * i).unwrap(), Phase::Settling1);
        i += 1;
    }

    let store = scheduler.world().store();
    assert_eq!(store.len(), 10);
    for (p, prev) in store.positions().iter().zip(store.previous()) {
        assert!((p.y - floor).abs() < 1e-3, "particle above the floor: {:?}", p);
        assert!((*p - *prev).length() < 1e-3, "particle still moving: {:?} -> {:?}", prev, p);
        assert!(p.x >= RADIUS && p.x <= WIDTH as f32 - RADIUS);
    }

    assert_eq!(scheduler.tick(t0 + tick * i).unwrap(), Phase::Replaying);
    let captured = scheduler.captured().unwrap();
    assert_eq!(captured.len(), 10);
    assert_eq!(scheduler.original_count(), Some(10));
    assert!(captured.records().iter().all(|r| r.color[1] == floor as u8));
    // The pile shows its captured colors for one tick before the replay.
    let painted = scheduler.world().store().colors();
    assert_eq!(painted.len(), 10);
    assert!(painted.iter().zip(captured.records()).all(|(c, r)| *c == r.color));
    scheduler.tick(t0 + tick * (i + 1)).unwrap();
    assert_eq!(scheduler.world().len(), 1);
}

#[test]
fn overlapping_pair_separates_by_correction_fraction() {
    let mut hash = SpatialHash::new(GridDims::covering(100.0, 100.0, 10.0));
    let mut positions = vec![Vec2::new(40.0, 50.0), Vec2::new(42.0, 50.0)];
    hash.rebuild(&positions);
    hash.resolve(&mut positions, &[5.0, 5.0], 0.3);

    let separation = positions[1].x - positions[0].x;
    assert!((separation - (2.0 + 2.4)).abs() < 1e-4);
    assert!((positions[0].x - 38.8).abs() < 1e-4);
    assert!((positions[1].x - 43.2).abs() < 1e-4);
}

fn total_overlap(positions: &[Vec2], radius: f32) -> f32 {
    let mut total = 0.0;
    for i in 0..positions.len() {
        for j in (i + 1)..positions.len() {
            total += (2.0 * radius - positions[i].distance(positions[j])).max(0.0);
        }
    }
    total
}

#[test]
fn overlap_decreases_monotonically_under_repeated_passes() {
    let radius = 4.0;
    let mut positions = Vec::new();
    for y in 0..6 {
        for x in 0..6 {
            positions.push(Vec2::new(20.0 + x as f32 * 30.0, 20.0 + y as f32 * 30.0));
        }
    }
    assert_eq!(total_overlap(&positions, radius), 0.0);

    // One extra particle overlapping its lattice neighbour.
    positions.push(positions[14] + Vec2::new(3.0, 1.0));
    let radii = vec![radius; positions.len()];
    let mut hash = SpatialHash::new(GridDims::covering(200.0, 200.0, 2.0 * radius));

    let mut last = total_overlap(&positions, radius);
    assert!(last > 0.0);
    for _ in 0..20 {
        hash.rebuild(&positions);
        hash.resolve(&mut positions, &radii, 0.3);
        let now = total_overlap(&positions, radius);
        assert!(now <= last, "overlap grew from {} to {}", last, now);
        if last > 0.0 {
            assert!(now < last);
        }
        last = now;
    }
    assert!(last < 0.01);
}

#[test]
fn spatial_hash_partitions_every_particle_exactly_once() {
    let mut rng = StdRng::seed_from_u64(7);
    let dims = GridDims::covering(320.0, 240.0, 8.0);
    let mut hash = SpatialHash::new(dims);

    for n in [0usize, 1, 17, 500, 4000] {
        let positions: Vec<Vec2> = (0..n)
            .map(|_| Vec2::new(rng.gen_range(-20.0..340.0), rng.gen_range(-20.0..260.0)))
            .collect();
        hash.rebuild(&positions);

        let mut seen = vec![0u32; n];
        let mut covered = 0;
        for cell in 0..dims.total_cells() {
            let members = hash.cell_particles(cell);
            covered += members.len();
            for &i in members {
                seen[i as usize] += 1;
                assert_eq!(dims.cell_of(positions[i as usize]) as usize, cell);
            }
            assert!(members.windows(2).all(|w| w[0] < w[1]));
        }
        assert_eq!(covered, n);
        assert!(seen.iter().all(|&c| c == 1));
    }
}

#[test]
fn integration_keeps_random_particles_in_bounds() {
    let mut rng = StdRng::seed_from_u64(42);
    let n = 2000;
    let bounds = Vec2::new(300.0, 200.0);
    let radii: Vec<f32> = (0..n).map(|_| rng.gen_range(1.0..6.0)).collect();
    let mut positions: Vec<Vec2> = radii
        .iter()
        .map(|&r| Vec2::new(rng.gen_range(r..bounds.x - r), rng.gen_range(r..bounds.y - r)))
        .collect();
    let mut previous: Vec<Vec2> = positions
        .iter()
        .map(|&p| p - Vec2::new(rng.gen_range(-15.0..15.0), rng.gen_range(-15.0..15.0)))
        .collect();

    let params = StepParams {
        dt: 1.0 / 480.0,
        gravity: 1000.0,
        bounds,
        motion: Motion::ACTIVE,
    };
    for _ in 0..100 {
        integrate(&mut positions, &mut previous, &radii, &params);
        for (p, &r) in positions.iter().zip(&radii) {
            assert!(p.x >= r && p.x <= bounds.x - r);
            assert!(p.y >= r && p.y <= bounds.y - r);
        }
    }
}

#[test]
fn phases_only_move_forward() {
    let config = SceneConfig::default()
        .with_canvas(160, 120)
        .with_particle_radius(4.0)
        .with_fill_threshold(0.05)
        .with_settle_secs(0.2, 0.2)
        .with_capture_path(None)
        .with_spouts(SpoutConfig {
            count: 4,
            layout: SpoutLayout::Row,
            angle_degrees: 30.0,
            speed: 300.0,
        });
    let tick = config.tick_interval();
    let mut scheduler = Scheduler::new(config, Some(Box::new(Gradient)));
    let t0 = Instant::now();

    let mut last = scheduler.phase();
    let mut original = None;
    for i in 0..600 {
        let phase = scheduler.tick(t0 + tick * i).unwrap();
        assert!(phase >= last, "phase went from {} back to {}", last, phase);
        last = phase;

        if let Some(count) = original {
            assert_eq!(scheduler.original_count(), Some(count));
        } else {
            original = scheduler.original_count();
        }
        if phase == Phase::Done {
            break;
        }
    }
    assert_eq!(last, Phase::Done);
    assert!(original.is_some());
}
