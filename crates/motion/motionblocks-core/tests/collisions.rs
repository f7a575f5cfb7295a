use motionblocks_core::{
    Action, Category, ChangeSource, Config, EntityId, EntityState, MotionEvent, Orchestrator,
};

const FRAME: f32 = 1.0 / 60.0;

fn hero() -> Orchestrator {
    Orchestrator::new(Config::default()).expect("valid config")
}

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn collisions(events: &[MotionEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, MotionEvent::CollisionBegan { .. }))
        .count()
}

fn tick(o: &mut Orchestrator, dt: f32, frames: usize) -> Vec<MotionEvent> {
    let mut events = Vec::new();
    for _ in 0..frames {
        events.extend(o.update(dt).events.iter().cloned());
    }
    events
}

#[test]
fn one_event_per_overlap_edge() {
    let mut o = hero();
    let a = EntityId::from("a");
    let b = EntityId::from("b");
    o.register_entity(a.clone(), EntityState::at(50.0, 50.0));
    o.register_entity(b.clone(), EntityState::at(300.0, 300.0));
    assert_eq!(collisions(&tick(&mut o, FRAME, 30)), 0);

    o.move_entity(&b, 60.0, 50.0);
    let events = tick(&mut o, FRAME, 120);
    assert_eq!(collisions(&events), 1, "{events:?}");
    assert!(events
        .iter()
        .any(|e| matches!(e, MotionEvent::SwapStarted { .. })));

    // separate, then overlap again: exactly one more event
    o.move_entity(&b, 400.0, 300.0);
    assert_eq!(collisions(&tick(&mut o, FRAME, 30)), 0);
    o.move_entity(&b, 55.0, 55.0);
    assert_eq!(collisions(&tick(&mut o, FRAME, 30)), 1);
}

#[test]
fn swap_trades_positions_and_marks_both() {
    let mut o = hero();
    let a = EntityId::from("a");
    let b = EntityId::from("b");
    o.register_entity(a.clone(), EntityState::at(100.0, 100.0));
    o.register_entity(b.clone(), EntityState::at(130.0, 110.0));

    let out = o.update(0.0).clone();
    assert_eq!(collisions(&out.events), 1);
    assert!(o.is_swapping(&a) && o.is_swapping(&b));
    assert!(o.is_colliding(&a) && o.is_colliding(&b));

    let mut writes = Vec::new();
    for _ in 0..60 {
        writes.extend(o.update(FRAME).changes.iter().cloned());
    }
    assert!(!o.is_swapping(&a));
    assert!(writes.iter().all(|c| c.source == ChangeSource::Collision));

    let sa = o.get(&a).unwrap();
    let sb = o.get(&b).unwrap();
    assert_eq!((sa.x, sa.y), (130.0, 110.0));
    assert_eq!((sb.x, sb.y), (100.0, 100.0));

    // marker outlives the swap, then clears
    tick(&mut o, FRAME, 30);
    assert!(!o.is_colliding(&a));
}

#[test]
fn triple_overlap_settles_to_one_swap() {
    let mut o = hero();
    for (id, x) in [("a", 200.0), ("b", 210.0), ("c", 220.0)] {
        o.register_entity(id, EntityState::at(x, 200.0));
    }
    let events = tick(&mut o, FRAME, 180);

    assert_eq!(collisions(&events), 3);
    let started: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            MotionEvent::SwapStarted { a, b } => Some((a.clone(), b.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec![(EntityId::from("a"), EntityId::from("b"))]);
    let skipped = events
        .iter()
        .filter(|e| matches!(e, MotionEvent::SwapSkipped { .. }))
        .count();
    assert_eq!(skipped, 2);
}

#[test]
fn collision_flips_only_moves_not_yet_started() {
    let mut o = hero();
    let car = EntityId::from("car1");
    let other = EntityId::from("car2");
    o.register_entity(car.clone(), EntityState::at(150.0, 150.0));
    o.register_entity(other.clone(), EntityState::at(400.0, 330.0));
    o.create_instruction(&car, Action::move_steps(3.0));
    o.create_instruction(&car, Action::move_steps(4.0));
    o.create_instruction(&car, Action::turn(15.0));

    o.run_entity(&car);
    o.update(0.1);
    let here = o.get(&car).unwrap();
    o.move_entity(&other, here.x + 10.0, here.y);
    let out = o.update(0.0).clone();
    assert_eq!(collisions(&out.events), 1);
    assert!(out.events.iter().any(|e| matches!(
        e,
        MotionEvent::MovesReversed { entity, count: 2 } if *entity == car
    )));
    assert!(!out
        .events
        .iter()
        .any(|e| matches!(e, MotionEvent::MovesReversed { entity, .. } if *entity == other)));

    // stop the swap before it writes so only the moves shape the path
    o.set_hero_mode(false);
    assert!(!o.is_swapping(&car));

    let motion: Vec<Action> = o
        .lane(&car, Category::Motion)
        .iter()
        .map(|i| i.action().clone())
        .collect();
    assert_eq!(
        motion,
        vec![
            Action::move_steps(-3.0),
            Action::move_steps(-4.0),
            Action::turn(15.0)
        ]
    );

    for _ in 0..(10 * 60) {
        o.update(FRAME);
        if !o.is_executing(&car) {
            break;
        }
    }
    // the running move kept going forward (+60), the queued one went back (-80)
    approx(o.get(&car).unwrap().x, 150.0 + 60.0 - 80.0, 0.05);
}

#[test]
fn cancel_all_leaves_swaps_but_reset_stops_them() {
    let mut o = hero();
    o.register_entity("a", EntityState::at(100.0, 100.0));
    o.register_entity("b", EntityState::at(120.0, 100.0));
    o.update(0.0);
    let a = EntityId::from("a");
    assert!(o.is_swapping(&a));

    o.cancel_all();
    o.update(FRAME);
    assert!(o.is_swapping(&a));

    o.reset_all();
    assert!(!o.is_swapping(&a));
    assert_eq!(o.get(&a), Some(EntityState::at(100.0, 100.0)));
}

#[test]
fn dragging_a_swapping_entity_stops_the_swap() {
    let mut o = hero();
    let a = EntityId::from("a");
    let b = EntityId::from("b");
    o.register_entity(a.clone(), EntityState::at(100.0, 100.0));
    o.register_entity(b.clone(), EntityState::at(120.0, 100.0));
    o.update(0.0);
    o.update(0.2);
    assert!(o.is_swapping(&b));

    o.move_entity(&a, 400.0, 300.0);
    assert!(!o.is_swapping(&a));
    assert!(!o.is_swapping(&b));
    let frozen_b = o.get(&b);
    tick(&mut o, FRAME, 60);
    assert_eq!(o.get(&b), frozen_b);
}

#[test]
fn hero_mode_off_disables_detection() {
    let mut cfg = Config::default();
    cfg.hero_mode = false;
    let mut o = Orchestrator::new(cfg).unwrap();
    o.register_entity("a", EntityState::at(100.0, 100.0));
    o.register_entity("b", EntityState::at(101.0, 100.0));
    assert_eq!(collisions(&tick(&mut o, FRAME, 30)), 0);

    // switching on reports the existing overlap once
    o.set_hero_mode(true);
    assert!(o.hero_mode());
    assert_eq!(collisions(&tick(&mut o, FRAME, 30)), 1);
}
