use motionblocks_core::{
    Action, Config, EntityId, EntityState, ExecStateKind, InstructionId, MotionEvent,
    Orchestrator,
};

const FRAME: f32 = 1.0 / 60.0;

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

/// Orchestrator with collisions disabled and one entity registered.
fn quiet_with(id: &str, at: EntityState) -> (Orchestrator, EntityId) {
    let mut cfg = Config::default();
    cfg.hero_mode = false;
    let mut o = Orchestrator::new(cfg).expect("valid config");
    let id = EntityId::from(id);
    o.register_entity(id.clone(), at);
    (o, id)
}

/// Tick until nothing is executing; returns every event observed.
fn run_to_idle(o: &mut Orchestrator, dt: f32) -> Vec<MotionEvent> {
    let mut events = Vec::new();
    for _ in 0..200_000 {
        events.extend(o.update(dt).events.iter().cloned());
        if !o.is_any_executing() {
            return events;
        }
    }
    panic!("run never finished");
}

fn started(events: &[MotionEvent]) -> Vec<(InstructionId, String)> {
    events
        .iter()
        .filter_map(|e| match e {
            MotionEvent::InstructionStarted {
                instruction, kind, ..
            } => Some((*instruction, kind.clone())),
            _ => None,
        })
        .collect()
}

#[test]
fn instructions_start_in_sequence_order_without_overlap() {
    let (mut o, car) = quiet_with("car1", EntityState::at(100.0, 100.0));
    let m0 = o.create_instruction(&car, Action::move_steps(1.0)).unwrap();
    let l0 = o.create_instruction(&car, Action::say("a", 0.2)).unwrap();
    let m1 = o.create_instruction(&car, Action::turn(5.0)).unwrap();
    let l1 = o.create_instruction(&car, Action::think("b", 0.2)).unwrap();

    assert!(o.run_entity(&car));
    let events = run_to_idle(&mut o, FRAME);

    let mut open: Option<InstructionId> = None;
    let mut order = Vec::new();
    for e in &events {
        match e {
            MotionEvent::InstructionStarted { instruction, .. } => {
                assert!(open.is_none(), "{instruction} started while {open:?} active");
                open = Some(*instruction);
                order.push(*instruction);
            }
            MotionEvent::InstructionFinished { instruction, .. } => {
                assert_eq!(open.take(), Some(*instruction));
            }
            _ => {}
        }
    }
    assert_eq!(order, vec![m0.id(), l0.id(), m1.id(), l1.id()]);
}

#[test]
fn at_most_one_run_per_entity() {
    let (mut o, car) = quiet_with("car1", EntityState::at(100.0, 100.0));
    o.create_instruction(&car, Action::move_steps(2.0));
    assert!(o.run_entity(&car));
    assert!(!o.run_entity(&car));
    let again = o.instructions_of(&car);
    assert!(!o.run(&car, again));

    let out = o.update(FRAME);
    let runs = out
        .events
        .iter()
        .filter(|e| matches!(e, MotionEvent::RunStarted { .. }))
        .count();
    assert_eq!(runs, 1);
}

#[test]
fn cancellation_is_idempotent_and_freezes_state() {
    let (mut o, car) = quiet_with("car1", EntityState::at(100.0, 100.0));
    o.create_instruction(&car, Action::move_steps(10.0));
    o.run_entity(&car);
    o.update(0.4);

    assert!(o.cancel(&car));
    assert!(!o.cancel(&car));
    o.cancel_all();

    let frozen = o.get(&car).unwrap();
    let mut cancelled = 0;
    for _ in 0..120 {
        let out = o.update(FRAME);
        assert!(out.changes.is_empty());
        cancelled += out
            .events
            .iter()
            .filter(|e| matches!(e, MotionEvent::RunCancelled { .. }))
            .count();
    }
    assert_eq!(cancelled, 1);
    assert_eq!(o.get(&car).unwrap(), frozen);
    assert_eq!(o.exec_state(&car), Some(ExecStateKind::Idle));
    assert!(o.status_of(&car).is_none());
}

#[test]
fn long_move_is_monotonic_and_walks_the_state_machine() {
    let (mut o, car) = quiet_with("car1", EntityState::at(20.0, 150.0));
    o.create_instruction(&car, Action::move_steps(50.0));
    assert_eq!(o.exec_state(&car), Some(ExecStateKind::Idle));
    o.run_entity(&car);

    let mut kinds = vec![o.exec_state(&car).unwrap()];
    let mut last_x = o.get(&car).unwrap().x;
    for _ in 0..(12 * 60) {
        o.update(FRAME);
        let x = o.get(&car).unwrap().x;
        assert!(x >= last_x, "x went backwards: {last_x} -> {x}");
        last_x = x;
        let kind = o.exec_state(&car).unwrap();
        if kinds.last() != Some(&kind) {
            kinds.push(kind);
        }
    }
    assert_eq!(
        kinds,
        vec![
            ExecStateKind::Running,
            ExecStateKind::Completed,
            ExecStateKind::Idle
        ]
    );
    // 1000 px requested, clamped at the right edge
    assert_eq!(last_x, 468.0);
}

#[test]
fn repeat_replays_every_other_instruction() {
    let (mut o, car) = quiet_with("car1", EntityState::at(100.0, 100.0));
    o.create_instruction(&car, Action::say("a", 0.1));
    o.create_instruction(&car, Action::repeat(3));
    o.create_instruction(&car, Action::say("b", 0.1));
    o.run_entity(&car);

    let events = run_to_idle(&mut o, 0.05);
    let starts = started(&events);
    let says = starts.iter().filter(|(_, k)| k == "say").count();
    let repeats = starts.iter().filter(|(_, k)| k == "repeat").count();
    assert_eq!(says, 2 + 3 * 2);
    assert_eq!(repeats, 1);

    let status = o.status_of(&car).expect("completion summary");
    assert_eq!(status.label, "CAR1 - All 3 blocks completed!");
    assert_eq!(status.instruction, None);
}

#[test]
fn repeat_with_no_siblings_finishes_immediately() {
    let (mut o, car) = quiet_with("car1", EntityState::at(100.0, 100.0));
    o.create_instruction(&car, Action::repeat(5));
    o.run_entity(&car);
    let out = o.update(0.0);
    assert!(out
        .events
        .iter()
        .any(|e| matches!(e, MotionEvent::RunCompleted { .. })));
    assert!(!o.is_executing(&car));
}

#[test]
fn goto_lands_exactly_on_target() {
    let (mut o, car) = quiet_with("car1", EntityState::new(10.0, 10.0, 45.0));
    o.create_instruction(&car, Action::goto(123.4, 56.7));
    o.run_entity(&car);
    run_to_idle(&mut o, 0.037);
    let s = o.get(&car).unwrap();
    assert_eq!(s.x, 123.4);
    assert_eq!(s.y, 56.7);
    assert_eq!(s.rotation, 45.0);
}

#[test]
fn goto_default_target_when_payload_missing() {
    let (mut o, car) = quiet_with("car1", EntityState::at(10.0, 10.0));
    o.create_instruction(&car, Action::Goto { x: None, y: None });
    o.run_entity(&car);
    run_to_idle(&mut o, FRAME);
    assert_eq!(o.get(&car).unwrap(), EntityState::at(100.0, 100.0));
}

#[test]
fn zero_move_resolves_without_writes() {
    let (mut o, car) = quiet_with("car1", EntityState::at(10.0, 10.0));
    o.create_instruction(&car, Action::move_steps(0.0));
    o.run_entity(&car);
    let mut writes = 0;
    for _ in 0..300 {
        writes += o.update(FRAME).changes.len();
    }
    assert_eq!(writes, 0);
    assert!(!o.is_executing(&car));
}

#[test]
fn unused_tick_time_carries_into_the_next_step() {
    let (mut o, car) = quiet_with("car1", EntityState::at(10.0, 10.0));
    o.create_instruction(&car, Action::say("a", 0.2));
    o.create_instruction(&car, Action::say("b", 0.2));
    o.run_entity(&car);

    o.update(0.2);
    assert!(o.speech_of(&car).is_none(), "pause between instructions");
    o.update(0.3);
    assert_eq!(o.speech_of(&car).unwrap().text, "b");

    // a single huge tick drains the whole run, including the summary window
    let (mut o, car) = quiet_with("car1", EntityState::at(10.0, 10.0));
    o.create_instruction(&car, Action::say("a", 0.2));
    o.create_instruction(&car, Action::say("b", 0.2));
    o.run_entity(&car);
    let out = o.update(10.0);
    let finished = out
        .events
        .iter()
        .filter(|e| matches!(e, MotionEvent::InstructionFinished { .. }))
        .count();
    assert_eq!(finished, 2);
    assert_eq!(o.exec_state(&car), Some(ExecStateKind::Idle));
}

#[test]
fn say_exposes_bubble_and_quoted_status() {
    let (mut o, car) = quiet_with("car1", EntityState::at(10.0, 10.0));
    o.create_instruction(&car, Action::Say {
        text: None,
        duration: Some(1.0),
    });
    o.run_entity(&car);
    o.update(0.5);
    let speech = o.speech_of(&car).unwrap();
    assert_eq!(speech.text, "Hello!");
    assert!(!speech.thought);
    assert_eq!(o.status_of(&car).unwrap().label, "\"Hello!\"");
    o.update(0.6);
    assert!(o.speech_of(&car).is_none());
}

#[test]
fn move_progress_counts_whole_steps() {
    let (mut o, car) = quiet_with("car1", EntityState::at(10.0, 10.0));
    o.create_instruction(&car, Action::move_steps(4.0));
    o.run_entity(&car);
    let mut last = 0;
    for _ in 0..60 {
        o.update(FRAME);
        if let Some(status) = o.status_of(&car) {
            assert_eq!(status.total_steps, 4);
            assert!(status.current_step >= last && status.current_step <= 4);
            last = status.current_step;
        }
    }
    // 1.0 s into a 1.2 s cubic ease: ~98% of 80 px
    approx(o.get(&car).unwrap().x, 10.0 + 80.0 * 0.9815, 0.5);
}

#[test]
fn turn_progress_counts_whole_degrees_then_lingers() {
    let (mut o, car) = quiet_with("car1", EntityState::new(200.0, 200.0, 0.0));
    o.create_instruction(&car, Action::turn(-90.0));
    o.run_entity(&car);

    // 0.9 s turn, then the 0.5 s linger
    let mut last = 0;
    for _ in 0..60 {
        o.update(FRAME);
        let status = o.status_of(&car).unwrap();
        assert_eq!(status.total_steps, 90);
        assert!(status.current_step >= last && status.current_step <= 90);
        last = status.current_step;
        if status.current_step < 90 {
            assert_eq!(status.label, "Turning -90°");
        }
    }
    let status = o.status_of(&car).unwrap();
    assert_eq!(status.label, "Turned -90°!");
    assert_eq!(status.current_step, 90);
    approx(o.get(&car).unwrap().rotation, 270.0, 1e-3);

    for _ in 0..30 {
        o.update(FRAME);
    }
    assert_eq!(
        o.status_of(&car).unwrap().label,
        "CAR1 - All 1 blocks completed!"
    );
}

#[test]
fn goto_reports_label_and_single_step_progress() {
    let (mut o, car) = quiet_with("car1", EntityState::at(100.0, 100.0));
    o.create_instruction(&car, Action::goto(200.0, 100.0));
    o.run_entity(&car);

    o.update(0.4);
    let status = o.status_of(&car).unwrap();
    assert_eq!(status.label, "Go to (200, 100)");
    assert_eq!((status.current_step, status.total_steps), (0, 1));

    // 0.8 s floor reached, 0.4 s linger still running
    o.update(0.5);
    let status = o.status_of(&car).unwrap();
    assert_eq!(status.current_step, 1);
    assert_eq!(o.get(&car).unwrap().x, 200.0);
    assert!(o.is_executing(&car));
}

#[test]
fn non_finite_move_still_finishes() {
    let (mut o, car) = quiet_with("car1", EntityState::at(20.0, 150.0));
    o.create_instruction(&car, Action::move_steps(f32::INFINITY));
    o.run_entity(&car);
    o.update(FRAME);
    assert_eq!(o.status_of(&car).unwrap().label, "Moving 10 steps");

    run_to_idle(&mut o, FRAME);
    approx(o.get(&car).unwrap().x, 220.0, 1e-2);
}

#[test]
fn endless_repeat_keeps_ticking_and_cancels() {
    let (mut o, car) = quiet_with("car1", EntityState::at(20.0, 150.0));
    o.create_instruction(&car, Action::say("hi", 10.0));
    o.create_instruction(&car, Action::repeat(u32::MAX));
    o.run_entity(&car);

    // each pass is a 10 s say plus a 0.3 s pause; stop mid-say
    for _ in 0..19 {
        o.update(10.3);
    }
    o.update(5.0);
    assert!(o.is_executing(&car));
    assert_eq!(o.speech_of(&car).unwrap().text, "hi");
    assert!(o.cancel(&car));
    assert!(!o.is_executing(&car));
}
