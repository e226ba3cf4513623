use crate::clock::{Clock, DtBuffer};

fn adaptive_clock() -> Clock {
    let mut clock = Clock {
        dt_table: vec![10.0],
        dttime: vec![1.0e9],
        dtopt: 1,
        maxcourant: 0.5,
        dtmax: 60.0,
        dtmin: 0.1,
        relax: 1.0,
        buffer: DtBuffer::new("", 100),
        ..Default::default()
    };
    clock.initialize(0.0);
    clock
}

/*
Simulation time advances by exactly the adopted step, and the sweep
toggle alternates every step.
 */
#[test]
fn test_fixed_table_advance() {
    let mut clock = Clock {
        dt_table: vec![60.0, 30.0],
        dttime: vec![120.0, 1.0e9],
        dtopt: 0,
        buffer: DtBuffer::new("", 100),
        ..Default::default()
    };
    clock.initialize(0.0);

    assert_eq!(clock.current_dt(), 60.0);
    assert_eq!(clock.iteration, 0);
    clock.advance().unwrap();
    assert_eq!(clock.simtime, 60.0);
    assert_eq!(clock.iteration, 1);
    clock.advance().unwrap();
    assert_eq!(clock.simtime, 120.0);
    assert_eq!(clock.iteration, 0);
    //past the first time break the table switches to 30 s
    clock.advance().unwrap();
    assert_eq!(clock.current_dt(), 30.0);
}

/*
With adaptive stepping a Courant number above the ceiling shrinks the
next step, and the proposal is rounded down to one significant figure.
 */
#[test]
fn test_adaptive_shrinks_on_high_courant() {
    let mut clock = adaptive_clock();
    clock.begin_step();
    clock.maxcourant_ov = 2.0; //four times the ceiling
    clock.maxcourant_ch = 0.3;
    clock.advance().unwrap();
    //proposal = 10 * 0.5 / 2.0 = 2.5, truncated to 2
    assert_eq!(clock.current_dt(), 2.0);
}

/*
The larger of the overland and channel Courant numbers governs.
 */
#[test]
fn test_adaptive_uses_larger_courant() {
    let mut clock = adaptive_clock();
    clock.begin_step();
    clock.maxcourant_ov = 0.3;
    clock.maxcourant_ch = 1.0;
    clock.advance().unwrap();
    //proposal = 10 * 0.5 / 1.0 = 5
    assert_eq!(clock.current_dt(), 5.0);
}

/*
With no flow anywhere the step grows toward its cap rather than
dividing by zero.
 */
#[test]
fn test_adaptive_grows_when_idle() {
    let mut clock = adaptive_clock();
    clock.begin_step();
    clock.advance().unwrap();
    assert_eq!(clock.current_dt(), 20.0);
    clock.begin_step();
    clock.advance().unwrap();
    clock.begin_step();
    clock.advance().unwrap();
    //clamped at dtmax and truncated
    assert!(clock.current_dt() <= 60.0);
}

/*
The dt buffer spills to its file in append mode when full and is
drained by a final flush.
 */
#[test]
fn test_dt_buffer_spills() {
    let mut path = std::env::temp_dir();
    path.push(format!("trex_dtbuf_test_{}", std::process::id()));
    let path = path.to_string_lossy().into_owned();
    let _ = std::fs::remove_file(&path);

    let mut buffer = DtBuffer::new(&path, 3);
    for i in 0..7 {
        buffer.record(10.0, i as f64 * 10.0).unwrap();
    }
    buffer.flush().unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 7);
    assert!(buffer.spilled);
    let _ = std::fs::remove_file(&path);
}
