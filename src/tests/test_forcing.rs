use crate::forcing::TimeFunction;

/*
A constant series interpolates to exactly that constant at every
query time, including through several cycles.
 */
#[test]
fn test_constant_series() {
    let mut f = TimeFunction::constant("rain", 10.0, 3600.0);
    f.initialize(0.0);
    for step in 0..200 {
        let t = step as f64 * 60.0;
        f.update(t);
        assert_eq!(f.value, 10.0, "constant broke at t = {}", t);
    }
}

/*
Interpolation is linear inside an interval.
 */
#[test]
fn test_linear_interpolation() {
    let mut f = TimeFunction::new("ramp", vec![0.0, 100.0], vec![0.0, 50.0]).unwrap();
    f.initialize(0.0);
    f.update(0.0);
    assert!((f.value - 0.0).abs() < 1e-12);
    f.update(50.0);
    assert!((f.value - 25.0).abs() < 1e-12);
    f.update(75.0);
    assert!((f.value - 37.5).abs() < 1e-12);
}

/*
A series cycled once returns the same value as the uncycled time: the
interpolator folds time beyond the end of the series back by modulo.
 */
#[test]
fn test_cycle_idempotence() {
    let times = vec![0.0, 600.0, 1800.0, 3600.0];
    let values = vec![2.0, 8.0, 4.0, 2.0];
    let mut a = TimeFunction::new("a", times.clone(), values.clone()).unwrap();
    let mut b = TimeFunction::new("b", times, values).unwrap();
    a.initialize(0.0);
    b.initialize(0.0);

    for step in 0..60 {
        let t = step as f64 * 60.0;
        a.update(t);
        let va = a.value;
        b.update(3600.0 + t); //one full cycle later
        assert!(
            (va - b.value).abs() < 1e-9,
            "cycle mismatch at t = {}: {} vs {}",
            t,
            va,
            b.value
        );
    }
}

/*
A stepped series (constant rate for the first half of the period, zero
for the second half) alternates correctly over several cycles.
 */
#[test]
fn test_cyclic_step_series() {
    //10 on [0, 3600), 0 on [3600, 7200), repeating with period 7200
    let times = vec![0.0, 3600.0, 3600.0, 7200.0];
    let values = vec![10.0, 10.0, 0.0, 0.0];
    let mut f = TimeFunction::new("storm", times, values).unwrap();
    f.initialize(0.0);

    let mut t = 0.0;
    while t < 10_000.0 {
        f.update(t);
        let phase = t % 7200.0;
        let expected = if phase < 3600.0 { 10.0 } else { 0.0 };
        assert!(
            (f.value - expected).abs() < 1e-9,
            "expected {} at t = {} but got {}",
            expected,
            t,
            f.value
        );
        t += 100.0;
    }
}

/*
The update window makes the recompute branch cheap: inside an interval
the interval cursor does not move.
 */
#[test]
fn test_update_window() {
    let mut f = TimeFunction::new("w", vec![0.0, 1000.0, 2000.0], vec![1.0, 2.0, 3.0]).unwrap();
    f.initialize(0.0);
    f.update(10.0);
    let nt = f.next_update_time();
    f.update(500.0);
    assert_eq!(f.next_update_time(), nt, "cursor moved inside the interval");
    f.update(1500.0);
    assert!(f.next_update_time() > nt, "cursor did not advance to the next interval");
}

/*
Unsorted breakpoints are an input error.
 */
#[test]
fn test_unsorted_series_rejected() {
    let result = TimeFunction::new("bad", vec![0.0, 100.0, 50.0], vec![1.0, 2.0, 3.0]);
    assert!(result.is_err());
    let msg = result.err().unwrap();
    assert!(msg.contains("out of order"), "unexpected message: {}", msg);
}
