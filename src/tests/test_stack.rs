use crate::domain::stack::{push_pop, LayerConc, StackSet, WATER_COLUMN};

//A single-column stack with one 0.1 m layer over a 100 m2 footprint,
//holding two solids classes at 60/40 of a packed bed.
fn build_stack() -> (StackSet, LayerConc) {
    let mut stk = StackSet::new(1, 3);
    stk.area[0] = 100.0;
    stk.hardpan[0] = 10.0;
    stk.init_layer(0, 0.1, 0.4, 0);

    let mut conc = LayerConc::zeroed(2, 1, 4);
    conc.set(1, 0, 1, 900_000.0);
    conc.set(2, 0, 1, 600_000.0);
    conc.refresh_total(0, 1);
    (stk, conc)
}

/*
Deposition that overflows the surface layer pushes a new surface
layer: the old layer is capped at its maximum volume, the new layer
holds the overflow at the same composition, and the stack grows by
one.
 */
#[test]
fn test_push_on_overflow() {
    let (mut stk, mut conc) = build_stack();
    let i = stk.idx(0, 1);
    //overflow the layer well past its push threshold
    let overflow = 3.0;
    stk.vnew[i] = stk.maxv[i] + overflow;

    let shift = {
        let mut concs = vec![&mut conc];
        push_pop(&mut stk, &mut concs, 0).unwrap()
    };
    let shift = shift.expect("a push should have happened");

    assert_eq!(stk.nstack[0], 2);
    let i2 = stk.idx(0, 2);
    assert!((stk.v[i] - stk.maxv[i]).abs() < 1e-9, "old surface not capped");
    assert!((stk.v[i2] - overflow).abs() < 1e-9, "overflow volume wrong");
    assert!(
        (stk.h[i2] - overflow / stk.area[0]).abs() < 1e-12,
        "new layer thickness is not overflow volume over ground area"
    );
    //the new surface carries the composition of the old one
    assert_eq!(conc.at(1, 0, 2), conc.at(1, 0, 1));
    assert_eq!(conc.at(2, 0, 2), conc.at(2, 0, 1));
    //total-solids invariant holds in both layers
    for layer in [1, 2] {
        let total = conc.at(1, 0, layer) + conc.at(2, 0, layer);
        assert!(
            (conc.at(0, 0, layer) - total).abs() <= 1e-6 * total,
            "slot-0 total broken in layer {}",
            layer
        );
    }
    //burial mass equals the mass left in the buried layer
    let expected_buried = conc.at(0, 0, 1) * stk.v[i] / 1000.0;
    assert!((shift.buried[0][0] - expected_buried).abs() < 1e-6 * expected_buried);
}

/*
Erosion that drains the surface layer below its minimum volume pops
it: the surface merges into the layer below with mass-weighted
concentrations and the stack shrinks by one.
 */
#[test]
fn test_pop_merges_mass_weighted() {
    let (mut stk, mut conc) = build_stack();
    //add a second layer with a different composition
    stk.init_layer(0, 0.05, 0.4, 0);
    conc.set(1, 0, 2, 200_000.0);
    conc.set(2, 0, 2, 100_000.0);
    conc.refresh_total(0, 2);

    let i2 = stk.idx(0, 2);
    let vbelow = stk.v[stk.idx(0, 1)];
    let c1_below = conc.at(1, 0, 1);
    //erode the surface layer below its pop threshold
    let vleft = 0.25 * stk.minv[i2];
    stk.vnew[i2] = vleft;

    let shift = {
        let mut concs = vec![&mut conc];
        push_pop(&mut stk, &mut concs, 0).unwrap()
    };
    assert!(shift.is_some(), "a pop should have happened");

    assert_eq!(stk.nstack[0], 1);
    let ib = stk.idx(0, 1);
    assert!((stk.v[ib] - (vbelow + vleft)).abs() < 1e-9);
    //merged concentration is the mass-weighted mean
    let expected = (c1_below * vbelow + 200_000.0 * vleft) / (vbelow + vleft);
    assert!(
        (conc.at(1, 0, 1) - expected).abs() < 1e-6 * expected,
        "merge not mass-weighted: {} vs {}",
        conc.at(1, 0, 1),
        expected
    );
    //the vacated slot is cleared
    assert_eq!(stk.v[i2], 0.0);
    assert_eq!(conc.at(1, 0, 2), 0.0);
    //total-solids invariant holds in the merged layer
    let total = conc.at(1, 0, 1) + conc.at(2, 0, 1);
    assert!((conc.at(0, 0, 1) - total).abs() <= 1e-6 * total);
}

/*
A second concentration set riding through a push gets its own buried
masses, sized to its own species count, and its layers stay aligned
with the first set's.
 */
#[test]
fn test_push_shifts_every_concentration_set() {
    let (mut stk, mut conc) = build_stack();
    let mut other = LayerConc::zeroed(1, 1, 4);
    other.set(1, 0, 1, 50_000.0);
    other.refresh_total(0, 1);

    let i = stk.idx(0, 1);
    stk.vnew[i] = stk.maxv[i] + 2.0;
    let shift = {
        let mut concs = vec![&mut conc, &mut other];
        push_pop(&mut stk, &mut concs, 0).unwrap()
    }
    .expect("a push should have happened");

    assert_eq!(shift.buried.len(), 2);
    assert_eq!(shift.buried[1].len(), 2); //total slot plus one species
    let expected = 50_000.0 * stk.v[i] / 1000.0;
    assert!(
        (shift.buried[1][1] - expected).abs() < 1e-6 * expected,
        "second-set burial {} but expected {}",
        shift.buried[1][1],
        expected
    );
    //the new surface layer carries the second set's composition too
    assert_eq!(other.at(1, 0, 2), 50_000.0);
}

/*
Layer elevations stay consistent through a push and a pop: the bed
surface elevation always sits the total occupied thickness above the
hardpan datum.
 */
#[test]
fn test_elevation_tracks_thickness() {
    let (mut stk, mut conc) = build_stack();
    let check = |stk: &StackSet| {
        let expected = stk.hardpan[0] + stk.total_thickness(0);
        assert!(
            (stk.bed_elevation(0) - expected).abs() < 1e-4,
            "bed elevation {} but hardpan + thickness = {}",
            stk.bed_elevation(0),
            expected
        );
    };
    check(&stk);

    //push
    let i = stk.idx(0, 1);
    stk.vnew[i] = stk.maxv[i] + 2.0;
    {
        let mut concs = vec![&mut conc];
        push_pop(&mut stk, &mut concs, 0).unwrap();
    }
    check(&stk);

    //pop the new surface layer back down
    let i2 = stk.idx(0, 2);
    stk.vnew[i2] = 0.1 * stk.minv[i2];
    {
        let mut concs = vec![&mut conc];
        push_pop(&mut stk, &mut concs, 0).unwrap();
    }
    check(&stk);
}

/*
Pushing past the stack capacity is a fatal runtime error.
 */
#[test]
fn test_stack_overflow_is_fatal() {
    let mut stk = StackSet::new(1, 1);
    stk.area[0] = 100.0;
    stk.init_layer(0, 0.1, 0.4, 0);
    let mut conc = LayerConc::zeroed(1, 1, 2);
    conc.set(1, 0, 1, 1_000_000.0);
    conc.refresh_total(0, 1);

    let i = stk.idx(0, 1);
    stk.vnew[i] = stk.maxv[i] * 2.0;
    let result = {
        let mut concs = vec![&mut conc];
        push_pop(&mut stk, &mut concs, 0)
    };
    assert!(result.is_err());
    let msg = result.err().unwrap();
    assert!(msg.contains("stack overflow"), "unexpected message: {}", msg);
}

/*
The surface layer never exchanges with the water column through slot
zero of the layer dimension; that slot is the water column itself.
 */
#[test]
fn test_water_column_slot_untouched_by_push() {
    let (mut stk, mut conc) = build_stack();
    conc.set(1, 0, WATER_COLUMN, 42.0);
    conc.refresh_total(0, WATER_COLUMN);
    let i = stk.idx(0, 1);
    stk.vnew[i] = stk.maxv[i] + 1.0;
    {
        let mut concs = vec![&mut conc];
        push_pop(&mut stk, &mut concs, 0).unwrap();
    }
    assert_eq!(conc.at(1, 0, WATER_COLUMN), 42.0);
}
