use crate::domain::stack::WATER_COLUMN;
use crate::domain::{CellGrid, GridSpec};
use crate::io::deck::DeckIO;
use crate::io::grid_ascii::write_grid;
use crate::mass_balance;

fn temp_file(name: &str) -> String {
    let mut p = std::env::temp_dir();
    p.push(format!("trex_solids_test_{}_{}", std::process::id(), name));
    p.to_string_lossy().into_owned()
}

//A 5x5 erodible plane sloping at 0.01 toward the east edge with one
//outlet, under a one-hour 25 mm/hr storm.
fn write_plane(tag: &str) -> (String, String) {
    let spec = GridSpec {
        nrows: 5,
        ncols: 5,
        w: 100.0,
        nodata: -9999.0,
        ..Default::default()
    };
    let mask = CellGrid::filled(5, 5, 1.0);
    let mut elev = CellGrid::filled(5, 5, 0.0);
    for row in 0..5 {
        for col in 0..5 {
            elev.set(row, col, (4 - col) as f64 * 1.0);
        }
    }
    let mask_path = temp_file(&format!("{}_mask.asc", tag));
    let elev_path = temp_file(&format!("{}_elev.asc", tag));
    write_grid(&mask_path, &spec, &mask).unwrap();
    write_grid(&elev_path, &spec, &elev).unwrap();
    (mask_path, elev_path)
}

fn storm_deck(mask: &str, elev: &str) -> String {
    format!(
        "GROUP A
KSIM 2
TSTART 0.0
TEND 2.0
DTOPT 0
NDT 1
30.0 2.0
PRINTOUT 2.0
END GROUP A
GROUP B
MASKFILE {mask}
ELEVATIONFILE {elev}
NLANDUSE 1
LANDUSE 1 field 0.03 0.0
STORAGEDEPTHCONST 0.0
NSOILS 1
SOIL 1 loam 0.0 0.0 0.0 0.45
RAINOPT 1
RAINGAGE 1 250.0 250.0 NPAIRS 4
0.0 25.0
1.0 25.0
1.0 0.0
2.0 0.0
OUTLETS 1
3 5 0.01 0
END GROUP B
GROUP C
NSOLIDS 1
SOLID 1 silt 0.00003 2.65 0.0001 10.0
LANDUSETRANSPORT 1 150000000.0 1.0 1.0 2.035 1.66 0.0
SOILERODE 1 0.3 0.0001
GSD 1 1.0
SOILSTACK 1 0.5
END GROUP C
GROUP E
END GROUP E
",
        mask = mask,
        elev = elev,
    )
}

/*
Solids are conserved over a storm: the eroded soil either leaves
through the outlet, redeposits, or stays suspended; the domain budget
closes within 1 percent.
 */
#[test]
fn test_storm_erosion_mass_balance() {
    let (mask, elev) = write_plane("storm");
    let deck = storm_deck(&mask, &elev);
    let mut sim = DeckIO::new().read_deck_string(&deck).unwrap();
    sim.configure().unwrap();
    sim.run().unwrap();

    let solids = sim.solids.as_ref().unwrap();
    assert!(
        solids.ov.ersmass.total(1) > 0.0,
        "the storm eroded nothing"
    );

    let vols = sim.current_volumes_ov();
    let b = mass_balance::solids_budget(
        &sim.basin,
        solids,
        &sim.soil_stack,
        None,
        &vols,
        None,
        1,
    );
    assert!(
        b.error_percent.abs() < 1.0,
        "solids balance error {} %",
        b.error_percent
    );

    //the water column change closes over the process registers
    let wc_change = b.final_wc - b.initial_wc;
    let explained = b.loads + b.erosion - b.deposition + b.advection_in - b.advection_out
        + b.dispersion_in
        - b.dispersion_out
        + b.residual;
    let scale = b.erosion.max(1.0);
    assert!(
        (wc_change - explained).abs() <= 0.01 * scale,
        "water column change {} not explained by the registers {}",
        wc_change,
        explained
    );

    let _ = std::fs::remove_file(&mask);
    let _ = std::fs::remove_file(&elev);
}

/*
The total-solids slot equals the sum over classes everywhere, in the
water column and in the surface soil layer, at the end of the run.
 */
#[test]
fn test_total_solids_invariant() {
    let (mask, elev) = write_plane("tss");
    let deck = storm_deck(&mask, &elev);
    let mut sim = DeckIO::new().read_deck_string(&deck).unwrap();
    sim.configure().unwrap();
    sim.run().unwrap();

    let solids = sim.solids.as_ref().unwrap();
    let spec = &sim.basin.spec;
    for row in 0..spec.nrows {
        for col in 0..spec.ncols {
            if !sim.basin.mask.is_active(row, col) {
                continue;
            }
            let cell = spec.index(row, col);
            for layer in [WATER_COLUMN, sim.soil_stack.surface(cell)] {
                let total = solids.ov.csed.at(0, cell, layer);
                let sum = solids.ov.csed.at(1, cell, layer);
                let tol = 1.0e-6 * sum.abs().max(1.0e-12);
                assert!(
                    (total - sum).abs() <= tol,
                    "slot-0 total {} != class sum {} at cell {} layer {}",
                    total,
                    sum,
                    cell,
                    layer
                );
            }
        }
    }

    let _ = std::fs::remove_file(&mask);
    let _ = std::fs::remove_file(&elev);
}

/*
A dry run moves no sediment: without rain there is no flow, no
transport capacity, and every solids register stays at zero.
 */
#[test]
fn test_no_rain_no_transport() {
    let (mask, elev) = write_plane("quiet");
    let deck = storm_deck(&mask, &elev).replace(
        "RAINGAGE 1 250.0 250.0 NPAIRS 4
0.0 25.0
1.0 25.0
1.0 0.0
2.0 0.0",
        "RAINGAGE 1 250.0 250.0 NPAIRS 2
0.0 0.0
2.0 0.0",
    );
    let mut sim = DeckIO::new().read_deck_string(&deck).unwrap();
    sim.configure().unwrap();
    sim.run().unwrap();

    let solids = sim.solids.as_ref().unwrap();
    assert_eq!(solids.ov.ersmass.total(0), 0.0);
    assert_eq!(solids.ov.depmass.total(0), 0.0);
    for cell in 0..sim.basin.spec.ncells() {
        assert_eq!(solids.ov.csed.at(0, cell, WATER_COLUMN), 0.0);
    }

    let _ = std::fs::remove_file(&mask);
    let _ = std::fs::remove_file(&elev);
}
