use crate::chemical::{kinetics, ChemClass};
use crate::domain::stack::LayerConc;
use crate::domain::{CellGrid, GridSpec};
use crate::io::deck::DeckIO;
use crate::io::grid_ascii::write_grid;
use crate::mass_balance;

/*
The dissolved and bound fractions always sum to one, whatever the
suspended load looks like.
 */
#[test]
fn test_partition_fractions_sum_to_one() {
    let chem = ChemClass {
        kp: vec![0.0, 0.001, 0.0005],
        ..Default::default()
    };
    let mut csed = LayerConc::zeroed(2, 1, 2);
    csed.set(1, 0, 0, 800.0);
    csed.set(2, 0, 0, 1500.0);
    csed.refresh_total(0, 0);

    let fdis = chem.dissolved_fraction(&csed, 0, 0);
    let fb1 = chem.bound_fraction(&csed, 0, 0, 1);
    let fb2 = chem.bound_fraction(&csed, 0, 0, 2);
    assert!(fdis > 0.0 && fdis < 1.0);
    assert!(
        (fdis + fb1 + fb2 - 1.0).abs() < 1e-12,
        "fractions sum to {}",
        fdis + fb1 + fb2
    );

    //with no solids everything is dissolved
    let clean = LayerConc::zeroed(2, 1, 2);
    assert_eq!(chem.dissolved_fraction(&clean, 0, 0), 1.0);
}

/*
First-order losses are bounded by the available mass, and the bed
phase sees neither photolysis nor volatilization.
 */
#[test]
fn test_kinetic_losses_bounded() {
    let chem = ChemClass {
        kbio: 1.0e-4,
        kvol: 1.0e-4,
        kpht: 1.0e-4,
        theta: 0.0,
        ..Default::default()
    };

    let mut mass = 1000.0;
    let losses = kinetics::apply_losses(&chem, &mut mass, 20.0, 600.0, true);
    assert!(mass > 0.0 && mass < 1000.0);
    assert!(losses[kinetics::BIOLYSIS] > 0.0);
    assert!(losses[kinetics::VOLATILIZATION] > 0.0);

    //a huge step cannot drive the mass negative
    let mut mass = 1000.0;
    kinetics::apply_losses(&chem, &mut mass, 20.0, 1.0e9, true);
    assert!(mass >= 0.0);

    //bed mass: photolysis and volatilization are masked off
    let mut mass = 1000.0;
    let losses = kinetics::apply_losses(&chem, &mut mass, 20.0, 600.0, false);
    assert_eq!(losses[kinetics::PHOTOLYSIS], 0.0);
    assert_eq!(losses[kinetics::VOLATILIZATION], 0.0);
    assert!(losses[kinetics::BIOLYSIS] > 0.0);
}

/*
Temperature correction: rates grow with temperature for theta > 1.
 */
#[test]
fn test_temperature_correction() {
    let chem = ChemClass {
        kbio: 1.0e-5,
        theta: 1.07,
        ..Default::default()
    };
    let cold = chem.corrected(chem.kbio, 10.0);
    let warm = chem.corrected(chem.kbio, 30.0);
    assert!(cold < chem.kbio);
    assert!(warm > chem.kbio);
}

fn temp_file(name: &str) -> String {
    let mut p = std::env::temp_dir();
    p.push(format!("trex_chem_test_{}_{}", std::process::id(), name));
    p.to_string_lossy().into_owned()
}

/*
A short run with a volatile chemical standing in ponded water: the
volatilization register fills, and the chemical budget closes within
1 percent.
 */
#[test]
fn test_chemical_run_budget() {
    let spec = GridSpec {
        nrows: 3,
        ncols: 3,
        w: 100.0,
        nodata: -9999.0,
        ..Default::default()
    };
    let mask = CellGrid::filled(3, 3, 1.0);
    let mut elev = CellGrid::filled(3, 3, 0.0);
    for row in 0..3 {
        for col in 0..3 {
            elev.set(row, col, (2 - col) as f64 * 1.0);
        }
    }
    let mask_path = temp_file("mask.asc");
    let elev_path = temp_file("elev.asc");
    write_grid(&mask_path, &spec, &mask).unwrap();
    write_grid(&elev_path, &spec, &elev).unwrap();

    let deck = format!(
        "GROUP A
KSIM 3
TSTART 0.0
TEND 1.0
DTOPT 0
NDT 1
30.0 1.0
PRINTOUT 1.0
END GROUP A
GROUP B
MASKFILE {mask}
ELEVATIONFILE {elev}
NLANDUSE 1
LANDUSE 1 field 0.03 0.0
STORAGEDEPTHCONST 0.0
NSOILS 1
SOIL 1 loam 0.0 0.0 0.0 0.45
HOV0CONST 0.02
OUTLETS 1
2 3 0.01 0
END GROUP B
GROUP C
NSOLIDS 1
SOLID 1 silt 0.00003 2.65 0.0001 10.0
LANDUSETRANSPORT 1 150000000.0 1.0 1.0 2.035 1.66 0.0
SOILERODE 1 0.3 0.0001
GSD 1 1.0
SOILSTACK 1 0.5
END GROUP C
GROUP D
NCHEMS 1
CHEM 1 solvent 0.0 0.0 0.0 0.0 0.0 0.0001 0.0 0.0 0.0
KP 1 0.0001
CCHEMOV0CONST 1 100.0
END GROUP D
GROUP E
END GROUP E
",
        mask = mask_path,
        elev = elev_path,
    );

    let mut sim = DeckIO::new().read_deck_string(&deck).unwrap();
    sim.configure().unwrap();
    sim.run().unwrap();

    let chems = sim.chems.as_ref().unwrap();
    assert!(
        chems.ov.volmass.total(1) > 0.0,
        "nothing volatilized from standing water"
    );

    let vols = sim.current_volumes_ov();
    let (b, transformed) = mass_balance::chem_budget(
        chems,
        &sim.soil_stack,
        None,
        &vols,
        None,
        1,
    );
    assert!(transformed > 0.0);
    assert!(
        b.error_percent.abs() < 1.0,
        "chemical balance error {} %",
        b.error_percent
    );

    let _ = std::fs::remove_file(&mask_path);
    let _ = std::fs::remove_file(&elev_path);
}
