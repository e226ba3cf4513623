use crate::domain::{CellGrid, GridSpec};
use crate::io::deck::DeckIO;
use crate::io::grid_ascii::write_grid;

fn temp_file(name: &str) -> String {
    let mut p = std::env::temp_dir();
    p.push(format!("trex_deck_test_{}_{}", std::process::id(), name));
    p.to_string_lossy().into_owned()
}

fn write_grids(tag: &str) -> (String, String) {
    let spec = GridSpec {
        nrows: 2,
        ncols: 2,
        w: 50.0,
        nodata: -9999.0,
        ..Default::default()
    };
    let mask = CellGrid::filled(2, 2, 1.0);
    let elev = CellGrid::filled(2, 2, 1.0);
    let mask_path = temp_file(&format!("{}_mask.asc", tag));
    let elev_path = temp_file(&format!("{}_elev.asc", tag));
    write_grid(&mask_path, &spec, &mask).unwrap();
    write_grid(&elev_path, &spec, &elev).unwrap();
    (mask_path, elev_path)
}

fn minimal_deck(mask: &str, elev: &str) -> String {
    format!(
        "# a minimal control deck
GROUP A
KSIM 1
TSTART 0.0
TEND 1.0
DTOPT 0
NDT 2
60.0 0.5
30.0 1.0
PRINTOUT 0.5
END GROUP A
GROUP B
MASKFILE {mask}
ELEVATIONFILE {elev}
NLANDUSE 1
LANDUSE 1 meadow 0.035 1.5
STORAGEDEPTHCONST 0.001
OUTLETS 1
1 2 0.005 0
END GROUP B
GROUP E
END GROUP E
",
        mask = mask,
        elev = elev,
    )
}

/*
A minimal deck parses into a configured simulation: options, the time
step table, the domain, and the outlet all land where they should.
 */
#[test]
fn test_minimal_deck_parses() {
    let (mask, elev) = write_grids("ok");
    let deck = minimal_deck(&mask, &elev);
    let sim = DeckIO::new().read_deck_string(&deck).unwrap();

    assert_eq!(sim.ctl.ksim, 1);
    assert_eq!(sim.ctl.tend, 3600.0);
    assert_eq!(sim.clock.dt_table, vec![60.0, 30.0]);
    assert_eq!(sim.clock.dttime, vec![1800.0, 3600.0]);
    assert_eq!(sim.basin.spec.nrows, 2);
    assert_eq!(sim.basin.spec.w, 50.0);
    assert_eq!(sim.basin.mask.count_active(), 4);
    assert_eq!(sim.basin.outlets.len(), 1);
    assert_eq!(sim.basin.outlets[0].row, 0);
    assert_eq!(sim.basin.outlets[0].col, 1);
    //interception arrives in metres
    assert!((sim.basin.landuse_classes[0].interception - 0.0015).abs() < 1e-12);

    let _ = std::fs::remove_file(&mask);
    let _ = std::fs::remove_file(&elev);
}

/*
An unknown record is rejected with the offending line.
 */
#[test]
fn test_unknown_record_names_the_line() {
    let (mask, elev) = write_grids("bad");
    let deck = minimal_deck(&mask, &elev).replace("PRINTOUT 0.5", "PRINTOUTX 0.5");
    let result = DeckIO::new().read_deck_string(&deck);
    assert!(result.is_err());
    let msg = result.err().unwrap();
    assert!(
        msg.contains("PRINTOUTX") && msg.contains("line"),
        "unexpected message: {}",
        msg
    );

    let _ = std::fs::remove_file(&mask);
    let _ = std::fs::remove_file(&elev);
}

/*
Auxiliary grids may only follow the mask: the mask defines the domain
every other grid is checked against.
 */
#[test]
fn test_mask_must_come_first() {
    let (mask, elev) = write_grids("order");
    let deck = minimal_deck(&mask, &elev).replace(
        &format!("MASKFILE {}\nELEVATIONFILE {}", mask, elev),
        &format!("ELEVATIONFILE {}\nMASKFILE {}", elev, mask),
    );
    let result = DeckIO::new().read_deck_string(&deck);
    assert!(result.is_err());
    let msg = result.err().unwrap();
    assert!(msg.contains("maskfile"), "unexpected message: {}", msg);

    let _ = std::fs::remove_file(&mask);
    let _ = std::fs::remove_file(&elev);
}

/*
A run without a time step table is rejected.
 */
#[test]
fn test_missing_time_steps_rejected() {
    let (mask, elev) = write_grids("nodt");
    let deck = minimal_deck(&mask, &elev).replace(
        "NDT 2
60.0 0.5
30.0 1.0
",
        "",
    );
    let result = DeckIO::new().read_deck_string(&deck);
    assert!(result.is_err());
    let msg = result.err().unwrap();
    assert!(msg.contains("time steps"), "unexpected message: {}", msg);

    let _ = std::fs::remove_file(&mask);
    let _ = std::fs::remove_file(&elev);
}

/*
Solids records are required once ksim asks for solids.
 */
#[test]
fn test_solids_level_requires_group_c() {
    let (mask, elev) = write_grids("noc");
    let deck = minimal_deck(&mask, &elev).replace("KSIM 1", "KSIM 2") + "";
    let result = DeckIO::new().read_deck_string(&deck);
    assert!(result.is_err());

    let _ = std::fs::remove_file(&mask);
    let _ = std::fs::remove_file(&elev);
}
