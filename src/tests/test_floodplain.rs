use crate::domain::grid::DIR_FLOODPLAIN;
use crate::domain::{CellGrid, GridSpec};
use crate::io::deck::DeckIO;
use crate::io::grid_ascii::write_grid;

fn temp_file(name: &str) -> String {
    let mut p = std::env::temp_dir();
    p.push(format!("trex_fp_test_{}_{}", std::process::id(), name));
    p.to_string_lossy().into_owned()
}

//A single channel cell: flat 1x1 grid, one link with one node, a
//trapezoid 2 m wide with a 1 m bank.  The outlet slope is zero so the
//only active process is the floodplain transfer.
fn write_cell(tag: &str) -> (String, String, String, String) {
    let spec = GridSpec {
        nrows: 1,
        ncols: 1,
        w: 100.0,
        nodata: -9999.0,
        ..Default::default()
    };
    let mask = CellGrid::filled(1, 1, 2.0);
    let elev = CellGrid::filled(1, 1, 10.0);
    let mask_path = temp_file(&format!("{}_mask.asc", tag));
    let elev_path = temp_file(&format!("{}_elev.asc", tag));
    write_grid(&mask_path, &spec, &mask).unwrap();
    write_grid(&elev_path, &spec, &elev).unwrap();

    let link_path = temp_file(&format!("{}_links.dat", tag));
    std::fs::write(&link_path, "nlinks 1\n1 1\n1 1\n").unwrap();
    let chan_path = temp_file(&format!("{}_channel.dat", tag));
    std::fs::write(&chan_path, "nlinks 1\n1 1\n1 2.0 1.0 1.0 0.04 1.0 0.0\n").unwrap();

    (mask_path, elev_path, link_path, chan_path)
}

fn cell_deck(mask: &str, elev: &str, links: &str, chan: &str, fldopt: i32, hch0: f64, hov0: f64) -> String {
    format!(
        "GROUP A
KSIM 1
TSTART 0.0
TEND 0.016666667
DTOPT 0
NDT 1
60.0 0.016666667
PRINTOUT 1.0
END GROUP A
GROUP B
MASKFILE {mask}
ELEVATIONFILE {elev}
NLANDUSE 1
LANDUSE 1 floodplain 0.03 0.0
STORAGEDEPTHCONST 0.0
CHNOPT 1
FLDOPT {fldopt}
LINKFILE {links}
CHANNELFILE {chan}
HCH0CONST {hch0}
HOV0CONST {hov0}
OUTLETS 1
1 1 0.0 0
END GROUP B
GROUP E
END GROUP E
",
        mask = mask,
        elev = elev,
        links = links,
        chan = chan,
        fldopt = fldopt,
        hch0 = hch0,
        hov0 = hov0,
    )
}

/*
Bidirectional transfer, channel standing above its bank and a shallow
floodplain: after one step the two water surfaces equalize exactly,
weighted by their footprints.
 */
#[test]
fn test_overbank_spill_equalizes_surfaces() {
    let (mask, elev, links, chan) = write_cell("spill");
    let deck = cell_deck(&mask, &elev, &links, &chan, 1, 1.5, 0.1);
    let mut sim = DeckIO::new().read_deck_string(&deck).unwrap();
    sim.configure().unwrap();
    sim.run().unwrap();

    let hov = sim.ov.hov.at(0, 0);
    let hch = sim.ch.hch[0];
    assert!(hch > 1.0, "the channel should still stand above its bank");
    //water surface elevations relative to the top of bank
    let wse_ov = hov;
    let wse_ch = hch - 1.0;
    assert!(
        (wse_ov - wse_ch).abs() < 1e-6,
        "surfaces did not equalize: overland {} vs channel {}",
        wse_ov,
        wse_ch
    );
    //and the transfer was channel-to-overland
    assert!(sim.ov.dqovinvol.at(0, 0, DIR_FLOODPLAIN) > 0.0);
    assert_eq!(sim.ov.dqovoutvol.at(0, 0, DIR_FLOODPLAIN), 0.0);

    for f in [mask, elev, links, chan] {
        let _ = std::fs::remove_file(&f);
    }
}

/*
Unidirectional transfer never sends water from the channel to the
overland plane, no matter how far the channel stands above its bank.
 */
#[test]
fn test_unidirectional_never_reverses() {
    let (mask, elev, links, chan) = write_cell("oneway");
    let deck = cell_deck(&mask, &elev, &links, &chan, 0, 1.5, 0.1);
    let mut sim = DeckIO::new().read_deck_string(&deck).unwrap();
    sim.configure().unwrap();
    sim.run().unwrap();

    //all overland water dropped into the channel and none came back
    assert_eq!(sim.ov.dqovinvol.at(0, 0, DIR_FLOODPLAIN), 0.0);
    assert!(sim.ov.dqovoutvol.at(0, 0, DIR_FLOODPLAIN) > 0.0);
    assert!(sim.ov.hov.at(0, 0) < 1e-12);
    assert!(sim.ch.hch[0] > 1.5);

    for f in [mask, elev, links, chan] {
        let _ = std::fs::remove_file(&f);
    }
}

/*
With equal surfaces nothing moves in either direction.
 */
#[test]
fn test_no_transfer_at_equal_surfaces() {
    let (mask, elev, links, chan) = write_cell("equal");
    //channel 1.2 m deep = 0.2 m over bank, overland 0.2 m deep
    let deck = cell_deck(&mask, &elev, &links, &chan, 1, 1.2, 0.2);
    let mut sim = DeckIO::new().read_deck_string(&deck).unwrap();
    sim.configure().unwrap();
    sim.run().unwrap();

    assert_eq!(sim.ov.dqovinvol.at(0, 0, DIR_FLOODPLAIN), 0.0);
    assert_eq!(sim.ov.dqovoutvol.at(0, 0, DIR_FLOODPLAIN), 0.0);
    assert!((sim.ov.hov.at(0, 0) - 0.2).abs() < 1e-12);
    assert!((sim.ch.hch[0] - 1.2).abs() < 1e-9);

    for f in [mask, elev, links, chan] {
        let _ = std::fs::remove_file(&f);
    }
}
