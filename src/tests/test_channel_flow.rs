use crate::domain::grid::DIR_E;
use crate::domain::{CellGrid, GridSpec};
use crate::io::deck::DeckIO;
use crate::io::grid_ascii::write_grid;
use crate::mass_balance;

fn temp_file(name: &str) -> String {
    let mut p = std::env::temp_dir();
    p.push(format!("trex_channel_test_{}_{}", std::process::id(), name));
    p.to_string_lossy().into_owned()
}

//A single 5-node link running west to east across a 1x5 grid of
//100 m channel cells, bed slope 0.002.
fn write_network(tag: &str) -> (String, String, String, String) {
    let spec = GridSpec {
        nrows: 1,
        ncols: 5,
        w: 100.0,
        nodata: -9999.0,
        ..Default::default()
    };
    let mask = CellGrid::filled(1, 5, 2.0);
    let mut elev = CellGrid::filled(1, 5, 0.0);
    for col in 0..5 {
        elev.set(0, col, (4 - col) as f64 * 0.2); //0.002 slope at w = 100
    }
    let mask_path = temp_file(&format!("{}_mask.asc", tag));
    let elev_path = temp_file(&format!("{}_elev.asc", tag));
    write_grid(&mask_path, &spec, &mask).unwrap();
    write_grid(&elev_path, &spec, &elev).unwrap();

    let link_path = temp_file(&format!("{}_links.dat", tag));
    std::fs::write(
        &link_path,
        "nlinks 1\n1 5\n1 1\n1 2\n1 3\n1 4\n1 5\n",
    )
    .unwrap();

    let chan_path = temp_file(&format!("{}_channel.dat", tag));
    let mut chan = String::from("nlinks 1\n1 5\n");
    for node in 1..=5 {
        //node bwidth sideslope hbank nmanning sinuosity deadstorage
        chan.push_str(&format!("{} 2.0 1.0 1.0 0.04 1.0 0.0\n", node));
    }
    std::fs::write(&chan_path, chan).unwrap();

    (mask_path, elev_path, link_path, chan_path)
}

fn channel_deck(mask: &str, elev: &str, links: &str, chan: &str) -> String {
    format!(
        "GROUP A
KSIM 1
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
LANDUSE 1 valley 0.03 0.0
STORAGEDEPTHCONST 0.0
CHNOPT 1
LINKFILE {links}
CHANNELFILE {chan}
OUTLETS 1
1 5 0.002 0
QWCH 1
1 1 NPAIRS 2
0.0 1.0
10.0 1.0
END GROUP B
GROUP E
END GROUP E
",
        mask = mask,
        elev = elev,
        links = links,
        chan = chan,
    )
}

/*
A constant upstream inflow reaches steady state: the outlet passes the
inflow rate at every interior node, and the flow depth settles near
the uniform-flow depth for the section (about 0.6 m for 1 m3/s in this
trapezoid).
 */
#[test]
fn test_steady_flow_reaches_outlet() {
    let (mask, elev, links, chan) = write_network("steady");
    let deck = channel_deck(&mask, &elev, &links, &chan);
    let mut sim = DeckIO::new().read_deck_string(&deck).unwrap();
    sim.configure().unwrap();
    sim.run().unwrap();

    //the outlet discharge matches the upstream inflow
    let qout = sim.ch.qoutch[0];
    assert!(
        (qout - 1.0).abs() < 0.05,
        "outlet flow {} is not the steady inflow",
        qout
    );

    //interior node-to-node flows carry the same rate
    let net = sim.basin.channels.as_ref().unwrap();
    for node in 0..4 {
        let n = net.node_index(0, node);
        let q = sim.ch.dqchout.at(n, DIR_E);
        assert!(
            (q - 1.0).abs() < 0.08,
            "node {} passes {} m3/s at steady state",
            node + 1,
            q
        );
    }

    //depth near the uniform-flow value
    let mid = net.node_index(0, 2);
    let h = sim.ch.hch[mid];
    assert!(
        (0.45..=0.75).contains(&h),
        "steady depth {} is far from the uniform-flow depth",
        h
    );

    //the water balance closes
    let balance = mass_balance::water_balance(&sim.basin, &sim.hyd, &sim.ov, Some(&sim.ch));
    assert!(
        balance.error_percent.abs() < 0.1,
        "water balance error {} %",
        balance.error_percent
    );
    //inflow volume = 1 m3/s for 2 hours
    assert!((balance.point_sources - 7200.0).abs() < 1.0);

    for f in [mask, elev, links, chan] {
        let _ = std::fs::remove_file(&f);
    }
}

/*
The derived network topology: a single straight link has no branches,
its outflow directions follow the cell walk, and the reverse cell map
finds every node.
 */
#[test]
fn test_network_topology() {
    let (mask, elev, links, chan) = write_network("topo");
    let deck = channel_deck(&mask, &elev, &links, &chan);
    let sim = DeckIO::new().read_deck_string(&deck).unwrap();

    let net = sim.basin.channels.as_ref().unwrap();
    assert_eq!(net.nlinks, 1);
    assert_eq!(net.nnodes(0), 5);
    assert!(net.downstream_link(0).is_none());
    assert!(net.upstream_links(0).is_empty());
    for node in 0..4 {
        assert_eq!(net.outflow_direction(0, node), Some(DIR_E));
    }
    assert_eq!(net.outflow_direction(0, 4), None);
    for col in 0..5 {
        assert_eq!(net.at_cell(0, col), Some((0, col)));
    }

    for f in [mask, elev, links, chan] {
        let _ = std::fs::remove_file(&f);
    }
}
