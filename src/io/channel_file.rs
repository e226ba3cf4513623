use crate::domain::{ChannelNetwork, GridSpec};
use crate::io::scanner::TokenScanner;

//Channel network files.  The link file declares the network topology
//as a node walk (grid cells per node, in downstream order); the
//channel properties file carries the trapezoidal geometry per node.
//Both files must list links sequentially from 1 and agree with each
//other on node counts.

/// Read the link file: `nlinks N`, then for each link a
/// `<link_id> <nnodes>` record followed by `<row> <col>` records per
/// node (1-based grid references, in downstream order).
pub fn read_link_file(filename: &str, spec: &GridSpec) -> Result<ChannelNetwork, String> {
    println!("Reading channel link file: {}", filename);
    let mut scan = TokenScanner::open(filename)?;

    scan.expect("nlinks")?;
    let nlinks = scan.next_usize("number of links")?;
    if nlinks == 0 {
        return Err(scan.error("a channel network needs at least one link"));
    }

    //First pass collects node counts and cells
    let mut nnodes = Vec::with_capacity(nlinks);
    let mut cells: Vec<(usize, usize)> = Vec::new();
    for link in 0..nlinks {
        let link_id = scan.next_usize("link number")?;
        //links must appear in sequential order from 1
        if link_id != link + 1 {
            return Err(scan.error(&format!(
                "link read = {} but link expected = {}",
                link_id,
                link + 1
            )));
        }
        let count = scan.next_usize("number of nodes")?;
        if count == 0 {
            return Err(scan.error(&format!("link {} has no nodes", link_id)));
        }
        nnodes.push(count);
        for _ in 0..count {
            let row = scan.next_usize("node row")?;
            let col = scan.next_usize("node column")?;
            if row == 0 || col == 0 || row > spec.nrows || col > spec.ncols {
                return Err(scan.error(&format!(
                    "node cell ({}, {}) is outside the {} x {} grid",
                    row, col, spec.nrows, spec.ncols
                )));
            }
            cells.push((row - 1, col - 1));
        }
    }

    let mut net = ChannelNetwork::new(spec, &nnodes);
    let mut flat = 0;
    for link in 0..nlinks {
        for node in 0..nnodes[link] {
            let n = net.node_index(link, node);
            net.node_row[n] = cells[flat].0;
            net.node_col[n] = cells[flat].1;
            flat += 1;
        }
    }
    net.connect()?;
    Ok(net)
}

/// Read the channel properties file onto an existing network:
/// `nlinks N`, then per link `<link_id> <nnodes>` followed by per-node
/// records `<node_id> <bwidth> <sideslope> <hbank> <nmanning>
/// <sinuosity> <deadstorage>`.
pub fn read_channel_file(
    filename: &str,
    spec: &GridSpec,
    elevation: &crate::domain::CellGrid<f64>,
    net: &mut ChannelNetwork,
) -> Result<(), String> {
    println!("Reading channel properties file: {}", filename);
    let mut scan = TokenScanner::open(filename)?;

    scan.expect("nlinks")?;
    let chanlinks = scan.next_usize("number of links")?;
    if chanlinks != net.nlinks {
        return Err(scan.error(&format!(
            "chanlinks = {} but nlinks = {}",
            chanlinks, net.nlinks
        )));
    }

    for link in 0..net.nlinks {
        let link_id = scan.next_usize("link number")?;
        if link_id != link + 1 {
            return Err(scan.error(&format!(
                "link read = {} but link expected = {}",
                link_id,
                link + 1
            )));
        }
        let channodes = scan.next_usize("number of nodes")?;
        if channodes != net.nnodes(link) {
            return Err(scan.error(&format!(
                "link = {}: channodes = {} but nnodes = {}",
                link_id,
                channodes,
                net.nnodes(link)
            )));
        }

        for node in 0..net.nnodes(link) {
            let node_id = scan.next_usize("node number")?;
            if node_id != node + 1 {
                return Err(scan.error(&format!(
                    "link {}: node read = {} but node expected = {}",
                    link_id,
                    node_id,
                    node + 1
                )));
            }
            let n = net.node_index(link, node);
            let (row, col) = net.node_cell(link, node);

            let bwidth = scan.next_f64("bottom width")?;
            let sideslope = scan.next_f64("side slope")?;
            let hbank = scan.next_f64("bank height")?;
            let nmanning = scan.next_f64("Manning n")?;
            let sinuosity = scan.next_f64("sinuosity")?;
            let deadstorage = scan.next_f64("dead storage depth")?;
            if bwidth <= 0.0 && sideslope <= 0.0 {
                return Err(scan.error(&format!(
                    "link {} node {}: channel must have width or side slope",
                    link_id, node_id
                )));
            }

            let props = &mut net.props[n];
            props.bwidth = bwidth;
            props.sideslope = sideslope;
            props.hbank = hbank;
            props.nmanning = nmanning;
            props.sinuosity = sinuosity;
            props.deadstorage = deadstorage;
            props.chanlength = spec.w * sinuosity;
            //derived top width at the top of bank
            props.twidth = bwidth + 2.0 * sideslope * hbank;
            //the channel bed sits one bank height below the ground
            props.elevbed0 = elevation.at(row, col) - hbank;

            //the channel footprint must leave an overland part
            if props.surface_area() >= spec.w * spec.w {
                return Err(scan.error(&format!(
                    "link {} node {}: channel surface {} m2 fills the {} m2 cell",
                    link_id,
                    node_id,
                    props.surface_area(),
                    spec.w * spec.w
                )));
            }
        }
    }

    Ok(())
}
