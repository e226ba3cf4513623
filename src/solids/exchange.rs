use crate::basin::Basin;
use crate::domain::grid::DIR_BOUNDARY;
use crate::domain::stack::WATER_COLUMN;
use crate::domain::StackSet;
use crate::solids::{DomainSolids, SolidsClass};
use crate::water::{ChannelWater, OverlandWater};

//Deposition and erosion between the water column and the surface
//layer of the bed.  Deposition settles at the class settling velocity
//over the wetted surface; erosion is driven by the transport capacity
//deficit (capacity minus the advective load actually leaving) and is
//bounded by the surface-layer inventory.  Both fluxes pass through
//the availability limiter with the other outgoing fluxes before the
//concentration update adopts them.

pub fn overland(
    basin: &Basin,
    soil_stack: &StackSet,
    water: &OverlandWater,
    solids: &mut DomainSolids,
    classes: &[SolidsClass],
    dt: f64,
) {
    let spec = &basin.spec;

    for row in 0..spec.nrows {
        for col in 0..spec.ncols {
            if !basin.mask.is_active(row, col) {
                continue;
            }
            let cell = spec.index(row, col);
            let ilayer = soil_stack.surface(cell);
            if ilayer == 0 {
                continue;
            }
            let aov = basin.overland_area(row, col);

            let mut deptotal = 0.0;
            let mut erstotal = 0.0;
            for (i, class) in classes.iter().enumerate() {
                let isolid = i + 1;

                //Deposition: settling over the wetted cell surface
                let c = solids.csed.at(isolid, cell, WATER_COLUMN);
                let dep = if water.hov.at(row, col) > 0.0 && c > 0.0 {
                    class.ws * aov * c
                } else {
                    0.0
                };

                //Erosion: the capacity deficit, bounded by the surface
                //layer inventory over this step
                let outgoing = {
                    let mut q = solids.advoutflux.at(isolid, cell, DIR_BOUNDARY);
                    for k in 1..=8 {
                        q += solids.advoutflux.at(isolid, cell, k);
                    }
                    q
                };
                let deficit = (solids.transcap.at(isolid, cell) - outgoing).max(0.0);
                let inventory =
                    solids.csed.at(isolid, cell, ilayer) * soil_stack.v[soil_stack.idx(cell, ilayer)];
                let ers = deficit.min(inventory / dt).max(0.0);

                solids.depflux.set(isolid, cell, dep);
                solids.ersflux.set(isolid, cell, ers);
                deptotal += dep;
                erstotal += ers;
            }
            solids.depflux.set(0, cell, deptotal);
            solids.ersflux.set(0, cell, erstotal);
        }
    }
}

pub fn channel(
    basin: &Basin,
    sed_stack: &StackSet,
    water: &ChannelWater,
    solids: &mut DomainSolids,
    classes: &[SolidsClass],
    dt: f64,
) {
    let net = match basin.channels.as_ref() {
        Some(net) => net,
        None => return,
    };

    for link in 0..net.nlinks {
        for node in 0..net.nnodes(link) {
            let n = net.node_index(link, node);
            let props = &net.props[n];
            let ilayer = sed_stack.surface(n);
            if ilayer == 0 {
                continue;
            }
            let h = water.hch[n];

            //water surface width bounded by the top width at bank
            let wsw = if h <= props.hbank {
                props.bwidth + 2.0 * props.sideslope * h
            } else {
                props.twidth
            };
            let asurf = wsw * props.chanlength;

            let mut deptotal = 0.0;
            let mut erstotal = 0.0;
            for (i, class) in classes.iter().enumerate() {
                let isolid = i + 1;
                let c = solids.csed.at(isolid, n, WATER_COLUMN);
                let dep = if h > 0.0 && c > 0.0 { class.ws * asurf * c } else { 0.0 };

                let outgoing = {
                    let mut q = solids.advoutflux.at(isolid, n, DIR_BOUNDARY);
                    for k in 1..=8 {
                        q += solids.advoutflux.at(isolid, n, k);
                    }
                    q
                };
                let deficit = (solids.transcap.at(isolid, n) - outgoing).max(0.0);
                let inventory =
                    solids.csed.at(isolid, n, ilayer) * sed_stack.v[sed_stack.idx(n, ilayer)];
                let ers = deficit.min(inventory / dt).max(0.0);

                solids.depflux.set(isolid, n, dep);
                solids.ersflux.set(isolid, n, ers);
                deptotal += dep;
                erstotal += ers;
            }
            solids.depflux.set(0, n, deptotal);
            solids.ersflux.set(0, n, erstotal);
        }
    }
}
