use crate::basin::Basin;
use crate::domain::grid::{opposite, DIR_E, DIR_FLOODPLAIN, DIR_S};
use crate::domain::stack::WATER_COLUMN;
use crate::solids::{DomainSolids, GRAVITY};
use crate::water::{ChannelWater, OverlandWater};

//Longitudinal and transverse dispersion coefficients as multiples of
//the depth-friction velocity product (Julien)
const E_LONGITUDINAL: f64 = 250.0;
const E_TRANSVERSE: f64 = 0.6;

/*
Overland dispersion between a cell and its cardinal neighbours, and
transverse dispersion across the floodplain interface of channel
cells.  Each interior face is visited once (south and east from every
cell); the dispersive flux follows the concentration gradient through

    flow = E * mixarea / mixlength,   flux = flow * (c_high - c_low)

with E = 250 h u* along the flow path and u* = sqrt(g h sf) from the
directional friction slope.  Diagonal overland dispersion is not
modelled.
 */
pub fn overland(
    basin: &Basin,
    water: &OverlandWater,
    solids: &mut DomainSolids,
    nsolids: usize,
) {
    let spec = &basin.spec;
    let w = spec.w;

    for row in 0..spec.nrows {
        for col in 0..spec.ncols {
            if !basin.mask.is_active(row, col) {
                continue;
            }
            let cell = spec.index(row, col);

            for dir in [DIR_E, DIR_S] {
                let Some((rr, cc)) = spec.neighbor(row, col, dir) else {
                    continue;
                };
                if !basin.mask.is_active(rr, cc) {
                    continue;
                }
                let adj = spec.index(rr, cc);

                let h = water.hov.at(row, col);
                let hadj = water.hov.at(rr, cc);
                let havg = 0.5 * (h + hadj);
                if havg <= 0.0 {
                    continue;
                }

                //The friction slope for the face is stored on the
                //donor side; take whichever side carries it
                let sf = water
                    .sfov
                    .at(row, col, dir)
                    .max(water.sfov.at(rr, cc, opposite(dir)));
                if sf <= 0.0 {
                    continue;
                }

                let ustar = (GRAVITY * havg * sf).sqrt();
                let elong = E_LONGITUDINAL * havg * ustar;
                //mixing area is the mean cross-section between cells
                let mixarea = havg * w;
                let flow = elong * mixarea / w;

                for isolid in 1..=nsolids {
                    let c = solids.csed.at(isolid, cell, WATER_COLUMN);
                    let cadj = solids.csed.at(isolid, adj, WATER_COLUMN);
                    let flux = flow * (c - cadj);
                    if flux > 0.0 {
                        //mass moves from the cell to the neighbour
                        solids.dspoutflux.add(isolid, cell, dir, flux);
                        solids.dspoutflux.add(0, cell, dir, flux);
                    } else if flux < 0.0 {
                        solids.dspoutflux.add(isolid, adj, opposite(dir), -flux);
                        solids.dspoutflux.add(0, adj, opposite(dir), -flux);
                    }
                }
            }
        }
    }
}

/*
Longitudinal dispersion along the channel, between consecutive nodes
of a link and across link junctions.  Same kernel as the overland
plane with the channel geometry: the mixing area is the mean flow
area of the two nodes and the mixing length the mean node length.
 */
pub fn channel(
    basin: &Basin,
    water: &ChannelWater,
    solids: &mut DomainSolids,
    nsolids: usize,
) {
    let net = match basin.channels.as_ref() {
        Some(net) => net,
        None => return,
    };

    for link in 0..net.nlinks {
        let nnodes = net.nnodes(link);
        for node in 0..nnodes {
            let n = net.node_index(link, node);
            let receiver = if node + 1 < nnodes {
                Some(net.node_index(link, node + 1))
            } else {
                net.downstream_link(link).map(|(d, _)| net.node_index(d, 0))
            };
            let Some(m) = receiver else {
                continue;
            };
            let Some(dir) = net.outflow_direction(link, node) else {
                continue;
            };

            let pn = &net.props[n];
            let pm = &net.props[m];
            let havg = 0.5 * (water.hch[n] + water.hch[m]);
            if havg <= 0.0 {
                continue;
            }
            let sf = water.sfch[n].max(water.sfch[m]).abs();
            if sf <= 0.0 {
                continue;
            }

            let ustar = (GRAVITY * havg * sf).sqrt();
            let elong = E_LONGITUDINAL * havg * ustar;
            let mixarea = 0.5 * (pn.flow_area(water.hch[n]) + pm.flow_area(water.hch[m]));
            let mixlength = 0.5 * (pn.chanlength + pm.chanlength);
            let flow = elong * mixarea / mixlength;

            for isolid in 1..=nsolids {
                let c = solids.csed.at(isolid, n, WATER_COLUMN);
                let cadj = solids.csed.at(isolid, m, WATER_COLUMN);
                let flux = flow * (c - cadj);
                if flux > 0.0 {
                    solids.dspoutflux.add(isolid, n, dir, flux);
                    solids.dspoutflux.add(0, n, dir, flux);
                } else if flux < 0.0 {
                    solids.dspoutflux.add(isolid, m, opposite(dir), -flux);
                    solids.dspoutflux.add(0, m, opposite(dir), -flux);
                }
            }
        }
    }
}

/*
Transverse dispersion between the channel water column and the
overland water column of the same cell.  The exchange only operates
when the channel stands above its bank so the two water bodies share
an interface; the mixing area is the channel length times the mean of
the overland depth and the over-bank depth, over half a cell width.
 */
pub fn floodplain(
    basin: &Basin,
    ov_water: &OverlandWater,
    ch_water: &ChannelWater,
    ov: &mut DomainSolids,
    ch: &mut DomainSolids,
    nsolids: usize,
) {
    let net = match basin.channels.as_ref() {
        Some(net) => net,
        None => return,
    };
    let w = basin.spec.w;

    for link in 0..net.nlinks {
        for node in 0..net.nnodes(link) {
            let n = net.node_index(link, node);
            let props = &net.props[n];
            let (row, col) = net.node_cell(link, node);
            let cell = basin.spec.index(row, col);

            let hover = ch_water.hch[n] - props.hbank;
            if hover <= 0.0 {
                continue;
            }
            let hcell = ov_water.hov.at(row, col);
            let havg = 0.5 * (hover + hcell);
            if havg <= 0.0 {
                continue;
            }
            let sf = ch_water.sfch[n].abs();
            if sf <= 0.0 {
                continue;
            }

            let ustar = (GRAVITY * havg * sf).sqrt();
            let etrans = E_TRANSVERSE * havg * ustar;
            let mixarea = props.chanlength * havg;
            let mixlength = 0.5 * w;
            let flow = etrans * mixarea / mixlength;

            for isolid in 1..=nsolids {
                let cch = ch.csed.at(isolid, n, WATER_COLUMN);
                let cov = ov.csed.at(isolid, cell, WATER_COLUMN);
                let flux = flow * (cch - cov);
                if flux > 0.0 {
                    ch.dspoutflux.add(isolid, n, DIR_FLOODPLAIN, flux);
                    ch.dspoutflux.add(0, n, DIR_FLOODPLAIN, flux);
                } else if flux < 0.0 {
                    ov.dspoutflux.add(isolid, cell, DIR_FLOODPLAIN, -flux);
                    ov.dspoutflux.add(0, cell, DIR_FLOODPLAIN, -flux);
                }
            }
        }
    }
}
