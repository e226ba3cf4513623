use crate::basin::Basin;
use crate::control::SimControl;
use crate::domain::grid::{DIR_E, DIR_FLOODPLAIN, DIR_N, DIR_S, DIR_W};
use crate::hydrology::HydrologyState;
use crate::water::{ChannelWater, OverlandWater};

/*
Water transfer between the overland and channel portions of channel
cells, run after both routing sweeps so the gross outflows of the step
are known.

With unidirectional transfer all overland water in excess of the
depression storage (after this step's infiltration and gross outflow
are taken out) drops into the channel.  With bidirectional transfer
the direction follows the water surface elevations: the overland plane
fills the channel to the top of bank and any remainder equalizes the
two surfaces weighted by their footprints; a channel standing above
its bank spills back onto the plane the same way.
 */
pub fn transfer(
    ctl: &SimControl,
    basin: &Basin,
    hyd: &HydrologyState,
    ov: &mut OverlandWater,
    ch: &mut ChannelWater,
    dt: f64,
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

            let lch = props.chanlength;
            let twch = props.twidth;
            let achsurf = twch * lch; //surface area of the channel (m2)
            let aov = (w * w - achsurf).max(0.0); //overland part of the cell

            let scell = basin.storagedepth.at(row, col);

            //Cell infiltration depth (not available for transfer) (m)
            let icell = if ctl.infopt > 0 {
                hyd.infilrate.at(row, col) * dt
            } else {
                0.0
            };

            //Cell gross outflow depth (not available for transfer) (m)
            let qcell = if aov > 0.0 {
                ov.dqovout.sum(row, col, &[DIR_N, DIR_E, DIR_S, DIR_W]) / aov * dt
            } else {
                0.0
            };

            //Effective overland depth for floodplain transfer (m)
            let mut hcell = ov.hov.at(row, col) - icell - qcell;
            if hcell < 0.0 {
                hcell = 0.0;
            }

            if ctl.fldopt == 0 {
                //Unidirectional: overland to channel only
                if hcell > scell {
                    let vtransfer = (hcell - scell) * aov;
                    apply_overland_to_channel(ov, ch, row, col, n, vtransfer, dt);
                } else {
                    zero_transfer(ov, ch, row, col, n);
                }
                continue;
            }

            //Bidirectional: compare water surface elevations.
            //
            //The effective channel volume takes out this step's gross
            //outflow and transmission loss.
            let bwch = props.bwidth;
            let hbch = props.hbank;
            let vchbank = props.volume_at_bank();

            let tloss = if ctl.ctlopt > 0 {
                hyd.tlossrate[n] * bwch * lch * dt
            } else {
                0.0
            };
            let mut qnode = 0.0;
            for k in 1..=8 {
                qnode += ch.dqchout.at(n, k);
            }
            let qnode = qnode * dt;

            let mut vch = props.volume(ch.hch[n]) - tloss - qnode;
            if vch < 0.0 {
                vch = 0.0;
            }

            //Effective channel depth from the effective volume
            let hnode = props.depth_from_volume(vch);

            //Available (unfilled) channel volume to the top of bank
            let vchavail = if hnode < hbch { vchbank - vch } else { 0.0 };

            //Water surface elevations relative to the top of bank
            let wseov = hcell;
            let wsech = hnode - hbch;

            if hcell > scell && wseov > wsech {
                //Case 1: overland plane drains into the channel
                let vtransfer = if hnode < hbch {
                    //Case 1a: fill toward the top of bank, then level
                    //the remainder over the overland footprint
                    let vcell = (hcell - scell) * aov;
                    if vcell <= vchavail {
                        vcell
                    } else {
                        vchavail + (vcell - vchavail) * (1.0 - achsurf / (w * w))
                    }
                } else {
                    //Case 1b: the channel is already over bank; level
                    //the two surfaces
                    ((hcell - scell) - (hnode - hbch)) * aov * (1.0 - aov / (w * w))
                };
                apply_overland_to_channel(ov, ch, row, col, n, vtransfer, dt);
            } else if wsech > wseov {
                //Case 2: the channel spills onto the overland plane
                let vtransfer = ((hnode - hbch) - hcell) * achsurf * (1.0 - achsurf / (w * w));
                apply_channel_to_overland(ov, ch, row, col, n, vtransfer, dt);
            } else {
                //Case 3: equal surfaces, nothing to transfer
                zero_transfer(ov, ch, row, col, n);
            }
        }
    }
}

fn apply_overland_to_channel(
    ov: &mut OverlandWater,
    ch: &mut ChannelWater,
    row: usize,
    col: usize,
    n: usize,
    vtransfer: f64,
    dt: f64,
) {
    let q = vtransfer / dt;
    ch.dqchin.set(n, DIR_FLOODPLAIN, q);
    ch.dqchout.set(n, DIR_FLOODPLAIN, 0.0);
    ch.dqch[n] += q;
    ov.dqovin.set(row, col, DIR_FLOODPLAIN, 0.0);
    ov.dqovout.set(row, col, DIR_FLOODPLAIN, q);
    *ov.dqov.at_mut(row, col) -= q;
}

fn apply_channel_to_overland(
    ov: &mut OverlandWater,
    ch: &mut ChannelWater,
    row: usize,
    col: usize,
    n: usize,
    vtransfer: f64,
    dt: f64,
) {
    let q = vtransfer / dt;
    ch.dqchin.set(n, DIR_FLOODPLAIN, 0.0);
    ch.dqchout.set(n, DIR_FLOODPLAIN, q);
    ch.dqch[n] -= q;
    ov.dqovin.set(row, col, DIR_FLOODPLAIN, q);
    ov.dqovout.set(row, col, DIR_FLOODPLAIN, 0.0);
    *ov.dqov.at_mut(row, col) += q;
}

fn zero_transfer(ov: &mut OverlandWater, ch: &mut ChannelWater, row: usize, col: usize, n: usize) {
    ch.dqchin.set(n, DIR_FLOODPLAIN, 0.0);
    ch.dqchout.set(n, DIR_FLOODPLAIN, 0.0);
    ov.dqovin.set(row, col, DIR_FLOODPLAIN, 0.0);
    ov.dqovout.set(row, col, DIR_FLOODPLAIN, 0.0);
}
