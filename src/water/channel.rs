use crate::basin::Basin;
use crate::clock::Clock;
use crate::control::SimControl;
use crate::domain::grid::{opposite, DIR_BOUNDARY, DIR_POINT};
use crate::forcing::ForcingSet;
use crate::water::ChannelWater;

/*
One-dimensional channel water routing over the dendritic link/node
network.  The friction slope between adjacent nodes is driven by the
bed elevation difference and the water surface slope, exactly as on
the overland plane but along the channel axis; the bed elevation is
the top of the node's sediment stack, so bed change feeds back into
the slopes.  Flow follows Manning's law on the trapezoidal section at
the donor node, with the over-bank rectangle above the bank height.

Node-to-node flow within a link, link-to-link flow at junctions, and
boundary flow at outlet nodes all pass through the same Manning
kernel; only the geometry of the receiving side differs.
 */
pub fn route(
    ctl: &SimControl,
    basin: &Basin,
    forcing: &ForcingSet,
    elevbed: &[f64],
    water: &mut ChannelWater,
    clock: &mut Clock,
) {
    let net = match basin.channels.as_ref() {
        Some(net) => net,
        None => return,
    };
    let dt = clock.current_dt();

    //Initialize the channel flow arrays for this time step
    for v in water.dqch.iter_mut() {
        *v = 0.0;
    }
    water.dqchin.clear();
    water.dqchout.clear();
    for v in water.sfch.iter_mut() {
        *v = 0.0;
    }
    for i in 0..water.qoutch.len() {
        water.qoutch[i] = 0.0;
        water.qinch[i] = 0.0;
    }

    //Assign external channel flow point sources
    for src in forcing.flows_ch.iter() {
        let n = net.node_index(src.link, src.node);
        let q = src.series.value;
        water.dqch[n] += q;
        water.dqchin.add(n, DIR_POINT, q);
    }

    //Route flow along each link and across junctions
    for link in 0..net.nlinks {
        let nnodes = net.nnodes(link);
        for node in 0..nnodes {
            let n = net.node_index(link, node);

            //The receiving node: the next node in the link, or the
            //first node of the downstream link at the link end
            let receiver = if node + 1 < nnodes {
                Some(net.node_index(link, node + 1))
            } else {
                net.downstream_link(link).map(|(d, _)| net.node_index(d, 0))
            };

            let Some(m) = receiver else {
                //link ends at the domain boundary; handled below
                continue;
            };
            let Some(dir) = net.outflow_direction(link, node) else {
                continue;
            };

            let pn = &net.props[n];
            let pm = &net.props[m];
            let len = 0.5 * (pn.chanlength + pm.chanlength);

            //Bed slope and water surface slope between the nodes
            let so = (elevbed[n] - elevbed[m]) / len;
            let dhdx = (water.hch[m] - water.hch[n]) / len;
            let sf = so - dhdx;

            if sf == 0.0 {
                continue;
            }

            //Donor-side geometry
            let (dn, props) = if sf > 0.0 { (n, pn) } else { (m, pm) };
            let heff = water.hch[dn] - props.deadstorage;
            if heff <= 0.0 {
                //store the slope for the solids computations even when
                //the depth cannot sustain flow
                water.sfch[dn] = sf.abs();
                continue;
            }

            let area = props.flow_area(heff);
            let wp = props.wetted_perimeter(heff);
            let rh = if wp > 0.0 { area / wp } else { 0.0 };
            let dq = area * libm::pow(rh, 2.0 / 3.0) * sf.abs().sqrt() / props.nmanning;

            water.sfch[dn] = sf.abs();
            if sf > 0.0 {
                water.dqch[n] -= dq;
                water.dqch[m] += dq;
                water.dqchout.set(n, dir, dq);
                water.dqchin.set(m, opposite(dir), dq);
            } else {
                water.dqch[m] -= dq;
                water.dqch[n] += dq;
                water.dqchout.set(m, opposite(dir), dq);
                water.dqchin.set(n, dir, dq);
            }
        }

        //Boundary flow at a link that ends without a downstream link
        if net.downstream_link(link).is_none() {
            let node = nnodes - 1;
            let n = net.node_index(link, node);
            let (row, col) = net.node_cell(link, node);
            let Some(outlet_no) = basin.outlet_at(row, col) else {
                continue;
            };
            let outlet = &basin.outlets[outlet_no - 1];
            let props = &net.props[n];

            //Boundary condition: normal depth, or a depth time series
            let mut hboundary = 0.0;
            let sf = if outlet.dbcopt == 0 {
                outlet.sovout
            } else {
                if let Some(bc) = forcing
                    .depth_bcs
                    .get(outlet_no - 1)
                    .and_then(|b| b.as_ref())
                {
                    hboundary = bc.value.max(0.0);
                }
                let dhdx = (hboundary - water.hch[n]) / props.chanlength;
                outlet.sovout - dhdx
            };

            if sf == 0.0 {
                continue;
            }

            let heff = if sf > 0.0 {
                water.hch[n] - props.deadstorage
            } else {
                hboundary
            };
            if heff <= 0.0 {
                water.sfch[n] = sf.abs();
                continue;
            }

            let area = props.flow_area(heff);
            let wp = props.wetted_perimeter(heff);
            let rh = if wp > 0.0 { area / wp } else { 0.0 };
            let dq = area * libm::pow(rh, 2.0 / 3.0) * sf.abs().sqrt() / props.nmanning;

            water.sfch[n] = sf.abs();
            if sf > 0.0 {
                water.dqch[n] -= dq;
                water.dqchout.set(n, DIR_BOUNDARY, dq);
                water.qoutch[outlet_no - 1] = dq;
            } else {
                water.dqch[n] += dq;
                water.dqchin.set(n, DIR_BOUNDARY, dq);
                water.qinch[outlet_no - 1] = dq;
            }
        }
    }

    //Track the maximum channel Courant number for adaptive stepping
    if ctl.dtopt > 0 {
        clock.maxcourant_ch = -1.0;
        for link in 0..net.nlinks {
            for node in 0..net.nnodes(link) {
                let n = net.node_index(link, node);
                let props = &net.props[n];
                let h = water.hch[n];
                if h <= 0.0 {
                    continue;
                }
                let area = props.flow_area(h);
                if area <= 0.0 {
                    continue;
                }
                let mut qout = water.dqchout.at(n, DIR_BOUNDARY);
                for k in 1..=8 {
                    qout += water.dqchout.at(n, k);
                }
                let velocity = qout / area;
                let courant = velocity * dt / props.chanlength;
                if courant > clock.maxcourant_ch {
                    clock.maxcourant_ch = courant;
                }
            }
        }
    }
}
