use crate::basin::Basin;
use crate::clock::Clock;
use crate::control::SimControl;
use crate::domain::grid::{
    opposite, DIR_BOUNDARY, DIR_E, DIR_N, DIR_POINT, DIR_S, DIR_W, MASK_CHANNEL,
};
use crate::forcing::ForcingSet;
use crate::hydrology::HydrologyState;
use crate::water::OverlandWater;

//Manning depth exponent for overland flow
const BETA: f64 = 5.0 / 3.0;

/*
Explicit two-dimensional overland water routing using the diffusive
wave approximation.

Every interior cell face is visited once per step through a two-pass
pair sweep: each cell pairs with its neighbour to the south and to the
east, and the order of the two pairings alternates between steps so
the row-major scan does not bias the solution in one direction.  The
friction slope between a pair of cells selects the donor; flow follows
Manning's resistance law on the depth in excess of the depression
storage and the depth committed to infiltration this step.
 */
pub fn route(
    ctl: &SimControl,
    basin: &Basin,
    forcing: &ForcingSet,
    hyd: &HydrologyState,
    water: &mut OverlandWater,
    clock: &mut Clock,
) {
    let spec = &basin.spec;
    let w = spec.w;
    let dt = clock.current_dt();

    //Initialize the overland flow arrays for this time step
    water.dqov.fill(0.0);
    water.dqovin.clear();
    water.dqovout.clear();
    water.sfov.clear();
    for i in 0..water.qoutov.len() {
        water.qoutov[i] = 0.0;
        water.qinov[i] = 0.0;
    }

    //Assign external overland flow point sources.  Flows from several
    //sources to one cell simply sum; the gross inflow register does
    //not track sources separately.
    for src in forcing.flows_ov.iter() {
        let q = src.series.value;
        *water.dqov.at_mut(src.row, src.col) += q;
        water.dqovin.add(src.row, src.col, DIR_POINT, q);
    }

    //Compute cell-to-cell flows over the interior faces
    for row in 0..spec.nrows {
        for col in 0..spec.ncols {
            if !basin.mask.is_active(row, col) {
                continue;
            }

            //Pair sweep: each cell visits its south and east faces.
            //For even iterations the south face goes first; for odd
            //iterations the east face goes first.
            for k in [-1i64, 0] {
                let (rr, cc) = if clock.iteration == 0 {
                    ((row as i64 - k), (col as i64 + k + 1))
                } else {
                    ((row as i64 + k + 1), (col as i64 - k))
                };
                if rr < 0 || cc < 0 || rr >= spec.nrows as i64 || cc >= spec.ncols as i64 {
                    continue;
                }
                let (rr, cc) = (rr as usize, cc as usize);
                if !basin.mask.is_active(rr, cc) {
                    continue;
                }

                //Ground slope and water surface slope between the cells
                let so = (basin.elevation.at(row, col) - basin.elevation.at(rr, cc)) / w;
                let dhdx = (water.hov.at(rr, cc) - water.hov.at(row, col)) / w;
                let sf = so - dhdx;

                //Store the friction slope by direction for the solids
                //transport computations (direction of the donor face)
                let (fwd, _rev) = if row == rr {
                    (DIR_E, DIR_W)
                } else {
                    (DIR_S, DIR_N)
                };
                if sf >= 0.0 {
                    water.sfov.set(row, col, fwd, sf);
                } else {
                    water.sfov.set(rr, cc, opposite(fwd), sf.abs());
                }

                if sf == 0.0 {
                    continue;
                }

                //Donor-side properties
                let (drow, dcol) = if sf > 0.0 { (row, col) } else { (rr, cc) };
                let hcell = water.hov.at(drow, dcol);
                let ncell = basin.landuse_at(drow, dcol).nmanning;
                let scell = basin.storagedepth.at(drow, dcol);
                let infcell = if ctl.infopt > 0 {
                    hyd.infilrate.at(drow, dcol) * dt
                } else {
                    0.0
                };

                //Overland flow occurs when the donor depth exceeds the
                //depression storage and the depth of water that will
                //infiltrate this step
                if hcell <= scell + infcell {
                    continue;
                }
                let alpha = sf.abs().sqrt() / ncell;
                let dq = w * alpha * (hcell - (scell + infcell)).powf(BETA);

                if sf > 0.0 {
                    *water.dqov.at_mut(row, col) -= dq;
                    *water.dqov.at_mut(rr, cc) += dq;
                    water.dqovout.set(row, col, fwd, dq);
                    water.dqovin.set(rr, cc, opposite(fwd), dq);
                } else {
                    *water.dqov.at_mut(rr, cc) -= dq;
                    *water.dqov.at_mut(row, col) += dq;
                    water.dqovout.set(rr, cc, opposite(fwd), dq);
                    water.dqovin.set(row, col, fwd, dq);
                }
            }
        }
    }

    //Compute overland flow crossing the domain boundary at outlets.
    //Overland outflow at a channel-outlet cell leaves via the channel
    //unless outopt directs it across the overland boundary as well.
    for (i, outlet) in basin.outlets.iter().enumerate() {
        let (orow, ocol) = (outlet.row, outlet.col);
        if basin.mask.grid.at(orow, ocol) >= MASK_CHANNEL && ctl.outopt != 1 {
            continue;
        }

        //Boundary water depth (zero unless a depth time series is set)
        let mut hboundary = 0.0;
        let sf = if outlet.dbcopt == 0 {
            //normal-depth condition: friction slope equals ground slope
            outlet.sovout
        } else {
            if let Some(bc) = forcing.depth_bcs.get(i).and_then(|b| b.as_ref()) {
                hboundary = bc.value.max(0.0);
                //at a channel outlet only the above-bank part of the
                //boundary depth stands on the overland plane
                if let Some(net) = basin.channels.as_ref() {
                    if let Some((link, node)) = net.at_cell(orow, ocol) {
                        let hbank = net.props[net.node_index(link, node)].hbank;
                        hboundary = (hboundary - hbank).max(0.0);
                    }
                }
            }
            let dhdx = (hboundary - water.hov.at(orow, ocol)) / w;
            outlet.sovout - dhdx
        };

        if sf == 0.0 {
            continue;
        }

        let (hcell, scell, infcell) = if sf > 0.0 {
            let inf = if ctl.infopt > 0 {
                hyd.infilrate.at(orow, ocol) * dt
            } else {
                0.0
            };
            (
                water.hov.at(orow, ocol),
                basin.storagedepth.at(orow, ocol),
                inf,
            )
        } else {
            //flow enters from the boundary; the boundary has no
            //depression storage and no infiltration
            (hboundary, 0.0, 0.0)
        };

        if hcell <= scell + infcell {
            continue;
        }
        let ncell = basin.landuse_at(orow, ocol).nmanning;
        let alpha = sf.abs().sqrt() / ncell;
        let dq = w * alpha * (hcell - (scell + infcell)).powf(BETA);

        if sf > 0.0 {
            *water.dqov.at_mut(orow, ocol) -= dq;
            water.dqovout.set(orow, ocol, DIR_BOUNDARY, dq);
            water.qoutov[i] = dq;
            water.sfov.set(orow, ocol, DIR_BOUNDARY, sf);
        } else {
            *water.dqov.at_mut(orow, ocol) += dq;
            water.dqovin.set(orow, ocol, DIR_BOUNDARY, dq);
            water.qinov[i] = dq;
        }
    }

    //Track the maximum overland Courant number for adaptive stepping
    if ctl.dtopt > 0 {
        clock.maxcourant_ov = -1.0;
        for row in 0..spec.nrows {
            for col in 0..spec.ncols {
                if !basin.mask.is_active(row, col) {
                    continue;
                }
                let h = water.hov.at(row, col);
                if h <= 0.0 {
                    continue;
                }
                let qout = water.dqovout.sum(row, col, &[DIR_N, DIR_E, DIR_S, DIR_W])
                    + water.dqovout.at(row, col, DIR_BOUNDARY);
                let velocity = qout / (h * w);
                let courant = velocity * dt / w;
                if courant > clock.maxcourant_ov {
                    clock.maxcourant_ov = courant;
                }
            }
        }
    }
}
