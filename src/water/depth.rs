use crate::basin::Basin;
use crate::control::SimControl;
use crate::domain::grid::NSOURCES;
use crate::hydrology::HydrologyState;
use crate::water::{ChannelWater, OverlandWater};

/*
Compute the new overland water depths once all flows for the step are
known, and accumulate the gross flow volumes by source for the mass
balance.  Small negative depths from round-off are clamped to zero and
the clamped volume is carried in a residual register; a non-finite
depth aborts the run with the offending cell.
 */
pub fn update_overland(
    ctl: &SimControl,
    basin: &Basin,
    hyd: &mut HydrologyState,
    water: &mut OverlandWater,
    simtime: f64,
    dt: f64,
) -> Result<(), String> {
    for row in 0..basin.spec.nrows {
        for col in 0..basin.spec.ncols {
            if !basin.mask.is_active(row, col) {
                continue;
            }
            let aov = basin.overland_area(row, col);

            //Sources and sinks over the overland part of the cell (m/s)
            let netrain = hyd.netrain.at(row, col);
            let swemelt = hyd.swemelt.at(row, col);
            let infil = if ctl.infopt > 0 {
                hyd.infilrate.at(row, col)
            } else {
                0.0
            };

            let mut hnew = water.hov.at(row, col)
                + (water.dqov.at(row, col) / aov + netrain + swemelt - infil) * dt;

            if !hnew.is_finite() {
                return Err(format!(
                    "Numerical error: overland depth is not finite at cell ({}, {}) at time {:.6} h",
                    row + 1,
                    col + 1,
                    simtime / 3600.0
                ));
            }
            if hnew < 0.0 {
                //round-off residual: clamp and record the created mass
                water.residual += -hnew * aov;
                hnew = 0.0;
            }
            water.hovnew.set(row, col, hnew);

            if hnew < water.minhov {
                water.minhov = hnew;
            }
            if hnew > water.maxhov {
                water.maxhov = hnew;
            }

            //Advance the cumulative infiltration depth and volume
            if ctl.infopt > 0 {
                *hyd.infildepth.at_mut(row, col) += infil * dt;
                *hyd.infilvol.at_mut(row, col) += infil * dt * aov;
            }

            //Accumulate gross flow volumes by source
            for k in 0..NSOURCES {
                water.dqovinvol.add(row, col, k, water.dqovin.at(row, col, k) * dt);
                water.dqovoutvol.add(row, col, k, water.dqovout.at(row, col, k) * dt);
            }
        }
    }

    //Outlet trackers: cumulative boundary volumes, peak discharge and
    //time of peak.  The peak registers only ratchet upward.
    for i in 0..basin.outlets.len() {
        water.qinovvol[i] += water.qinov[i] * dt;
        water.qoutovvol[i] += water.qoutov[i] * dt;
        if water.qoutov[i] > water.qpeakov[i] {
            water.qpeakov[i] = water.qoutov[i];
            water.tpeakov[i] = simtime;
        }
    }

    Ok(())
}

/*
Compute the new channel depths from the volume balance at each node
and accumulate the gross flow volumes.  The depth is recovered from
the stored volume through the trapezoidal geometry; transmission loss
leaves through the bed.
 */
pub fn update_channel(
    ctl: &SimControl,
    basin: &Basin,
    hyd: &mut HydrologyState,
    water: &mut ChannelWater,
    simtime: f64,
    dt: f64,
) -> Result<(), String> {
    let net = match basin.channels.as_ref() {
        Some(net) => net,
        None => return Ok(()),
    };

    for link in 0..net.nlinks {
        for node in 0..net.nnodes(link) {
            let n = net.node_index(link, node);
            let props = &net.props[n];

            let tloss = if ctl.ctlopt > 0 {
                hyd.tlossrate[n] * props.bwidth * props.chanlength
            } else {
                0.0
            };

            let mut vnew = props.volume(water.hch[n]) + (water.dqch[n] - tloss) * dt;

            if !vnew.is_finite() {
                return Err(format!(
                    "Numerical error: channel volume is not finite at link {} node {} at time {:.6} h",
                    link + 1,
                    node + 1,
                    simtime / 3600.0
                ));
            }
            if vnew < 0.0 {
                water.residual += -vnew;
                vnew = 0.0;
            }

            let hnew = props.depth_from_volume(vnew);
            water.hchnew[n] = hnew;

            if hnew < water.minhch {
                water.minhch = hnew;
            }
            if hnew > water.maxhch {
                water.maxhch = hnew;
            }

            if ctl.ctlopt > 0 {
                hyd.tlossdepth[n] += hyd.tlossrate[n] * dt;
                hyd.tlossvol[n] += tloss * dt;
            }

            for k in 0..NSOURCES {
                water.dqchinvol.add(n, k, water.dqchin.at(n, k) * dt);
                water.dqchoutvol.add(n, k, water.dqchout.at(n, k) * dt);
            }
        }
    }

    for i in 0..basin.outlets.len() {
        water.qinchvol[i] += water.qinch[i] * dt;
        water.qoutchvol[i] += water.qoutch[i] * dt;
        if water.qoutch[i] > water.qpeakch[i] {
            water.qpeakch[i] = water.qoutch[i];
            water.tpeakch[i] = simtime;
        }
    }

    Ok(())
}

/// Adopt the end-of-step depths.
pub fn new_state(basin: &Basin, ov: &mut OverlandWater, ch: &mut ChannelWater) {
    for row in 0..basin.spec.nrows {
        for col in 0..basin.spec.ncols {
            if basin.mask.is_active(row, col) {
                let h = ov.hovnew.at(row, col);
                ov.hov.set(row, col, h);
            }
        }
    }
    for n in 0..ch.hch.len() {
        ch.hch[n] = ch.hchnew[n];
    }
}
