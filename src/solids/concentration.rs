use crate::basin::Basin;
use crate::domain::grid::{opposite, DIR_FLOODPLAIN, NSOURCES};
use crate::domain::stack::{push_pop, LayerConc, StackSet, WATER_COLUMN};
use crate::domain::SpeciesColDirs;
use crate::solids::{DomainSolids, SolidsClass, RHO_WATER};
use crate::water::{ChannelWater, OverlandWater};

//The solids concentration update: scale outgoing fluxes to the mass
//actually available (the availability limiter), mirror the surviving
//outfluxes into the receiving influx registers, advance the water
//column and surface layer concentrations, adjust the surface layer
//volume, and run the stack push/pop.

/// Start-of-step and end-of-step water volumes per column.
pub struct ColumnVolumes {
    pub old: Vec<f64>,
    pub new: Vec<f64>,
}

pub fn water_volumes_overland(basin: &Basin, water: &OverlandWater) -> ColumnVolumes {
    let spec = &basin.spec;
    let mut old = vec![0.0; spec.ncells()];
    let mut new = vec![0.0; spec.ncells()];
    for row in 0..spec.nrows {
        for col in 0..spec.ncols {
            if basin.mask.is_active(row, col) {
                let cell = spec.index(row, col);
                let aov = basin.overland_area(row, col);
                old[cell] = water.hov.at(row, col) * aov;
                new[cell] = water.hovnew.at(row, col) * aov;
            }
        }
    }
    ColumnVolumes { old, new }
}

pub fn water_volumes_channel(basin: &Basin, water: &ChannelWater) -> ColumnVolumes {
    let net = basin.channels.as_ref().expect("channel volumes need a network");
    let total = net.total_nodes();
    let mut old = vec![0.0; total];
    let mut new = vec![0.0; total];
    for link in 0..net.nlinks {
        for node in 0..net.nnodes(link) {
            let n = net.node_index(link, node);
            let props = &net.props[n];
            old[n] = props.volume(water.hch[n]);
            new[n] = props.volume(water.hchnew[n]);
        }
    }
    ColumnVolumes { old, new }
}

/*
Scale every outgoing flux of a column so the mass leaving the water
column over the step cannot exceed the mass it holds.  All outgoing
registers of a class (advection, dispersion, deposition) are scaled by
the same available/potential ratio, then the class totals in slot 0
are rebuilt.
 */
pub fn limit_availability(solids: &mut DomainSolids, vold: &[f64], nsolids: usize, dt: f64) {
    let ncolumns = solids.advoutflux.ncolumns;
    for col in 0..ncolumns {
        for isolid in 1..=nsolids {
            let mut potential = solids.depflux.at(isolid, col);
            for k in 1..NSOURCES {
                potential += solids.advoutflux.at(isolid, col, k);
                potential += solids.dspoutflux.at(isolid, col, k);
            }
            if potential <= 0.0 {
                continue;
            }
            let available = solids.csed.at(isolid, col, WATER_COLUMN) * vold[col];
            if potential * dt > available {
                let scale = (available / (potential * dt)).max(0.0);
                for k in 1..NSOURCES {
                    let a = solids.advoutflux.at(isolid, col, k);
                    solids.advoutflux.set(isolid, col, k, a * scale);
                    let d = solids.dspoutflux.at(isolid, col, k);
                    solids.dspoutflux.set(isolid, col, k, d * scale);
                }
                let dep = solids.depflux.at(isolid, col);
                solids.depflux.set(isolid, col, dep * scale);
            }
        }
        //rebuild the class totals after scaling
        for k in 1..NSOURCES {
            let mut asum = 0.0;
            let mut dsum = 0.0;
            for isolid in 1..=nsolids {
                asum += solids.advoutflux.at(isolid, col, k);
                dsum += solids.dspoutflux.at(isolid, col, k);
            }
            solids.advoutflux.set(0, col, k, asum);
            solids.dspoutflux.set(0, col, k, dsum);
        }
        let mut depsum = 0.0;
        for isolid in 1..=nsolids {
            depsum += solids.depflux.at(isolid, col);
        }
        solids.depflux.set(0, col, depsum);
    }
}

fn mirror(out: &SpeciesColDirs, into: &mut SpeciesColDirs, donor: usize, dir: usize, receiver: usize, nsolids: usize) {
    for isolid in 0..=nsolids {
        let flux = out.at(isolid, donor, dir);
        if flux > 0.0 {
            into.add(isolid, receiver, opposite(dir), flux);
        }
    }
}

/*
Mirror the limited outfluxes into the influx registers of the
receiving cells, so every donor/receiver pair agrees on the mass
crossing the face.  Source-slot (point load) influx entries written
during the advection phase are left untouched; boundary outflow has no
receiver.
 */
pub fn derive_influx_overland(basin: &Basin, solids: &mut DomainSolids, nsolids: usize) {
    let spec = &basin.spec;
    let adv = solids.advoutflux.clone();
    let dsp = solids.dspoutflux.clone();
    for row in 0..spec.nrows {
        for col in 0..spec.ncols {
            if !basin.mask.is_active(row, col) {
                continue;
            }
            let cell = spec.index(row, col);
            for k in 1..=8 {
                if let Some((rr, cc)) = spec.neighbor(row, col, k) {
                    if basin.mask.is_active(rr, cc) {
                        let receiver = spec.index(rr, cc);
                        mirror(&adv, &mut solids.advinflux, cell, k, receiver, nsolids);
                        mirror(&dsp, &mut solids.dspinflux, cell, k, receiver, nsolids);
                    }
                }
            }
        }
    }
}

pub fn derive_influx_channel(basin: &Basin, solids: &mut DomainSolids, nsolids: usize) {
    let net = match basin.channels.as_ref() {
        Some(net) => net,
        None => return,
    };
    let adv = solids.advoutflux.clone();
    let dsp = solids.dspoutflux.clone();
    for link in 0..net.nlinks {
        for node in 0..net.nnodes(link) {
            let n = net.node_index(link, node);
            let (row, col) = net.node_cell(link, node);
            for k in 1..=8 {
                if let Some((rr, cc)) = basin.spec.neighbor(row, col, k) {
                    if let Some((rlink, rnode)) = net.at_cell(rr, cc) {
                        let receiver = net.node_index(rlink, rnode);
                        mirror(&adv, &mut solids.advinflux, n, k, receiver, nsolids);
                        mirror(&dsp, &mut solids.dspinflux, n, k, receiver, nsolids);
                    }
                }
            }
        }
    }
}

/// Mirror the floodplain (direction 9) fluxes between the overland and
/// channel water columns of channel cells.
pub fn derive_influx_floodplain(
    basin: &Basin,
    ov: &mut DomainSolids,
    ch: &mut DomainSolids,
    nsolids: usize,
) {
    let net = match basin.channels.as_ref() {
        Some(net) => net,
        None => return,
    };
    for link in 0..net.nlinks {
        for node in 0..net.nnodes(link) {
            let n = net.node_index(link, node);
            let (row, col) = net.node_cell(link, node);
            let cell = basin.spec.index(row, col);
            for isolid in 0..=nsolids {
                let down = ov.advoutflux.at(isolid, cell, DIR_FLOODPLAIN)
                    + ov.dspoutflux.at(isolid, cell, DIR_FLOODPLAIN);
                if down > 0.0 {
                    ch.advinflux.add(isolid, n, DIR_FLOODPLAIN, down);
                }
                let up = ch.advoutflux.at(isolid, n, DIR_FLOODPLAIN)
                    + ch.dspoutflux.at(isolid, n, DIR_FLOODPLAIN);
                if up > 0.0 {
                    ov.advinflux.add(isolid, cell, DIR_FLOODPLAIN, up);
                }
            }
        }
    }
}

/*
Advance the water column and surface layer of every column.  The water
column takes the flux balance over the step; when the water volume
vanishes the suspended mass settles onto the surface layer rather than
disappearing.  The surface layer volume grows with deposited bulk
volume (particle volume over one minus porosity) and shrinks with the
eroded volume; the new layer volume is checked against the push/pop
thresholds afterwards.

Cumulative mass registers advance here (kg).
 */
#[allow(clippy::too_many_arguments)]
pub fn update(
    solids: &mut DomainSolids,
    stack: &mut StackSet,
    chems: Option<&mut DomainSolids>,
    classes: &[SolidsClass],
    volumes: &ColumnVolumes,
    active: &[usize],
    simtime: f64,
    dt: f64,
) -> Result<(), String> {
    let nsolids = classes.len();

    for &col in active {
        let ilayer = stack.surface(col);
        let vold = volumes.old[col];
        let vnew = volumes.new[col];

        let mut dumped = vec![0.0; nsolids + 1]; //mass stranded by a drying column (g)
        for isolid in 1..=nsolids {
            let mut influx = solids.ersflux.at(isolid, col);
            let mut outflux = solids.depflux.at(isolid, col);
            for k in 0..NSOURCES {
                influx += solids.advinflux.at(isolid, col, k) + solids.dspinflux.at(isolid, col, k);
            }
            for k in 1..NSOURCES {
                outflux +=
                    solids.advoutflux.at(isolid, col, k) + solids.dspoutflux.at(isolid, col, k);
            }

            let massold = solids.csed.at(isolid, col, WATER_COLUMN) * vold;
            let mut massnew = massold + (influx - outflux) * dt;
            if massnew < 0.0 {
                solids.residual += -massnew / 1000.0;
                massnew = 0.0;
            }
            if !massnew.is_finite() {
                return Err(format!(
                    "Numerical error: solids mass is not finite (class {}, column {}) at time {:.6} h",
                    isolid,
                    col,
                    simtime / 3600.0
                ));
            }

            let cnew = if vnew > 1.0e-12 {
                massnew / vnew
            } else {
                //the column dried out this step: strand the mass on
                //the bed and count it as deposition
                dumped[isolid] = massnew;
                dumped[0] += massnew;
                solids.depmass.add(isolid, col, massnew / 1000.0);
                solids.depmass.add(0, col, massnew / 1000.0);
                0.0
            };
            solids.csednew.set(isolid, col, WATER_COLUMN, cnew);

            //cumulative mass registers (kg)
            for k in 0..NSOURCES {
                solids
                    .advinmass
                    .add(isolid, col, k, solids.advinflux.at(isolid, col, k) * dt / 1000.0);
                solids
                    .advoutmass
                    .add(isolid, col, k, solids.advoutflux.at(isolid, col, k) * dt / 1000.0);
                solids
                    .dspinmass
                    .add(isolid, col, k, solids.dspinflux.at(isolid, col, k) * dt / 1000.0);
                solids
                    .dspoutmass
                    .add(isolid, col, k, solids.dspoutflux.at(isolid, col, k) * dt / 1000.0);
                solids
                    .advinmass
                    .add(0, col, k, solids.advinflux.at(isolid, col, k) * dt / 1000.0);
                solids
                    .advoutmass
                    .add(0, col, k, solids.advoutflux.at(isolid, col, k) * dt / 1000.0);
                solids
                    .dspinmass
                    .add(0, col, k, solids.dspinflux.at(isolid, col, k) * dt / 1000.0);
                solids
                    .dspoutmass
                    .add(0, col, k, solids.dspoutflux.at(isolid, col, k) * dt / 1000.0);
            }
            let depm = solids.depflux.at(isolid, col) * dt / 1000.0;
            let ersm = solids.ersflux.at(isolid, col) * dt / 1000.0;
            solids.depmass.add(isolid, col, depm);
            solids.depmass.add(0, col, depm);
            solids.ersmass.add(isolid, col, ersm);
            solids.ersmass.add(0, col, ersm);
        }

        //Surface layer mass and bulk volume update
        if ilayer > 0 {
            let li = stack.idx(col, ilayer);
            let vlayer = stack.v[li];
            let porosity = stack.porosity[li];
            let mut vlayernew = vlayer;
            let mut bedmass = vec![0.0; nsolids + 1];

            for (i, class) in classes.iter().enumerate() {
                let isolid = i + 1;
                let gain = (solids.depflux.at(isolid, col) - solids.ersflux.at(isolid, col)) * dt
                    + dumped[isolid];
                let m = solids.csed.at(isolid, col, ilayer) * vlayer + gain;
                bedmass[isolid] = m.max(0.0);
                if m < 0.0 {
                    solids.residual += -m / 1000.0;
                }
                //bulk volume of the gained or lost solids (m3)
                let particle_volume = gain / (class.spgravity * RHO_WATER);
                vlayernew += particle_volume / (1.0 - porosity).max(1.0e-6);
            }

            if vlayernew < 0.0 {
                vlayernew = 0.0;
            }
            stack.vnew[li] = vlayernew;

            for isolid in 1..=nsolids {
                let c = if vlayernew > 1.0e-12 {
                    bedmass[isolid] / vlayernew
                } else {
                    0.0
                };
                solids.csednew.set(isolid, col, ilayer, c);
            }
        }
    }

    //Adopt the new state, refresh the totals and trackers, then run
    //the stack push/pop on the updated surface layers
    let mut chems = chems;
    for &col in active {
        let ilayer = stack.surface(col);
        for isolid in 1..=nsolids {
            let cw = solids.csednew.at(isolid, col, WATER_COLUMN);
            solids.csed.set(isolid, col, WATER_COLUMN, cw);
            solids.minmax_wc.track(isolid, cw);
            if ilayer > 0 {
                let cb = solids.csednew.at(isolid, col, ilayer);
                solids.csed.set(isolid, col, ilayer, cb);
                solids.minmax_surf.track(isolid, cb);
            }
        }
        solids.csed.refresh_total(col, WATER_COLUMN);
        solids.minmax_wc.track(0, solids.csed.at(0, col, WATER_COLUMN));
        if ilayer > 0 {
            solids.csed.refresh_total(col, ilayer);
            solids.minmax_surf.track(0, solids.csed.at(0, col, ilayer));
            stack.apply_surface_volume(col);

            //The chemical layer concentrations ride through the shift
            //with the solids so the two stacks stay aligned
            let shift = {
                let mut concs: Vec<&mut LayerConc> = Vec::with_capacity(2);
                concs.push(&mut solids.csed);
                if let Some(ch) = chems.as_deref_mut() {
                    concs.push(&mut ch.csed);
                }
                push_pop(stack, &mut concs, col).map_err(|e| {
                    format!("{} at time {:.6} h", e, simtime / 3600.0)
                })?
            };
            if let Some(shift) = shift {
                for isolid in 0..=nsolids {
                    solids.burmass.add(isolid, col, shift.buried[0][isolid]);
                    solids.scrmass.add(isolid, col, shift.scoured[0][isolid]);
                }
                //the second concentration set is the chemical domain
                if let Some(ch) = chems.as_deref_mut() {
                    if let (Some(buried), Some(scoured)) =
                        (shift.buried.get(1), shift.scoured.get(1))
                    {
                        for ichem in 0..=ch.burmass.nspecies {
                            ch.burmass.add(ichem, col, buried[ichem]);
                            ch.scrmass.add(ichem, col, scoured[ichem]);
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
