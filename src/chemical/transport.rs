use crate::basin::Basin;
use crate::chemical::{kinetics, ChemClass, ChemState, DomainChems};
use crate::domain::grid::{DIR_BOUNDARY, DIR_FLOODPLAIN, DIR_POINT, NSOURCES};
use crate::domain::stack::{StackSet, WATER_COLUMN};
use crate::forcing::ForcingSet;
use crate::solids::concentration::{
    derive_influx_channel, derive_influx_floodplain, derive_influx_overland, limit_availability,
    water_volumes_channel, water_volumes_overland, ColumnVolumes,
};
use crate::solids::{DomainSolids, SolidsClass};
use crate::water::{ChannelWater, OverlandWater};

//Chemical transport mirrors the solids machinery: the same register
//shapes, the same availability limiter, the same influx mirroring.
//The differences are in what the fluxes carry: advection and
//dispersion move the total (dissolved plus bound) water-column
//concentration, deposition settles only the solids-bound fractions,
//erosion carries bed chemical with the eroded bed volume, porewater
//release returns dissolved bed chemical to the water column, and
//first-order kinetics transform mass in both phases.

#[allow(clippy::too_many_arguments)]
pub fn step(
    basin: &Basin,
    forcing: &ForcingSet,
    soil_stack: &StackSet,
    sed_stack: Option<&StackSet>,
    ov_water: &OverlandWater,
    ch_water: &ChannelWater,
    solids_classes: &[SolidsClass],
    solids_ov: &DomainSolids,
    solids_ch: Option<&DomainSolids>,
    state: &mut ChemState,
    active_cells: &[usize],
    temperature: f64,
    simtime: f64,
    dt: f64,
) -> Result<(), String> {
    let nchems = state.classes.len();
    let classes = state.classes.clone();

    state.ov.trans.clear_fluxes();
    if let Some(ch) = state.ch.as_mut() {
        ch.trans.clear_fluxes();
    }

    fluxes_overland(
        basin,
        forcing,
        soil_stack,
        ov_water,
        solids_classes,
        solids_ov,
        &classes,
        &mut state.ov,
        dt,
    );
    if let (Some(ch), Some(stk), Some(sol_ch)) = (state.ch.as_mut(), sed_stack, solids_ch) {
        fluxes_channel(
            basin,
            forcing,
            stk,
            ch_water,
            solids_classes,
            sol_ch,
            &classes,
            ch,
            dt,
        );
    }

    //Availability limiter, then mirror the surviving outfluxes
    let vol_ov = water_volumes_overland(basin, ov_water);
    limit_availability(&mut state.ov.trans, &vol_ov.old, nchems, dt);
    let vol_ch = state.ch.as_mut().map(|ch| {
        let v = water_volumes_channel(basin, ch_water);
        limit_availability(&mut ch.trans, &v.old, nchems, dt);
        v
    });

    derive_influx_overland(basin, &mut state.ov.trans, nchems);
    if let Some(ch) = state.ch.as_mut() {
        derive_influx_channel(basin, &mut ch.trans, nchems);
        derive_influx_floodplain(basin, &mut state.ov.trans, &mut ch.trans, nchems);
    }

    //Concentration updates with kinetics
    update(
        &mut state.ov,
        soil_stack,
        &classes,
        &vol_ov,
        active_cells,
        temperature,
        simtime,
        dt,
    )?;
    if let (Some(ch), Some(stk), Some(vols)) = (state.ch.as_mut(), sed_stack, vol_ch) {
        let nodes: Vec<usize> = (0..vols.old.len()).collect();
        update(ch, stk, &classes, &vols, &nodes, temperature, simtime, dt)?;
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn fluxes_overland(
    basin: &Basin,
    forcing: &ForcingSet,
    soil_stack: &StackSet,
    water: &OverlandWater,
    solids_classes: &[SolidsClass],
    solids: &DomainSolids,
    classes: &[ChemClass],
    chems: &mut DomainChems,
    dt: f64,
) {
    let spec = &basin.spec;

    //External loads enter through the source slot
    for load in forcing.chem_loads_ov.iter() {
        let cell = spec.index(load.row, load.col);
        chems.trans.advinflux.add(load.species, cell, DIR_POINT, load.series.value);
        chems.trans.advinflux.add(0, cell, DIR_POINT, load.series.value);
    }

    for row in 0..spec.nrows {
        for col in 0..spec.ncols {
            if !basin.mask.is_active(row, col) {
                continue;
            }
            let cell = spec.index(row, col);
            let ilayer = soil_stack.surface(cell);
            let aov = basin.overland_area(row, col);

            for (i, chem) in classes.iter().enumerate() {
                let ichem = i + 1;
                let c = chems.trans.csed.at(ichem, cell, WATER_COLUMN);

                if c > 0.0 {
                    //Advection with every gross water outflow
                    for k in 1..=8 {
                        let q = water.dqovout.at(row, col, k);
                        if q > 0.0 {
                            chems.trans.advoutflux.add(ichem, cell, k, q * c);
                            chems.trans.advoutflux.add(0, cell, k, q * c);
                        }
                    }
                    for k in [DIR_FLOODPLAIN, DIR_BOUNDARY] {
                        let q = water.dqovout.at(row, col, k);
                        if q > 0.0 {
                            chems.trans.advoutflux.add(ichem, cell, k, q * c);
                            chems.trans.advoutflux.add(0, cell, k, q * c);
                        }
                    }

                    //Dispersion reuses the solids dispersive flows: the
                    //solids total-class flux divided by the solids
                    //concentration is the bulk dispersion flow for the
                    //face, which then carries the chemical gradient.
                    let ctot = solids.csed.at(0, cell, WATER_COLUMN);
                    if ctot > 0.0 {
                        for k in 1..=8 {
                            let sflux = solids.dspoutflux.at(0, cell, k);
                            if sflux > 0.0 {
                                let flux = sflux * c / ctot;
                                chems.trans.dspoutflux.add(ichem, cell, k, flux);
                                chems.trans.dspoutflux.add(0, cell, k, flux);
                            }
                        }
                    }

                    //Deposition settles the bound fractions at their
                    //carrier-class settling velocities
                    if water.hov.at(row, col) > 0.0 {
                        let mut dep = 0.0;
                        for (s, sclass) in solids_classes.iter().enumerate() {
                            let fb = chem.bound_fraction(&solids.csed, cell, WATER_COLUMN, s + 1);
                            dep += fb * sclass.ws * aov * c;
                        }
                        if dep > 0.0 {
                            chems.trans.depflux.add(ichem, cell, dep);
                            chems.trans.depflux.add(0, cell, dep);
                        }
                    }
                }

                if ilayer > 0 {
                    let li = soil_stack.idx(cell, ilayer);
                    let cbed = chems.trans.csed.at(ichem, cell, ilayer);

                    //Erosion carries bed chemical with the eroded volume
                    let ctotbed = solids.csed.at(0, cell, ilayer);
                    if cbed > 0.0 && ctotbed > 0.0 {
                        let ers_volume = solids.ersflux.at(0, cell) / ctotbed;
                        let ers = ers_volume * cbed;
                        if ers > 0.0 {
                            chems.trans.ersflux.add(ichem, cell, ers);
                            chems.trans.ersflux.add(0, cell, ers);
                        }
                    }

                    //Porewater release of dissolved bed chemical
                    if cbed > 0.0 && chem.kexch > 0.0 {
                        let porosity = soil_stack.porosity[li].max(1.0e-6);
                        let fdis = chem.dissolved_fraction(&solids.csed, cell, ilayer);
                        let cpore = fdis * cbed / porosity;
                        let release = chem.kexch * soil_stack.area[cell] * cpore;
                        if release > 0.0 {
                            chems.trans.ersflux.add(ichem, cell, release);
                            chems.trans.ersflux.add(0, cell, release);
                            chems.pwrmass.add(ichem, cell, release * dt / 1000.0);
                            chems.pwrmass.add(0, cell, release * dt / 1000.0);
                        }
                    }
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn fluxes_channel(
    basin: &Basin,
    forcing: &ForcingSet,
    sed_stack: &StackSet,
    water: &ChannelWater,
    solids_classes: &[SolidsClass],
    solids: &DomainSolids,
    classes: &[ChemClass],
    chems: &mut DomainChems,
    dt: f64,
) {
    let net = match basin.channels.as_ref() {
        Some(net) => net,
        None => return,
    };

    for load in forcing.chem_loads_ch.iter() {
        let n = net.node_index(load.link, load.node);
        chems.trans.advinflux.add(load.species, n, DIR_POINT, load.series.value);
        chems.trans.advinflux.add(0, n, DIR_POINT, load.series.value);
    }

    for link in 0..net.nlinks {
        for node in 0..net.nnodes(link) {
            let n = net.node_index(link, node);
            let props = &net.props[n];
            let ilayer = sed_stack.surface(n);
            let h = water.hch[n];

            let wsw = if h <= props.hbank {
                props.bwidth + 2.0 * props.sideslope * h
            } else {
                props.twidth
            };
            let asurf = wsw * props.chanlength;

            for (i, chem) in classes.iter().enumerate() {
                let ichem = i + 1;
                let c = chems.trans.csed.at(ichem, n, WATER_COLUMN);

                if c > 0.0 {
                    for k in 1..=8 {
                        let q = water.dqchout.at(n, k);
                        if q > 0.0 {
                            chems.trans.advoutflux.add(ichem, n, k, q * c);
                            chems.trans.advoutflux.add(0, n, k, q * c);
                        }
                    }
                    for k in [DIR_FLOODPLAIN, DIR_BOUNDARY] {
                        let q = water.dqchout.at(n, k);
                        if q > 0.0 {
                            chems.trans.advoutflux.add(ichem, n, k, q * c);
                            chems.trans.advoutflux.add(0, n, k, q * c);
                        }
                    }

                    let ctot = solids.csed.at(0, n, WATER_COLUMN);
                    if ctot > 0.0 {
                        for k in 1..=8 {
                            let sflux = solids.dspoutflux.at(0, n, k);
                            if sflux > 0.0 {
                                let flux = sflux * c / ctot;
                                chems.trans.dspoutflux.add(ichem, n, k, flux);
                                chems.trans.dspoutflux.add(0, n, k, flux);
                            }
                        }
                    }

                    if h > 0.0 {
                        let mut dep = 0.0;
                        for (s, sclass) in solids_classes.iter().enumerate() {
                            let fb = chem.bound_fraction(&solids.csed, n, WATER_COLUMN, s + 1);
                            dep += fb * sclass.ws * asurf * c;
                        }
                        if dep > 0.0 {
                            chems.trans.depflux.add(ichem, n, dep);
                            chems.trans.depflux.add(0, n, dep);
                        }
                    }
                }

                if ilayer > 0 {
                    let li = sed_stack.idx(n, ilayer);
                    let cbed = chems.trans.csed.at(ichem, n, ilayer);
                    let ctotbed = solids.csed.at(0, n, ilayer);
                    if cbed > 0.0 && ctotbed > 0.0 {
                        let ers_volume = solids.ersflux.at(0, n) / ctotbed;
                        let ers = ers_volume * cbed;
                        if ers > 0.0 {
                            chems.trans.ersflux.add(ichem, n, ers);
                            chems.trans.ersflux.add(0, n, ers);
                        }
                    }
                    if cbed > 0.0 && chem.kexch > 0.0 {
                        let porosity = sed_stack.porosity[li].max(1.0e-6);
                        let fdis = chem.dissolved_fraction(&solids.csed, n, ilayer);
                        let cpore = fdis * cbed / porosity;
                        let release = chem.kexch * sed_stack.area[n] * cpore;
                        if release > 0.0 {
                            chems.trans.ersflux.add(ichem, n, release);
                            chems.trans.ersflux.add(0, n, release);
                            chems.pwrmass.add(ichem, n, release * dt / 1000.0);
                            chems.pwrmass.add(0, n, release * dt / 1000.0);
                        }
                    }
                }
            }
        }
    }
}

/*
Advance the chemical concentrations.  The water column takes the flux
balance plus the kinetic losses on the water-column mass; the surface
layer takes deposition minus erosion and porewater plus its own
kinetic losses (no photolysis or volatilization below ground).  Bed
volume changes belong to the solids step; the chemical bed update
only moves mass.
 */
#[allow(clippy::too_many_arguments)]
fn update(
    chems: &mut DomainChems,
    stack: &StackSet,
    classes: &[ChemClass],
    volumes: &ColumnVolumes,
    active: &[usize],
    temperature: f64,
    simtime: f64,
    dt: f64,
) -> Result<(), String> {
    let nchems = classes.len();

    for &col in active {
        let ilayer = stack.surface(col);
        let vold = volumes.old[col];
        let vnew = volumes.new[col];

        for (i, chem) in classes.iter().enumerate() {
            let ichem = i + 1;

            let mut influx = chems.trans.ersflux.at(ichem, col);
            let mut outflux = chems.trans.depflux.at(ichem, col);
            for k in 0..NSOURCES {
                influx += chems.trans.advinflux.at(ichem, col, k)
                    + chems.trans.dspinflux.at(ichem, col, k);
            }
            for k in 1..NSOURCES {
                outflux += chems.trans.advoutflux.at(ichem, col, k)
                    + chems.trans.dspoutflux.at(ichem, col, k);
            }

            let massold = chems.trans.csed.at(ichem, col, WATER_COLUMN) * vold;
            let mut massnew = massold + (influx - outflux) * dt;

            let losses = kinetics::apply_losses(chem, &mut massnew, temperature, dt, true);
            record_losses(chems, ichem, col, &losses);

            if massnew < 0.0 {
                chems.trans.residual += -massnew / 1000.0;
                massnew = 0.0;
            }
            if !massnew.is_finite() {
                return Err(format!(
                    "Numerical error: chemical mass is not finite (chemical {}, column {}) at time {:.6} h",
                    ichem,
                    col,
                    simtime / 3600.0
                ));
            }

            let mut dumped = 0.0;
            let cnew = if vnew > 1.0e-12 {
                massnew / vnew
            } else {
                //a drying column strands its chemical on the bed
                dumped = massnew;
                chems.trans.depmass.add(ichem, col, massnew / 1000.0);
                chems.trans.depmass.add(0, col, massnew / 1000.0);
                0.0
            };
            chems.trans.csednew.set(ichem, col, WATER_COLUMN, cnew);

            if ilayer > 0 {
                let li = stack.idx(col, ilayer);
                let vlayer = stack.v[li].max(1.0e-12);
                let gain =
                    (chems.trans.depflux.at(ichem, col) - chems.trans.ersflux.at(ichem, col)) * dt;
                let mut mbed = chems.trans.csed.at(ichem, col, ilayer) * vlayer + gain + dumped;

                let losses = kinetics::apply_losses(chem, &mut mbed, temperature, dt, false);
                record_losses(chems, ichem, col, &losses);

                if mbed < 0.0 {
                    chems.trans.residual += -mbed / 1000.0;
                    mbed = 0.0;
                }
                chems.trans.csednew.set(ichem, col, ilayer, mbed / vlayer);
            }

            //cumulative mass registers (kg)
            for k in 0..NSOURCES {
                let ai = chems.trans.advinflux.at(ichem, col, k) * dt / 1000.0;
                let ao = chems.trans.advoutflux.at(ichem, col, k) * dt / 1000.0;
                let di = chems.trans.dspinflux.at(ichem, col, k) * dt / 1000.0;
                let dout = chems.trans.dspoutflux.at(ichem, col, k) * dt / 1000.0;
                chems.trans.advinmass.add(ichem, col, k, ai);
                chems.trans.advinmass.add(0, col, k, ai);
                chems.trans.advoutmass.add(ichem, col, k, ao);
                chems.trans.advoutmass.add(0, col, k, ao);
                chems.trans.dspinmass.add(ichem, col, k, di);
                chems.trans.dspinmass.add(0, col, k, di);
                chems.trans.dspoutmass.add(ichem, col, k, dout);
                chems.trans.dspoutmass.add(0, col, k, dout);
            }
            let depm = chems.trans.depflux.at(ichem, col) * dt / 1000.0;
            let ersm = chems.trans.ersflux.at(ichem, col) * dt / 1000.0;
            chems.trans.depmass.add(ichem, col, depm);
            chems.trans.depmass.add(0, col, depm);
            chems.trans.ersmass.add(ichem, col, ersm);
            chems.trans.ersmass.add(0, col, ersm);
        }

        //Adopt the new state and track extremes
        for ichem in 1..=nchems {
            let cw = chems.trans.csednew.at(ichem, col, WATER_COLUMN);
            chems.trans.csed.set(ichem, col, WATER_COLUMN, cw);
            chems.trans.minmax_wc.track(ichem, cw);
            if ilayer > 0 {
                let cb = chems.trans.csednew.at(ichem, col, ilayer);
                chems.trans.csed.set(ichem, col, ilayer, cb);
                chems.trans.minmax_surf.track(ichem, cb);
            }
        }
        chems.trans.csed.refresh_total(col, WATER_COLUMN);
        if ilayer > 0 {
            chems.trans.csed.refresh_total(col, ilayer);
        }
    }

    Ok(())
}

fn record_losses(chems: &mut DomainChems, ichem: usize, col: usize, losses: &[f64; 7]) {
    let regs = [
        (&mut chems.biomass, kinetics::BIOLYSIS),
        (&mut chems.hydmass, kinetics::HYDROLYSIS),
        (&mut chems.oximass, kinetics::OXIDATION),
        (&mut chems.phtmass, kinetics::PHOTOLYSIS),
        (&mut chems.radmass, kinetics::RADIOLYSIS),
        (&mut chems.volmass, kinetics::VOLATILIZATION),
        (&mut chems.usrmass, kinetics::USER_DEFINED),
    ];
    for (reg, which) in regs {
        let loss_kg = losses[which] / 1000.0;
        if loss_kg > 0.0 {
            reg.add(ichem, col, loss_kg);
            reg.add(0, col, loss_kg);
        }
    }
}
