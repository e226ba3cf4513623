use crate::basin::Basin;
use crate::domain::grid::{DIR_BOUNDARY, DIR_FLOODPLAIN, DIR_POINT};
use crate::domain::stack::WATER_COLUMN;
use crate::forcing::ForcingSet;
use crate::solids::DomainSolids;
use crate::water::{ChannelWater, OverlandWater};

//Advective solids fluxes: every gross water outflow carries the donor
//water-column concentration.  Only the outflux registers are written
//here; the matching influx registers are derived after the
//availability limiter has scaled the outfluxes, so donor and receiver
//always agree.  Point and distributed loads enter through the source
//slot (direction 0) of the influx registers directly.

pub fn overland(
    basin: &Basin,
    forcing: &ForcingSet,
    water: &OverlandWater,
    solids: &mut DomainSolids,
    nsolids: usize,
) {
    let spec = &basin.spec;

    //External loads (kg/day at the deck boundary, converted to g/s on
    //read) enter the water column as source-slot influx
    for load in forcing.solids_loads_ov.iter() {
        let cell = spec.index(load.row, load.col);
        solids.advinflux.add(load.species, cell, DIR_POINT, load.series.value);
        solids.advinflux.add(0, cell, DIR_POINT, load.series.value);
    }
    if !forcing.solids_loads_dist.is_empty() {
        let nactive = basin.mask.count_active().max(1);
        for load in forcing.solids_loads_dist.iter() {
            let per_cell = load.series.value / nactive as f64;
            for row in 0..spec.nrows {
                for col in 0..spec.ncols {
                    if basin.mask.is_active(row, col) {
                        let cell = spec.index(row, col);
                        solids.advinflux.add(load.species, cell, DIR_POINT, per_cell);
                        solids.advinflux.add(0, cell, DIR_POINT, per_cell);
                    }
                }
            }
        }
    }

    //Cell-to-cell, floodplain, and boundary advection
    for row in 0..spec.nrows {
        for col in 0..spec.ncols {
            if !basin.mask.is_active(row, col) {
                continue;
            }
            let cell = spec.index(row, col);
            for isolid in 1..=nsolids {
                let c = solids.csed.at(isolid, cell, WATER_COLUMN);
                if c <= 0.0 {
                    continue;
                }
                for k in 1..=8 {
                    let q = water.dqovout.at(row, col, k);
                    if q > 0.0 {
                        let flux = q * c;
                        solids.advoutflux.add(isolid, cell, k, flux);
                        solids.advoutflux.add(0, cell, k, flux);
                    }
                }
                let qfp = water.dqovout.at(row, col, DIR_FLOODPLAIN);
                if qfp > 0.0 {
                    let flux = qfp * c;
                    solids.advoutflux.add(isolid, cell, DIR_FLOODPLAIN, flux);
                    solids.advoutflux.add(0, cell, DIR_FLOODPLAIN, flux);
                }
                let qb = water.dqovout.at(row, col, DIR_BOUNDARY);
                if qb > 0.0 {
                    let flux = qb * c;
                    solids.advoutflux.add(isolid, cell, DIR_BOUNDARY, flux);
                    solids.advoutflux.add(0, cell, DIR_BOUNDARY, flux);
                }
            }
        }
    }
}

pub fn channel(
    basin: &Basin,
    forcing: &ForcingSet,
    water: &ChannelWater,
    solids: &mut DomainSolids,
    nsolids: usize,
) {
    let net = match basin.channels.as_ref() {
        Some(net) => net,
        None => return,
    };

    for load in forcing.solids_loads_ch.iter() {
        let n = net.node_index(load.link, load.node);
        solids.advinflux.add(load.species, n, DIR_POINT, load.series.value);
        solids.advinflux.add(0, n, DIR_POINT, load.series.value);
    }

    for link in 0..net.nlinks {
        for node in 0..net.nnodes(link) {
            let n = net.node_index(link, node);
            for isolid in 1..=nsolids {
                let c = solids.csed.at(isolid, n, WATER_COLUMN);
                if c <= 0.0 {
                    continue;
                }
                for k in 1..=8 {
                    let q = water.dqchout.at(n, k);
                    if q > 0.0 {
                        let flux = q * c;
                        solids.advoutflux.add(isolid, n, k, flux);
                        solids.advoutflux.add(0, n, k, flux);
                    }
                }
                let qfp = water.dqchout.at(n, DIR_FLOODPLAIN);
                if qfp > 0.0 {
                    let flux = qfp * c;
                    solids.advoutflux.add(isolid, n, DIR_FLOODPLAIN, flux);
                    solids.advoutflux.add(0, n, DIR_FLOODPLAIN, flux);
                }
                let qb = water.dqchout.at(n, DIR_BOUNDARY);
                if qb > 0.0 {
                    let flux = qb * c;
                    solids.advoutflux.add(isolid, n, DIR_BOUNDARY, flux);
                    solids.advoutflux.add(0, n, DIR_BOUNDARY, flux);
                }
            }
        }
    }
}
