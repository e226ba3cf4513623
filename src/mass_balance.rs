use crate::basin::Basin;
use crate::chemical::ChemState;
use crate::domain::grid::{DIR_BOUNDARY, DIR_POINT};
use crate::domain::stack::WATER_COLUMN;
use crate::domain::StackSet;
use crate::hydrology::HydrologyState;
use crate::solids::{DomainSolids, SolidsState};
use crate::water::{ChannelWater, OverlandWater};

//End-of-run accounting.  The flux and volume registers accumulated
//during stepping are the sole data source here; nothing is recomputed
//from the physics.

/// Domain water budget (m3).
#[derive(Clone, Default)]
pub struct WaterBalance {
    pub initial_ov: f64,
    pub initial_ch: f64,
    pub initial_swe: f64,
    pub gross_rain: f64,
    pub net_rain: f64,
    pub interception: f64,
    pub gross_swe: f64,
    pub swemelt: f64,
    pub infiltration: f64,
    pub transloss: f64,
    pub point_sources: f64,
    pub boundary_in: f64,
    pub boundary_out: f64,
    pub residual: f64,
    pub final_ov: f64,
    pub final_ch: f64,
    pub final_swe: f64,
    pub error_percent: f64,
}

pub fn water_balance(
    basin: &Basin,
    hyd: &HydrologyState,
    ov: &OverlandWater,
    ch: Option<&ChannelWater>,
) -> WaterBalance {
    let spec = &basin.spec;
    let mut b = WaterBalance::default();

    for row in 0..spec.nrows {
        for col in 0..spec.ncols {
            if !basin.mask.is_active(row, col) {
                continue;
            }
            let aov = basin.overland_area(row, col);
            let full = spec.cell_area();
            b.initial_ov += ov.initialwater.at(row, col);
            b.initial_swe += hyd.initial_swe.at(row, col) * full;
            b.final_ov += ov.hov.at(row, col) * aov;
            b.final_swe += hyd.swe.at(row, col) * full;
            b.gross_rain += hyd.grossrainvol.at(row, col);
            b.net_rain += hyd.netrainvol.at(row, col);
            b.interception += hyd.interceptionvol.at(row, col);
            b.gross_swe += hyd.grossswevol.at(row, col);
            b.swemelt += hyd.swemeltvol.at(row, col);
            b.infiltration += hyd.infilvol.at(row, col);
            b.point_sources += ov.dqovinvol.at(row, col, DIR_POINT);
            b.boundary_in += ov.dqovinvol.at(row, col, DIR_BOUNDARY);
            b.boundary_out += ov.dqovoutvol.at(row, col, DIR_BOUNDARY);
        }
    }
    b.residual = ov.residual;

    if let (Some(ch), Some(net)) = (ch, basin.channels.as_ref()) {
        for link in 0..net.nlinks {
            for node in 0..net.nnodes(link) {
                let n = net.node_index(link, node);
                b.initial_ch += ch.initialwater[n];
                b.final_ch += net.props[n].volume(ch.hch[n]);
                b.point_sources += ch.dqchinvol.at(n, DIR_POINT);
                b.boundary_in += ch.dqchinvol.at(n, DIR_BOUNDARY);
                b.boundary_out += ch.dqchoutvol.at(n, DIR_BOUNDARY);
                b.transloss += hyd.tlossvol[n];
            }
        }
        b.residual += ch.residual;
    }

    //Relative error: (sources - sinks - storage change) / sources
    let sources = b.initial_ov + b.initial_ch + b.initial_swe + b.net_rain + b.gross_swe
        + b.point_sources
        + b.boundary_in
        + b.residual;
    //snowmelt is an internal transfer (pack to water column), not a sink
    let sinks = b.infiltration + b.transloss + b.boundary_out;
    let storage = b.final_ov + b.final_ch + b.final_swe;
    b.error_percent = if sources > 0.0 {
        (sources - sinks - storage) / sources * 100.0
    } else {
        0.0
    };
    b
}

/// Per-class mass budget for one transport domain (kg).
#[derive(Clone, Default)]
pub struct SpeciesBalance {
    pub initial_wc: f64,
    pub initial_bed: f64,
    pub loads: f64,
    pub advection_in: f64,
    pub advection_out: f64,
    pub dispersion_in: f64,
    pub dispersion_out: f64,
    pub deposition: f64,
    pub erosion: f64,
    pub burial: f64,
    pub scour: f64,
    pub final_wc: f64,
    pub final_bed: f64,
    pub residual: f64,
    pub error_percent: f64,
}

/*
Final mass in the water column and in every occupied bed layer for one
species (kg).  The surface-layer frame of reference is the stack as it
stands at the end of the run.
 */
pub fn final_masses(
    domain: &DomainSolids,
    stack: &StackSet,
    volumes: &[f64],
    species: usize,
) -> (f64, f64) {
    let mut wc = 0.0;
    let mut bed = 0.0;
    for col in 0..stack.ncolumns {
        wc += domain.csed.at(species, col, WATER_COLUMN) * volumes[col] / 1000.0;
        for layer in 1..=stack.nstack[col] {
            bed += domain.csed.at(species, col, layer) * stack.v[stack.idx(col, layer)] / 1000.0;
        }
    }
    (wc, bed)
}

pub fn species_balance(
    domain: &DomainSolids,
    stack: &StackSet,
    volumes: &[f64],
    species: usize,
) -> SpeciesBalance {
    let mut b = SpeciesBalance::default();
    b.initial_wc = domain.initialmass_wc[species];
    b.initial_bed = domain.initialmass_bed[species];
    let (wc, bed) = final_masses(domain, stack, volumes, species);
    b.final_wc = wc;
    b.final_bed = bed;
    b.residual = domain.residual;

    for col in 0..stack.ncolumns {
        b.loads += domain.advinmass.at(species, col, DIR_POINT);
        b.advection_in += domain.advinmass.at(species, col, DIR_BOUNDARY);
        b.advection_out += domain.advoutmass.at(species, col, DIR_BOUNDARY);
        b.dispersion_in += domain.dspinmass.at(species, col, DIR_BOUNDARY);
        b.dispersion_out += domain.dspoutmass.at(species, col, DIR_BOUNDARY);
        b.deposition += domain.depmass.at(species, col);
        b.erosion += domain.ersmass.at(species, col);
        b.burial += domain.burmass.at(species, col);
        b.scour += domain.scrmass.at(species, col);
    }

    //Interior advection/dispersion cancels within the domain; the
    //budget closes over loads, boundary exchange, and storage change.
    let sources = b.initial_wc + b.initial_bed + b.loads + b.advection_in + b.dispersion_in
        + b.residual;
    let sinks = b.advection_out + b.dispersion_out;
    let storage = b.final_wc + b.final_bed;
    b.error_percent = if sources > 0.0 {
        (sources - sinks - storage) / sources * 100.0
    } else {
        0.0
    };
    b
}

/// Cross-domain (overland + channel) budget for one solids class.
pub fn solids_budget(
    basin: &Basin,
    solids: &SolidsState,
    soil_stack: &StackSet,
    sed_stack: Option<&StackSet>,
    ov_volumes: &[f64],
    ch_volumes: Option<&[f64]>,
    species: usize,
) -> SpeciesBalance {
    let mut b = species_balance(&solids.ov, soil_stack, ov_volumes, species);
    if let (Some(ch), Some(stk), Some(vols)) = (solids.ch.as_ref(), sed_stack, ch_volumes) {
        let cb = species_balance(ch, stk, vols, species);
        b.initial_wc += cb.initial_wc;
        b.initial_bed += cb.initial_bed;
        b.loads += cb.loads;
        b.advection_in += cb.advection_in;
        b.advection_out += cb.advection_out;
        b.dispersion_in += cb.dispersion_in;
        b.dispersion_out += cb.dispersion_out;
        b.deposition += cb.deposition;
        b.erosion += cb.erosion;
        b.burial += cb.burial;
        b.scour += cb.scour;
        b.final_wc += cb.final_wc;
        b.final_bed += cb.final_bed;
        b.residual += cb.residual;
    }
    let _ = basin;
    let sources = b.initial_wc + b.initial_bed + b.loads + b.advection_in + b.dispersion_in
        + b.residual;
    let sinks = b.advection_out + b.dispersion_out;
    let storage = b.final_wc + b.final_bed;
    b.error_percent = if sources > 0.0 {
        (sources - sinks - storage) / sources * 100.0
    } else {
        0.0
    };
    b
}

/// Cross-domain budget for one chemical.
pub fn chem_budget(
    chems: &ChemState,
    soil_stack: &StackSet,
    sed_stack: Option<&StackSet>,
    ov_volumes: &[f64],
    ch_volumes: Option<&[f64]>,
    species: usize,
) -> (SpeciesBalance, f64) {
    let mut b = species_balance(&chems.ov.trans, soil_stack, ov_volumes, species);
    let mut transformed = 0.0;
    for col in 0..chems.ov.biomass.ncolumns {
        transformed += chems.ov.biomass.at(species, col)
            + chems.ov.hydmass.at(species, col)
            + chems.ov.oximass.at(species, col)
            + chems.ov.phtmass.at(species, col)
            + chems.ov.radmass.at(species, col)
            + chems.ov.volmass.at(species, col)
            + chems.ov.usrmass.at(species, col);
    }
    if let (Some(ch), Some(stk), Some(vols)) = (chems.ch.as_ref(), sed_stack, ch_volumes) {
        let cb = species_balance(&ch.trans, stk, vols, species);
        b.initial_wc += cb.initial_wc;
        b.initial_bed += cb.initial_bed;
        b.loads += cb.loads;
        b.advection_in += cb.advection_in;
        b.advection_out += cb.advection_out;
        b.dispersion_in += cb.dispersion_in;
        b.dispersion_out += cb.dispersion_out;
        b.deposition += cb.deposition;
        b.erosion += cb.erosion;
        b.burial += cb.burial;
        b.scour += cb.scour;
        b.final_wc += cb.final_wc;
        b.final_bed += cb.final_bed;
        b.residual += cb.residual;
        for col in 0..ch.biomass.ncolumns {
            transformed += ch.biomass.at(species, col)
                + ch.hydmass.at(species, col)
                + ch.oximass.at(species, col)
                + ch.phtmass.at(species, col)
                + ch.radmass.at(species, col)
                + ch.volmass.at(species, col)
                + ch.usrmass.at(species, col);
        }
    }
    let sources = b.initial_wc + b.initial_bed + b.loads + b.advection_in + b.dispersion_in
        + b.residual;
    let sinks = b.advection_out + b.dispersion_out + transformed;
    let storage = b.final_wc + b.final_bed;
    b.error_percent = if sources > 0.0 {
        (sources - sinks - storage) / sources * 100.0
    } else {
        0.0
    };
    (b, transformed)
}
