pub mod advection;
pub mod capacity;
pub mod concentration;
pub mod dispersion;
pub mod exchange;

use crate::basin::Basin;
use crate::domain::registers::{MinMax, SpeciesColDirs, SpeciesCols};
use crate::domain::stack::LayerConc;

//Water density in g/m3; used to convert between particle mass and
//bed-layer volume together with the specific gravity and porosity.
pub const RHO_WATER: f64 = 1.0e6;
pub const GRAVITY: f64 = 9.81;
//Kinematic viscosity of water (m2/s) for the dimensionless diameter
pub const NU_WATER: f64 = 1.0e-6;

/// A solids (particle) class.
#[derive(Clone, Default)]
pub struct SolidsClass {
    pub name: String,
    pub ds: f64,        //representative diameter (m)
    pub spgravity: f64, //specific gravity (dimensionless)
    pub ws: f64,        //settling velocity (m/s)
    pub vcch: f64,      //critical velocity for erosion in channels (m/s)
}

impl SolidsClass {
    /// Dimensionless grain diameter d* used to weight the transport
    /// capacity toward finer classes.
    pub fn dstar(&self) -> f64 {
        self.ds * libm::pow((self.spgravity - 1.0) * GRAVITY / (NU_WATER * NU_WATER), 1.0 / 3.0)
    }
}

/// Solids state and flux/mass registers for one transport domain
/// (columns are flat cell indices overland, flat node indices in the
/// channel network).
#[derive(Clone, Default)]
pub struct DomainSolids {
    pub csed: LayerConc,    //concentrations, layer 0 = water column (g/m3)
    pub csednew: LayerConc, //end-of-step concentrations

    pub transcap: SpeciesCols, //transport capacity (g/s)

    //Advection and dispersion registers by direction/source
    pub advinflux: SpeciesColDirs,  //g/s
    pub advoutflux: SpeciesColDirs, //g/s
    pub advinmass: SpeciesColDirs,  //kg
    pub advoutmass: SpeciesColDirs, //kg
    pub dspinflux: SpeciesColDirs,
    pub dspoutflux: SpeciesColDirs,
    pub dspinmass: SpeciesColDirs,
    pub dspoutmass: SpeciesColDirs,

    //Water column <-> surface layer exchange
    pub depflux: SpeciesCols, //deposition (g/s, out of the water column)
    pub depmass: SpeciesCols, //kg
    pub ersflux: SpeciesCols, //erosion (g/s, into the water column)
    pub ersmass: SpeciesCols, //kg

    //Surface <-> subsurface exchange through push/pop
    pub burmass: SpeciesCols, //buried by a push (kg)
    pub scrmass: SpeciesCols, //re-exposed by a pop (kg)

    //Initial and residual accounting
    pub initialmass_wc: Vec<f64>,  //per class, kg in the water column at start
    pub initialmass_bed: Vec<f64>, //per class, kg in the bed at start
    pub residual: f64,             //clamped negative mass (kg)

    pub minmax_wc: MinMax,   //water column concentration extremes
    pub minmax_surf: MinMax, //surface layer concentration extremes
}

impl DomainSolids {
    pub fn new(nsolids: usize, ncolumns: usize, nlayers: usize) -> DomainSolids {
        DomainSolids {
            csed: LayerConc::zeroed(nsolids, ncolumns, nlayers),
            csednew: LayerConc::zeroed(nsolids, ncolumns, nlayers),
            transcap: SpeciesCols::zeroed(nsolids, ncolumns),
            advinflux: SpeciesColDirs::zeroed(nsolids, ncolumns),
            advoutflux: SpeciesColDirs::zeroed(nsolids, ncolumns),
            advinmass: SpeciesColDirs::zeroed(nsolids, ncolumns),
            advoutmass: SpeciesColDirs::zeroed(nsolids, ncolumns),
            dspinflux: SpeciesColDirs::zeroed(nsolids, ncolumns),
            dspoutflux: SpeciesColDirs::zeroed(nsolids, ncolumns),
            dspinmass: SpeciesColDirs::zeroed(nsolids, ncolumns),
            dspoutmass: SpeciesColDirs::zeroed(nsolids, ncolumns),
            depflux: SpeciesCols::zeroed(nsolids, ncolumns),
            depmass: SpeciesCols::zeroed(nsolids, ncolumns),
            ersflux: SpeciesCols::zeroed(nsolids, ncolumns),
            ersmass: SpeciesCols::zeroed(nsolids, ncolumns),
            burmass: SpeciesCols::zeroed(nsolids, ncolumns),
            scrmass: SpeciesCols::zeroed(nsolids, ncolumns),
            initialmass_wc: vec![0.0; nsolids + 1],
            initialmass_bed: vec![0.0; nsolids + 1],
            residual: 0.0,
            minmax_wc: MinMax::new(nsolids),
            minmax_surf: MinMax::new(nsolids),
        }
    }

    /// Zero the per-step flux registers (mass registers accumulate
    /// across the run and are left alone).
    pub fn clear_fluxes(&mut self) {
        for col in 0..self.advinflux.ncolumns {
            self.advinflux.clear_column(col);
            self.advoutflux.clear_column(col);
            self.dspinflux.clear_column(col);
            self.dspoutflux.clear_column(col);
        }
        for x in self.depflux.data.iter_mut() {
            *x = 0.0;
        }
        for x in self.ersflux.data.iter_mut() {
            *x = 0.0;
        }
        for x in self.transcap.data.iter_mut() {
            *x = 0.0;
        }
    }
}

/// All solids transport state: the class table and one domain record
/// for the overland plane plus one for the channel network.
#[derive(Clone, Default)]
pub struct SolidsState {
    pub classes: Vec<SolidsClass>, //1-based in reports; index 0 unused
    pub ov: DomainSolids,
    pub ch: Option<DomainSolids>,
}

/*
One solids transport step, strictly ordered: transport capacity,
advection, dispersion, deposition and erosion, the availability
limiter, influx mirroring, and finally the concentration and bed
updates with the stack push/pop.  The chemical transport domains ride
along so a push or pop keeps the chemical layers aligned with the
solids layers and feeds the chemical burial/scour registers.
 */
#[allow(clippy::too_many_arguments)]
pub fn step(
    basin: &crate::basin::Basin,
    forcing: &crate::forcing::ForcingSet,
    soil_stack: &mut crate::domain::StackSet,
    sed_stack: Option<&mut crate::domain::StackSet>,
    ov_water: &crate::water::OverlandWater,
    ch_water: &crate::water::ChannelWater,
    state: &mut SolidsState,
    chem_bed_ov: Option<&mut DomainSolids>,
    chem_bed_ch: Option<&mut DomainSolids>,
    active_cells: &[usize],
    simtime: f64,
    dt: f64,
) -> Result<(), String> {
    let nsolids = state.classes.len();
    let classes = state.classes.clone();

    state.ov.clear_fluxes();
    if let Some(ch) = state.ch.as_mut() {
        ch.clear_fluxes();
    }

    //Transport capacity
    capacity::overland(basin, soil_stack, ov_water, &mut state.ov, &classes);
    if let Some(ch) = state.ch.as_mut() {
        capacity::channel(basin, ch_water, ch, &classes);
    }

    //Advection
    advection::overland(basin, forcing, ov_water, &mut state.ov, nsolids);
    if let Some(ch) = state.ch.as_mut() {
        advection::channel(basin, forcing, ch_water, ch, nsolids);
    }

    //Dispersion
    dispersion::overland(basin, ov_water, &mut state.ov, nsolids);
    if let Some(ch) = state.ch.as_mut() {
        dispersion::channel(basin, ch_water, ch, nsolids);
        dispersion::floodplain(basin, ov_water, ch_water, &mut state.ov, ch, nsolids);
    }

    //Deposition and erosion
    if let Some(stk) = sed_stack.as_deref() {
        if let Some(ch) = state.ch.as_mut() {
            exchange::channel(basin, stk, ch_water, ch, &classes, dt);
        }
    }
    exchange::overland(basin, soil_stack, ov_water, &mut state.ov, &classes, dt);

    //Availability limiter, then mirror the surviving outfluxes
    let vol_ov = concentration::water_volumes_overland(basin, ov_water);
    concentration::limit_availability(&mut state.ov, &vol_ov.old, nsolids, dt);
    let vol_ch = state.ch.as_mut().map(|ch| {
        let v = concentration::water_volumes_channel(basin, ch_water);
        concentration::limit_availability(ch, &v.old, nsolids, dt);
        v
    });

    concentration::derive_influx_overland(basin, &mut state.ov, nsolids);
    if let Some(ch) = state.ch.as_mut() {
        concentration::derive_influx_channel(basin, ch, nsolids);
        concentration::derive_influx_floodplain(basin, &mut state.ov, ch, nsolids);
    }

    //Concentration updates, bed volume updates, push/pop
    concentration::update(
        &mut state.ov,
        soil_stack,
        chem_bed_ov,
        &classes,
        &vol_ov,
        active_cells,
        simtime,
        dt,
    )?;
    if let (Some(ch), Some(stk), Some(vols)) = (state.ch.as_mut(), sed_stack, vol_ch) {
        let nodes: Vec<usize> = (0..vols.old.len()).collect();
        concentration::update(ch, stk, chem_bed_ch, &classes, &vols, &nodes, simtime, dt)?;
    }

    Ok(())
}

impl SolidsState {
    pub fn nsolids(&self) -> usize {
        self.classes.len()
    }

    pub fn new(basin: &Basin, nsolids: usize, nlayers_ov: usize, nlayers_ch: usize) -> SolidsState {
        let ncells = basin.spec.ncells();
        let ch = basin.channels.as_ref().map(|net| {
            DomainSolids::new(nsolids, net.total_nodes(), nlayers_ch)
        });
        SolidsState {
            classes: Vec::new(),
            ov: DomainSolids::new(nsolids, ncells, nlayers_ov),
            ch,
        }
    }
}
