pub mod kinetics;
pub mod transport;

use crate::basin::Basin;
use crate::domain::registers::SpeciesCols;
use crate::domain::stack::LayerConc;
use crate::solids::DomainSolids;

/// A chemical: partition coefficients against each solids class and
/// first-order transformation rates.  Partitioning is computed from
/// the local solids concentrations, so the dissolved and bound
/// fractions follow the suspended load around the domain.
#[derive(Clone, Default)]
pub struct ChemClass {
    pub name: String,
    pub kp: Vec<f64>,    //partition coefficient per solids class (m3/g), slot 0 unused
    pub kbio: f64,       //biolysis rate (1/s)
    pub khyd: f64,       //hydrolysis rate (1/s)
    pub koxi: f64,       //oxidation rate (1/s)
    pub kpht: f64,       //photolysis rate (1/s)
    pub krad: f64,       //radiolysis rate (1/s)
    pub kvol: f64,       //volatilization rate (1/s, water column only)
    pub kusr: f64,       //user-defined reaction rate (1/s)
    pub theta: f64,      //temperature correction coefficient
    pub kexch: f64,      //porewater exchange velocity (m/s)
}

impl ChemClass {
    /// Dissolved fraction at the local solids concentrations.
    /// `csed` must address the same layer the fraction is asked for.
    pub fn dissolved_fraction(&self, csed: &LayerConc, col: usize, layer: usize) -> f64 {
        let mut bound = 0.0;
        for s in 1..=csed.nspecies {
            let kp = self.kp.get(s).copied().unwrap_or(0.0);
            bound += kp * csed.at(s, col, layer);
        }
        1.0 / (1.0 + bound)
    }

    /// Fraction bound to one solids class
    pub fn bound_fraction(&self, csed: &LayerConc, col: usize, layer: usize, isolid: usize) -> f64 {
        let mut bound = 0.0;
        for s in 1..=csed.nspecies {
            let kp = self.kp.get(s).copied().unwrap_or(0.0);
            bound += kp * csed.at(s, col, layer);
        }
        let kp = self.kp.get(isolid).copied().unwrap_or(0.0);
        kp * csed.at(isolid, col, layer) / (1.0 + bound)
    }

    /// First-order rate with temperature correction
    pub fn corrected(&self, k: f64, temperature: f64) -> f64 {
        if k <= 0.0 {
            return 0.0;
        }
        if self.theta > 0.0 {
            k * libm::pow(self.theta, temperature - 20.0)
        } else {
            k
        }
    }
}

/// Chemical state for one transport domain: the shared transport
/// registers (the same shapes the solids carry) plus the kinetic and
/// porewater mass registers.
#[derive(Clone, Default)]
pub struct DomainChems {
    pub trans: DomainSolids,
    pub biomass: SpeciesCols, //net biolysis loss (kg)
    pub hydmass: SpeciesCols,
    pub oximass: SpeciesCols,
    pub phtmass: SpeciesCols,
    pub radmass: SpeciesCols,
    pub volmass: SpeciesCols,
    pub usrmass: SpeciesCols,
    pub pwrmass: SpeciesCols, //porewater release to the water column (kg)
}

impl DomainChems {
    pub fn new(nchems: usize, ncolumns: usize, nlayers: usize) -> DomainChems {
        DomainChems {
            trans: DomainSolids::new(nchems, ncolumns, nlayers),
            biomass: SpeciesCols::zeroed(nchems, ncolumns),
            hydmass: SpeciesCols::zeroed(nchems, ncolumns),
            oximass: SpeciesCols::zeroed(nchems, ncolumns),
            phtmass: SpeciesCols::zeroed(nchems, ncolumns),
            radmass: SpeciesCols::zeroed(nchems, ncolumns),
            volmass: SpeciesCols::zeroed(nchems, ncolumns),
            usrmass: SpeciesCols::zeroed(nchems, ncolumns),
            pwrmass: SpeciesCols::zeroed(nchems, ncolumns),
        }
    }
}

/// All chemical transport state.
#[derive(Clone, Default)]
pub struct ChemState {
    pub classes: Vec<ChemClass>,
    pub ov: DomainChems,
    pub ch: Option<DomainChems>,
}

impl ChemState {
    pub fn nchems(&self) -> usize {
        self.classes.len()
    }

    pub fn new(basin: &Basin, nchems: usize, nlayers_ov: usize, nlayers_ch: usize) -> ChemState {
        let ncells = basin.spec.ncells();
        let ch = basin
            .channels
            .as_ref()
            .map(|net| DomainChems::new(nchems, net.total_nodes(), nlayers_ch));
        ChemState {
            classes: Vec::new(),
            ov: DomainChems::new(nchems, ncells, nlayers_ov),
            ch,
        }
    }
}
