use crate::chemical::ChemClass;

//First-order kinetic transformations.  Each process removes mass from
//the phase it acts on at a temperature-corrected rate; the per-step
//loss is bounded by the mass present so stacked processes cannot
//drive a mass negative.

pub const N_PROCESSES: usize = 7;

pub const BIOLYSIS: usize = 0;
pub const HYDROLYSIS: usize = 1;
pub const OXIDATION: usize = 2;
pub const PHOTOLYSIS: usize = 3;
pub const RADIOLYSIS: usize = 4;
pub const VOLATILIZATION: usize = 5;
pub const USER_DEFINED: usize = 6;

/*
Apply every transformation to a mass (g) in sequence and return the
per-process losses (g).  Photolysis and volatilization act only on the
water column; the caller masks them off for bed masses.
 */
pub fn apply_losses(
    chem: &ChemClass,
    mass: &mut f64,
    temperature: f64,
    dt: f64,
    water_column: bool,
) -> [f64; N_PROCESSES] {
    let mut losses = [0.0; N_PROCESSES];
    let rates = [
        chem.corrected(chem.kbio, temperature),
        chem.corrected(chem.khyd, temperature),
        chem.corrected(chem.koxi, temperature),
        if water_column {
            chem.corrected(chem.kpht, temperature)
        } else {
            0.0
        },
        chem.corrected(chem.krad, temperature),
        if water_column {
            chem.corrected(chem.kvol, temperature)
        } else {
            0.0
        },
        chem.corrected(chem.kusr, temperature),
    ];
    for (which, k) in rates.into_iter().enumerate() {
        if k <= 0.0 || *mass <= 0.0 {
            continue;
        }
        let loss = (k * *mass * dt).min(*mass);
        *mass -= loss;
        losses[which] = loss;
    }
    losses
}
