pub mod infiltration;
pub mod interception;
pub mod snow;
pub mod transloss;

use crate::basin::Basin;
use crate::domain::CellGrid;

/// Hydrologic state and per-step sink/source rates for every cell,
/// plus the channel transmission-loss state per node.  Rates are in
/// metres of water per second over the relevant surface.
#[derive(Clone, Default)]
pub struct HydrologyState {
    //Per-step rates (m/s)
    pub grossrain: CellGrid<f64>,  //gross rainfall onto the cell
    pub netrain: CellGrid<f64>,    //rainfall reaching the surface
    pub grossswe: CellGrid<f64>,   //snowfall (as swe)
    pub swemelt: CellGrid<f64>,    //snowmelt release
    pub infilrate: CellGrid<f64>,  //infiltration into the soil

    //State
    pub interception_left: CellGrid<f64>, //remaining interception capacity (m)
    pub swe: CellGrid<f64>,               //snow water equivalent (m)
    pub infildepth: CellGrid<f64>,        //cumulative infiltration depth (m)
    pub initial_swe: CellGrid<f64>,

    //Cumulative volumes for the mass balance (m3)
    pub grossrainvol: CellGrid<f64>,
    pub netrainvol: CellGrid<f64>,
    pub interceptionvol: CellGrid<f64>,
    pub grossswevol: CellGrid<f64>,
    pub swemeltvol: CellGrid<f64>,
    pub infilvol: CellGrid<f64>,

    //Channel transmission loss, per node
    pub tlossrate: Vec<f64>,  //loss rate through the bed (m/s)
    pub tlossdepth: Vec<f64>, //cumulative loss depth (m)
    pub tlossvol: Vec<f64>,   //cumulative loss volume (m3)
}

impl HydrologyState {
    pub fn new(basin: &Basin) -> HydrologyState {
        let nrows = basin.spec.nrows;
        let ncols = basin.spec.ncols;
        let nnodes = basin
            .channels
            .as_ref()
            .map(|c| c.total_nodes())
            .unwrap_or(0);
        let mut state = HydrologyState {
            grossrain: CellGrid::filled(nrows, ncols, 0.0),
            netrain: CellGrid::filled(nrows, ncols, 0.0),
            grossswe: CellGrid::filled(nrows, ncols, 0.0),
            swemelt: CellGrid::filled(nrows, ncols, 0.0),
            infilrate: CellGrid::filled(nrows, ncols, 0.0),
            interception_left: CellGrid::filled(nrows, ncols, 0.0),
            swe: CellGrid::filled(nrows, ncols, 0.0),
            infildepth: CellGrid::filled(nrows, ncols, 0.0),
            initial_swe: CellGrid::filled(nrows, ncols, 0.0),
            grossrainvol: CellGrid::filled(nrows, ncols, 0.0),
            netrainvol: CellGrid::filled(nrows, ncols, 0.0),
            interceptionvol: CellGrid::filled(nrows, ncols, 0.0),
            grossswevol: CellGrid::filled(nrows, ncols, 0.0),
            swemeltvol: CellGrid::filled(nrows, ncols, 0.0),
            infilvol: CellGrid::filled(nrows, ncols, 0.0),
            tlossrate: vec![0.0; nnodes],
            tlossdepth: vec![0.0; nnodes],
            tlossvol: vec![0.0; nnodes],
        };
        //Interception storage starts at the land-use capacity
        for row in 0..nrows {
            for col in 0..ncols {
                if basin.mask.is_active(row, col) {
                    let cap = basin.landuse_at(row, col).interception;
                    state.interception_left.set(row, col, cap);
                }
            }
        }
        state
    }
}
