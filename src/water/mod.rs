pub mod channel;
pub mod depth;
pub mod floodplain;
pub mod overland;

use crate::basin::Basin;
use crate::domain::{CellGrid, ColDirs, DirGrid};

/// Overland-plane water state: depths, the per-step gross/net flow
/// registers, cumulative flow volumes by source, friction slopes by
/// direction for the transport computations, and the outlet trackers.
#[derive(Clone, Default)]
pub struct OverlandWater {
    pub hov: CellGrid<f64>,     //water depth (m)
    pub hovnew: CellGrid<f64>,  //depth at the end of the step (m)
    pub initialwater: CellGrid<f64>, //initial water volume (m3)

    pub dqov: CellGrid<f64>, //net flow (m3/s)
    pub dqovin: DirGrid,     //gross inflow by source (m3/s)
    pub dqovout: DirGrid,    //gross outflow by source (m3/s)
    pub dqovinvol: DirGrid,  //cumulative gross inflow volume (m3)
    pub dqovoutvol: DirGrid, //cumulative gross outflow volume (m3)
    pub sfov: DirGrid,       //friction slope magnitude by direction

    //Per-outlet flow trackers (instantaneous and peaks)
    pub qinov: Vec<f64>,
    pub qoutov: Vec<f64>,
    pub qpeakov: Vec<f64>,
    pub tpeakov: Vec<f64>,
    pub qinovvol: Vec<f64>,
    pub qoutovvol: Vec<f64>,

    pub minhov: f64,
    pub maxhov: f64,
    pub residual: f64, //water volume created by clamping round-off negatives (m3)
}

impl OverlandWater {
    pub fn new(basin: &Basin) -> OverlandWater {
        let nrows = basin.spec.nrows;
        let ncols = basin.spec.ncols;
        let nout = basin.outlets.len();
        OverlandWater {
            hov: CellGrid::filled(nrows, ncols, 0.0),
            hovnew: CellGrid::filled(nrows, ncols, 0.0),
            initialwater: CellGrid::filled(nrows, ncols, 0.0),
            dqov: CellGrid::filled(nrows, ncols, 0.0),
            dqovin: DirGrid::zeroed(nrows, ncols),
            dqovout: DirGrid::zeroed(nrows, ncols),
            dqovinvol: DirGrid::zeroed(nrows, ncols),
            dqovoutvol: DirGrid::zeroed(nrows, ncols),
            sfov: DirGrid::zeroed(nrows, ncols),
            qinov: vec![0.0; nout],
            qoutov: vec![0.0; nout],
            qpeakov: vec![0.0; nout],
            tpeakov: vec![0.0; nout],
            qinovvol: vec![0.0; nout],
            qoutovvol: vec![0.0; nout],
            minhov: f64::INFINITY,
            maxhov: f64::NEG_INFINITY,
            residual: 0.0,
        }
    }
}

/// Channel-network water state, per flat node index.
#[derive(Clone, Default)]
pub struct ChannelWater {
    pub hch: Vec<f64>,
    pub hchnew: Vec<f64>,
    pub initialwater: Vec<f64>, //initial water volume (m3)

    pub dqch: Vec<f64>,   //net flow (m3/s)
    pub dqchin: ColDirs,  //gross inflow by source (m3/s)
    pub dqchout: ColDirs, //gross outflow by source (m3/s)
    pub dqchinvol: ColDirs,
    pub dqchoutvol: ColDirs,
    pub sfch: Vec<f64>,   //friction slope magnitude at the node outflow

    pub qinch: Vec<f64>,
    pub qoutch: Vec<f64>,
    pub qpeakch: Vec<f64>,
    pub tpeakch: Vec<f64>,
    pub qinchvol: Vec<f64>,
    pub qoutchvol: Vec<f64>,

    pub minhch: f64,
    pub maxhch: f64,
    pub residual: f64,
}

impl ChannelWater {
    pub fn new(basin: &Basin) -> ChannelWater {
        let nnodes = basin
            .channels
            .as_ref()
            .map(|c| c.total_nodes())
            .unwrap_or(0);
        let nout = basin.outlets.len();
        ChannelWater {
            hch: vec![0.0; nnodes],
            hchnew: vec![0.0; nnodes],
            initialwater: vec![0.0; nnodes],
            dqch: vec![0.0; nnodes],
            dqchin: ColDirs::zeroed(nnodes),
            dqchout: ColDirs::zeroed(nnodes),
            dqchinvol: ColDirs::zeroed(nnodes),
            dqchoutvol: ColDirs::zeroed(nnodes),
            sfch: vec![0.0; nnodes],
            qinch: vec![0.0; nout],
            qoutch: vec![0.0; nout],
            qpeakch: vec![0.0; nout],
            tpeakch: vec![0.0; nout],
            qinchvol: vec![0.0; nout],
            qoutchvol: vec![0.0; nout],
            minhch: f64::INFINITY,
            maxhch: f64::NEG_INFINITY,
            residual: 0.0,
        }
    }
}
