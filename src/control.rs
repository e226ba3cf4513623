//Run control: every option switch of the input deck plus the output
//file paths, gathered into one struct owned by the simulation.

/// Simulation level: 1 = hydrology only, 2 = + solids, 3 = + chemicals.
pub const KSIM_HYDROLOGY: i32 = 1;
pub const KSIM_SOLIDS: i32 = 2;
pub const KSIM_CHEMICALS: i32 = 3;

#[derive(Clone)]
pub struct SimControl {
    //Data group A: simulation control
    pub ksim: i32,
    pub tstart: f64,         //simulation start time (s)
    pub tend: f64,           //simulation end time (s)
    pub dtopt: i32,          //0 = fixed table, 1 = Courant-adaptive, 2 = hybrid
    pub maxcourant: f64,     //Courant ceiling for adaptive stepping
    pub dtmax: f64,          //upper bound on adaptive dt (s)
    pub dtmin: f64,          //lower bound on adaptive dt (s)
    pub relax: f64,          //gain applied to adaptive dt proposals
    pub bdt: usize,          //in-memory capacity of the dt buffer
    pub printout_interval: f64, //time series print interval (s)
    pub printgrid_interval: f64, //grid print interval (s)

    //Data group B: hydrology and channels
    pub chnopt: i32,
    pub infopt: i32,
    pub snowopt: i32,
    pub meltopt: i32,
    pub ctlopt: i32,
    pub fldopt: i32,
    pub outopt: i32,
    pub rainopt: i32,
    pub ddf: f64,            //degree-day melt factor (m swe per degC per s)
    pub tbase: f64,          //degree-day base temperature (degC)
    pub tsnow: f64,          //air temperature below which rain falls as snow (degC)
    pub ctlkh: f64,          //channel bed hydraulic conductivity (m/s)
    pub ctlpsi: f64,         //channel bed suction head (m)
    pub ctldtheta: f64,      //channel bed moisture deficit

    //Data group C: solids
    pub nsolids: usize,

    //Data group D: chemicals
    pub nchems: usize,

    //Data group E: output files
    pub echofile: String,
    pub summaryfile: String,
    pub msbfile: String,
    pub waterexpfile: String,
    pub sedexpfile: String,
    pub chemexpfile: String,
    pub dtbufferfile: String,
    pub gridbase: String,    //prefix for grid snapshot files
    pub jsonsummaryfile: String,

    //Solids export units per reporting group: 1 = g/m3, 2 = t/day
    pub sedunitsopt: Vec<i32>,
}

impl Default for SimControl {
    fn default() -> SimControl {
        SimControl {
            ksim: KSIM_HYDROLOGY,
            tstart: 0.0,
            tend: 0.0,
            dtopt: 0,
            maxcourant: 0.5,
            dtmax: 60.0,
            dtmin: 0.1,
            relax: 0.9,
            bdt: 10_000,
            printout_interval: 3600.0,
            printgrid_interval: 0.0,
            chnopt: 0,
            infopt: 0,
            snowopt: 0,
            meltopt: 0,
            ctlopt: 0,
            fldopt: 0,
            outopt: 0,
            rainopt: 1,
            ddf: 0.0,
            tbase: 0.0,
            tsnow: 0.0,
            ctlkh: 0.0,
            ctlpsi: 0.0,
            ctldtheta: 0.0,
            nsolids: 0,
            nchems: 0,
            echofile: String::new(),
            summaryfile: String::new(),
            msbfile: String::new(),
            waterexpfile: String::new(),
            sedexpfile: String::new(),
            chemexpfile: String::new(),
            dtbufferfile: String::new(),
            gridbase: String::new(),
            jsonsummaryfile: String::new(),
            sedunitsopt: Vec::new(),
        }
    }
}

impl SimControl {
    pub fn simulates_solids(&self) -> bool {
        self.ksim >= KSIM_SOLIDS
    }

    pub fn simulates_chemicals(&self) -> bool {
        self.ksim >= KSIM_CHEMICALS
    }
}
