use crate::basin::{Basin, GageLocation, LandUseClass, Outlet, ReportStation, SoilType};
use crate::chemical::{ChemClass, ChemState};
use crate::clock::{Clock, DtBuffer};
use crate::control::SimControl;
use crate::domain::stack::WATER_COLUMN;
use crate::domain::{CellGrid, Mask, StackSet};
use crate::forcing::{ChannelLoad, ChannelSource, ForcingSet, Load, PointSource, TimeFunction};
use crate::io::channel_file::{read_channel_file, read_link_file};
use crate::io::grid_ascii::read_grid_checked;
use crate::io::scanner::TokenScanner;
use crate::simulation::Simulation;
use crate::solids::{SolidsClass, SolidsState, RHO_WATER};
use std::path::{Path, PathBuf};

//The primary control file: five named data groups of `name value`
//records.  Group A selects the simulation level and the time
//stepping, group B describes the watershed and its hydrology, group C
//the solids, group D the chemicals, and group E the output files.
//Auxiliary grids and channel files are referenced by path relative to
//the deck.

//Unit conversions at the deck boundary
const HOURS: f64 = 3600.0; //deck times are hours, internal time is seconds
const MM_PER_HR: f64 = 0.001 / 3600.0; //rain intensity to m/s
const KG_PER_DAY: f64 = 1000.0 / 86400.0; //loads to g/s
const MM_PER_DEGC_DAY: f64 = 0.001 / 86400.0; //melt factor to m/degC/s

pub struct DeckIO {
    working_directory: Option<PathBuf>,
}

impl DeckIO {
    pub fn new() -> DeckIO {
        DeckIO {
            working_directory: None,
        }
    }

    /// Read a control deck and assemble the simulation.
    pub fn read_deck_file(&self, path: &str) -> Result<Simulation, String> {
        println!("Reading control file: {}", path);
        let mut io = DeckIO {
            working_directory: Path::new(path).parent().map(|p| p.to_path_buf()),
        };
        let mut scan = TokenScanner::open(path)?;
        io.parse(&mut scan)
    }

    /// Read a control deck from a string (paths resolve against the
    /// current directory).
    pub fn read_deck_string(&self, content: &str) -> Result<Simulation, String> {
        let mut scan = TokenScanner::from_content("<deck>", content);
        let mut io = DeckIO {
            working_directory: self.working_directory.clone(),
        };
        io.parse(&mut scan)
    }

    /// Resolve a file reference against the deck location.
    fn resolve(&self, file: &str) -> String {
        match &self.working_directory {
            Some(dir) if !dir.as_os_str().is_empty() => {
                dir.join(file).to_string_lossy().into_owned()
            }
            _ => file.to_string(),
        }
    }

    fn parse(&mut self, scan: &mut TokenScanner) -> Result<Simulation, String> {
        let mut ctl = SimControl::default();
        let mut dt_table: Vec<f64> = Vec::new();
        let mut dttime: Vec<f64> = Vec::new();

        //--- Data group A: simulation and time control ---------------
        scan.expect("GROUP")?;
        scan.expect("A")?;
        loop {
            let key = scan.next_str("group A record")?.to_ascii_uppercase();
            match key.as_str() {
                "KSIM" => ctl.ksim = scan.next_i32("ksim")?,
                "TSTART" => ctl.tstart = scan.next_f64("tstart")? * HOURS,
                "TEND" => ctl.tend = scan.next_f64("tend")? * HOURS,
                "DTOPT" => ctl.dtopt = scan.next_i32("dtopt")?,
                "MAXCOURANT" => ctl.maxcourant = scan.next_f64("maxcourant")?,
                "DTMAX" => ctl.dtmax = scan.next_f64("dtmax")?,
                "DTMIN" => ctl.dtmin = scan.next_f64("dtmin")?,
                "RELAX" => ctl.relax = scan.next_f64("relax")?,
                "BDT" => ctl.bdt = scan.next_usize("bdt")?,
                "NDT" => {
                    let ndt = scan.next_usize("ndt")?;
                    for _ in 0..ndt {
                        dt_table.push(scan.next_f64("dt value")?);
                        dttime.push(scan.next_f64("dt time break")? * HOURS);
                    }
                }
                "DTFILE" => {
                    let file = self.resolve(&scan.next_str("dt file")?);
                    read_dt_file(&file, &mut dt_table, &mut dttime)?;
                }
                "PRINTOUT" => ctl.printout_interval = scan.next_f64("printout interval")? * HOURS,
                "PRINTGRID" => ctl.printgrid_interval = scan.next_f64("printgrid interval")? * HOURS,
                "END" => {
                    scan.expect("GROUP")?;
                    scan.expect("A")?;
                    break;
                }
                other => return Err(scan.error(&format!("unknown group A record '{}'", other))),
            }
        }
        if !(1..=3).contains(&ctl.ksim) {
            return Err(scan.error("ksim must be 1, 2, or 3"));
        }
        if ctl.tend <= ctl.tstart {
            return Err(scan.error("tend must be after tstart"));
        }
        if dt_table.is_empty() {
            return Err(scan.error("no time steps specified (ndt or dtfile)"));
        }
        //the last tabulated step extends to the end of the run
        if let Some(last) = dttime.last_mut() {
            if *last < ctl.tend {
                *last = ctl.tend;
            }
        }

        //--- Data group B: hydrology and channels --------------------
        let mut basin = Basin::default();
        let mut forcing = ForcingSet::default();
        let mut hov0: Option<CellGrid<f64>> = None;
        let mut hov0const = 0.0;
        let mut hch0const = 0.0;
        let mut swe0: Option<CellGrid<f64>> = None;
        let mut swe0const = 0.0;
        let mut storage_const: Option<f64> = None;
        let mut soil_const: Option<usize> = None;
        let mut mask_read = false;

        scan.expect("GROUP")?;
        scan.expect("B")?;
        loop {
            let key = scan.next_str("group B record")?.to_ascii_uppercase();
            match key.as_str() {
                "MASKFILE" => {
                    let file = self.resolve(&scan.next_str("mask file")?);
                    println!("Reading mask file: {}", file);
                    let (spec, grid) = crate::io::grid_ascii::read_grid(&file)
                        .map_err(String::from)?;
                    let nodata = spec.nodata as i32;
                    let mut mask = CellGrid::filled(spec.nrows, spec.ncols, nodata);
                    for i in 0..grid.data.len() {
                        mask.data[i] = grid.data[i] as i32;
                    }
                    basin.spec = spec;
                    basin.mask = Mask {
                        grid: mask,
                        nodata,
                    };
                    mask_read = true;
                }
                "ELEVATIONFILE" => {
                    let file = self.resolve(&scan.next_str("elevation file")?);
                    println!("Reading elevation file: {}", file);
                    require_mask(mask_read, scan)?;
                    basin.elevation = read_grid_checked(&file, &basin.spec).map_err(String::from)?;
                }
                "LANDUSEFILE" => {
                    let file = self.resolve(&scan.next_str("land use file")?);
                    println!("Reading land use file: {}", file);
                    require_mask(mask_read, scan)?;
                    let grid = read_grid_checked(&file, &basin.spec).map_err(String::from)?;
                    basin.landuse = CellGrid::filled(basin.spec.nrows, basin.spec.ncols, 0);
                    for i in 0..grid.data.len() {
                        let v = grid.data[i];
                        basin.landuse.data[i] = if v > 0.0 { v as usize - 1 } else { 0 };
                    }
                }
                "NLANDUSE" => {
                    let n = scan.next_usize("number of land use classes")?;
                    basin.landuse_classes = vec![LandUseClass::default(); n];
                }
                "LANDUSE" => {
                    let id = scan.next_usize("land use id")?;
                    if id == 0 || id > basin.landuse_classes.len() {
                        return Err(scan.error(&format!("land use id {} out of range", id)));
                    }
                    let class = &mut basin.landuse_classes[id - 1];
                    class.name = scan.next_str("land use name")?;
                    class.nmanning = scan.next_f64("Manning n")?;
                    class.interception = scan.next_f64("interception depth")? / 1000.0; //mm to m
                }
                "STORAGEDEPTHFILE" => {
                    let file = self.resolve(&scan.next_str("storage depth file")?);
                    println!("Reading storage depth file: {}", file);
                    require_mask(mask_read, scan)?;
                    basin.storagedepth = read_grid_checked(&file, &basin.spec).map_err(String::from)?;
                }
                "STORAGEDEPTHCONST" => storage_const = Some(scan.next_f64("storage depth")?),
                "NSOILS" => {
                    let n = scan.next_usize("number of soils")?;
                    basin.soils = vec![SoilType::default(); n];
                }
                "SOIL" => {
                    let id = scan.next_usize("soil id")?;
                    if id == 0 || id > basin.soils.len() {
                        return Err(scan.error(&format!("soil id {} out of range", id)));
                    }
                    let soil = &mut basin.soils[id - 1];
                    soil.name = scan.next_str("soil name")?;
                    soil.kh = scan.next_f64("hydraulic conductivity")?;
                    soil.psi = scan.next_f64("suction head")?;
                    soil.dtheta = scan.next_f64("moisture deficit")?;
                    soil.porosity = scan.next_f64("porosity")?;
                }
                "SOILFILE" => {
                    let file = self.resolve(&scan.next_str("soil file")?);
                    println!("Reading soil type file: {}", file);
                    require_mask(mask_read, scan)?;
                    let grid = read_grid_checked(&file, &basin.spec).map_err(String::from)?;
                    basin.soil_grid = CellGrid::filled(basin.spec.nrows, basin.spec.ncols, 0);
                    for i in 0..grid.data.len() {
                        let v = grid.data[i];
                        basin.soil_grid.data[i] = if v > 0.0 { v as usize - 1 } else { 0 };
                    }
                }
                "SOILCONST" => soil_const = Some(scan.next_usize("soil id")? - 1),
                "INFOPT" => ctl.infopt = scan.next_i32("infopt")?,
                "CHNOPT" => ctl.chnopt = scan.next_i32("chnopt")?,
                "FLDOPT" => ctl.fldopt = scan.next_i32("fldopt")?,
                "CTLOPT" => {
                    ctl.ctlopt = scan.next_i32("ctlopt")?;
                    if ctl.ctlopt > 0 {
                        ctl.ctlkh = scan.next_f64("bed conductivity")?;
                        ctl.ctlpsi = scan.next_f64("bed suction head")?;
                        ctl.ctldtheta = scan.next_f64("bed moisture deficit")?;
                    }
                }
                "OUTOPT" => ctl.outopt = scan.next_i32("outopt")?,
                "SNOWOPT" => ctl.snowopt = scan.next_i32("snowopt")?,
                "MELTOPT" => {
                    ctl.meltopt = scan.next_i32("meltopt")?;
                    if ctl.meltopt > 0 {
                        ctl.ddf = scan.next_f64("degree-day factor")? * MM_PER_DEGC_DAY;
                        ctl.tbase = scan.next_f64("base temperature")?;
                    }
                }
                "TSNOW" => ctl.tsnow = scan.next_f64("rain/snow threshold")?,
                "RAINOPT" => {
                    ctl.rainopt = scan.next_i32("rainopt")?;
                    if !(1..=4).contains(&ctl.rainopt) {
                        return Err(scan.error("rainopt must be 1, 2, 3, or 4"));
                    }
                }
                "RAINGAGEGRID" => {
                    //cell-by-cell gage assignment (1-based gage numbers)
                    let file = self.resolve(&scan.next_str("rain gage grid")?);
                    println!("Reading rain gage grid: {}", file);
                    require_mask(mask_read, scan)?;
                    let grid = read_grid_checked(&file, &basin.spec).map_err(String::from)?;
                    let mut gages = CellGrid::filled(basin.spec.nrows, basin.spec.ncols, 1usize);
                    for i in 0..grid.data.len() {
                        let v = grid.data[i];
                        gages.data[i] = if v > 0.0 { v as usize } else { 1 };
                    }
                    basin.rain_gage_grid = Some(gages);
                }
                "RAINGAGE" => {
                    let id = scan.next_usize("gage number")?;
                    if id != forcing.rain_gages.len() + 1 {
                        return Err(scan.error(&format!(
                            "rain gage read = {} but gage expected = {}",
                            id,
                            forcing.rain_gages.len() + 1
                        )));
                    }
                    let x = scan.next_f64("gage x")?;
                    let y = scan.next_f64("gage y")?;
                    let series = read_series(scan, &format!("rain gage {}", id), MM_PER_HR)?;
                    basin.rain_gage_locations.push(GageLocation { x, y });
                    forcing.rain_gages.push(series);
                }
                "SNOWGAGE" => {
                    let id = scan.next_usize("gage number")?;
                    let x = scan.next_f64("gage x")?;
                    let y = scan.next_f64("gage y")?;
                    let series = read_series(scan, &format!("snow gage {}", id), MM_PER_HR)?;
                    basin.snow_gage_locations.push(GageLocation { x, y });
                    forcing.snow_gages.push(series);
                }
                "ATEMP" => {
                    forcing.air_temp = Some(read_series(scan, "air temperature", 1.0)?);
                }
                "LINKFILE" => {
                    let file = self.resolve(&scan.next_str("link file")?);
                    require_mask(mask_read, scan)?;
                    basin.channels = Some(read_link_file(&file, &basin.spec)?);
                }
                "CHANNELFILE" => {
                    let file = self.resolve(&scan.next_str("channel file")?);
                    require_mask(mask_read, scan)?;
                    if basin.elevation.data.is_empty() {
                        return Err(scan.error("channelfile requires the elevationfile first"));
                    }
                    let spec = basin.spec.clone();
                    let elevation = basin.elevation.clone();
                    match basin.channels.as_mut() {
                        Some(net) => read_channel_file(&file, &spec, &elevation, net)?,
                        None => {
                            return Err(scan.error("channelfile requires a linkfile first"));
                        }
                    }
                }
                "HOV0FILE" => {
                    let file = self.resolve(&scan.next_str("initial depth file")?);
                    require_mask(mask_read, scan)?;
                    hov0 = Some(read_grid_checked(&file, &basin.spec).map_err(String::from)?);
                }
                "HOV0CONST" => hov0const = scan.next_f64("initial overland depth")?,
                "HCH0CONST" => hch0const = scan.next_f64("initial channel depth")?,
                "SWE0FILE" => {
                    let file = self.resolve(&scan.next_str("initial snow file")?);
                    require_mask(mask_read, scan)?;
                    swe0 = Some(read_grid_checked(&file, &basin.spec).map_err(String::from)?);
                }
                "SWE0CONST" => swe0const = scan.next_f64("initial swe")?,
                "OUTLETS" => {
                    let n = scan.next_usize("number of outlets")?;
                    for i in 0..n {
                        let row = scan.next_usize("outlet row")?;
                        let col = scan.next_usize("outlet column")?;
                        if row == 0 || col == 0 || row > basin.spec.nrows || col > basin.spec.ncols
                        {
                            return Err(scan.error(&format!(
                                "outlet {} cell ({}, {}) is outside the grid",
                                i + 1,
                                row,
                                col
                            )));
                        }
                        let sovout = scan.next_f64("outlet slope")?;
                        let dbcopt = scan.next_i32("dbcopt")?;
                        basin.outlets.push(Outlet {
                            row: row - 1,
                            col: col - 1,
                            sovout,
                            dbcopt,
                        });
                        if dbcopt > 0 {
                            let series =
                                read_series(scan, &format!("outlet {} depth", i + 1), 1.0)?;
                            forcing.depth_bcs.push(Some(series));
                        } else {
                            forcing.depth_bcs.push(None);
                        }
                    }
                }
                "QWOV" => {
                    let n = scan.next_usize("number of overland point sources")?;
                    for i in 0..n {
                        let row = scan.next_usize("source row")? - 1;
                        let col = scan.next_usize("source column")? - 1;
                        let series =
                            read_series(scan, &format!("overland flow source {}", i + 1), 1.0)?;
                        forcing.flows_ov.push(PointSource { row, col, series });
                    }
                }
                "QWCH" => {
                    let n = scan.next_usize("number of channel point sources")?;
                    for i in 0..n {
                        let link = scan.next_usize("source link")? - 1;
                        let node = scan.next_usize("source node")? - 1;
                        let series =
                            read_series(scan, &format!("channel flow source {}", i + 1), 1.0)?;
                        forcing.flows_ch.push(ChannelSource { link, node, series });
                    }
                }
                "END" => {
                    scan.expect("GROUP")?;
                    scan.expect("B")?;
                    break;
                }
                other => return Err(scan.error(&format!("unknown group B record '{}'", other))),
            }
        }

        //Basic completeness checks for group B
        require_mask(mask_read, scan)?;
        if basin.landuse_classes.is_empty() {
            return Err("no land use classes defined (nlanduse)".to_string());
        }
        if basin.elevation.data.is_empty() {
            return Err("no elevation grid (elevationfile)".to_string());
        }
        if basin.landuse.data.is_empty() {
            basin.landuse = CellGrid::filled(basin.spec.nrows, basin.spec.ncols, 0);
        }
        if basin.storagedepth.data.is_empty() {
            basin.storagedepth = CellGrid::filled(
                basin.spec.nrows,
                basin.spec.ncols,
                storage_const.unwrap_or(0.0),
            );
        }
        if basin.soils.is_empty() {
            basin.soils = vec![SoilType {
                name: "default".to_string(),
                porosity: 0.5,
                ..Default::default()
            }];
        }
        if basin.soil_grid.data.is_empty() {
            basin.soil_grid =
                CellGrid::filled(basin.spec.nrows, basin.spec.ncols, soil_const.unwrap_or(0));
        }
        if ctl.chnopt > 0 && basin.channels.is_none() {
            return Err("chnopt = 1 but no linkfile/channelfile given".to_string());
        }
        if ctl.chnopt == 0 {
            basin.channels = None;
        }
        if ctl.rainopt <= 1 && forcing.rain_gages.len() > 1 {
            return Err("rainopt = 1 takes a single rain gage".to_string());
        }
        if ctl.rainopt == 4 && basin.rain_gage_grid.is_none() {
            return Err("rainopt = 4 requires a raingagegrid record".to_string());
        }

        //--- Data group C: solids ------------------------------------
        let mut solids_classes: Vec<SolidsClass> = Vec::new();
        let mut gsd: Vec<Vec<f64>> = Vec::new(); //per soil, per class fraction
        let mut maxstackov = 3usize;
        let mut maxstackch = 3usize;
        let mut soil_layers: Vec<f64> = Vec::new(); //thicknesses, bottom-up
        let mut sed_layers: Vec<f64> = Vec::new();
        let mut stack_fracs = (0.5, 1.5, 0.05); //min frac, max frac, new layer thickness
        let mut csedov0: Vec<f64> = Vec::new(); //initial suspended conc per class
        let mut solids_loads_tmp: Vec<Load> = Vec::new();
        let mut solids_loads_dist_tmp: Vec<Load> = Vec::new();
        let mut solids_loads_ch_tmp: Vec<ChannelLoad> = Vec::new();

        if ctl.ksim >= 2 {
            scan.expect("GROUP")?;
            scan.expect("C")?;
            loop {
                let key = scan.next_str("group C record")?.to_ascii_uppercase();
                match key.as_str() {
                    "NSOLIDS" => {
                        let n = scan.next_usize("number of solids classes")?;
                        solids_classes = vec![SolidsClass::default(); n];
                        csedov0 = vec![0.0; n + 1];
                    }
                    "SOLID" => {
                        let id = scan.next_usize("solids id")?;
                        if id == 0 || id > solids_classes.len() {
                            return Err(scan.error(&format!("solids id {} out of range", id)));
                        }
                        let class = &mut solids_classes[id - 1];
                        class.name = scan.next_str("solids name")?;
                        class.ds = scan.next_f64("particle diameter")?;
                        class.spgravity = scan.next_f64("specific gravity")?;
                        class.ws = scan.next_f64("settling velocity")?;
                        class.vcch = scan.next_f64("channel critical velocity")?;
                    }
                    "LANDUSETRANSPORT" => {
                        let id = scan.next_usize("land use id")?;
                        if id == 0 || id > basin.landuse_classes.len() {
                            return Err(scan.error(&format!("land use id {} out of range", id)));
                        }
                        let class = &mut basin.landuse_classes[id - 1];
                        class.ktc = scan.next_f64("transport coefficient")?;
                        class.cusle = scan.next_f64("cover factor")?;
                        class.pusle = scan.next_f64("practice factor")?;
                        class.betas = scan.next_f64("discharge exponent")?;
                        class.gammas = scan.next_f64("slope exponent")?;
                        class.tcwexp = scan.next_f64("grain weighting exponent")?;
                    }
                    "SOILERODE" => {
                        let id = scan.next_usize("soil id")?;
                        if id == 0 || id > basin.soils.len() {
                            return Err(scan.error(&format!("soil id {} out of range", id)));
                        }
                        let soil = &mut basin.soils[id - 1];
                        soil.kusle = scan.next_f64("erodibility")?;
                        soil.vcov = scan.next_f64("overland critical velocity")?;
                    }
                    "GSD" => {
                        let id = scan.next_usize("soil id")?;
                        if id == 0 || id > basin.soils.len() {
                            return Err(scan.error(&format!("soil id {} out of range", id)));
                        }
                        if gsd.len() < basin.soils.len() {
                            gsd.resize(basin.soils.len(), Vec::new());
                        }
                        let mut fracs = Vec::with_capacity(solids_classes.len());
                        let mut sum = 0.0;
                        for _ in 0..solids_classes.len() {
                            let f = scan.next_f64("grain size fraction")?;
                            sum += f;
                            fracs.push(f);
                        }
                        if (sum - 1.0).abs() > 1.0e-3 {
                            return Err(scan.error(&format!(
                                "grain size fractions for soil {} sum to {}",
                                id, sum
                            )));
                        }
                        gsd[id - 1] = fracs;
                    }
                    "MAXSTACKOV" => maxstackov = scan.next_usize("maxstackov")?,
                    "MAXSTACKCH" => maxstackch = scan.next_usize("maxstackch")?,
                    "STACKFRACS" => {
                        stack_fracs.0 = scan.next_f64("minimum volume fraction")?;
                        stack_fracs.1 = scan.next_f64("maximum volume fraction")?;
                        stack_fracs.2 = scan.next_f64("new layer thickness")?;
                    }
                    "SOILSTACK" => {
                        let n = scan.next_usize("number of soil layers")?;
                        soil_layers.clear();
                        for _ in 0..n {
                            soil_layers.push(scan.next_f64("layer thickness")?);
                        }
                    }
                    "SEDSTACK" => {
                        let n = scan.next_usize("number of sediment layers")?;
                        sed_layers.clear();
                        for _ in 0..n {
                            sed_layers.push(scan.next_f64("layer thickness")?);
                        }
                    }
                    "CSEDOV0CONST" => {
                        let id = scan.next_usize("solids id")?;
                        if id == 0 || id > solids_classes.len() {
                            return Err(scan.error(&format!("solids id {} out of range", id)));
                        }
                        csedov0[id] = scan.next_f64("initial concentration")?;
                    }
                    "SWOV" => {
                        let n = scan.next_usize("number of solids point loads")?;
                        for i in 0..n {
                            let species = scan.next_usize("solids id")?;
                            let row = scan.next_usize("load row")? - 1;
                            let col = scan.next_usize("load column")? - 1;
                            let series = read_series(
                                scan,
                                &format!("solids load {}", i + 1),
                                KG_PER_DAY,
                            )?;
                            solids_loads_tmp.push(Load {
                                species,
                                row,
                                col,
                                series,
                            });
                        }
                    }
                    "SWDOV" => {
                        let n = scan.next_usize("number of distributed solids loads")?;
                        for i in 0..n {
                            let species = scan.next_usize("solids id")?;
                            let series = read_series(
                                scan,
                                &format!("distributed solids load {}", i + 1),
                                KG_PER_DAY,
                            )?;
                            solids_loads_dist_tmp.push(Load {
                                species,
                                row: 0,
                                col: 0,
                                series,
                            });
                        }
                    }
                    "SWCH" => {
                        let n = scan.next_usize("number of channel solids loads")?;
                        for i in 0..n {
                            let species = scan.next_usize("solids id")?;
                            let link = scan.next_usize("load link")? - 1;
                            let node = scan.next_usize("load node")? - 1;
                            let series = read_series(
                                scan,
                                &format!("channel solids load {}", i + 1),
                                KG_PER_DAY,
                            )?;
                            solids_loads_ch_tmp.push(ChannelLoad {
                                species,
                                link,
                                node,
                                series,
                            });
                        }
                    }
                    "END" => {
                        scan.expect("GROUP")?;
                        scan.expect("C")?;
                        break;
                    }
                    other => {
                        return Err(scan.error(&format!("unknown group C record '{}'", other)))
                    }
                }
            }
            if solids_classes.is_empty() {
                return Err("ksim >= 2 but no solids classes defined".to_string());
            }
            if soil_layers.is_empty() {
                soil_layers.push(0.5);
            }
            if sed_layers.is_empty() {
                sed_layers.push(0.2);
            }
            ctl.nsolids = solids_classes.len();
        }

        //--- Data group D: chemicals ---------------------------------
        let mut chem_classes: Vec<ChemClass> = Vec::new();
        let mut cchemov0: Vec<f64> = Vec::new();
        let mut cchembed0: Vec<f64> = Vec::new();
        let mut chem_loads_tmp: Vec<Load> = Vec::new();
        let mut chem_loads_ch_tmp: Vec<ChannelLoad> = Vec::new();

        if ctl.ksim >= 3 {
            scan.expect("GROUP")?;
            scan.expect("D")?;
            loop {
                let key = scan.next_str("group D record")?.to_ascii_uppercase();
                match key.as_str() {
                    "NCHEMS" => {
                        let n = scan.next_usize("number of chemicals")?;
                        chem_classes = vec![
                            ChemClass {
                                kp: vec![0.0; ctl.nsolids + 1],
                                ..Default::default()
                            };
                            n
                        ];
                        cchemov0 = vec![0.0; n + 1];
                        cchembed0 = vec![0.0; n + 1];
                    }
                    "CHEM" => {
                        let id = scan.next_usize("chemical id")?;
                        if id == 0 || id > chem_classes.len() {
                            return Err(scan.error(&format!("chemical id {} out of range", id)));
                        }
                        let chem = &mut chem_classes[id - 1];
                        chem.name = scan.next_str("chemical name")?;
                        chem.kbio = scan.next_f64("biolysis rate")?;
                        chem.khyd = scan.next_f64("hydrolysis rate")?;
                        chem.koxi = scan.next_f64("oxidation rate")?;
                        chem.kpht = scan.next_f64("photolysis rate")?;
                        chem.krad = scan.next_f64("radiolysis rate")?;
                        chem.kvol = scan.next_f64("volatilization rate")?;
                        chem.kusr = scan.next_f64("user reaction rate")?;
                        chem.theta = scan.next_f64("temperature coefficient")?;
                        chem.kexch = scan.next_f64("porewater exchange velocity")?;
                    }
                    "KP" => {
                        let id = scan.next_usize("chemical id")?;
                        if id == 0 || id > chem_classes.len() {
                            return Err(scan.error(&format!("chemical id {} out of range", id)));
                        }
                        for isolid in 1..=ctl.nsolids {
                            chem_classes[id - 1].kp[isolid] =
                                scan.next_f64("partition coefficient")?;
                        }
                    }
                    "CCHEMOV0CONST" => {
                        let id = scan.next_usize("chemical id")?;
                        if id == 0 || id > chem_classes.len() {
                            return Err(scan.error(&format!("chemical id {} out of range", id)));
                        }
                        cchemov0[id] = scan.next_f64("initial concentration")?;
                    }
                    "CCHEMBED0CONST" => {
                        let id = scan.next_usize("chemical id")?;
                        if id == 0 || id > chem_classes.len() {
                            return Err(scan.error(&format!("chemical id {} out of range", id)));
                        }
                        cchembed0[id] = scan.next_f64("initial bed concentration")?;
                    }
                    "CWOV" => {
                        let n = scan.next_usize("number of chemical point loads")?;
                        for i in 0..n {
                            let species = scan.next_usize("chemical id")?;
                            let row = scan.next_usize("load row")? - 1;
                            let col = scan.next_usize("load column")? - 1;
                            let series = read_series(
                                scan,
                                &format!("chemical load {}", i + 1),
                                KG_PER_DAY,
                            )?;
                            chem_loads_tmp.push(Load {
                                species,
                                row,
                                col,
                                series,
                            });
                        }
                    }
                    "CWCH" => {
                        let n = scan.next_usize("number of channel chemical loads")?;
                        for i in 0..n {
                            let species = scan.next_usize("chemical id")?;
                            let link = scan.next_usize("load link")? - 1;
                            let node = scan.next_usize("load node")? - 1;
                            let series = read_series(
                                scan,
                                &format!("channel chemical load {}", i + 1),
                                KG_PER_DAY,
                            )?;
                            chem_loads_ch_tmp.push(ChannelLoad {
                                species,
                                link,
                                node,
                                series,
                            });
                        }
                    }
                    "END" => {
                        scan.expect("GROUP")?;
                        scan.expect("D")?;
                        break;
                    }
                    other => {
                        return Err(scan.error(&format!("unknown group D record '{}'", other)))
                    }
                }
            }
            if chem_classes.is_empty() {
                return Err("ksim >= 3 but no chemicals defined".to_string());
            }
            ctl.nchems = chem_classes.len();
        }

        //--- Data group E: output ------------------------------------
        scan.expect("GROUP")?;
        scan.expect("E")?;
        loop {
            let key = scan.next_str("group E record")?.to_ascii_uppercase();
            match key.as_str() {
                "ECHOFILE" => ctl.echofile = self.resolve(&scan.next_str("echo file")?),
                "SUMMARYFILE" => ctl.summaryfile = self.resolve(&scan.next_str("summary file")?),
                "MSBFILE" => ctl.msbfile = self.resolve(&scan.next_str("mass balance file")?),
                "WATEREXPFILE" => {
                    ctl.waterexpfile = self.resolve(&scan.next_str("water export file")?)
                }
                "SEDEXPFILE" => ctl.sedexpfile = self.resolve(&scan.next_str("solids export file")?),
                "CHEMEXPFILE" => {
                    ctl.chemexpfile = self.resolve(&scan.next_str("chemical export file")?)
                }
                "DTBUFFERFILE" => {
                    ctl.dtbufferfile = self.resolve(&scan.next_str("dt buffer file")?)
                }
                "GRIDBASE" => ctl.gridbase = self.resolve(&scan.next_str("grid base name")?),
                "JSONSUMMARYFILE" => {
                    ctl.jsonsummaryfile = self.resolve(&scan.next_str("json summary file")?)
                }
                "QREPORTS" => {
                    let n = scan.next_usize("number of flow reporting stations")?;
                    for _ in 0..n {
                        let name = scan.next_str("station name")?;
                        let row = scan.next_usize("station row")? - 1;
                        let col = scan.next_usize("station column")? - 1;
                        let convert = scan.next_f64("unit conversion")?;
                        let outlet = basin.outlet_at(row, col).unwrap_or(0);
                        basin.qreports.push(ReportStation {
                            name,
                            row,
                            col,
                            outlet,
                            convert,
                        });
                    }
                }
                "SEDREPORTS" => {
                    let n = scan.next_usize("number of solids reporting stations")?;
                    for _ in 0..n {
                        let name = scan.next_str("station name")?;
                        let row = scan.next_usize("station row")? - 1;
                        let col = scan.next_usize("station column")? - 1;
                        let units = scan.next_i32("units option")?;
                        if units != 1 && units != 2 {
                            return Err(scan.error("sedunitsopt must be 1 or 2"));
                        }
                        let outlet = basin.outlet_at(row, col).unwrap_or(0);
                        basin.sedreports.push(ReportStation {
                            name,
                            row,
                            col,
                            outlet,
                            convert: 1.0,
                        });
                        ctl.sedunitsopt.push(units);
                    }
                }
                "END" => {
                    scan.expect("GROUP")?;
                    scan.expect("E")?;
                    break;
                }
                other => return Err(scan.error(&format!("unknown group E record '{}'", other))),
            }
        }

        forcing.solids_loads_ov = solids_loads_tmp;
        forcing.solids_loads_dist = solids_loads_dist_tmp;
        forcing.solids_loads_ch = solids_loads_ch_tmp;
        forcing.chem_loads_ov = chem_loads_tmp;
        forcing.chem_loads_ch = chem_loads_ch_tmp;

        //--- Assemble the simulation ---------------------------------
        let clock = Clock {
            dt_table,
            dttime,
            dtopt: ctl.dtopt,
            maxcourant: ctl.maxcourant,
            dtmax: ctl.dtmax,
            dtmin: ctl.dtmin,
            relax: ctl.relax,
            buffer: DtBuffer::new(&ctl.dtbufferfile, ctl.bdt),
            ..Default::default()
        };

        let mut sim = Simulation::new(ctl, basin, forcing, clock);

        //Initial water state
        for row in 0..sim.basin.spec.nrows {
            for col in 0..sim.basin.spec.ncols {
                if sim.basin.mask.is_active(row, col) {
                    let h = match &hov0 {
                        Some(grid) => grid.at(row, col).max(0.0),
                        None => hov0const,
                    };
                    sim.ov.hov.set(row, col, h);
                    let s = match &swe0 {
                        Some(grid) => grid.at(row, col).max(0.0),
                        None => swe0const,
                    };
                    sim.hyd.swe.set(row, col, s);
                    sim.hyd.initial_swe.set(row, col, s);
                }
            }
        }
        for n in 0..sim.ch.hch.len() {
            sim.ch.hch[n] = hch0const;
        }

        //Solids state: stacks and initial concentrations
        if sim.ctl.ksim >= 2 {
            build_solids(
                &mut sim,
                solids_classes,
                &gsd,
                maxstackov,
                maxstackch,
                &soil_layers,
                &sed_layers,
                stack_fracs,
                &csedov0,
            )?;
        }
        if sim.ctl.ksim >= 3 {
            build_chems(&mut sim, chem_classes, &cchemov0, &cchembed0)?;
        }

        //Echo the configuration
        if !sim.ctl.echofile.is_empty() {
            crate::io::echo::write_echo(&sim)?;
        }

        Ok(sim)
    }
}

fn require_mask(mask_read: bool, scan: &TokenScanner) -> Result<(), String> {
    if mask_read {
        Ok(())
    } else {
        Err(scan.error("the maskfile record must come first"))
    }
}

/// Read an `NPAIRS n` record followed by n `(time_hours, value)`
/// pairs, converting values with the given factor.
fn read_series(scan: &mut TokenScanner, name: &str, vconv: f64) -> Result<TimeFunction, String> {
    scan.expect("NPAIRS")?;
    let n = scan.next_usize("number of pairs")?;
    let mut times = Vec::with_capacity(n);
    let mut values = Vec::with_capacity(n);
    for _ in 0..n {
        times.push(scan.next_f64("time")? * HOURS);
        values.push(scan.next_f64("value")? * vconv);
    }
    TimeFunction::new(name, times, values)
}

/// Read the external time step file: `ndt N` then N `(dt_seconds,
/// time_hours)` pairs.
fn read_dt_file(filename: &str, dt: &mut Vec<f64>, dttime: &mut Vec<f64>) -> Result<(), String> {
    println!("Reading time step file: {}", filename);
    let mut scan = TokenScanner::open(filename)?;
    scan.expect("ndt")?;
    let ndt = scan.next_usize("number of time steps")?;
    for _ in 0..ndt {
        dt.push(scan.next_f64("dt value")?);
        dttime.push(scan.next_f64("dt time break")? * HOURS);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn build_solids(
    sim: &mut Simulation,
    classes: Vec<SolidsClass>,
    gsd: &[Vec<f64>],
    maxstackov: usize,
    maxstackch: usize,
    soil_layers: &[f64],
    sed_layers: &[f64],
    stack_fracs: (f64, f64, f64),
    csedov0: &[f64],
) -> Result<(), String> {
    let nsolids = classes.len();
    let spec = sim.basin.spec.clone();

    if soil_layers.len() > maxstackov {
        return Err(format!(
            "soil stack has {} layers but maxstackov = {}",
            soil_layers.len(),
            maxstackov
        ));
    }
    if sed_layers.len() > maxstackch {
        return Err(format!(
            "sediment stack has {} layers but maxstackch = {}",
            sed_layers.len(),
            maxstackch
        ));
    }

    //Soil stacks over the overland plane
    let mut soil_stack = StackSet::new(spec.ncells(), maxstackov);
    soil_stack.minvol_frac = stack_fracs.0;
    soil_stack.maxvol_frac = stack_fracs.1;
    soil_stack.newlayer_thickness = stack_fracs.2;

    let mut state = SolidsState::new(&sim.basin, nsolids, maxstackov + 1, maxstackch + 1);
    state.classes = classes;

    for row in 0..spec.nrows {
        for col in 0..spec.ncols {
            if !sim.basin.mask.is_active(row, col) {
                continue;
            }
            let cell = spec.index(row, col);
            let isoil = sim.basin.soil_grid.at(row, col);
            let soil = &sim.basin.soils[isoil];
            soil_stack.area[cell] = sim.basin.overland_area(row, col);
            soil_stack.hardpan[cell] =
                sim.basin.elevation.at(row, col) - soil_layers.iter().sum::<f64>();
            for &thickness in soil_layers {
                soil_stack.init_layer(cell, thickness, soil.porosity, isoil);
            }

            //Bed composition from the soil grain-size distribution:
            //the bed bulk concentration of a class is its fraction of
            //the packed solid volume
            let fracs = gsd.get(isoil).filter(|f| !f.is_empty());
            for layer in 1..=soil_stack.nstack[cell] {
                for (i, class) in state.classes.iter().enumerate() {
                    let isolid = i + 1;
                    let f = match fracs {
                        Some(fr) => fr[i],
                        None => 1.0 / nsolids as f64,
                    };
                    let conc = f * (1.0 - soil.porosity) * class.spgravity * RHO_WATER;
                    state.ov.csed.set(isolid, cell, layer, conc);
                }
                state.ov.csed.refresh_total(cell, layer);
            }

            //Initial suspended concentrations
            for isolid in 1..=nsolids {
                state
                    .ov
                    .csed
                    .set(isolid, cell, WATER_COLUMN, csedov0[isolid]);
            }
            state.ov.csed.refresh_total(cell, WATER_COLUMN);
        }
    }

    //Sediment stacks under the channel network
    let mut sed_stack = None;
    if let Some(net) = sim.basin.channels.as_ref() {
        let mut stk = StackSet::new(net.total_nodes(), maxstackch);
        stk.minvol_frac = stack_fracs.0;
        stk.maxvol_frac = stack_fracs.1;
        stk.newlayer_thickness = stack_fracs.2;
        let ch_state = state.ch.as_mut().expect("channel solids state");

        for link in 0..net.nlinks {
            for node in 0..net.nnodes(link) {
                let n = net.node_index(link, node);
                let props = &net.props[n];
                let (row, col) = net.node_cell(link, node);
                let isoil = sim.basin.soil_grid.at(row, col);
                let soil = &sim.basin.soils[isoil];
                stk.area[n] = props.bwidth * props.chanlength;
                stk.hardpan[n] = props.elevbed0 - sed_layers.iter().sum::<f64>();
                for &thickness in sed_layers {
                    stk.init_layer(n, thickness, soil.porosity, isoil);
                }

                let fracs = gsd.get(isoil).filter(|f| !f.is_empty());
                for layer in 1..=stk.nstack[n] {
                    for (i, class) in state.classes.iter().enumerate() {
                        let isolid = i + 1;
                        let f = match fracs {
                            Some(fr) => fr[i],
                            None => 1.0 / nsolids as f64,
                        };
                        let conc = f * (1.0 - soil.porosity) * class.spgravity * RHO_WATER;
                        ch_state.csed.set(isolid, n, layer, conc);
                    }
                    ch_state.csed.refresh_total(n, layer);
                }
            }
        }
        sed_stack = Some(stk);
    }

    sim.soil_stack = soil_stack;
    sim.sed_stack = sed_stack;
    sim.solids = Some(state);
    Ok(())
}

fn build_chems(
    sim: &mut Simulation,
    classes: Vec<ChemClass>,
    cchemov0: &[f64],
    cchembed0: &[f64],
) -> Result<(), String> {
    let nchems = classes.len();
    let nlayers_ov = sim.soil_stack.nlayers();
    let nlayers_ch = sim
        .sed_stack
        .as_ref()
        .map(|s| s.nlayers())
        .unwrap_or(nlayers_ov);

    let mut state = ChemState::new(&sim.basin, nchems, nlayers_ov, nlayers_ch);
    state.classes = classes;

    let spec = &sim.basin.spec;
    for row in 0..spec.nrows {
        for col in 0..spec.ncols {
            if !sim.basin.mask.is_active(row, col) {
                continue;
            }
            let cell = spec.index(row, col);
            for ichem in 1..=nchems {
                state
                    .ov
                    .trans
                    .csed
                    .set(ichem, cell, WATER_COLUMN, cchemov0[ichem]);
                for layer in 1..=sim.soil_stack.nstack[cell] {
                    state.ov.trans.csed.set(ichem, cell, layer, cchembed0[ichem]);
                }
            }
            state.ov.trans.csed.refresh_total(cell, WATER_COLUMN);
            for layer in 1..=sim.soil_stack.nstack[cell] {
                state.ov.trans.csed.refresh_total(cell, layer);
            }
        }
    }
    if let (Some(ch_state), Some(stk), Some(net)) = (
        state.ch.as_mut(),
        sim.sed_stack.as_ref(),
        sim.basin.channels.as_ref(),
    ) {
        for link in 0..net.nlinks {
            for node in 0..net.nnodes(link) {
                let n = net.node_index(link, node);
                for ichem in 1..=nchems {
                    for layer in 1..=stk.nstack[n] {
                        ch_state.trans.csed.set(ichem, n, layer, cchembed0[ichem]);
                    }
                }
                for layer in 1..=stk.nstack[n] {
                    ch_state.trans.csed.refresh_total(n, layer);
                }
            }
        }
    }

    sim.chems = Some(state);
    Ok(())
}
