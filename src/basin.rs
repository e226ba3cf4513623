use crate::domain::{CellGrid, ChannelNetwork, GridSpec, Mask};

/// A land use classification: hydraulic roughness, interception
/// capacity, and the land-use factors of the overland transport
/// capacity relation.
#[derive(Clone, Default)]
pub struct LandUseClass {
    pub name: String,
    pub nmanning: f64,       //Manning n for overland flow
    pub interception: f64,   //interception capacity (m)
    pub ktc: f64,            //transport capacity coefficient
    pub cusle: f64,          //cover factor
    pub pusle: f64,          //practice factor
    pub betas: f64,          //discharge exponent
    pub gammas: f64,         //slope exponent
    pub tcwexp: f64,         //grain-size weighting exponent
}

/// A soil type: Green–Ampt infiltration parameters, erodibility, and
/// porosity of the soil matrix.
#[derive(Clone, Default)]
pub struct SoilType {
    pub name: String,
    pub kh: f64,             //saturated hydraulic conductivity (m/s)
    pub psi: f64,            //capillary suction head (m)
    pub dtheta: f64,         //soil moisture deficit (dimensionless)
    pub kusle: f64,          //erodibility factor
    pub porosity: f64,
    pub vcov: f64,           //critical velocity for overland erosion (m/s)
}

/// A domain outlet: boundary cell, outflowing ground slope, and the
/// boundary condition option (0 = normal depth, 1 = depth time series).
#[derive(Clone, Default)]
pub struct Outlet {
    pub row: usize,
    pub col: usize,
    pub sovout: f64,  //ground slope out of the domain (dimensionless)
    pub dbcopt: i32,
}

/// A reporting station: grid cell, outlet number when the station sits
/// on an outlet (0 otherwise), and the unit conversion applied to the
/// exported values.
#[derive(Clone, Default)]
pub struct ReportStation {
    pub name: String,
    pub row: usize,
    pub col: usize,
    pub outlet: usize, //1-based outlet number; 0 = not an outlet station
    pub convert: f64,
}

/// A rain or snow gage location in grid projection coordinates.
#[derive(Clone, Default)]
pub struct GageLocation {
    pub x: f64,
    pub y: f64,
}

/// Static description of the watershed: the raster domain, per-cell
/// attributes, classification tables, the channel network, outlets,
/// and reporting stations.  Built once from the input deck and never
/// mutated during stepping.
#[derive(Clone, Default)]
pub struct Basin {
    pub spec: GridSpec,
    pub mask: Mask,
    pub elevation: CellGrid<f64>,
    pub landuse: CellGrid<usize>,     //index into landuse_classes
    pub storagedepth: CellGrid<f64>,  //depression storage depth (m)

    pub landuse_classes: Vec<LandUseClass>,
    pub soils: Vec<SoilType>,
    pub soil_grid: CellGrid<usize>,   //surface soil type per cell

    pub channels: Option<ChannelNetwork>,

    pub outlets: Vec<Outlet>,
    pub qreports: Vec<ReportStation>,
    pub sedreports: Vec<ReportStation>,

    pub rain_gage_locations: Vec<GageLocation>,
    pub snow_gage_locations: Vec<GageLocation>,
    //Per-cell gage weights for the distributed rainfall options,
    //strided ncells x ngages; empty for uniform rainfall.
    pub rain_weights: Vec<f64>,
    //Per-cell gage assignment grid (1-based gage numbers) for the
    //cell-by-cell rainfall option.
    pub rain_gage_grid: Option<CellGrid<usize>>,
}

impl Basin {
    /// Land-use class of a cell
    #[inline]
    pub fn landuse_at(&self, row: usize, col: usize) -> &LandUseClass {
        &self.landuse_classes[self.landuse.at(row, col)]
    }

    /// Surface area of the overland portion of a cell: the full cell
    /// area less the channel surface footprint for channel cells.
    pub fn overland_area(&self, row: usize, col: usize) -> f64 {
        let full = self.spec.cell_area();
        if let Some(net) = &self.channels {
            if let Some((link, node)) = net.at_cell(row, col) {
                let achsurf = net.props[net.node_index(link, node)].surface_area();
                return (full - achsurf).max(0.0);
            }
        }
        full
    }

    /// Projected coordinates of a cell centre
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        let x = self.spec.xllcorner + (col as f64 + 0.5) * self.spec.w;
        //row 0 is the top (northern) row of the grid
        let y = self.spec.yllcorner + (self.spec.nrows as f64 - row as f64 - 0.5) * self.spec.w;
        (x, y)
    }

    /// The outlet at a cell, if any (1-based outlet number)
    pub fn outlet_at(&self, row: usize, col: usize) -> Option<usize> {
        self.outlets
            .iter()
            .position(|o| o.row == row && o.col == col)
            .map(|i| i + 1)
    }

    /*
    Precompute per-cell rain gage weights.  With one gage all weight
    goes to it; with several, weights follow the selected scheme:
    nearest-gage (Thiessen) or inverse-distance-squared.
     */
    pub fn build_rain_weights(&mut self, rainopt: i32) {
        let ngages = self.rain_gage_locations.len();
        let ncells = self.spec.ncells();
        self.rain_weights = vec![0.0; ncells * ngages.max(1)];
        if ngages == 0 {
            return;
        }
        for row in 0..self.spec.nrows {
            for col in 0..self.spec.ncols {
                if !self.mask.is_active(row, col) {
                    continue;
                }
                let cell = self.spec.index(row, col);
                let (cx, cy) = self.cell_center(row, col);
                match rainopt {
                    //uniform rainfall: the first gage covers the domain
                    1 => self.rain_weights[cell * ngages] = 1.0,
                    //nearest gage takes the cell
                    2 => {
                        let mut best = 0usize;
                        let mut bestd = f64::INFINITY;
                        for (g, loc) in self.rain_gage_locations.iter().enumerate() {
                            let d2 = (loc.x - cx).powi(2) + (loc.y - cy).powi(2);
                            if d2 < bestd {
                                bestd = d2;
                                best = g;
                            }
                        }
                        self.rain_weights[cell * ngages + best] = 1.0;
                    }
                    //inverse distance squared
                    3 => {
                        let mut wsum = 0.0;
                        let mut w = vec![0.0; ngages];
                        for (g, loc) in self.rain_gage_locations.iter().enumerate() {
                            let d2 = (loc.x - cx).powi(2) + (loc.y - cy).powi(2);
                            w[g] = if d2 > 0.0 { 1.0 / d2 } else { 1.0e12 };
                            wsum += w[g];
                        }
                        for g in 0..ngages {
                            self.rain_weights[cell * ngages + g] = w[g] / wsum;
                        }
                    }
                    //per-cell gage assignment from the gage grid
                    4 => {
                        let g = match &self.rain_gage_grid {
                            Some(grid) => grid.at(row, col).saturating_sub(1).min(ngages - 1),
                            None => 0,
                        };
                        self.rain_weights[cell * ngages + g] = 1.0;
                    }
                    _ => self.rain_weights[cell * ngages] = 1.0,
                }
            }
        }
    }

    /// Gross rainfall rate at a cell from the gage values (m/s)
    pub fn rain_at(&self, row: usize, col: usize, gage_values: &[f64]) -> f64 {
        let ngages = gage_values.len();
        if ngages == 0 {
            return 0.0;
        }
        if self.rain_weights.is_empty() {
            return gage_values[0];
        }
        let cell = self.spec.index(row, col);
        let mut rate = 0.0;
        for g in 0..ngages {
            rate += self.rain_weights[cell * ngages + g] * gage_values[g];
        }
        rate
    }
}
