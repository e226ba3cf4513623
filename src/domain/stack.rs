//The layered bed: every overland cell owns a soil stack and every
//channel node owns a sediment stack.  Layers are numbered from the
//bottom (1) to the surface (nstack); slot 0 of the layer dimension is
//the water column, so concentration arrays can address the water
//column and the bed with one index.  Only the surface layer exchanges
//mass with the water column in a step; push and pop move the surface
//frame up and down.

/// One set of stacks, one column per overland cell or channel node.
/// Layer storage is flat with stride `nlayers = maxstack + 1`.
#[derive(Clone, Default)]
pub struct StackSet {
    pub maxstack: usize,
    pub ncolumns: usize,
    nlayers: usize,

    pub nstack: Vec<usize>, //occupied layers per column (surface index)

    pub h: Vec<f64>,        //layer thickness (m)
    pub v: Vec<f64>,        //layer volume (m3)
    pub vnew: Vec<f64>,     //layer volume at the end of the step (m3)
    pub v0: Vec<f64>,       //layer volume at initialization (m3)
    pub minv: Vec<f64>,     //minimum volume before a pop (m3)
    pub maxv: Vec<f64>,     //maximum volume before a push (m3)
    pub elev: Vec<f64>,     //elevation of the layer top (m)
    pub porosity: Vec<f64>,
    pub soiltype: Vec<usize>,

    pub hardpan: Vec<f64>,  //datum elevation below layer 1, per column (m)
    pub area: Vec<f64>,     //ground (bed) surface area, per column (m2)

    //Pop/push thresholds as fractions of a layer's reference volume
    pub minvol_frac: f64,
    pub maxvol_frac: f64,
    //Reference thickness for layers created by a push (m)
    pub newlayer_thickness: f64,
}

impl StackSet {
    pub fn new(ncolumns: usize, maxstack: usize) -> StackSet {
        let nlayers = maxstack + 1;
        StackSet {
            maxstack,
            ncolumns,
            nlayers,
            nstack: vec![0; ncolumns],
            h: vec![0.0; ncolumns * nlayers],
            v: vec![0.0; ncolumns * nlayers],
            vnew: vec![0.0; ncolumns * nlayers],
            v0: vec![0.0; ncolumns * nlayers],
            minv: vec![0.0; ncolumns * nlayers],
            maxv: vec![0.0; ncolumns * nlayers],
            elev: vec![0.0; ncolumns * nlayers],
            porosity: vec![0.0; ncolumns * nlayers],
            soiltype: vec![0; ncolumns * nlayers],
            hardpan: vec![0.0; ncolumns],
            area: vec![0.0; ncolumns],
            minvol_frac: 0.5,
            maxvol_frac: 1.5,
            newlayer_thickness: 0.05,
        }
    }

    #[inline]
    pub fn nlayers(&self) -> usize {
        self.nlayers
    }

    #[inline]
    pub fn idx(&self, col: usize, layer: usize) -> usize {
        debug_assert!(layer < self.nlayers);
        col * self.nlayers + layer
    }

    /// Index of the surface layer of a column
    #[inline]
    pub fn surface(&self, col: usize) -> usize {
        self.nstack[col]
    }

    /*
    Occupy layer k of a column with an initial thickness.  Layers must
    be added bottom-up; elevations are accumulated from the hardpan
    datum.  The pop/push volume thresholds are set from the initial
    volume.
     */
    pub fn init_layer(
        &mut self,
        col: usize,
        thickness: f64,
        porosity: f64,
        soiltype: usize,
    ) {
        let k = self.nstack[col] + 1;
        assert!(k <= self.maxstack, "layer beyond stack capacity");
        let i = self.idx(col, k);
        let vol = thickness * self.area[col];
        self.h[i] = thickness;
        self.v[i] = vol;
        self.vnew[i] = vol;
        self.v0[i] = vol;
        self.minv[i] = self.minvol_frac * vol;
        self.maxv[i] = self.maxvol_frac * vol;
        self.porosity[i] = porosity;
        self.soiltype[i] = soiltype;
        let below = if k == 1 {
            self.hardpan[col]
        } else {
            self.elev[self.idx(col, k - 1)]
        };
        self.elev[i] = below + thickness;
        self.nstack[col] = k;
    }

    /// Elevation of the top of the surface layer (the bed surface)
    pub fn bed_elevation(&self, col: usize) -> f64 {
        let k = self.nstack[col];
        if k == 0 {
            self.hardpan[col]
        } else {
            self.elev[self.idx(col, k)]
        }
    }

    /// Total occupied thickness of the stack (m)
    pub fn total_thickness(&self, col: usize) -> f64 {
        let mut sum = 0.0;
        for k in 1..=self.nstack[col] {
            sum += self.h[self.idx(col, k)];
        }
        sum
    }

    /*
    Adopt the end-of-step volume of the surface layer and refresh its
    thickness and top elevation.  Subsurface layers are inert between
    push/pop events.
     */
    pub fn apply_surface_volume(&mut self, col: usize) {
        let k = self.nstack[col];
        if k == 0 {
            return;
        }
        let i = self.idx(col, k);
        self.v[i] = self.vnew[i];
        self.h[i] = self.v[i] / self.area[col];
        let below = if k == 1 {
            self.hardpan[col]
        } else {
            self.elev[self.idx(col, k - 1)]
        };
        self.elev[i] = below + self.h[i];
    }
}

/// Per-species concentrations over columns and layers (g/m3).
/// Species slot 0 holds the sum over all species (TSS for solids) and
/// is refreshed whenever a class concentration changes.
#[derive(Clone, Default)]
pub struct LayerConc {
    pub nspecies: usize, //number of classes, excluding the total slot
    pub ncolumns: usize,
    pub nlayers: usize,
    pub data: Vec<f64>,
}

pub const WATER_COLUMN: usize = 0;

impl LayerConc {
    pub fn zeroed(nspecies: usize, ncolumns: usize, nlayers: usize) -> LayerConc {
        LayerConc {
            nspecies,
            ncolumns,
            nlayers,
            data: vec![0.0; (nspecies + 1) * ncolumns * nlayers],
        }
    }

    #[inline]
    fn index(&self, species: usize, col: usize, layer: usize) -> usize {
        debug_assert!(species <= self.nspecies && col < self.ncolumns && layer < self.nlayers);
        (species * self.ncolumns + col) * self.nlayers + layer
    }

    #[inline]
    pub fn at(&self, species: usize, col: usize, layer: usize) -> f64 {
        self.data[self.index(species, col, layer)]
    }

    #[inline]
    pub fn set(&mut self, species: usize, col: usize, layer: usize, value: f64) {
        let i = self.index(species, col, layer);
        self.data[i] = value;
    }

    /// Recompute the total (slot 0) for a column/layer from the
    /// individual classes.
    pub fn refresh_total(&mut self, col: usize, layer: usize) {
        let mut sum = 0.0;
        for s in 1..=self.nspecies {
            sum += self.at(s, col, layer);
        }
        self.set(0, col, layer, sum);
    }
}

/// Mass moved between layers by a push or pop (kg): one vector per
/// concentration set handed to `push_pop`, indexed by species with
/// the total in slot 0.
pub struct StackShift {
    pub buried: Vec<Vec<f64>>,
    pub scoured: Vec<Vec<f64>>,
}

/*
Check the surface layer of a column against its volume thresholds and
push or pop as needed.  Push caps the old surface layer at its maximum
volume and starts a new surface layer holding the overflow, with the
same composition, porosity, and soil type.  Pop merges the surface
layer into the one below with mass-weighted concentrations.

Returns the buried (push) and scoured (pop) masses for every
concentration set that rode through the shift, so the caller can feed
the burial/scour registers of each transported constituent.  At most
one push or one pop occurs per column per step.
 */
pub fn push_pop(
    stk: &mut StackSet,
    concs: &mut [&mut LayerConc],
    col: usize,
) -> Result<Option<StackShift>, String> {
    let k = stk.nstack[col];
    if k == 0 {
        return Ok(None);
    }
    let i = stk.idx(col, k);

    if stk.vnew[i] > stk.maxv[i] {
        //Push: the stack grows by one layer
        if k + 1 > stk.maxstack {
            return Err(format!(
                "bed stack overflow: column {} already holds {} layers",
                col, k
            ));
        }
        let overflow = stk.vnew[i] - stk.maxv[i];
        stk.vnew[i] = stk.maxv[i];
        stk.v[i] = stk.maxv[i];
        stk.h[i] = stk.v[i] / stk.area[col];
        let below = if k == 1 {
            stk.hardpan[col]
        } else {
            stk.elev[stk.idx(col, k - 1)]
        };
        stk.elev[i] = below + stk.h[i];

        let k2 = k + 1;
        let i2 = stk.idx(col, k2);
        stk.h[i2] = overflow / stk.area[col];
        stk.v[i2] = overflow;
        stk.vnew[i2] = overflow;
        //Thresholds are set from the larger of the overflow volume and
        //the reference new-layer volume so a sliver of a layer does not
        //immediately push again.
        let vref = overflow.max(stk.newlayer_thickness * stk.area[col]);
        stk.v0[i2] = vref;
        stk.minv[i2] = stk.minvol_frac * vref;
        stk.maxv[i2] = stk.maxvol_frac * vref;
        stk.porosity[i2] = stk.porosity[i];
        stk.soiltype[i2] = stk.soiltype[i];
        stk.elev[i2] = stk.elev[i] + stk.h[i2];
        stk.nstack[col] = k2;

        //The overflow carries the composition of the old surface; the
        //mass left behind in the now-buried layer is the burial.
        for conc in concs.iter_mut() {
            for s in 1..=conc.nspecies {
                let c = conc.at(s, col, k);
                conc.set(s, col, k2, c);
            }
            conc.refresh_total(col, k2);
        }
        let mut buried: Vec<Vec<f64>> = Vec::with_capacity(concs.len());
        for conc in concs.iter() {
            let mut masses = vec![0.0; conc.nspecies + 1];
            for s in 0..=conc.nspecies {
                //g/m3 * m3 / 1000 = kg
                masses[s] = conc.at(s, col, k) * stk.v[i] / 1000.0;
            }
            buried.push(masses);
        }
        let scoured: Vec<Vec<f64>> = concs.iter().map(|c| vec![0.0; c.nspecies + 1]).collect();
        return Ok(Some(StackShift { buried, scoured }));
    }

    if stk.vnew[i] < stk.minv[i] && k > 1 {
        //Pop: merge the surface layer into the layer below
        let ib = stk.idx(col, k - 1);
        let vsurf = stk.vnew[i];
        let vbelow = stk.v[ib];
        let vmerged = vsurf + vbelow;

        //The layer below is re-exposed as the new surface; its mass
        //is the scour, taken before the merge rewrites it
        let mut scoured: Vec<Vec<f64>> = Vec::with_capacity(concs.len());
        for conc in concs.iter() {
            let mut masses = vec![0.0; conc.nspecies + 1];
            for s in 0..=conc.nspecies {
                masses[s] = conc.at(s, col, k - 1) * vbelow / 1000.0;
            }
            scoured.push(masses);
        }

        for conc in concs.iter_mut() {
            for s in 1..=conc.nspecies {
                let mass = conc.at(s, col, k) * vsurf + conc.at(s, col, k - 1) * vbelow;
                let c = if vmerged > 0.0 { mass / vmerged } else { 0.0 };
                conc.set(s, col, k - 1, c);
                conc.set(s, col, k, 0.0);
            }
            conc.refresh_total(col, k - 1);
            conc.refresh_total(col, k);
        }

        stk.v[ib] = vmerged;
        stk.vnew[ib] = vmerged;
        stk.h[ib] += if stk.area[col] > 0.0 { vsurf / stk.area[col] } else { 0.0 };
        let below = if k - 1 == 1 {
            stk.hardpan[col]
        } else {
            stk.elev[stk.idx(col, k - 2)]
        };
        stk.elev[ib] = below + stk.h[ib];

        //Clear the vacated slot
        stk.h[i] = 0.0;
        stk.v[i] = 0.0;
        stk.vnew[i] = 0.0;
        stk.v0[i] = 0.0;
        stk.minv[i] = 0.0;
        stk.maxv[i] = 0.0;
        stk.elev[i] = stk.elev[ib];
        stk.nstack[col] = k - 1;

        let buried: Vec<Vec<f64>> = concs.iter().map(|c| vec![0.0; c.nspecies + 1]).collect();
        return Ok(Some(StackShift { buried, scoured }));
    }

    Ok(None)
}
