//Piecewise-linear time functions drive all external forcing: rainfall
//and snowfall gages, air temperature, point and distributed loads, and
//outlet depth boundary conditions.  Each function keeps an interval
//cursor and the linear coefficients of the current interval so the
//per-step evaluation is a single multiply-add; simulation time beyond
//the end of a series cycles the series from its start.

/// A time function: a sorted sequence of (time, value) breakpoints
/// with linear interpolation inside intervals and modulo cycling past
/// the final breakpoint.  Times are seconds of simulation time.
#[derive(Clone, Default)]
pub struct TimeFunction {
    pub name: String,
    pub times: Vec<f64>,
    pub values: Vec<f64>,

    //Interval cursor and current linear coefficients (y = m x + b
    //evaluated as m * (simtime - nt) + b)
    ip: usize,
    m: f64,
    b: f64,
    nt: f64, //next (upper) window time to recompute the interval
    pt: f64, //prior (lower) window time

    pub value: f64, //interpolated value at the current simulation time
}

impl TimeFunction {
    pub fn new(name: &str, times: Vec<f64>, values: Vec<f64>) -> Result<TimeFunction, String> {
        if times.len() != values.len() {
            return Err(format!(
                "time function '{}': {} times but {} values",
                name,
                times.len(),
                values.len()
            ));
        }
        if times.len() < 2 {
            return Err(format!(
                "time function '{}': at least two breakpoints are required",
                name
            ));
        }
        for i in 1..times.len() {
            if times[i] < times[i - 1] {
                return Err(format!(
                    "time function '{}': breakpoint {} is out of order ({} < {})",
                    name,
                    i + 1,
                    times[i],
                    times[i - 1]
                ));
            }
        }
        Ok(TimeFunction {
            name: name.to_string(),
            times,
            values,
            ..Default::default()
        })
    }

    /// A constant-valued function (used for uniform forcing)
    pub fn constant(name: &str, value: f64, tend: f64) -> TimeFunction {
        TimeFunction::new(name, vec![0.0, tend.max(1.0)], vec![value, value])
            .expect("constant function construction cannot fail")
    }

    /// End time of the series (last breakpoint time)
    pub fn end_time(&self) -> f64 {
        *self.times.last().unwrap()
    }

    /*
    Position the cursor for the start of the run.  The update window is
    collapsed onto the start time so the first update call recomputes
    the interval coefficients.
     */
    pub fn initialize(&mut self, tstart: f64) {
        let npairs = self.times.len();
        let mut ip = 0;
        while tstart > self.times[ip] && ip < npairs - 1 {
            ip += 1;
        }
        self.ip = ip;
        self.nt = tstart;
        self.pt = tstart;
        self.value = 0.0;
    }

    /*
    Recompute the interval coefficients if the simulation time has left
    the current update window, then evaluate the function.  Time past
    the series end is folded back by modulo so the series repeats.
     */
    pub fn update(&mut self, simtime: f64) {
        if simtime >= self.nt || simtime < self.pt {
            let endtime = self.end_time();
            let ncycle = (simtime / endtime).floor();
            let mtime = (simtime / endtime - ncycle) * endtime;

            //Search upward or downward for the interval holding mtime
            let last = self.times.len() - 1;
            while self.ip + 1 < last && mtime >= self.times[self.ip + 1] {
                self.ip += 1;
            }
            while mtime < self.times[self.ip] && self.ip > 0 {
                self.ip -= 1;
            }

            let t0 = self.times[self.ip];
            let t1 = self.times[self.ip + 1];
            let v0 = self.values[self.ip];
            let v1 = self.values[self.ip + 1];
            self.b = v1;
            self.m = if t0 == t1 { 0.0 } else { (v0 - v1) / (t0 - t1) };
            self.nt = ncycle * endtime + t1;
            self.pt = ncycle * endtime + t0;
        }
        self.value = self.m * (simtime - self.nt) + self.b;
    }

    /// Time at which this function next needs its interval recomputed
    pub fn next_update_time(&self) -> f64 {
        self.nt
    }
}

/// A point source: a time function applied at one cell or node.
#[derive(Clone, Default)]
pub struct PointSource {
    pub row: usize,
    pub col: usize,
    pub series: TimeFunction,
}

/// A channel point source addressed by link/node.
#[derive(Clone, Default)]
pub struct ChannelSource {
    pub link: usize,
    pub node: usize,
    pub series: TimeFunction,
}

/// A solids or chemical load: a mass rate (kg/day) applied to one
/// cell/node (point) or spread across the whole domain (distributed).
#[derive(Clone, Default)]
pub struct Load {
    pub species: usize, //solids class or chemical number (1-based)
    pub row: usize,
    pub col: usize,
    pub series: TimeFunction,
}

#[derive(Clone, Default)]
pub struct ChannelLoad {
    pub species: usize,
    pub link: usize,
    pub node: usize,
    pub series: TimeFunction,
}

/// All forcing functions of a run, with a shared next-update time so
/// the per-step scan is cheap when nothing is due.
#[derive(Clone, Default)]
pub struct ForcingSet {
    pub rain_gages: Vec<TimeFunction>,
    pub snow_gages: Vec<TimeFunction>,
    pub air_temp: Option<TimeFunction>,
    pub flows_ov: Vec<PointSource>,
    pub flows_ch: Vec<ChannelSource>,
    pub depth_bcs: Vec<Option<TimeFunction>>, //one slot per outlet
    pub solids_loads_ov: Vec<Load>,
    pub solids_loads_dist: Vec<Load>, //row/col unused; applied domain-wide
    pub solids_loads_ch: Vec<ChannelLoad>,
    pub chem_loads_ov: Vec<Load>,
    pub chem_loads_ch: Vec<ChannelLoad>,

    next_update: f64,
}

impl ForcingSet {
    pub fn initialize(&mut self, tstart: f64) {
        self.for_each(|f| f.initialize(tstart));
        self.next_update = tstart;
    }

    /// Update every series for the current simulation time (§ step 1
    /// of the per-step sequence).
    pub fn update(&mut self, simtime: f64) {
        //The interval recompute inside TimeFunction::update is guarded
        //by each function's own window; the set-level next_update just
        //avoids scanning windows when no series is due.
        self.for_each(|f| f.update(simtime));
        let mut nt = f64::INFINITY;
        self.for_each_ref(|f| {
            if f.next_update_time() < nt {
                nt = f.next_update_time();
            }
        });
        self.next_update = nt;
    }

    fn for_each<F: FnMut(&mut TimeFunction)>(&mut self, mut op: F) {
        for f in self.rain_gages.iter_mut() {
            op(f);
        }
        for f in self.snow_gages.iter_mut() {
            op(f);
        }
        if let Some(f) = self.air_temp.as_mut() {
            op(f);
        }
        for s in self.flows_ov.iter_mut() {
            op(&mut s.series);
        }
        for s in self.flows_ch.iter_mut() {
            op(&mut s.series);
        }
        for s in self.depth_bcs.iter_mut().flatten() {
            op(s);
        }
        for s in self.solids_loads_ov.iter_mut() {
            op(&mut s.series);
        }
        for s in self.solids_loads_dist.iter_mut() {
            op(&mut s.series);
        }
        for s in self.solids_loads_ch.iter_mut() {
            op(&mut s.series);
        }
        for s in self.chem_loads_ov.iter_mut() {
            op(&mut s.series);
        }
        for s in self.chem_loads_ch.iter_mut() {
            op(&mut s.series);
        }
    }

    fn for_each_ref<F: FnMut(&TimeFunction)>(&self, mut op: F) {
        for f in self.rain_gages.iter() {
            op(f);
        }
        for f in self.snow_gages.iter() {
            op(f);
        }
        if let Some(f) = self.air_temp.as_ref() {
            op(f);
        }
        for s in self.flows_ov.iter() {
            op(&s.series);
        }
        for s in self.flows_ch.iter() {
            op(&s.series);
        }
        for s in self.depth_bcs.iter().flatten() {
            op(s);
        }
        for s in self.solids_loads_ov.iter() {
            op(&s.series);
        }
        for s in self.solids_loads_dist.iter() {
            op(&s.series);
        }
        for s in self.solids_loads_ch.iter() {
            op(&s.series);
        }
        for s in self.chem_loads_ov.iter() {
            op(&s.series);
        }
        for s in self.chem_loads_ch.iter() {
            op(&s.series);
        }
    }
}
