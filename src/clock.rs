use std::fs::OpenOptions;
use std::io::Write;

//The simulation clock: the time-step series, the Courant trackers
//feeding adaptive step control, and the buffer of adopted (dt, time)
//pairs that spills to a temporary file when its in-memory capacity is
//exhausted.

/*
Round a time step down to one significant figure.  Rounded dt values
keep successive adaptive proposals from drifting by tiny adjustments.
 */
pub fn truncate_dt(dt: f64) -> f64 {
    debug_assert!(dt > 0.0);
    //The first significant digit is the characteristic of log10(dt)
    let characteristic = if dt >= 1.0 {
        libm::log10(dt) as i32
    } else {
        libm::log10(dt) as i32 - 1
    };
    let scale = libm::pow(10.0, characteristic as f64);
    ((dt / scale) as i64) as f64 * scale
}

/// Buffer of adopted (dt, time) pairs.  When full it is flushed to the
/// buffer file in append mode and reused; the finalizer drains what
/// remains in memory.
#[derive(Clone, Default)]
pub struct DtBuffer {
    pub path: String,
    pub capacity: usize,
    pub entries: Vec<(f64, f64)>,
    pub spilled: bool,
}

impl DtBuffer {
    pub fn new(path: &str, capacity: usize) -> DtBuffer {
        DtBuffer {
            path: path.to_string(),
            capacity: capacity.max(1),
            entries: Vec::new(),
            spilled: false,
        }
    }

    pub fn record(&mut self, dt: f64, time: f64) -> Result<(), String> {
        self.entries.push((dt, time));
        if self.entries.len() >= self.capacity {
            self.flush()?;
        }
        Ok(())
    }

    /// Append the buffered pairs to the buffer file and clear the
    /// in-memory store.
    pub fn flush(&mut self) -> Result<(), String> {
        if self.entries.is_empty() || self.path.is_empty() {
            return Ok(());
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|_| format!("Can't open time step buffer file: {}", self.path))?;
        for (dt, time) in self.entries.iter() {
            writeln!(file, "{}  {}", dt, time)
                .map_err(|_| format!("Error writing time step buffer file: {}", self.path))?;
        }
        self.entries.clear();
        self.spilled = true;
        Ok(())
    }
}

/// The integration clock.  Owns `simtime`, the tabulated time-step
/// series, the sweep-direction toggle, and the per-step Courant
/// maxima reported back by the water router.
#[derive(Clone, Default)]
pub struct Clock {
    pub simtime: f64,     //current simulation time (s)
    pub dt_table: Vec<f64>,  //tabulated time step values (s)
    pub dttime: Vec<f64>,    //time break each tabulated value applies until (s)
    pub idt: usize,          //index into the tabulated series
    pub dt_current: f64,     //the step in force (s)
    pub iteration: u32,      //sweep-direction toggle, flipped every step

    pub dtopt: i32,
    pub maxcourant: f64, //Courant ceiling for adaptive stepping
    pub dtmax: f64,
    pub dtmin: f64,
    pub relax: f64,      //gain on adaptive proposals

    //Courant maxima observed during the current step
    pub maxcourant_ov: f64,
    pub maxcourant_ch: f64,

    pub buffer: DtBuffer,
}

impl Clock {
    /// The time step in force (s)
    #[inline]
    pub fn current_dt(&self) -> f64 {
        self.dt_current
    }

    /// Position the step index for the start of the run.
    pub fn initialize(&mut self, tstart: f64) {
        self.simtime = tstart;
        self.idt = 0;
        while self.simtime > self.dttime[self.idt] && self.idt + 1 < self.dt_table.len() {
            self.idt += 1;
        }
        self.dt_current = self.dt_table[self.idt];
        self.maxcourant_ov = -1.0;
        self.maxcourant_ch = -1.0;
    }

    /// Reset the per-step Courant trackers.
    pub fn begin_step(&mut self) {
        self.maxcourant_ov = -1.0;
        self.maxcourant_ch = -1.0;
    }

    /*
    Advance the clock by the adopted step, flip the sweep toggle, and
    choose the step for the next step.  With a fixed table the step
    just tracks the time breaks; with adaptive control the next step
    is proposed from the Courant maxima so the larger of the overland
    and channel Courant numbers lands at or below the ceiling, then
    rounded down to one significant figure.
     */
    pub fn advance(&mut self) -> Result<(), String> {
        let dt = self.dt_current;
        self.simtime += dt;

        if self.dtopt > 0 {
            self.buffer.record(dt, self.simtime)?;
        }

        //Alternate the overland sweep direction
        self.iteration = if self.iteration == 0 { 1 } else { 0 };

        //Track the tabulated series past its time breaks
        while self.simtime > self.dttime[self.idt] && self.idt + 1 < self.dt_table.len() {
            self.idt += 1;
        }

        if self.dtopt == 0 {
            self.dt_current = self.dt_table[self.idt];
        } else {
            let cmax = self.maxcourant_ov.max(self.maxcourant_ch);
            let mut proposal = if cmax > 0.0 {
                self.relax * dt * self.maxcourant / cmax
            } else {
                //no flow anywhere: grow the step toward its cap
                dt * 2.0
            };
            if self.dtopt == 2 {
                //Hybrid: the tabulated series bounds the proposal
                proposal = proposal.min(self.dt_table[self.idt]);
            }
            proposal = proposal.clamp(self.dtmin, self.dtmax);
            self.dt_current = truncate_dt(proposal).max(self.dtmin);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::truncate_dt;

    #[test]
    fn truncates_down_to_one_significant_figure() {
        assert_eq!(truncate_dt(87.3), 80.0);
        assert_eq!(truncate_dt(9.99), 9.0);
        assert_eq!(truncate_dt(1.0), 1.0);
        assert!((truncate_dt(0.37) - 0.3).abs() < 1e-12);
        assert!((truncate_dt(0.0099) - 0.009).abs() < 1e-12);
    }
}
