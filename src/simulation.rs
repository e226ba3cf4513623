use crate::basin::Basin;
use crate::chemical::ChemState;
use crate::clock::Clock;
use crate::context::{clear_context, set_context_phase, SimPhase};
use crate::control::SimControl;
use crate::domain::stack::WATER_COLUMN;
use crate::domain::StackSet;
use crate::forcing::ForcingSet;
use crate::hydrology::{self, HydrologyState};
use crate::io::{echo, export, grids_out, massbalance, summary};
use crate::solids::SolidsState;
use crate::water::{self, ChannelWater, OverlandWater};
use crate::{chemical, solids};

/// The simulation: one object owning every piece of state, stepped by
/// the scheduler in a fixed phase order.  Components receive scoped
/// borrows of the fields they work on; nothing else sees partial
/// state inside a step.
pub struct Simulation {
    pub ctl: SimControl,
    pub basin: Basin,
    pub forcing: ForcingSet,
    pub clock: Clock,

    pub hyd: HydrologyState,
    pub ov: OverlandWater,
    pub ch: ChannelWater,
    pub soil_stack: StackSet,
    pub sed_stack: Option<StackSet>,
    pub solids: Option<SolidsState>,
    pub chems: Option<ChemState>,

    pub active_cells: Vec<usize>,
    pub elevbed: Vec<f64>, //channel bed elevations, refreshed from the sediment stack

    next_print: f64,
    next_gridprint: f64,
    export_started: bool,
    pub steps_completed: u64,
    pub started_at: chrono::DateTime<chrono::Local>,
}

impl Simulation {
    /// Assemble a simulation around a loaded basin; the deck reader
    /// fills in initial conditions, stacks, and transport state after
    /// construction.
    pub fn new(ctl: SimControl, basin: Basin, forcing: ForcingSet, clock: Clock) -> Simulation {
        let hyd = HydrologyState::new(&basin);
        let ov = OverlandWater::new(&basin);
        let ch = ChannelWater::new(&basin);
        Simulation {
            ctl,
            basin,
            forcing,
            clock,
            hyd,
            ov,
            ch,
            soil_stack: StackSet::default(),
            sed_stack: None,
            solids: None,
            chems: None,
            active_cells: Vec::new(),
            elevbed: Vec::new(),
            next_print: 0.0,
            next_gridprint: f64::INFINITY,
            export_started: false,
            steps_completed: 0,
            started_at: chrono::Local::now(),
        }
    }

    /*
    Configuration that must happen once after loading, before the run:
    derived tables, initial volumes and masses, and the forcing and
    clock cursors.
     */
    pub fn configure(&mut self) -> Result<(), String> {
        //Rain gage weights for the distributed rainfall options
        self.basin.build_rain_weights(self.ctl.rainopt);

        let nrows = self.basin.spec.nrows;
        let ncols = self.basin.spec.ncols;

        //List of active cells in row-major order
        self.active_cells.clear();
        for row in 0..nrows {
            for col in 0..ncols {
                if self.basin.mask.is_active(row, col) {
                    self.active_cells.push(self.basin.spec.index(row, col));
                }
            }
        }
        if self.active_cells.is_empty() {
            return Err("the mask has no active cells".to_string());
        }

        //Initial water volumes
        for row in 0..nrows {
            for col in 0..ncols {
                if self.basin.mask.is_active(row, col) {
                    let aov = self.basin.overland_area(row, col);
                    let v = self.ov.hov.at(row, col) * aov;
                    self.ov.initialwater.set(row, col, v);
                }
            }
        }
        if let Some(net) = self.basin.channels.as_ref() {
            for link in 0..net.nlinks {
                for node in 0..net.nnodes(link) {
                    let n = net.node_index(link, node);
                    self.ch.initialwater[n] = net.props[n].volume(self.ch.hch[n]);
                }
            }
        }

        //Initial solids and chemical masses (kg) per domain
        let vols_ov = self.initial_volumes_ov();
        let vols_ch = self
            .basin
            .channels
            .as_ref()
            .map(|_| initial_volumes_ch(&self.basin, &self.ch));
        if let Some(state) = self.solids.as_mut() {
            let nsolids = state.classes.len();
            init_masses(&mut state.ov, &self.soil_stack, &vols_ov, nsolids);
            if let (Some(ch), Some(stk), Some(vols)) =
                (state.ch.as_mut(), self.sed_stack.as_ref(), vols_ch.as_ref())
            {
                init_masses(ch, stk, vols, nsolids);
            }
        }
        if let Some(state) = self.chems.as_mut() {
            let nchems = state.classes.len();
            init_masses(&mut state.ov.trans, &self.soil_stack, &vols_ov, nchems);
            if let (Some(ch), Some(stk), Some(vols)) =
                (state.ch.as_mut(), self.sed_stack.as_ref(), vols_ch.as_ref())
            {
                init_masses(&mut ch.trans, stk, vols, nchems);
            }
        }

        //Channel bed elevations from the sediment stack (or the static
        //bed where no sediment is simulated)
        self.refresh_bed_elevations();

        //Forcing and clock cursors
        self.forcing.initialize(self.ctl.tstart);
        self.clock.initialize(self.ctl.tstart);
        self.next_print = self.ctl.tstart;
        self.next_gridprint = if self.ctl.printgrid_interval > 0.0 {
            self.ctl.tstart
        } else {
            f64::INFINITY
        };
        self.started_at = chrono::Local::now();

        Ok(())
    }

    fn initial_volumes_ov(&self) -> Vec<f64> {
        let spec = &self.basin.spec;
        let mut vols = vec![0.0; spec.ncells()];
        for row in 0..spec.nrows {
            for col in 0..spec.ncols {
                if self.basin.mask.is_active(row, col) {
                    let cell = spec.index(row, col);
                    vols[cell] = self.ov.hov.at(row, col) * self.basin.overland_area(row, col);
                }
            }
        }
        vols
    }

    fn refresh_bed_elevations(&mut self) {
        let Some(net) = self.basin.channels.as_ref() else {
            return;
        };
        if self.elevbed.len() != net.total_nodes() {
            self.elevbed = vec![0.0; net.total_nodes()];
        }
        for link in 0..net.nlinks {
            for node in 0..net.nnodes(link) {
                let n = net.node_index(link, node);
                self.elevbed[n] = match self.sed_stack.as_ref() {
                    Some(stk) => stk.bed_elevation(n),
                    None => net.props[n].elevbed0,
                };
            }
        }
    }

    /*
    Run the simulation from tstart to tend.  Reports are emitted at
    the print intervals and a finalization pass closes the balances
    and writes the end-of-run files.
     */
    pub fn run(&mut self) -> Result<(), String> {
        println!(
            "Running simulation from {:.4} to {:.4} hours...",
            self.ctl.tstart / 3600.0,
            self.ctl.tend / 3600.0
        );

        //Reports at the start of the run
        self.write_reports()?;

        while self.clock.simtime < self.ctl.tend {
            self.clock.begin_step();

            //A panic inside a step is attributed to a phase and cell
            //through the thread-local simulation context
            let simtime = self.clock.simtime;
            let stepped = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| self.run_step()));
            match stepped {
                Ok(result) => result?,
                Err(info) => {
                    return Err(crate::context::format_simulation_error(info, simtime));
                }
            }

            self.clock.advance()?;
            self.steps_completed += 1;

            if self.clock.simtime >= self.next_print {
                set_context_phase(SimPhase::Output);
                self.write_reports()?;
                while self.next_print <= self.clock.simtime {
                    self.next_print += self.ctl.printout_interval;
                }
            }
            if self.clock.simtime >= self.next_gridprint {
                set_context_phase(SimPhase::Output);
                self.write_grids()?;
                while self.next_gridprint <= self.clock.simtime {
                    self.next_gridprint += self.ctl.printgrid_interval;
                }
            }
        }

        clear_context();
        println!("Simulation loop complete after {} steps.", self.steps_completed);
        Ok(())
    }

    /*
    One simulation step in the fixed phase order: forcing, hydrology,
    overland routing, channel routing, floodplain transfer, depth
    updates, solids, chemicals, and finally adoption of the new water
    state.  Solids see the old and new depths; chemicals see the
    solids fluxes of the same step.
     */
    pub fn run_step(&mut self) -> Result<(), String> {
        let dt = self.clock.current_dt();
        let simtime = self.clock.simtime;

        //1. Forcing functions
        set_context_phase(SimPhase::Forcing);
        self.forcing.update(simtime);

        //2. Hydrology
        set_context_phase(SimPhase::Hydrology);
        hydrology::interception::update_precipitation(
            &self.ctl,
            &self.basin,
            &self.forcing,
            &mut self.hyd,
            dt,
        );
        hydrology::snow::update_snowpack(&self.ctl, &self.basin, &self.forcing, &mut self.hyd, dt);
        if self.ctl.infopt > 0 {
            hydrology::infiltration::update_infiltration(&self.basin, &self.ov.hov, &mut self.hyd, dt);
        }
        if self.ctl.ctlopt > 0 {
            hydrology::transloss::update_transmission_loss(
                &self.ctl,
                &self.basin,
                &self.ch.hch,
                &mut self.hyd,
                dt,
            );
        }

        //3. Water routing: overland, then channel, then floodplain
        set_context_phase(SimPhase::OverlandFlow);
        water::overland::route(
            &self.ctl,
            &self.basin,
            &self.forcing,
            &self.hyd,
            &mut self.ov,
            &mut self.clock,
        );
        if self.ctl.chnopt > 0 {
            set_context_phase(SimPhase::ChannelFlow);
            self.refresh_bed_elevations();
            water::channel::route(
                &self.ctl,
                &self.basin,
                &self.forcing,
                &self.elevbed,
                &mut self.ch,
                &mut self.clock,
            );
            set_context_phase(SimPhase::Floodplain);
            water::floodplain::transfer(
                &self.ctl,
                &self.basin,
                &self.hyd,
                &mut self.ov,
                &mut self.ch,
                dt,
            );
        }

        //4. New depths and volume accounting
        set_context_phase(SimPhase::DepthUpdate);
        water::depth::update_overland(&self.ctl, &self.basin, &mut self.hyd, &mut self.ov, simtime, dt)?;
        if self.ctl.chnopt > 0 {
            water::depth::update_channel(&self.ctl, &self.basin, &mut self.hyd, &mut self.ch, simtime, dt)?;
        }

        //5. Solids transport
        if let Some(state) = self.solids.as_mut() {
            set_context_phase(SimPhase::Solids);
            let (chem_bed_ov, chem_bed_ch) = match self.chems.as_mut() {
                Some(c) => (
                    Some(&mut c.ov.trans),
                    c.ch.as_mut().map(|d| &mut d.trans),
                ),
                None => (None, None),
            };
            solids::step(
                &self.basin,
                &self.forcing,
                &mut self.soil_stack,
                self.sed_stack.as_mut(),
                &self.ov,
                &self.ch,
                state,
                chem_bed_ov,
                chem_bed_ch,
                &self.active_cells,
                simtime,
                dt,
            )?;
        }

        //6. Chemical transport
        if let (Some(chem_state), Some(solids_state)) = (self.chems.as_mut(), self.solids.as_ref())
        {
            set_context_phase(SimPhase::Chemicals);
            let temperature = self
                .forcing
                .air_temp
                .as_ref()
                .map(|t| t.value)
                .unwrap_or(20.0);
            chemical::transport::step(
                &self.basin,
                &self.forcing,
                &self.soil_stack,
                self.sed_stack.as_ref(),
                &self.ov,
                &self.ch,
                &solids_state.classes,
                &solids_state.ov,
                solids_state.ch.as_ref(),
                chem_state,
                &self.active_cells,
                temperature,
                simtime,
                dt,
            )?;
        }

        //7. Adopt the new water state
        water::depth::new_state(&self.basin, &mut self.ov, &mut self.ch);

        Ok(())
    }

    /// Append the time-series export files.
    fn write_reports(&mut self) -> Result<(), String> {
        let header = !self.export_started;
        export::append_water(self, header)?;
        export::append_solids(self, header)?;
        export::append_chems(self, header)?;
        self.export_started = true;
        Ok(())
    }

    /// Write the grid snapshot files for the current time.
    fn write_grids(&mut self) -> Result<(), String> {
        grids_out::write_snapshots(self)
    }

    /*
    Finalization: drain the time-step buffer, compute the final
    balances, and write the summary, mass-balance, and optional JSON
    summary files.
     */
    pub fn finalize(&mut self) -> Result<(), String> {
        println!("Finalizing simulation...");
        self.clock.buffer.flush()?;

        //Final reports at tend
        self.write_reports()?;
        if self.ctl.printgrid_interval > 0.0 {
            self.write_grids()?;
        }

        summary::write_summary(self)?;
        massbalance::write_mass_balance(self)?;
        if !self.ctl.jsonsummaryfile.is_empty() {
            summary::write_json_summary(self)?;
        }
        echo::append_completion(self)?;

        clear_context();
        Ok(())
    }

    /// Water volumes per cell at the current state (m3)
    pub fn current_volumes_ov(&self) -> Vec<f64> {
        self.initial_volumes_ov()
    }

    /// Water volumes per node at the current state (m3)
    pub fn current_volumes_ch(&self) -> Option<Vec<f64>> {
        self.basin
            .channels
            .as_ref()
            .map(|_| initial_volumes_ch(&self.basin, &self.ch))
    }
}

fn initial_volumes_ch(basin: &Basin, ch: &ChannelWater) -> Vec<f64> {
    let net = basin.channels.as_ref().expect("channel volumes need a network");
    let mut vols = vec![0.0; net.total_nodes()];
    for link in 0..net.nlinks {
        for node in 0..net.nnodes(link) {
            let n = net.node_index(link, node);
            vols[n] = net.props[n].volume(ch.hch[n]);
        }
    }
    vols
}

fn init_masses(
    domain: &mut crate::solids::DomainSolids,
    stack: &StackSet,
    volumes: &[f64],
    nspecies: usize,
) {
    for s in 0..=nspecies {
        domain.initialmass_wc[s] = 0.0;
        domain.initialmass_bed[s] = 0.0;
        for col in 0..stack.ncolumns {
            domain.initialmass_wc[s] += domain.csed.at(s, col, WATER_COLUMN) * volumes[col] / 1000.0;
            for layer in 1..=stack.nstack[col] {
                domain.initialmass_bed[s] +=
                    domain.csed.at(s, col, layer) * stack.v[stack.idx(col, layer)] / 1000.0;
            }
        }
    }
}
