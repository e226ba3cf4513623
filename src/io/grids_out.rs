use crate::domain::stack::WATER_COLUMN;
use crate::domain::CellGrid;
use crate::io::grid_ascii::write_grid;
use crate::simulation::Simulation;

//Grid snapshot files: one ESRI ASCII raster per quantity per print
//time, the print time (hours) stamped into the file name.  Cells
//outside the domain carry the no-data value.

fn snapshot_name(base: &str, what: &str, simtime: f64) -> String {
    format!("{}_{}_{:08.3}h.asc", base, what, simtime / 3600.0)
}

fn masked(sim: &Simulation, value: impl Fn(usize, usize) -> f64) -> CellGrid<f64> {
    let spec = &sim.basin.spec;
    let mut grid = CellGrid::filled(spec.nrows, spec.ncols, spec.nodata);
    for row in 0..spec.nrows {
        for col in 0..spec.ncols {
            if sim.basin.mask.is_active(row, col) {
                grid.set(row, col, value(row, col));
            }
        }
    }
    grid
}

pub fn write_snapshots(sim: &Simulation) -> Result<(), String> {
    if sim.ctl.gridbase.is_empty() {
        return Ok(());
    }
    let spec = &sim.basin.spec;
    let t = sim.clock.simtime;

    //Water depth
    let depth = masked(sim, |row, col| sim.ov.hov.at(row, col));
    write_grid(&snapshot_name(&sim.ctl.gridbase, "depth", t), spec, &depth)
        .map_err(String::from)?;

    //Channel depth on channel cells
    if let Some(net) = sim.basin.channels.as_ref() {
        let chdepth = masked(sim, |row, col| match net.at_cell(row, col) {
            Some((link, node)) => sim.ch.hch[net.node_index(link, node)],
            None => 0.0,
        });
        write_grid(
            &snapshot_name(&sim.ctl.gridbase, "chdepth", t),
            spec,
            &chdepth,
        )
        .map_err(String::from)?;
    }

    if let Some(solids) = sim.solids.as_ref() {
        //Suspended and surface-layer total solids concentration
        let tss = masked(sim, |row, col| {
            solids.ov.csed.at(0, spec.index(row, col), WATER_COLUMN)
        });
        write_grid(&snapshot_name(&sim.ctl.gridbase, "tss", t), spec, &tss)
            .map_err(String::from)?;

        let surf = masked(sim, |row, col| {
            let cell = spec.index(row, col);
            let ilayer = sim.soil_stack.surface(cell);
            if ilayer > 0 {
                solids.ov.csed.at(0, cell, ilayer)
            } else {
                0.0
            }
        });
        write_grid(
            &snapshot_name(&sim.ctl.gridbase, "tss_surface", t),
            spec,
            &surf,
        )
        .map_err(String::from)?;

        //Cumulative gross erosion, deposition, and net accumulation (kg)
        let erosion = masked(sim, |row, col| {
            solids.ov.ersmass.at(0, spec.index(row, col))
        });
        write_grid(
            &snapshot_name(&sim.ctl.gridbase, "erosion", t),
            spec,
            &erosion,
        )
        .map_err(String::from)?;

        let deposition = masked(sim, |row, col| {
            solids.ov.depmass.at(0, spec.index(row, col))
        });
        write_grid(
            &snapshot_name(&sim.ctl.gridbase, "deposition", t),
            spec,
            &deposition,
        )
        .map_err(String::from)?;

        let net_acc = masked(sim, |row, col| {
            let cell = spec.index(row, col);
            solids.ov.depmass.at(0, cell) - solids.ov.ersmass.at(0, cell)
        });
        write_grid(
            &snapshot_name(&sim.ctl.gridbase, "net_accumulation", t),
            spec,
            &net_acc,
        )
        .map_err(String::from)?;
    }

    if let Some(chems) = sim.chems.as_ref() {
        let cchem = masked(sim, |row, col| {
            chems.ov.trans.csed.at(0, spec.index(row, col), WATER_COLUMN)
        });
        write_grid(&snapshot_name(&sim.ctl.gridbase, "chem", t), spec, &cchem)
            .map_err(String::from)?;
    }

    Ok(())
}
