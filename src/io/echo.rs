use crate::simulation::Simulation;
use std::fs::OpenOptions;
use std::io::Write;

//The echo file mirrors the parsed configuration back to the user so a
//run is reproducible from its own output.  It is written once after
//the deck is read and appended at completion with the run outcome.

fn open_append(path: &str) -> Result<std::fs::File, String> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|_| format!("Can't open echo file: {}", path))
}

pub fn write_echo(sim: &Simulation) -> Result<(), String> {
    if sim.ctl.echofile.is_empty() {
        return Ok(());
    }
    //start the echo file fresh for this run
    let _ = std::fs::remove_file(&sim.ctl.echofile);
    let mut f = open_append(&sim.ctl.echofile)?;
    let w = &mut f;
    let err = |_| format!("Error writing echo file: {}", sim.ctl.echofile);

    writeln!(w, "Watershed simulation echo file").map_err(err)?;
    writeln!(w, "Run started: {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S")).map_err(err)?;
    writeln!(w).map_err(err)?;

    writeln!(w, "Simulation control:").map_err(err)?;
    writeln!(w, "  ksim = {}", sim.ctl.ksim).map_err(err)?;
    writeln!(
        w,
        "  tstart = {} hours, tend = {} hours",
        sim.ctl.tstart / 3600.0,
        sim.ctl.tend / 3600.0
    )
    .map_err(err)?;
    writeln!(w, "  dtopt = {}", sim.ctl.dtopt).map_err(err)?;
    if sim.ctl.dtopt > 0 {
        writeln!(
            w,
            "  maxcourant = {}, dtmin = {} s, dtmax = {} s",
            sim.ctl.maxcourant, sim.ctl.dtmin, sim.ctl.dtmax
        )
        .map_err(err)?;
    }
    writeln!(w, "  time step table ({} entries):", sim.clock.dt_table.len()).map_err(err)?;
    for i in 0..sim.clock.dt_table.len() {
        writeln!(
            w,
            "    dt = {} s through {} hours",
            sim.clock.dt_table[i],
            sim.clock.dttime[i] / 3600.0
        )
        .map_err(err)?;
    }
    writeln!(w).map_err(err)?;

    writeln!(w, "Domain:").map_err(err)?;
    writeln!(w, "  {}", sim.basin.spec).map_err(err)?;
    writeln!(w, "  active cells = {}", sim.basin.mask.count_active()).map_err(err)?;
    if let Some(net) = sim.basin.channels.as_ref() {
        writeln!(
            w,
            "  channel network: {} links, {} nodes",
            net.nlinks,
            net.total_nodes()
        )
        .map_err(err)?;
    }
    writeln!(w, "  outlets = {}", sim.basin.outlets.len()).map_err(err)?;
    for (i, o) in sim.basin.outlets.iter().enumerate() {
        writeln!(
            w,
            "    outlet {}: cell ({}, {}), slope {}, dbcopt {}",
            i + 1,
            o.row + 1,
            o.col + 1,
            o.sovout,
            o.dbcopt
        )
        .map_err(err)?;
    }
    writeln!(w).map_err(err)?;

    writeln!(w, "Hydrology options:").map_err(err)?;
    writeln!(
        w,
        "  chnopt = {}, infopt = {}, snowopt = {}, meltopt = {}, ctlopt = {}, fldopt = {}, outopt = {}, rainopt = {}",
        sim.ctl.chnopt,
        sim.ctl.infopt,
        sim.ctl.snowopt,
        sim.ctl.meltopt,
        sim.ctl.ctlopt,
        sim.ctl.fldopt,
        sim.ctl.outopt,
        sim.ctl.rainopt
    )
    .map_err(err)?;
    writeln!(w, "  rain gages = {}", sim.forcing.rain_gages.len()).map_err(err)?;
    writeln!(w, "  land use classes:").map_err(err)?;
    for (i, c) in sim.basin.landuse_classes.iter().enumerate() {
        writeln!(
            w,
            "    {} {}: n = {}, interception = {} m",
            i + 1,
            c.name,
            c.nmanning,
            c.interception
        )
        .map_err(err)?;
    }
    writeln!(w, "  soils:").map_err(err)?;
    for (i, s) in sim.basin.soils.iter().enumerate() {
        writeln!(
            w,
            "    {} {}: kh = {} m/s, psi = {} m, dtheta = {}, porosity = {}",
            i + 1,
            s.name,
            s.kh,
            s.psi,
            s.dtheta,
            s.porosity
        )
        .map_err(err)?;
    }
    writeln!(w).map_err(err)?;

    if let Some(solids) = sim.solids.as_ref() {
        writeln!(w, "Solids classes:").map_err(err)?;
        for (i, c) in solids.classes.iter().enumerate() {
            writeln!(
                w,
                "  {} {}: ds = {} m, sg = {}, ws = {} m/s, vcch = {} m/s",
                i + 1,
                c.name,
                c.ds,
                c.spgravity,
                c.ws,
                c.vcch
            )
            .map_err(err)?;
        }
        writeln!(w).map_err(err)?;
    }
    if let Some(chems) = sim.chems.as_ref() {
        writeln!(w, "Chemicals:").map_err(err)?;
        for (i, c) in chems.classes.iter().enumerate() {
            writeln!(w, "  {} {}", i + 1, c.name).map_err(err)?;
        }
        writeln!(w).map_err(err)?;
    }

    Ok(())
}

/// Append the completion record at the end of the run.
pub fn append_completion(sim: &Simulation) -> Result<(), String> {
    if sim.ctl.echofile.is_empty() {
        return Ok(());
    }
    let mut f = open_append(&sim.ctl.echofile)?;
    let err = |_| format!("Error writing echo file: {}", sim.ctl.echofile);
    writeln!(f).map_err(err)?;
    writeln!(
        f,
        "Run completed: {} ({} steps)",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        sim.steps_completed
    )
    .map_err(err)?;
    Ok(())
}

/// Append an error diagnostic to the echo file (best effort).
pub fn append_error(path: &str, message: &str) {
    if path.is_empty() {
        return;
    }
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(f, "\nError! {}", message);
    }
}
