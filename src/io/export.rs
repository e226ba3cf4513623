use crate::domain::grid::DIR_BOUNDARY;
use crate::simulation::Simulation;
use std::fs::OpenOptions;

//Export time-series files: comma-delimited, time in hours in column 1
//and one column set per reporting station, appended at every print
//interval.  Water stations report the overland discharge, the channel
//discharge, and their sum, each scaled by the station's unit
//conversion.  Solids and chemical stations report either the water
//column concentration (g/m3) or the boundary mass flux (metric tons
//per day) depending on the station's units option.

fn append_writer(path: &str) -> Result<csv::Writer<std::fs::File>, String> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|_| format!("Can't open export file: {}", path))?;
    Ok(csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file))
}

pub fn append_water(sim: &Simulation, header: bool) -> Result<(), String> {
    if sim.ctl.waterexpfile.is_empty() || sim.basin.qreports.is_empty() {
        return Ok(());
    }
    let path = &sim.ctl.waterexpfile;
    if header {
        let _ = std::fs::remove_file(path);
    }
    let mut w = append_writer(path)?;

    if header {
        let mut row = vec!["time (hours)".to_string()];
        for station in sim.basin.qreports.iter() {
            row.push(format!("{} overland", station.name));
            row.push(format!("{} channel", station.name));
            row.push(format!("{} total", station.name));
        }
        w.write_record(&row)
            .map_err(|_| format!("Error writing export file: {}", path))?;
    }

    let mut row = vec![format!("{:.6}", sim.clock.simtime / 3600.0)];
    for station in sim.basin.qreports.iter() {
        //Flow at an outlet station is the flow across the boundary
        //interface; elsewhere it is the net flow through the cell.
        let qov = if station.outlet > 0 {
            sim.ov.qoutov[station.outlet - 1] - sim.ov.qinov[station.outlet - 1]
        } else {
            sim.ov.dqov.at(station.row, station.col)
        };
        let qch = match sim.basin.channels.as_ref().and_then(|net| net.at_cell(station.row, station.col)) {
            Some((link, node)) => {
                let net = sim.basin.channels.as_ref().unwrap();
                let n = net.node_index(link, node);
                if station.outlet > 0 {
                    sim.ch.qoutch[station.outlet - 1] - sim.ch.qinch[station.outlet - 1]
                } else {
                    sim.ch.dqch[n]
                }
            }
            None => 0.0,
        };
        row.push(format!("{:.6}", qov * station.convert));
        row.push(format!("{:.6}", qch * station.convert));
        row.push(format!("{:.6}", (qov + qch) * station.convert));
    }
    w.write_record(&row)
        .map_err(|_| format!("Error writing export file: {}", path))?;
    w.flush()
        .map_err(|_| format!("Error writing export file: {}", path))?;
    Ok(())
}

pub fn append_solids(sim: &Simulation, header: bool) -> Result<(), String> {
    let Some(solids) = sim.solids.as_ref() else {
        return Ok(());
    };
    if sim.ctl.sedexpfile.is_empty() || sim.basin.sedreports.is_empty() {
        return Ok(());
    }
    let path = &sim.ctl.sedexpfile;
    if header {
        let _ = std::fs::remove_file(path);
    }
    let mut w = append_writer(path)?;

    if header {
        let mut row = vec!["time (hours)".to_string()];
        for (i, station) in sim.basin.sedreports.iter().enumerate() {
            let units = match sim.ctl.sedunitsopt.get(i) {
                Some(2) => "t/day",
                _ => "g/m3",
            };
            row.push(format!("{} ({})", station.name, units));
        }
        w.write_record(&row)
            .map_err(|_| format!("Error writing export file: {}", path))?;
    }

    let mut row = vec![format!("{:.6}", sim.clock.simtime / 3600.0)];
    for (i, station) in sim.basin.sedreports.iter().enumerate() {
        let cell = sim.basin.spec.index(station.row, station.col);
        let value = match sim.ctl.sedunitsopt.get(i) {
            //boundary flux in metric tons per day
            Some(2) => {
                let mut flux = solids.ov.advoutflux.at(0, cell, DIR_BOUNDARY);
                if let Some((ch, net)) = solids.ch.as_ref().zip(sim.basin.channels.as_ref()) {
                    if let Some((link, node)) = net.at_cell(station.row, station.col) {
                        flux += ch.advoutflux.at(0, net.node_index(link, node), DIR_BOUNDARY);
                    }
                }
                flux * 86400.0 / 1.0e6
            }
            //water column concentration
            _ => solids.ov.csed.at(0, cell, 0),
        };
        row.push(format!("{:.6}", value));
    }
    w.write_record(&row)
        .map_err(|_| format!("Error writing export file: {}", path))?;
    w.flush()
        .map_err(|_| format!("Error writing export file: {}", path))?;
    Ok(())
}

pub fn append_chems(sim: &Simulation, header: bool) -> Result<(), String> {
    let Some(chems) = sim.chems.as_ref() else {
        return Ok(());
    };
    if sim.ctl.chemexpfile.is_empty() || sim.basin.sedreports.is_empty() {
        return Ok(());
    }
    let path = &sim.ctl.chemexpfile;
    if header {
        let _ = std::fs::remove_file(path);
    }
    let mut w = append_writer(path)?;

    if header {
        let mut row = vec!["time (hours)".to_string()];
        for station in sim.basin.sedreports.iter() {
            row.push(format!("{} (g/m3)", station.name));
        }
        w.write_record(&row)
            .map_err(|_| format!("Error writing export file: {}", path))?;
    }

    let mut row = vec![format!("{:.6}", sim.clock.simtime / 3600.0)];
    for station in sim.basin.sedreports.iter() {
        let cell = sim.basin.spec.index(station.row, station.col);
        row.push(format!("{:.6}", chems.ov.trans.csed.at(0, cell, 0)));
    }
    w.write_record(&row)
        .map_err(|_| format!("Error writing export file: {}", path))?;
    w.flush()
        .map_err(|_| format!("Error writing export file: {}", path))?;
    Ok(())
}
