use crate::domain::grid::NSOURCES;
use crate::simulation::Simulation;
use std::fs;
use std::io::Write;

//The cell/node-resolved mass balance file: one row per active cell
//with the initial volume, the per-process volume contributions, the
//gross in/out volumes by source position, and the final volume; then
//the same per node for the channel network; then the per-class solids
//and chemical tables with masses in kilograms.

pub fn write_mass_balance(sim: &Simulation) -> Result<(), String> {
    if sim.ctl.msbfile.is_empty() {
        return Ok(());
    }
    let path = &sim.ctl.msbfile;
    let mut out = Vec::new();
    let err = |_| format!("Error writing mass balance file: {}", path);
    let spec = &sim.basin.spec;

    writeln!(out, "Mass Balance for Water\n").map_err(err)?;
    writeln!(out, "Volume summary for the overland plane:\n").map_err(err)?;
    write!(out, "row\tcol\timask\tlink\tnode").map_err(err)?;
    write!(out, "\tinitial water vol (m3)\tinitial swe vol (m3)").map_err(err)?;
    write!(out, "\tgrossrain (m3)\tnetrain (m3)").map_err(err)?;
    write!(out, "\tgrossswe (m3)\tswemelt (m3)\tinterception (m3)").map_err(err)?;
    write!(out, "\tinfiltration (m3)").map_err(err)?;
    for k in 0..NSOURCES {
        write!(out, "\tdqovinvol {} (m3)", k).map_err(err)?;
    }
    for k in 0..NSOURCES {
        write!(out, "\tdqovoutvol {} (m3)", k).map_err(err)?;
    }
    writeln!(out, "\tfinal vol (m3)").map_err(err)?;

    for row in 0..spec.nrows {
        for col in 0..spec.ncols {
            if !sim.basin.mask.is_active(row, col) {
                continue;
            }
            let (chanlink, channode) = match sim
                .basin
                .channels
                .as_ref()
                .and_then(|net| net.at_cell(row, col))
            {
                Some((l, n)) => (l as i64 + 1, n as i64 + 1),
                None => (-1, -1),
            };
            let aov = sim.basin.overland_area(row, col);
            write!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{:.6}\t{:.6}",
                row + 1,
                col + 1,
                sim.basin.mask.grid.at(row, col),
                chanlink,
                channode,
                sim.ov.initialwater.at(row, col),
                sim.hyd.initial_swe.at(row, col) * spec.cell_area(),
            )
            .map_err(err)?;
            write!(
                out,
                "\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}",
                sim.hyd.grossrainvol.at(row, col),
                sim.hyd.netrainvol.at(row, col),
                sim.hyd.grossswevol.at(row, col),
                sim.hyd.swemeltvol.at(row, col),
                sim.hyd.interceptionvol.at(row, col),
                sim.hyd.infilvol.at(row, col),
            )
            .map_err(err)?;
            for k in 0..NSOURCES {
                write!(out, "\t{:.6}", sim.ov.dqovinvol.at(row, col, k)).map_err(err)?;
            }
            for k in 0..NSOURCES {
                write!(out, "\t{:.6}", sim.ov.dqovoutvol.at(row, col, k)).map_err(err)?;
            }
            writeln!(out, "\t{:.6}", sim.ov.hov.at(row, col) * aov).map_err(err)?;
        }
    }

    if let Some(net) = sim.basin.channels.as_ref() {
        writeln!(out, "\nVolume summary for the channel network:\n").map_err(err)?;
        write!(out, "link\tnode\trow\tcol\tinitial vol (m3)\ttransloss (m3)").map_err(err)?;
        for k in 0..NSOURCES {
            write!(out, "\tdqchinvol {} (m3)", k).map_err(err)?;
        }
        for k in 0..NSOURCES {
            write!(out, "\tdqchoutvol {} (m3)", k).map_err(err)?;
        }
        writeln!(out, "\tfinal vol (m3)").map_err(err)?;

        for link in 0..net.nlinks {
            for node in 0..net.nnodes(link) {
                let n = net.node_index(link, node);
                let (row, col) = net.node_cell(link, node);
                write!(
                    out,
                    "{}\t{}\t{}\t{}\t{:.6}\t{:.6}",
                    link + 1,
                    node + 1,
                    row + 1,
                    col + 1,
                    sim.ch.initialwater[n],
                    sim.hyd.tlossvol[n],
                )
                .map_err(err)?;
                for k in 0..NSOURCES {
                    write!(out, "\t{:.6}", sim.ch.dqchinvol.at(n, k)).map_err(err)?;
                }
                for k in 0..NSOURCES {
                    write!(out, "\t{:.6}", sim.ch.dqchoutvol.at(n, k)).map_err(err)?;
                }
                writeln!(out, "\t{:.6}", net.props[n].volume(sim.ch.hch[n])).map_err(err)?;
            }
        }
    }

    if let Some(solids) = sim.solids.as_ref() {
        for isolid in 1..=solids.classes.len() {
            writeln!(
                out,
                "\nMass Balance for Solids Class {} ({})\n",
                isolid,
                solids.classes[isolid - 1].name
            )
            .map_err(err)?;
            write!(out, "row\tcol").map_err(err)?;
            for k in 0..NSOURCES {
                write!(out, "\tadvinmass {} (kg)", k).map_err(err)?;
            }
            for k in 0..NSOURCES {
                write!(out, "\tadvoutmass {} (kg)", k).map_err(err)?;
            }
            write!(out, "\tdspinmass (kg)\tdspoutmass (kg)").map_err(err)?;
            writeln!(out, "\tdepmass (kg)\tersmass (kg)\tburmass (kg)\tscrmass (kg)").map_err(err)?;
            for row in 0..spec.nrows {
                for col in 0..spec.ncols {
                    if !sim.basin.mask.is_active(row, col) {
                        continue;
                    }
                    let cell = spec.index(row, col);
                    write!(out, "{}\t{}", row + 1, col + 1).map_err(err)?;
                    for k in 0..NSOURCES {
                        write!(out, "\t{:.6}", solids.ov.advinmass.at(isolid, cell, k))
                            .map_err(err)?;
                    }
                    for k in 0..NSOURCES {
                        write!(out, "\t{:.6}", solids.ov.advoutmass.at(isolid, cell, k))
                            .map_err(err)?;
                    }
                    write!(
                        out,
                        "\t{:.6}\t{:.6}",
                        solids.ov.dspinmass.sum_all(isolid, cell),
                        solids.ov.dspoutmass.sum_all(isolid, cell),
                    )
                    .map_err(err)?;
                    writeln!(
                        out,
                        "\t{:.6}\t{:.6}\t{:.6}\t{:.6}",
                        solids.ov.depmass.at(isolid, cell),
                        solids.ov.ersmass.at(isolid, cell),
                        solids.ov.burmass.at(isolid, cell),
                        solids.ov.scrmass.at(isolid, cell),
                    )
                    .map_err(err)?;
                }
            }
        }
    }

    if let Some(chems) = sim.chems.as_ref() {
        for ichem in 1..=chems.classes.len() {
            writeln!(
                out,
                "\nMass Balance for Chemical {} ({})\n",
                ichem,
                chems.classes[ichem - 1].name
            )
            .map_err(err)?;
            writeln!(
                out,
                "row\tcol\tadvinmass (kg)\tadvoutmass (kg)\tdspinmass (kg)\tdspoutmass (kg)\tdepmass (kg)\tersmass (kg)\tburmass (kg)\tscrmass (kg)\tbiolysis (kg)\thydrolysis (kg)\toxidation (kg)\tphotolysis (kg)\tradiolysis (kg)\tvolatilization (kg)\tuser (kg)\tporewater (kg)"
            )
            .map_err(err)?;
            for row in 0..spec.nrows {
                for col in 0..spec.ncols {
                    if !sim.basin.mask.is_active(row, col) {
                        continue;
                    }
                    let cell = spec.index(row, col);
                    writeln!(
                        out,
                        "{}\t{}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}",
                        row + 1,
                        col + 1,
                        chems.ov.trans.advinmass.sum_all(ichem, cell),
                        chems.ov.trans.advoutmass.sum_all(ichem, cell),
                        chems.ov.trans.dspinmass.sum_all(ichem, cell),
                        chems.ov.trans.dspoutmass.sum_all(ichem, cell),
                        chems.ov.trans.depmass.at(ichem, cell),
                        chems.ov.trans.ersmass.at(ichem, cell),
                        chems.ov.trans.burmass.at(ichem, cell),
                        chems.ov.trans.scrmass.at(ichem, cell),
                        chems.ov.biomass.at(ichem, cell),
                        chems.ov.hydmass.at(ichem, cell),
                        chems.ov.oximass.at(ichem, cell),
                        chems.ov.phtmass.at(ichem, cell),
                        chems.ov.radmass.at(ichem, cell),
                        chems.ov.volmass.at(ichem, cell),
                        chems.ov.usrmass.at(ichem, cell),
                        chems.ov.pwrmass.at(ichem, cell),
                    )
                    .map_err(err)?;
                }
            }
        }
    }

    fs::write(path, out).map_err(|_| format!("Error writing mass balance file: {}", path))
}
