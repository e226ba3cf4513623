use crate::mass_balance::{self, WaterBalance};
use crate::simulation::Simulation;
use serde_derive::Serialize;
use std::fs;
use std::io::Write;

//The summary statistics file: the run window, the domain water
//budget, peak discharges with their times, min/max state trackers,
//and the mass balance errors.  A JSON twin of the headline numbers
//can be written for downstream tooling.

pub fn write_summary(sim: &Simulation) -> Result<(), String> {
    if sim.ctl.summaryfile.is_empty() {
        return Ok(());
    }
    let path = &sim.ctl.summaryfile;
    let mut out = Vec::new();
    let err = |_| format!("Error writing summary file: {}", path);

    let balance = water_balance_of(sim);

    writeln!(out, "Simulation summary").map_err(err)?;
    writeln!(
        out,
        "Run: {} to {}",
        sim.started_at.format("%Y-%m-%d %H:%M:%S"),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    )
    .map_err(err)?;
    writeln!(
        out,
        "Simulated window: {:.4} to {:.4} hours in {} steps",
        sim.ctl.tstart / 3600.0,
        sim.ctl.tend / 3600.0,
        sim.steps_completed
    )
    .map_err(err)?;
    writeln!(out).map_err(err)?;

    writeln!(out, "Water budget (m3):").map_err(err)?;
    writeln!(out, "  initial overland volume      = {:14.4}", balance.initial_ov).map_err(err)?;
    writeln!(out, "  initial channel volume       = {:14.4}", balance.initial_ch).map_err(err)?;
    writeln!(out, "  initial snowpack (swe)       = {:14.4}", balance.initial_swe).map_err(err)?;
    writeln!(out, "  gross rainfall               = {:14.4}", balance.gross_rain).map_err(err)?;
    writeln!(out, "  interception                 = {:14.4}", balance.interception).map_err(err)?;
    writeln!(out, "  net rainfall                 = {:14.4}", balance.net_rain).map_err(err)?;
    writeln!(out, "  gross snowfall (swe)         = {:14.4}", balance.gross_swe).map_err(err)?;
    writeln!(out, "  snowmelt                     = {:14.4}", balance.swemelt).map_err(err)?;
    writeln!(out, "  infiltration                 = {:14.4}", balance.infiltration).map_err(err)?;
    writeln!(out, "  channel transmission loss    = {:14.4}", balance.transloss).map_err(err)?;
    writeln!(out, "  point sources                = {:14.4}", balance.point_sources).map_err(err)?;
    writeln!(out, "  boundary inflow              = {:14.4}", balance.boundary_in).map_err(err)?;
    writeln!(out, "  boundary outflow             = {:14.4}", balance.boundary_out).map_err(err)?;
    writeln!(out, "  round-off residual           = {:14.4}", balance.residual).map_err(err)?;
    writeln!(out, "  final overland volume        = {:14.4}", balance.final_ov).map_err(err)?;
    writeln!(out, "  final channel volume         = {:14.4}", balance.final_ch).map_err(err)?;
    writeln!(out, "  final snowpack (swe)         = {:14.4}", balance.final_swe).map_err(err)?;
    writeln!(out, "  mass balance error           = {:10.6} %", balance.error_percent)
        .map_err(err)?;
    writeln!(out).map_err(err)?;

    writeln!(out, "Depth extremes (m):").map_err(err)?;
    writeln!(
        out,
        "  overland min = {:.6}, max = {:.6}",
        finite_or_zero(sim.ov.minhov),
        finite_or_zero(sim.ov.maxhov)
    )
    .map_err(err)?;
    if sim.ctl.chnopt > 0 {
        writeln!(
            out,
            "  channel  min = {:.6}, max = {:.6}",
            finite_or_zero(sim.ch.minhch),
            finite_or_zero(sim.ch.maxhch)
        )
        .map_err(err)?;
    }
    writeln!(out).map_err(err)?;

    writeln!(out, "Outlet peaks:").map_err(err)?;
    for (i, _o) in sim.basin.outlets.iter().enumerate() {
        writeln!(
            out,
            "  outlet {}: overland peak = {:.6} m3/s at {:.4} h, channel peak = {:.6} m3/s at {:.4} h",
            i + 1,
            sim.ov.qpeakov[i],
            sim.ov.tpeakov[i] / 3600.0,
            sim.ch.qpeakch.get(i).copied().unwrap_or(0.0),
            sim.ch.tpeakch.get(i).copied().unwrap_or(0.0) / 3600.0
        )
        .map_err(err)?;
    }
    writeln!(out).map_err(err)?;

    if let Some(solids) = sim.solids.as_ref() {
        let vols_ov = sim.current_volumes_ov();
        let vols_ch = sim.current_volumes_ch();
        writeln!(out, "Solids budgets (kg):").map_err(err)?;
        for isolid in 1..=solids.classes.len() {
            let b = mass_balance::solids_budget(
                &sim.basin,
                solids,
                &sim.soil_stack,
                sim.sed_stack.as_ref(),
                &vols_ov,
                vols_ch.as_deref(),
                isolid,
            );
            writeln!(out, "  class {} ({}):", isolid, solids.classes[isolid - 1].name)
                .map_err(err)?;
            write_species_budget(&mut out, &b, path)?;
        }
        writeln!(out).map_err(err)?;
        writeln!(out, "Suspended concentration extremes (g/m3):").map_err(err)?;
        for isolid in 0..=solids.classes.len() {
            writeln!(
                out,
                "  class {}: water column min = {:.6}, max = {:.6}",
                isolid,
                finite_or_zero(solids.ov.minmax_wc.min[isolid]),
                finite_or_zero(solids.ov.minmax_wc.max[isolid])
            )
            .map_err(err)?;
        }
        writeln!(out).map_err(err)?;
    }

    if let Some(chems) = sim.chems.as_ref() {
        let vols_ov = sim.current_volumes_ov();
        let vols_ch = sim.current_volumes_ch();
        writeln!(out, "Chemical budgets (kg):").map_err(err)?;
        for ichem in 1..=chems.classes.len() {
            let (b, transformed) = mass_balance::chem_budget(
                chems,
                &sim.soil_stack,
                sim.sed_stack.as_ref(),
                &vols_ov,
                vols_ch.as_deref(),
                ichem,
            );
            writeln!(out, "  chemical {} ({}):", ichem, chems.classes[ichem - 1].name)
                .map_err(err)?;
            write_species_budget(&mut out, &b, path)?;
            writeln!(out, "    transformed         = {:14.6}", transformed).map_err(err)?;
        }
        writeln!(out).map_err(err)?;
    }

    fs::write(path, out).map_err(|_| format!("Error writing summary file: {}", path))
}

fn write_species_budget(
    out: &mut Vec<u8>,
    b: &mass_balance::SpeciesBalance,
    path: &str,
) -> Result<(), String> {
    let err = |_| format!("Error writing summary file: {}", path);
    writeln!(out, "    initial water column = {:14.6}", b.initial_wc).map_err(err)?;
    writeln!(out, "    initial bed          = {:14.6}", b.initial_bed).map_err(err)?;
    writeln!(out, "    external loads       = {:14.6}", b.loads).map_err(err)?;
    writeln!(out, "    boundary inflow      = {:14.6}", b.advection_in + b.dispersion_in)
        .map_err(err)?;
    writeln!(out, "    boundary outflow     = {:14.6}", b.advection_out + b.dispersion_out)
        .map_err(err)?;
    writeln!(out, "    deposition           = {:14.6}", b.deposition).map_err(err)?;
    writeln!(out, "    erosion              = {:14.6}", b.erosion).map_err(err)?;
    writeln!(out, "    burial               = {:14.6}", b.burial).map_err(err)?;
    writeln!(out, "    scour                = {:14.6}", b.scour).map_err(err)?;
    writeln!(out, "    final water column   = {:14.6}", b.final_wc).map_err(err)?;
    writeln!(out, "    final bed            = {:14.6}", b.final_bed).map_err(err)?;
    writeln!(out, "    mass balance error   = {:10.6} %", b.error_percent).map_err(err)?;
    Ok(())
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn water_balance_of(sim: &Simulation) -> WaterBalance {
    let ch = if sim.ctl.chnopt > 0 { Some(&sim.ch) } else { None };
    mass_balance::water_balance(&sim.basin, &sim.hyd, &sim.ov, ch)
}

/// The machine-readable twin of the summary headline numbers.
#[derive(Serialize)]
struct RunSummary {
    tstart_hours: f64,
    tend_hours: f64,
    steps: u64,
    water_error_percent: f64,
    boundary_outflow_m3: f64,
    infiltration_m3: f64,
    peak_discharges: Vec<PeakRecord>,
    solids_error_percent: Vec<f64>,
    chem_error_percent: Vec<f64>,
}

#[derive(Serialize)]
struct PeakRecord {
    outlet: usize,
    overland_peak_m3s: f64,
    overland_peak_time_hours: f64,
    channel_peak_m3s: f64,
    channel_peak_time_hours: f64,
}

pub fn write_json_summary(sim: &Simulation) -> Result<(), String> {
    let path = &sim.ctl.jsonsummaryfile;
    let balance = water_balance_of(sim);

    let mut peaks = Vec::new();
    for i in 0..sim.basin.outlets.len() {
        peaks.push(PeakRecord {
            outlet: i + 1,
            overland_peak_m3s: sim.ov.qpeakov[i],
            overland_peak_time_hours: sim.ov.tpeakov[i] / 3600.0,
            channel_peak_m3s: sim.ch.qpeakch.get(i).copied().unwrap_or(0.0),
            channel_peak_time_hours: sim.ch.tpeakch.get(i).copied().unwrap_or(0.0) / 3600.0,
        });
    }

    let mut solids_errors = Vec::new();
    if let Some(solids) = sim.solids.as_ref() {
        let vols_ov = sim.current_volumes_ov();
        let vols_ch = sim.current_volumes_ch();
        for isolid in 1..=solids.classes.len() {
            let b = mass_balance::solids_budget(
                &sim.basin,
                solids,
                &sim.soil_stack,
                sim.sed_stack.as_ref(),
                &vols_ov,
                vols_ch.as_deref(),
                isolid,
            );
            solids_errors.push(b.error_percent);
        }
    }
    let mut chem_errors = Vec::new();
    if let Some(chems) = sim.chems.as_ref() {
        let vols_ov = sim.current_volumes_ov();
        let vols_ch = sim.current_volumes_ch();
        for ichem in 1..=chems.classes.len() {
            let (b, _) = mass_balance::chem_budget(
                chems,
                &sim.soil_stack,
                sim.sed_stack.as_ref(),
                &vols_ov,
                vols_ch.as_deref(),
                ichem,
            );
            chem_errors.push(b.error_percent);
        }
    }

    let record = RunSummary {
        tstart_hours: sim.ctl.tstart / 3600.0,
        tend_hours: sim.ctl.tend / 3600.0,
        steps: sim.steps_completed,
        water_error_percent: balance.error_percent,
        boundary_outflow_m3: balance.boundary_out,
        infiltration_m3: balance.infiltration,
        peak_discharges: peaks,
        solids_error_percent: solids_errors,
        chem_error_percent: chem_errors,
    };

    let json = serde_json::to_string_pretty(&record)
        .map_err(|_| "Error serializing run summary".to_string())?;
    fs::write(path, json).map_err(|_| format!("Error writing json summary file: {}", path))
}
