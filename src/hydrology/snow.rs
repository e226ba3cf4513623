use crate::basin::Basin;
use crate::control::SimControl;
use crate::forcing::ForcingSet;
use crate::hydrology::HydrologyState;

/*
Degree-day snowmelt.  Snowfall computed by the precipitation phase is
added to the pack, then melt is released at

    melt = ddf * (Tair - Tbase)      for Tair > Tbase

bounded by the snow water equivalent remaining in the pack.  Melt
water joins the overland water column through the depth update.
 */
pub fn update_snowpack(
    ctl: &SimControl,
    basin: &Basin,
    forcing: &ForcingSet,
    hyd: &mut HydrologyState,
    dt: f64,
) {
    let airtemp = forcing.air_temp.as_ref().map(|t| t.value).unwrap_or(0.0);
    let area = basin.spec.cell_area();

    for row in 0..basin.spec.nrows {
        for col in 0..basin.spec.ncols {
            if !basin.mask.is_active(row, col) {
                continue;
            }

            //Accumulate snowfall into the pack
            let mut swe = hyd.swe.at(row, col) + hyd.grossswe.at(row, col) * dt;

            //Degree-day melt when melt is simulated
            let mut melt = 0.0;
            if ctl.meltopt > 0 && airtemp > ctl.tbase && swe > 0.0 {
                melt = (ctl.ddf * (airtemp - ctl.tbase)).min(swe / dt);
                swe -= melt * dt;
            }

            hyd.swe.set(row, col, swe);
            hyd.swemelt.set(row, col, melt);
            *hyd.swemeltvol.at_mut(row, col) += melt * dt * area;
        }
    }
}
