use crate::basin::Basin;
use crate::control::SimControl;
use crate::forcing::ForcingSet;
use crate::hydrology::HydrologyState;

/*
Distribute gage precipitation over the grid and take interception off
the top.  Gross rainfall at a cell is the gage-weighted rate; while a
cell still has interception capacity the net rate is reduced until the
capacity is exhausted.  When snow is simulated and the air temperature
is at or below the rain/snow threshold, precipitation arrives as
snowfall (added to the snowpack by the snow phase instead of the water
column).

Volumes are accumulated over the full cell area; the floodplain split
between the overland and channel parts of a cell is applied where the
volumes are reported.
 */
pub fn update_precipitation(
    ctl: &SimControl,
    basin: &Basin,
    forcing: &ForcingSet,
    hyd: &mut HydrologyState,
    dt: f64,
) {
    let gage_values: Vec<f64> = forcing.rain_gages.iter().map(|g| g.value).collect();
    let snow_values: Vec<f64> = forcing.snow_gages.iter().map(|g| g.value).collect();
    let airtemp = forcing.air_temp.as_ref().map(|t| t.value);
    let area = basin.spec.cell_area();

    for row in 0..basin.spec.nrows {
        for col in 0..basin.spec.ncols {
            if !basin.mask.is_active(row, col) {
                continue;
            }

            let mut rain = basin.rain_at(row, col, &gage_values).max(0.0);
            let mut snowfall = 0.0;

            //Gage snowfall (snowopt = 2) is its own set of series;
            //otherwise cold-air precipitation falls as snow
            if ctl.snowopt == 2 && !snow_values.is_empty() {
                snowfall = basin.rain_at(row, col, &snow_values).max(0.0);
            } else if ctl.snowopt > 0 {
                if let Some(t) = airtemp {
                    if t <= ctl.tsnow {
                        snowfall = rain;
                        rain = 0.0;
                    }
                }
            }

            //Interception comes off the rainfall first
            let capacity = hyd.interception_left.at(row, col);
            let depth = rain * dt;
            let intercepted = depth.min(capacity);
            hyd.interception_left.set(row, col, capacity - intercepted);
            let net = (depth - intercepted) / dt;

            hyd.grossrain.set(row, col, rain);
            hyd.netrain.set(row, col, net);
            hyd.grossswe.set(row, col, snowfall);

            //Volume accounting (m3)
            *hyd.grossrainvol.at_mut(row, col) += rain * dt * area;
            *hyd.netrainvol.at_mut(row, col) += net * dt * area;
            *hyd.interceptionvol.at_mut(row, col) += intercepted * area;
            *hyd.grossswevol.at_mut(row, col) += snowfall * dt * area;
        }
    }
}
