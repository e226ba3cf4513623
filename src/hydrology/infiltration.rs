use crate::basin::Basin;
use crate::domain::CellGrid;
use crate::hydrology::HydrologyState;

/*
Green-Ampt infiltration.  The potential rate grows without bound as
the cumulative wetted depth F goes to zero:

    f = Kh (1 + psi * dtheta / F)

so the realised rate is limited by the water available at the surface
this step (ponded depth plus net rain and melt).  The cumulative depth
is advanced by the depth-update phase once the realised rate has been
applied.
 */
pub fn update_infiltration(
    basin: &Basin,
    hov: &CellGrid<f64>,
    hyd: &mut HydrologyState,
    dt: f64,
) {
    for row in 0..basin.spec.nrows {
        for col in 0..basin.spec.ncols {
            if !basin.mask.is_active(row, col) {
                hyd.infilrate.set(row, col, 0.0);
                continue;
            }
            let soil = &basin.soils[basin.soil_grid.at(row, col)];
            if soil.kh <= 0.0 {
                hyd.infilrate.set(row, col, 0.0);
                continue;
            }

            //The wetted depth is floored at one conductivity-step so a
            //dry soil starts at a large but finite rate
            let f = hyd.infildepth.at(row, col).max(soil.kh * dt).max(1.0e-9);
            let potential = soil.kh * (1.0 + soil.psi * soil.dtheta / f);

            //Water available for infiltration this step (m)
            let available = hov.at(row, col)
                + (hyd.netrain.at(row, col) + hyd.swemelt.at(row, col)) * dt;

            let rate = potential.min(available.max(0.0) / dt);
            hyd.infilrate.set(row, col, rate);
        }
    }
}
