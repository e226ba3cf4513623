use crate::basin::Basin;
use crate::domain::grid::DIR_BOUNDARY;
use crate::domain::StackSet;
use crate::solids::{DomainSolids, SolidsClass, GRAVITY};
use crate::water::{ChannelWater, OverlandWater};

/*
Overland solids transport capacity, modified Kilinc-Richardson form.

The total capacity over all classes follows

    qs = ktotal (q - qc)^beta sf^gamma        (kg/m/s)

per outflow direction, with ktotal the product of the land-use
transport coefficient and the soil erodibility, cover, and practice
factors, and qc = vc h the critical unit discharge below which no
transport occurs.  The per-class share weights the bed grain-size
fractions of the surface soil layer by 1/d*^tcwexp so coarse grains
carry a smaller share of the capacity than fine grains.
 */
pub fn overland(
    basin: &Basin,
    soil_stack: &StackSet,
    water: &OverlandWater,
    solids: &mut DomainSolids,
    classes: &[SolidsClass],
) {
    let spec = &basin.spec;
    let w = spec.w;
    let nsolids = classes.len();
    let mut fcapacity = vec![0.0; nsolids + 1];

    for row in 0..spec.nrows {
        for col in 0..spec.ncols {
            if !basin.mask.is_active(row, col) {
                continue;
            }
            let cell = spec.index(row, col);
            let ilayer = soil_stack.surface(cell);
            if ilayer == 0 {
                continue;
            }
            let isoil = soil_stack.soiltype[soil_stack.idx(cell, ilayer)];
            let soil = &basin.soils[isoil];
            let land = basin.landuse_at(row, col);

            //critical erosion threshold (unit discharge) for this cell
            let qc = soil.vcov * water.hov.at(row, col);

            for isolid in 0..=nsolids {
                solids.transcap.set(isolid, cell, 0.0);
            }

            //total capacity summed over the eight directions (g/s)
            let ktotal = land.ktc * soil.kusle * land.cusle * land.pusle;
            let mut total = 0.0;
            for k in 1..=8 {
                let sf = water.sfov.at(row, col, k).abs();
                let q = water.dqovout.at(row, col, k) / w;
                if q > qc && sf > 0.0 {
                    let qs = ktotal * libm::pow(q - qc, land.betas) * libm::pow(sf, land.gammas);
                    total += qs * w * 1000.0;
                }
            }
            //boundary outflow at outlet cells also carries capacity
            let sfb = water.sfov.at(row, col, DIR_BOUNDARY).abs();
            let qb = water.dqovout.at(row, col, DIR_BOUNDARY) / w;
            if qb > qc && sfb > 0.0 {
                total += ktotal * libm::pow(qb - qc, land.betas) * libm::pow(sfb, land.gammas)
                    * w
                    * 1000.0;
            }
            solids.transcap.set(0, cell, total);

            //Apportion the total capacity by the bed grain-size
            //fractions weighted toward fine classes
            let ctotal = solids.csed.at(0, cell, ilayer);
            let mut sumcapacity = 0.0;
            for (i, class) in classes.iter().enumerate() {
                let isolid = i + 1;
                let fsolids = if ctotal > 0.0 {
                    solids.csed.at(isolid, cell, ilayer) / ctotal
                } else {
                    0.0
                };
                fcapacity[isolid] = fsolids / libm::pow(class.dstar(), land.tcwexp);
                sumcapacity += fcapacity[isolid];
            }
            for isolid in 1..=nsolids {
                let share = if sumcapacity > 0.0 {
                    fcapacity[isolid] / sumcapacity
                } else {
                    0.0
                };
                solids.transcap.set(isolid, cell, share * total);
            }
        }
    }
}

/*
Channel solids transport capacity, modified Engelund-Hansen form with
an explicit incipient motion threshold.  The concentration by weight a
node can carry is converted to g/m3 and multiplied by the node's total
outflow to give the capacity in g/s per class.
 */
pub fn channel(
    basin: &Basin,
    water: &ChannelWater,
    solids: &mut DomainSolids,
    classes: &[SolidsClass],
) {
    let net = match basin.channels.as_ref() {
        Some(net) => net,
        None => return,
    };
    let nsolids = classes.len();

    for link in 0..net.nlinks {
        for node in 0..net.nnodes(link) {
            let n = net.node_index(link, node);
            let props = &net.props[n];
            let hchan = water.hch[n];

            //Hydraulic radius and mean velocity at the present depth
            let (rh, velocity) = if hchan > 0.0 {
                let area = props.flow_area(hchan);
                let wp = props.wetted_perimeter(hchan);
                let rh = if wp > 0.0 { area / wp } else { 0.0 };
                let mut dqsum = 0.0;
                for k in 1..=8 {
                    dqsum += water.dqchout.at(n, k);
                }
                dqsum += water.dqchout.at(n, DIR_BOUNDARY);
                (rh, if area > 0.0 { dqsum / area } else { 0.0 })
            } else {
                (0.0, 0.0)
            };

            let sf = water.sfch[n].abs();
            let mut qsum = 0.0;
            for k in 1..=8 {
                qsum += water.dqchout.at(n, k);
            }
            qsum += water.dqchout.at(n, DIR_BOUNDARY);

            solids.transcap.set(0, n, 0.0);
            for (i, class) in classes.iter().enumerate() {
                let isolid = i + 1;
                let vc = class.vcch;
                let sg = class.spgravity;
                let cw = if velocity > vc && sf > 0.0 {
                    0.05 * (sg / (sg - 1.0)) * ((velocity - vc) * sf)
                        / ((sg - 1.0) * GRAVITY * class.ds).sqrt()
                        * ((rh * sf) / ((sg - 1.0) * class.ds)).sqrt()
                } else {
                    0.0
                };
                //concentration by weight to mass concentration (g/m3),
                //with the sediment density correction (Julien 1998)
                let cgm3 = 1.0e6 * sg * cw / (sg + (1.0 - sg) * cw);
                let cap = cgm3 * qsum;
                solids.transcap.set(isolid, n, cap);
                solids.transcap.add(0, n, cap);
            }
        }
    }
}
