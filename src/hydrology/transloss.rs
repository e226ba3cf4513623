use crate::basin::Basin;
use crate::control::SimControl;
use crate::hydrology::HydrologyState;

/*
Channel transmission loss: seepage through the channel bed, computed
with the same wetting-front form as overland infiltration but with the
bed sediment properties.  The loss rate is limited by the water depth
standing in the channel this step.
 */
pub fn update_transmission_loss(
    ctl: &SimControl,
    basin: &Basin,
    hch: &[f64],
    hyd: &mut HydrologyState,
    dt: f64,
) {
    let net = match basin.channels.as_ref() {
        Some(net) => net,
        None => return,
    };
    if ctl.ctlopt == 0 {
        for rate in hyd.tlossrate.iter_mut() {
            *rate = 0.0;
        }
        return;
    }

    if ctl.ctlkh <= 0.0 {
        return;
    }
    for link in 0..net.nlinks {
        for node in 0..net.nnodes(link) {
            let n = net.node_index(link, node);
            let f = hyd.tlossdepth[n].max(ctl.ctlkh * dt).max(1.0e-9);
            let potential = ctl.ctlkh * (1.0 + ctl.ctlpsi * ctl.ctldtheta / f);
            let rate = potential.min(hch[n].max(0.0) / dt);
            hyd.tlossrate[n] = rate;
        }
    }
}
