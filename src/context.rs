//! Simulation context tracking for panic error reporting
//!
//! Thread-local storage tracking where the simulation currently is.
//! When a panic occurs during stepping, this context is used to build
//! an error message naming the phase and the offending cell or node.

use std::any::Any;
use std::cell::RefCell;
use std::panic;

/// Simulation phase
#[derive(Clone, Copy, Default, PartialEq)]
pub enum SimPhase {
    #[default]
    Unknown,
    Forcing,
    Hydrology,
    OverlandFlow,
    ChannelFlow,
    Floodplain,
    DepthUpdate,
    Solids,
    Chemicals,
    Output,
}

impl SimPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimPhase::Unknown => "unknown",
            SimPhase::Forcing => "forcing",
            SimPhase::Hydrology => "hydrology",
            SimPhase::OverlandFlow => "overland flow",
            SimPhase::ChannelFlow => "channel flow",
            SimPhase::Floodplain => "floodplain transfer",
            SimPhase::DepthUpdate => "depth update",
            SimPhase::Solids => "solids transport",
            SimPhase::Chemicals => "chemical transport",
            SimPhase::Output => "output",
        }
    }
}

/// Where the simulation is working: an overland cell or a channel node.
#[derive(Clone, Copy, Default, PartialEq)]
pub enum SimLocation {
    #[default]
    None,
    Cell {
        row: usize,
        col: usize,
    },
    Node {
        link: usize,
        node: usize,
    },
}

thread_local! {
    static SIM_CONTEXT: RefCell<SimulationContext> = RefCell::new(SimulationContext::default());
}

/// Tracks the current state of simulation for error reporting.
/// Stores plain values on the hot path for minimal overhead.
#[derive(Default)]
pub struct SimulationContext {
    pub phase: SimPhase,
    pub location: SimLocation,
}

/// Set the current phase
#[inline]
pub fn set_context_phase(phase: SimPhase) {
    SIM_CONTEXT.with(|ctx| {
        ctx.borrow_mut().phase = phase;
    });
}

/// Set the current cell
#[inline]
pub fn set_context_cell(row: usize, col: usize) {
    SIM_CONTEXT.with(|ctx| {
        ctx.borrow_mut().location = SimLocation::Cell { row, col };
    });
}

/// Set the current channel node
#[inline]
pub fn set_context_node(link: usize, node: usize) {
    SIM_CONTEXT.with(|ctx| {
        ctx.borrow_mut().location = SimLocation::Node { link, node };
    });
}

/// Get the raw context for error formatting
pub fn get_context() -> (SimPhase, SimLocation) {
    SIM_CONTEXT.with(|ctx| {
        let c = ctx.borrow();
        (c.phase, c.location)
    })
}

/// Clear the simulation context (called when a run completes or before starting)
pub fn clear_context() {
    SIM_CONTEXT.with(|ctx| {
        let mut c = ctx.borrow_mut();
        c.phase = SimPhase::Unknown;
        c.location = SimLocation::None;
    });
}

/// Check if we're currently inside a simulation (phase is not Unknown)
pub fn is_in_simulation() -> bool {
    SIM_CONTEXT.with(|ctx| ctx.borrow().phase != SimPhase::Unknown)
}

/// Install a custom panic hook that suppresses output when inside a
/// simulation.  Panics outside simulation context still print normally.
pub fn install_simulation_panic_hook() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        if !is_in_simulation() {
            default_hook(info);
        }
        // Silent when in simulation - we'll format our own error message
    }));
}

/// Extract a message string from panic info
fn extract_panic_message(panic_info: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "no_panic_message".to_string()
    }
}

/// Format a simulation error with context information.
pub fn format_simulation_error(panic_info: Box<dyn Any + Send>, simtime: f64) -> String {
    let panic_msg = extract_panic_message(panic_info);
    let (phase, location) = get_context();

    let where_str = match location {
        SimLocation::Cell { row, col } => format!("cell ({}, {})", row + 1, col + 1),
        SimLocation::Node { link, node } => format!("link {} node {}", link + 1, node + 1),
        SimLocation::None => "unknown location".to_string(),
    };

    format!(
        "Time: {:.6} h, Phase: {}, At: {}, Msg: '{}'",
        simtime / 3600.0,
        phase.as_str(),
        where_str,
        panic_msg,
    )
}
