//! Lamp Properties
//!
//! This example demonstrates property assignments: states write values
//! into the host's property surface on entry, and with the restore
//! policy enabled, exiting a state puts the prior value back.
//!
//! Key concepts:
//! - Declarative per-state property assignments
//! - RestorePolicy::RestoreProperties and restorables
//! - Reading the property surface between events
//!
//! Run with: cargo run --example lamp_properties

use microstep::builder::{MachineBuilder, TransitionBuilder};
use microstep::core::Event;
use microstep::properties::RestorePolicy;
use serde_json::json;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut b = MachineBuilder::new();
    let root = b.root();
    let off = b.atomic("off", root)?;
    let dim = b.atomic("dim", root)?;
    let bright = b.atomic("bright", root)?;

    b.initial(root, off)?;
    b.assign(dim, "lamp", "brightness", json!(30))?;
    b.assign(bright, "lamp", "brightness", json!(100))?;
    b.transition(off, TransitionBuilder::new().on("up").target(dim))?;
    b.transition(dim, TransitionBuilder::new().on("up").target(bright))?;
    b.transition(bright, TransitionBuilder::new().on("down").target(dim))?;
    b.transition(dim, TransitionBuilder::new().on("down").target(off))?;
    b.property("lamp", "brightness", json!(0));

    let mut machine = b.restore_policy(RestorePolicy::RestoreProperties).build()?;
    machine.start()?;

    for event in ["up", "up", "down", "down"] {
        machine.dispatch(Event::new(event));
        println!(
            "after {event:>4}: {:?} brightness={}",
            machine.active_names(),
            machine.properties().get("lamp", "brightness")
        );
    }

    Ok(())
}
