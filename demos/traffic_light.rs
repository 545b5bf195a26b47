//! Traffic Light
//!
//! This example demonstrates a hierarchical chart: the three light
//! phases live inside an "operational" compound, and a single transition
//! on the compound handles failure from any phase.
//!
//! Key concepts:
//! - Compound states with a default initial child
//! - Ancestor transitions (handle an event once for a whole subtree)
//! - Re-entry through default children
//!
//! Run with: cargo run --example traffic_light

use microstep::builder::{MachineBuilder, TransitionBuilder};
use microstep::core::Event;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut b = MachineBuilder::new();
    let root = b.root();
    let operational = b.compound("operational", root)?;
    let red = b.atomic("red", operational)?;
    let green = b.atomic("green", operational)?;
    let yellow = b.atomic("yellow", operational)?;
    let broken = b.atomic("broken", root)?;

    b.initial(root, operational)?;
    b.initial(operational, red)?;
    b.transition(red, TransitionBuilder::new().on("tick").target(green))?;
    b.transition(green, TransitionBuilder::new().on("tick").target(yellow))?;
    b.transition(yellow, TransitionBuilder::new().on("tick").target(red))?;
    // "smash" is handled by the compound, whichever phase is active.
    b.transition(operational, TransitionBuilder::new().on("smash").target(broken))?;
    b.transition(broken, TransitionBuilder::new().on("repair").target(operational))?;

    let mut machine = b.build()?;
    machine.start()?;
    println!("started: {:?}", machine.active_names());

    for event in ["tick", "tick", "smash", "repair", "tick"] {
        machine.dispatch(Event::new(event));
        println!("after {event:>6}: {:?}", machine.active_names());
    }

    Ok(())
}
