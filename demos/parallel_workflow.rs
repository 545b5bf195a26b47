//! Parallel Workflow
//!
//! This example demonstrates concurrent regions: a download and an
//! install track run side by side inside one parallel state, and the
//! chart finishes only when both regions reach their final state.
//!
//! Key concepts:
//! - Parallel states and simultaneous region activity
//! - Machine-generated done.state.* completion events
//! - Detecting overall completion via the stop reason
//!
//! Run with: cargo run --example parallel_workflow

use microstep::builder::{MachineBuilder, TransitionBuilder};
use microstep::core::Event;
use microstep::engine::StopReason;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut b = MachineBuilder::new();
    let root = b.root();
    let work = b.parallel("work", root)?;
    let download = b.compound("download", work)?;
    let downloading = b.atomic("downloading", download)?;
    let downloaded = b.final_state("downloaded", download)?;
    let install = b.compound("install", work)?;
    let installing = b.atomic("installing", install)?;
    let installed = b.final_state("installed", install)?;
    let all_done = b.final_state("all_done", root)?;

    b.initial(root, work)?;
    b.initial(download, downloading)?;
    b.initial(install, installing)?;
    b.transition(
        downloading,
        TransitionBuilder::new().on("download.complete").target(downloaded),
    )?;
    b.transition(
        installing,
        TransitionBuilder::new().on("install.complete").target(installed),
    )?;
    b.transition(
        work,
        TransitionBuilder::new().on("done.state.work").target(all_done),
    )?;

    let mut machine = b.build()?;
    machine.start()?;
    println!("started: {:?}", machine.active_names());

    machine.dispatch(Event::new("download.complete"));
    println!("download done: {:?}", machine.active_names());

    machine.dispatch(Event::new("install.complete"));
    println!("install done: {:?}", machine.active_names());
    println!(
        "finished: {}",
        machine.stop_reason() == Some(StopReason::Finished)
    );

    Ok(())
}
