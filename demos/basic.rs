// RXP Regex Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Basic example driving the RXP engines through the software model.
//!
//! Run with: `cargo run --example basic`

use rxp_rust::sim::SimAdapter;
use rxp_rust::{
    Adapter, Device, DeviceConfig, EngineId, Job, ProgramMode, Responses, RofEntry, RofEntryType,
    RxpError,
};

const RULES: &str = "\
# type,address,value
0,0x00010000,0x0000000000000011
0,0x00010001,0x0000000000000022
6,0x00020000,0x00000000deadbeef
# engine identifier, then committed rule count
1,0x00000000,0x0000000000015254
2,0x00010015,0x0000000000000003
";

fn main() {
    println!("RXP Basic Example");
    println!("=================\n");

    if let Err(e) = run() {
        println!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), RxpError> {
    let sim = SimAdapter::new();
    sim.add_pattern(100, b"password");
    sim.add_pattern(101, b"admin");

    let mut config = DeviceConfig::default();
    config.set_database_size(1 << 20);
    config.set_huge_pages(false);

    println!("Initializing device...");
    let device = Device::init(vec![sim], config)?;
    let info = device.adapter().info();
    println!("  Adapter: {} at {}", info.name, info.pci_address);
    println!("  Firmware: {}", info.firmware);
    println!();

    println!("Programming rules...");
    let rules = rxp_rust::rof::parse_text(RULES)?;
    for engine in EngineId::ALL {
        let report = device.program_rules(engine, &rules, ProgramMode::Full)?;
        println!(
            "  Engine {}: {} entries, {} batches, {} checks",
            engine, report.entries_written, report.batches, report.checks_passed
        );
    }

    // An incremental update on top of the full program.
    let extra = [RofEntry::new(RofEntryType::Instruction, 0x0001_0002, 0x33)];
    device.program_rules(EngineId::ALL[0], &extra, ProgramMode::Incremental)?;
    println!("  Engine {}: incremental update applied", EngineId::ALL[0]);
    println!();

    println!("Submitting jobs...");
    let mut queue = device.open_queue()?;
    let payloads: [&[u8]; 3] = [
        b"user=admin&password=hunter2",
        b"nothing to see here",
        b"admin admin admin",
    ];
    let jobs: Vec<Job<'_>> = payloads
        .iter()
        .enumerate()
        .map(|(i, data)| Job::new(i as u32 + 1, data))
        .collect();
    let sent = queue.submit(&jobs)?;
    println!("  Submitted {} jobs on queue {}", sent, queue.id());

    while queue.unread_responses() < sent {
        queue.poll()?;
    }

    let mut buf = vec![0u8; 64 * 1024];
    let summary = queue.read_responses(&mut buf)?;
    println!("  Read {} responses ({} bytes)", summary.responses, summary.bytes);
    for response in Responses::new(&buf[..summary.bytes]) {
        println!(
            "    job {}: {} matches",
            response.header.job_id, response.header.match_count
        );
        for m in response.matches() {
            println!(
                "      rule {} at offset {} (len {})",
                m.rule_id, m.start_offset, m.length
            );
        }
    }
    println!();

    println!("Engine counters:");
    for engine in EngineId::ALL {
        let stats = device.engine(engine).stats()?;
        println!(
            "  Engine {}: {} jobs, {} bytes, {} responses, {} matches",
            engine, stats.job_count, stats.job_byte_count, stats.response_count, stats.match_count
        );
    }

    queue.close();
    println!("\nDevice closed: {}", device.is_closed());
    Ok(())
}
