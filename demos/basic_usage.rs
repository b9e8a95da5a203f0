use nlx_importer::{load_continuous, Signal};
use std::env;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let path = env::args()
        .nth(1)
        .unwrap_or_else(|| "data/2016-06-14_09-39-10/LFP1.ncs".to_string());

    // Load NCS file
    let channel = load_continuous(&path)?;

    // Print header information
    let header = channel.header();
    if let Some(name) = header.get("AcqEntName") {
        println!("Acquisition entity: {}", name);
    }
    if let Some(opened) = header.time_opened() {
        println!("Time opened: {}", opened);
    }
    if let Some(ad_bit_volts) = header.ad_bit_volts() {
        println!("ADBitVolts: {}", ad_bit_volts);
    }

    // Print record information
    println!("Channel number: {}", channel.channel_number());
    println!("Sample rate: {} Hz", channel.sampling_rate());
    println!("Records: {}", channel.records().len());
    println!("Samples: {}", channel.num_samples());
    println!("Duration: {:.3} seconds", channel.duration());

    // Report discontinuities
    let gaps = channel.gaps();
    if gaps.is_empty() {
        println!("\nNo timestamp gaps.");
    } else {
        println!("\n{} timestamp gaps:", gaps.len());
        for gap in gaps.iter().take(5) {
            println!(
                "  record {}: expected {:.1} μs, observed {} μs",
                gap.record_index, gap.expected_delta, gap.observed_delta
            );
        }
        if gaps.len() > 5 {
            println!("  ... and {} more", gaps.len() - 5);
        }
    }

    // Show first few samples
    let timestamps = channel.sample_timestamps();
    let num_samples = std::cmp::min(5, channel.num_samples());
    println!("\nFirst {} samples:", num_samples);
    for i in 0..num_samples {
        match channel.samples() {
            Signal::Physical(data) => {
                println!("  {:.1} μs: {} {}", timestamps[i], data[i], channel.units())
            }
            Signal::Counts(data) => println!("  {:.1} μs: {} (raw)", timestamps[i], data[i]),
        }
    }

    Ok(())
}
