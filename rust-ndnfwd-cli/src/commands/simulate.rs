//! Simulated traffic through an in-process forwarder.
//!
//! One consumer application face expresses Interests under a prefix, and a
//! set of producer faces answer them after a fixed round-trip time. Time is
//! simulated, so the run is deterministic.

use anyhow::{Context, Result};
use bytes::Bytes;
use log::{debug, info};
use rust_ndnfwd_common::{ContentObject, FaceId, FaceType, Interest, Name, NackType};
use rust_ndnfwd_core::{app_channel, AppHandle, Forwarder, ForwarderConfig};
use std::path::Path;
use std::time::Duration;

use crate::utils::{format_duration, print_header};

pub struct SimulateOptions {
    pub prefix: String,
    pub count: usize,
    pub producers: usize,
    pub rtt_ms: u64,
    pub drop_every: usize,
}

#[derive(Debug, Default)]
struct SimulationResults {
    satisfied: usize,
    nacked: usize,
    unanswered: usize,
}

struct Producer {
    face: FaceId,
    link: AppHandle,
}

pub fn run(options: SimulateOptions, config: Option<&Path>) -> Result<()> {
    let config = ForwarderConfig::load(config).context("Failed to load forwarder configuration")?;
    let prefix: Name = options
        .prefix
        .parse()
        .with_context(|| format!("Invalid prefix {:?}", options.prefix))?;
    let rtt = Duration::from_millis(options.rtt_ms);

    info!(
        "Simulating: prefix={}, count={}, producers={}, rtt={:?}",
        prefix, options.count, options.producers, rtt
    );

    let mut fwd = Forwarder::new(config);
    let (consumer_transport, consumer) = app_channel();
    let consumer_face = fwd.add_face(FaceType::App, Box::new(consumer_transport));

    let mut producers = Vec::with_capacity(options.producers);
    for cost in 0..options.producers {
        let (transport, link) = app_channel();
        let face = fwd.add_face(FaceType::NetDevice, Box::new(transport));
        fwd.add_route(prefix.clone(), face, cost as i32)?;
        producers.push(Producer { face, link });
    }
    let installed = fwd
        .install_routes()
        .context("Configured routes refer to faces this simulation does not create")?;
    debug!("Installed {} configured routes", installed);

    let mut results = SimulationResults::default();
    let mut asked = 0usize;

    for i in 0..options.count {
        let interest = Interest::new(prefix.append(i.to_string().as_str()));
        fwd.receive(consumer_face, interest.to_packet())?;
        fwd.advance(rtt);

        for (rank, producer) in producers.iter().enumerate() {
            while let Some(mut packet) = producer.link.recv() {
                let request = packet.remove_header::<Interest>()?;
                if request.is_nack() {
                    continue;
                }
                asked += 1;
                if rank == 0 && options.drop_every > 0 && asked % options.drop_every == 0 {
                    debug!("Producer {} ignoring {}", producer.face, request.name);
                    continue;
                }
                let payload = Bytes::from(format!("content of {}", request.name));
                let data = ContentObject::new(request.name.clone(), payload);
                fwd.receive(producer.face, data.to_packet())?;
            }
        }

        collect(&consumer, &mut results)?;
    }

    // Let every pending Interest expire.
    fwd.advance(Duration::from_secs(60));
    collect(&consumer, &mut results)?;
    results.unanswered = options
        .count
        .saturating_sub(results.satisfied + results.nacked);

    print_results(&fwd, &results, rtt);
    Ok(())
}

fn collect(consumer: &AppHandle, results: &mut SimulationResults) -> Result<()> {
    while let Some(packet) = consumer.recv() {
        match packet.peek_header::<Interest>() {
            Ok(nack) if nack.nack_type != NackType::NormalInterest => {
                debug!("Consumer got {} for {}", nack.nack_type, nack.name);
                results.nacked += 1;
            }
            _ => {
                let data = ContentObject::from_packet(packet)?;
                debug!("Consumer got Data {}", data.name());
                results.satisfied += 1;
            }
        }
    }
    Ok(())
}

fn print_results(fwd: &Forwarder, results: &SimulationResults, rtt: Duration) {
    let metrics = fwd.metrics();

    print_header("Simulation results");
    println!("Satisfied:  {}", results.satisfied);
    println!("Nacked:     {}", results.nacked);
    println!("Unanswered: {}", results.unanswered);
    println!("Link RTT:   {}", format_duration(rtt));
    println!(
        "Mean RTT:   {}",
        format_duration(Duration::from_micros(metrics.rtt_us.average() as u64))
    );

    print_header("Forwarder counters");
    println!("Interests received:  {}", metrics.interests_received.value());
    println!("Interests forwarded: {}", metrics.interests_forwarded.value());
    println!("Interests timed out: {}", metrics.interests_timed_out.value());
    println!("Data received:       {}", metrics.data_received.value());
    println!("Nacks sent:          {}", metrics.nacks_sent.value());
    println!("Content Store hits:  {}", metrics.cs_hits.value());

    print_header("FIB");
    for entry in fwd.fib().iter() {
        println!("{}", entry);
    }
}
