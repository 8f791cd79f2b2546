//! Console front-end: scripted packet tests plus an interactive loop.
//!
//! Pure presentation over the same decision engine, prober and history the
//! HTTP API uses.

use anyhow::Result;
use fw_filter::{service::service_name, Action, RuleStats};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::api::{execute_test, AppState};
use crate::history::TestRecord;

/// Packets exercised on every console run.
const BUILTIN_PACKETS: &[(&str, u16)] = &[
    ("8.8.8.8", 53),
    ("192.168.0.10", 80),
    ("10.0.0.5", 22),
    ("1.1.1.1", 443),
];

/// Run the scripted test pass, print a tally, then drop into the
/// interactive loop. An empty rule set is fatal here: with no policy there
/// is nothing to simulate.
pub async fn run(state: &AppState) -> Result<()> {
    let rules = state.store.load();
    if rules.is_empty() {
        anyhow::bail!(
            "no rules loaded from {:?}, nothing to simulate",
            state.store.path()
        );
    }

    println!("Loaded {} rule(s) from {:?}", rules.len(), state.store.path());
    for (i, rule) in rules.iter().enumerate() {
        match &rule.description {
            Some(desc) => println!(
                "  {:>2}. {:<15} port {:<5} {} ({})",
                i, rule.ip, rule.port, rule.action, desc
            ),
            None => println!("  {:>2}. {:<15} port {:<5} {}", i, rule.ip, rule.port, rule.action),
        }
    }
    println!();

    println!("Running {} built-in packet tests", BUILTIN_PACKETS.len());
    let mut permitted = 0usize;
    let mut blocked = 0usize;
    for (i, (ip, port)) in BUILTIN_PACKETS.iter().enumerate() {
        let record = execute_test(state, ip, *port).await;
        print_record(i + 1, &record);
        match record.decision {
            Action::Permit => permitted += 1,
            Action::Block => blocked += 1,
        }
    }

    println!(
        "Results: {} permitted, {} blocked, {} total",
        permitted,
        blocked,
        BUILTIN_PACKETS.len()
    );
    let stats = RuleStats::of(&rules);
    println!(
        "Configured rules: {} permit, {} block, {} total",
        stats.permitted, stats.blocked, stats.total
    );
    println!();

    interactive_loop(state).await
}

/// Line-oriented loop for ad hoc packet tests. A blank line or "quit" ends
/// the session; an invalid port is reported and re-prompted, never fatal.
async fn interactive_loop(state: &AppState) -> Result<()> {
    println!("Interactive mode: enter a destination to test (blank line or 'quit' to exit)");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut counter = 1usize;

    loop {
        println!("destination ip:");
        let Some(ip) = next_field(&mut lines).await? else { break };

        println!("destination port:");
        let Some(port_raw) = next_field(&mut lines).await? else { break };
        let port = match port_raw.parse::<u16>() {
            Ok(p) if p >= 1 => p,
            _ => {
                println!("  invalid port '{}', expected 1-65535", port_raw);
                continue;
            }
        };

        println!("  service: {}", service_name(port));
        let record = execute_test(state, &ip, port).await;
        print_record(counter, &record);
        counter += 1;
    }

    println!("Leaving interactive mode");
    Ok(())
}

/// Read one trimmed input line; None ends the session.
async fn next_field(lines: &mut Lines<BufReader<Stdin>>) -> Result<Option<String>> {
    match lines.next_line().await? {
        Some(line) => {
            let line = line.trim().to_string();
            if line.is_empty() || line.eq_ignore_ascii_case("quit") {
                Ok(None)
            } else {
                Ok(Some(line))
            }
        }
        None => Ok(None),
    }
}

fn print_record(number: usize, record: &TestRecord) {
    println!("Test #{}: {}:{} ({})", number, record.ip, record.port, record.service);
    println!("  reachability: {}", record.reachability);
    println!("  decision:     {}", record.decision);
}
