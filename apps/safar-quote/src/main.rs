//! # Safar Quote
//!
//! Prices a booking offline and prints the invoice as JSON.
//!
//! ## Usage
//! ```bash
//! # Invoice for a booking file against a rate snapshot
//! cargo run -p safar-quote -- rates.json booking.json
//!
//! # Include the per-family split and per-family invoices
//! cargo run -p safar-quote -- rates.json booking.json --families
//!
//! # Agency and currency settings from a specific config file
//! cargo run -p safar-quote -- rates.json booking.json --config ./booking.toml
//! ```
//!
//! Logs go to stderr and honour `RUST_LOG`; the quote goes to stdout.

use std::env;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use safar_core::invoice::{apportion_families, build_family_invoice, Apportionment, Invoice};
use safar_core::rates::RateTable;
use safar_core::{recompute, BookingInputs, Money, RateError, ValidationReport};
use safar_session::{EngineConfig, RateStore};

struct Args {
    rates: PathBuf,
    booking: PathBuf,
    config: Option<PathBuf>,
    families: bool,
}

#[derive(Serialize)]
struct Quote<'a> {
    rates_version: u64,
    grand_total: Money,
    invoice: &'a Invoice,
    #[serde(skip_serializing_if = "Option::is_none")]
    families: Option<Apportionment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    family_invoices: Vec<Invoice>,
    rate_errors: &'a [RateError],
    validation: &'a ValidationReport,
}

fn print_usage() {
    println!("Safar Quote");
    println!();
    println!("Usage: safar-quote <RATES.json> <BOOKING.json> [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config <PATH>  Engine config file (default: platform config dir)");
    println!("  -f, --families       Split the grand total and invoice per family");
    println!("  -h, --help           Show this help message");
}

/// Returns `None` when only help was requested.
fn parse_args() -> Result<Option<Args>, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut positional = Vec::new();
    let mut config = None;
    let mut families = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                let path = args.get(i + 1).ok_or("--config needs a path")?;
                config = Some(PathBuf::from(path));
                i += 1;
            }
            "--families" | "-f" => families = true,
            "--help" | "-h" => return Ok(None),
            flag if flag.starts_with('-') => return Err(format!("unknown option: {}", flag)),
            path => positional.push(PathBuf::from(path)),
        }
        i += 1;
    }

    match <[PathBuf; 2]>::try_from(positional) {
        Ok([rates, booking]) => Ok(Some(Args {
            rates,
            booking,
            config,
            families,
        })),
        Err(_) => Err("expected exactly two files: <RATES.json> <BOOKING.json>".to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let args = match parse_args()? {
        Some(args) => args,
        None => {
            print_usage();
            return Ok(());
        }
    };

    let config = EngineConfig::load_or_default(args.config);
    let context = config.session_context();

    let rates: RateTable = serde_json::from_str(&std::fs::read_to_string(&args.rates)?)?;
    let store = RateStore::new(config.fallback_rate());
    let snapshot = store.install(rates).await;

    let mut inputs: BookingInputs = serde_json::from_str(&std::fs::read_to_string(&args.booking)?)?;
    if inputs.discount_group_id.is_none() {
        inputs.discount_group_id = config.agency.discount_group_id.clone();
    }
    info!(
        flow = inputs.flow.as_str(),
        agency = %context.agency_id,
        rates_version = snapshot.version,
        "Pricing booking"
    );

    let derived = recompute(&inputs, &snapshot, &context);
    for error in &derived.rate_errors {
        warn!(%error, "Unresolved rate");
    }
    if derived.invoice.has_missing_rates() {
        warn!("Invoice contains placeholder lines for missing rates");
    }

    let family_invoices = if args.families {
        derived
            .families
            .iter()
            .filter_map(|family| build_family_invoice(&derived.invoice, &derived.families, &family.key))
            .collect()
    } else {
        Vec::new()
    };

    let quote = Quote {
        rates_version: snapshot.version,
        grand_total: derived.grand_total(),
        invoice: &derived.invoice,
        families: args
            .families
            .then(|| apportion_families(&derived.invoice, &derived.families)),
        family_invoices,
        rate_errors: &derived.rate_errors,
        validation: &derived.validation,
    };
    println!("{}", serde_json::to_string_pretty(&quote)?);

    Ok(())
}
