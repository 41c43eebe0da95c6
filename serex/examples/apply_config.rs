//! Apply per-device-type configuration templates to every attached device,
//! allocating each device its own network number.
//!
//! Templates live in a directory as `<TYPE>.cfgtmpl` files, keyed by the
//! hardware type discovery probes off the device.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example apply_config -- \
//!     --pattern cu.SLAB_USBtoUART \
//!     --templates ./configs \
//!     --password cisco123
//! ```

use std::env;

use serex::workflow::steps::configuration_workflow;
use serex::{ProvisionConfig, SerialOpener, TemplateParams, discover};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ProvisionConfig::new().with_enable_password(&args.password);

    println!("Scanning for consoles matching {:?}...", args.pattern);
    let opener = SerialOpener::new();
    let sessions = discover(&opener, &args.pattern, &config).await?;
    if sessions.is_empty() {
        eprintln!("No devices found.");
        std::process::exit(1);
    }

    // Each device gets the next network number, so workflows are built
    // per device rather than shared.
    let mut second_net_tuple = 42u16;
    let mut failures = 0usize;
    for mut session in sessions {
        let identity = session.identity().clone();
        println!("Configuring {identity}...");

        let params = TemplateParams::new("10", second_net_tuple);
        let workflow = configuration_workflow(&args.templates, params, &config);
        let outcome = workflow.run(&mut session).await;

        println!("  {identity}: {outcome}");
        if outcome.is_success() {
            second_net_tuple += 1;
        } else {
            failures += 1;
        }
    }

    if failures > 0 {
        eprintln!("{failures} device(s) failed");
        std::process::exit(1);
    }
    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    pattern: String,
    templates: String,
    password: String,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut pattern = "cu.SLAB_USBtoUART".to_string();
        let mut templates = "configs".to_string();
        let mut password = String::new();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--pattern" => {
                    i += 1;
                    if i < args.len() {
                        pattern = args[i].clone();
                    }
                }
                "--templates" => {
                    i += 1;
                    if i < args.len() {
                        templates = args[i].clone();
                    }
                }
                "--password" => {
                    i += 1;
                    if i < args.len() {
                        password = args[i].clone();
                    }
                }
                _ => {}
            }
            i += 1;
        }

        Self {
            pattern,
            templates,
            password,
        }
    }
}
