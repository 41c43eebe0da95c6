//! Provision every attached device: copy and install a firmware bundle,
//! set the boot image, optionally refresh the guest-OS image, reload.
//!
//! # Prerequisites
//!
//! - One or more devices attached over USB console cables
//! - Devices already have IP connectivity to the TFTP server holding the
//!   artifacts (or hostnames that encode their network, so the server
//!   address can be derived)
//!
//! # Usage
//!
//! ```bash
//! cargo run --example provision -- \
//!     --pattern cu.SLAB_USBtoUART \
//!     --bundle ir800-universalk9_npe-bundle.SPA.156-2.T.bin \
//!     --image ir800-universalk9_npe-mz.SPA.156-2.T \
//!     --guest-os ir800-ioxvm.20160404.bin \
//!     --password cisco123
//! ```

use std::env;

use serex::workflow::steps::provisioning_workflow;
use serex::{FleetRunner, ProvisionConfig, SerialOpener, discover};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for the full exchange trace)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = ProvisionConfig::new().with_enable_password(&args.password);
    if let Some(bundle) = &args.bundle {
        config = config.with_bundle(bundle);
    }
    if let Some(image) = &args.image {
        config = config.with_image(image);
    }
    if let Some(guest_os) = &args.guest_os {
        config = config.with_guest_os(guest_os);
    }
    if let Some(tftp) = &args.tftp {
        config = config.with_tftp_server(tftp);
    }

    println!("Scanning for consoles matching {:?}...", args.pattern);
    let opener = SerialOpener::new();
    let sessions = discover(&opener, &args.pattern, &config).await?;
    if sessions.is_empty() {
        eprintln!("No devices found.");
        std::process::exit(1);
    }

    for session in &sessions {
        println!("  {}", session.identity());
    }

    let workflow = provisioning_workflow(&config);
    println!(
        "\nRunning {} step(s) per device: {}",
        workflow.len(),
        workflow.step_names().collect::<Vec<_>>().join(" -> ")
    );

    let summary = FleetRunner::sequential().run_all(sessions, &workflow).await;
    println!("\n{summary}");

    if !summary.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    pattern: String,
    bundle: Option<String>,
    image: Option<String>,
    guest_os: Option<String>,
    tftp: Option<String>,
    password: String,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut pattern = "cu.SLAB_USBtoUART".to_string();
        let mut bundle = None;
        let mut image = None;
        let mut guest_os = None;
        let mut tftp = None;
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
                "--bundle" => {
                    i += 1;
                    if i < args.len() {
                        bundle = Some(args[i].clone());
                    }
                }
                "--image" => {
                    i += 1;
                    if i < args.len() {
                        image = Some(args[i].clone());
                    }
                }
                "--guest-os" => {
                    i += 1;
                    if i < args.len() {
                        guest_os = Some(args[i].clone());
                    }
                }
                "--tftp" => {
                    i += 1;
                    if i < args.len() {
                        tftp = Some(args[i].clone());
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
            bundle,
            image,
            guest_os,
            tftp,
            password,
        }
    }
}
