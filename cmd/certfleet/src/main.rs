mod cli;
mod output;
mod settings;

use anyhow::{Context, bail};
use clap::Parser;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, DeployArgs, GenerateArgs, InspectArgs, OutputFormat};
use pkg_deploy::{ArtifactProfile, DeployContext, DeployOptions};
use pkg_pki::{CertificateAuthority, LeafIssuer};
use pkg_remote::{Credentials, SshConnector};
use pkg_types::config::{CertfleetConfigFile, load_config_file};
use pkg_types::{DeploymentSummary, FleetManifest, NodeIdentity};
use settings::Settings;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    // Load config file (returns defaults if file not found)
    let file_cfg: CertfleetConfigFile = load_config_file(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config))?;
    info!("Config file: {}", cli.config);
    let settings = Settings::resolve(file_cfg, cli.cert_dir);

    match cli.command {
        Commands::Generate(args) => generate(&settings, args),
        Commands::HttpCerts(args) => http_certs(&settings, &args.aliases),
        Commands::Deploy(args) => deploy(&settings, args).await,
        Commands::Inspect(args) => inspect(args),
    }
}

fn load_manifest(path: &Path) -> anyhow::Result<FleetManifest> {
    let manifest = FleetManifest::load(path)
        .with_context(|| format!("invalid manifest {}", path.display()))?;
    info!(
        "Manifest {}: {} node(s), {} skipped",
        path.display(),
        manifest.len(),
        manifest.quarantined().len()
    );
    Ok(manifest)
}

fn regenerate_transport(
    settings: &Settings,
    manifest: &FleetManifest,
    days: Option<u32>,
    passphrase: Option<&str>,
) -> anyhow::Result<()> {
    let ca = CertificateAuthority::regenerate(&settings.cert_dir)
        .context("failed to create root CA")?;
    let material = pkg_pki::generate_all(
        manifest,
        &ca,
        days.unwrap_or(settings.node_validity_days),
        passphrase,
    )
    .context("certificate issuance failed")?;

    println!(
        "Issued {} node certificate(s) in {}",
        material.leaves.len(),
        settings.cert_dir.display()
    );
    for leaf in &material.leaves {
        println!(
            "  {:<24} {:<40} serial {}",
            leaf.node.name,
            leaf.node.ip,
            pkg_pki::serial::serial_hex(&leaf.certificate.serial)
        );
    }
    for skipped in &material.skipped {
        println!(
            "  skipped entry #{} ({}): {}",
            skipped.index,
            skipped.name.as_deref().unwrap_or("<unnamed>"),
            skipped.reason
        );
    }
    Ok(())
}

fn generate(settings: &Settings, args: GenerateArgs) -> anyhow::Result<()> {
    let manifest = load_manifest(&args.manifest)?;
    regenerate_transport(settings, &manifest, args.days, args.passphrase.as_deref())
}

fn http_certs(settings: &Settings, aliases: &[String]) -> anyhow::Result<()> {
    let ca = CertificateAuthority::load(&settings.cert_dir)
        .context("no CA found; run `certfleet generate` first")?;
    let aliases = if aliases.is_empty() {
        settings.service_aliases.as_slice()
    } else {
        aliases
    };
    let issued = LeafIssuer::new(&ca)
        .issue_service_certificate(aliases)
        .context("failed to issue HTTP-layer certificate")?;
    pkg_pki::write_service_certificate(&ca, &issued)?;
    println!(
        "HTTP-layer certificate for [{}] written to {}",
        aliases.join(", "),
        ca.layout().http_dir().display()
    );
    Ok(())
}

async fn deploy(settings: &Settings, args: DeployArgs) -> anyhow::Result<()> {
    let run_id = uuid::Uuid::new_v4().to_string();
    let span = info_span!("run", id = %run_id);

    let manifest = load_manifest(&args.manifest)?;
    if args.regenerate {
        match args.profile {
            ArtifactProfile::Transport => regenerate_transport(
                settings,
                &manifest,
                args.days,
                args.passphrase.as_deref(),
            )?,
            ArtifactProfile::Http => http_certs(settings, &settings.service_aliases)?,
        }
    }

    let mut credentials = Credentials::new(&args.user)
        .with_port(settings.ssh_port)
        .with_connect_timeout(settings.connect_timeout);
    if let Some(password) = args.password {
        credentials = credentials.with_password(password);
    }
    if let Some(identity) = args.identity {
        credentials = credentials.with_identity_file(identity);
    }

    let mut commands = settings.commands.clone();
    if args.no_sudo {
        commands.use_sudo = false;
    }
    let options = DeployOptions {
        commands,
        poller: settings.poller,
        concurrency: args.concurrency.unwrap_or(settings.concurrency),
        key_passphrase: args.passphrase,
        rebuild_secret_store: args.skip_secret_store.then_some(false),
        groups: args.groups,
    };
    let ctx = DeployContext::new(
        &manifest,
        credentials,
        pkg_pki::CertDirLayout::new(&settings.cert_dir),
        args.profile,
        options,
    )?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling remaining nodes");
            on_signal.cancel();
        }
    });

    let progress = |node: &NodeIdentity, message: &str| {
        eprintln!("[{}] {}", node.name, message);
    };
    let connector = SshConnector::new();
    let results = pkg_deploy::deploy(&ctx, &connector, &progress, &cancel)
        .instrument(span)
        .await;
    let summary = DeploymentSummary::from_results(&results);

    match args.output {
        OutputFormat::Table => {
            print!("{}", output::render_results_table(&results));
            println!("{}", summary);
        }
        OutputFormat::Json => {
            let report = output::DeployReport {
                run_id,
                profile: ctx.profile().to_string(),
                summary: summary.clone(),
                results: &results,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    if !summary.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn inspect(args: InspectArgs) -> anyhow::Result<()> {
    let pem = std::fs::read_to_string(&args.path)
        .with_context(|| format!("failed to read {}", args.path.display()))?;
    let info = pkg_pki::decode_certificate(&pem)
        .with_context(|| format!("failed to decode {}", args.path.display()))?;

    let mut chain_failed = false;
    let chain = match &args.ca {
        Some(ca_path) => {
            let ca_pem = std::fs::read_to_string(ca_path)
                .with_context(|| format!("failed to read {}", ca_path.display()))?;
            Some(match pkg_pki::verify_chain(&pem, &ca_pem) {
                Ok(()) => format!("verified against {}", ca_path.display()),
                Err(e) => {
                    chain_failed = true;
                    format!("FAILED: {}", e)
                }
            })
        }
        None => None,
    };

    match args.output {
        OutputFormat::Table => print!("{}", output::render_certificate(&info, chain.as_deref())),
        OutputFormat::Json => {
            let mut value = serde_json::to_value(&info)?;
            value["serial"] = serde_json::Value::String(info.serial_hex());
            if let Some(chain) = chain {
                value["chain"] = serde_json::Value::String(chain);
            }
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    if chain_failed {
        bail!("{} does not chain to the given CA", args.path.display());
    }
    Ok(())
}
