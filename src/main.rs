use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use emqx_bridge::cli::{
    format_evacuations, format_nodes, format_plugins, format_ports, resolve_instance,
    resolve_pods, Cli, Commands,
};
use emqx_bridge::cluster::{evacuation, listener_ports, list_nodes, plugins};
use emqx_bridge::config::{load_config, load_config_from};
use emqx_bridge::k8s::KubeTopology;
use emqx_bridge::{ControlPlaneClient, HttpTransport};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    // Load .env file if specified
    if let Some(ref env_file) = cli.env_file {
        if let Err(e) = dotenvy::from_path(env_file) {
            error!("Failed to load env file {}: {}", env_file.display(), e);
            process::exit(1);
        }
    }

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match cli.config {
        Some(ref path) => load_config_from(path),
        None => load_config(),
    }
    .context("Failed to load config")?;
    if let Some(secs) = cli.timeout {
        config = config.with_request_timeout(secs);
    }

    let instance = resolve_instance(&cli)?;
    info!("Using instance {}/{}", instance.namespace(), instance.name());

    let kube = KubeTopology::try_default()
        .await
        .context("Failed to connect to Kubernetes")?;
    let transport = HttpTransport::new(config.request_timeout())?;
    let client = ControlPlaneClient::connect(
        &instance,
        Arc::new(kube.clone()),
        &kube,
        Arc::new(transport),
        &config,
    )
    .await?;

    match cli.command {
        Commands::Nodes => {
            let nodes = list_nodes(&client, &instance).await?;
            print!("{}", format_nodes(&nodes));
        }
        Commands::Listeners => {
            let ports = listener_ports(&client, &instance).await?;
            print!("{}", format_ports(&ports));
        }
        Commands::Evacuations => {
            let sessions = evacuation::status(&client, &instance).await?;
            print!("{}", format_evacuations(&sessions));
        }
        Commands::Plugins => {
            let infos = plugins::list_plugins(&client, &instance).await?;
            print!("{}", format_plugins(&infos));
        }
        Commands::Evacuate(args) => {
            let pods = resolve_pods(client.topology(), &instance, &args.to).await?;
            evacuation::start(&client, &instance, &pods, &args.source).await?;
            println!("Evacuation of {} started", args.source);
        }
        Commands::Plugin(args) => {
            plugins::set_plugin_state(&client, &instance, &args.node, &args.plugin, args.action)
                .await?;
            println!("{} {} on {}", args.action, args.plugin, args.node);
        }
    }

    Ok(())
}
