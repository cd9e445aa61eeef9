//! Docker command

use std::path::PathBuf;

use clap::Args;
use corral_capi::{ClusterConfig, DockerProvider};
use tracing::info;

use super::{cancel_on_interrupt, connect, read_input, write_manifests};
use crate::{GlobalArgs, Result};

#[derive(Args, Debug)]
pub struct DockerArgs {
    /// Cluster description (YAML)
    #[arg(long, short = 'f')]
    pub file: PathBuf,

    /// Repository for node images, tagged with the Kubernetes version
    #[arg(long)]
    pub node_image_repository: Option<String>,
}

pub async fn run(args: DockerArgs, global: &GlobalArgs) -> Result<()> {
    let mut config = ClusterConfig::from_yaml(&read_input(&args.file).await?)?;
    if config.namespace.is_none() {
        config.namespace = global.namespace.clone();
    }

    let provider = match args.node_image_repository {
        Some(repository) => DockerProvider::with_node_image_repository(repository),
        None => DockerProvider::new(),
    };

    let reader = connect(global.kubeconfig.as_deref()).await?;
    let cancel = cancel_on_interrupt();

    let objects = provider.cluster_spec(&reader, &cancel, &config).await?;
    let manifests = objects.objects()?;
    info!(
        cluster = %config.name,
        namespace = %config.namespace(),
        objects = manifests.len(),
        "generated docker cluster objects"
    );

    write_manifests(&mut std::io::stdout().lock(), &manifests)
}
