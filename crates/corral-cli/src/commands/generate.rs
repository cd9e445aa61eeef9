//! Generate command
//!
//! Takes a full object stream for one provider (Cluster, control plane,
//! external etcd and worker groups), assembles it and renames every machine
//! template and bootstrap config template that changed against the live
//! cluster.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use corral_capi::provider::{parse_cluster_objects, update_cluster_names};
use corral_capi::{CapiManifest, Docker, InfrastructureProvider, ObjectReader, ParserConfig, Snow};
use corral_common::DEFAULT_NAMESPACE;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{cancel_on_interrupt, connect, read_input, write_manifests};
use crate::{GlobalArgs, Result};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    /// Docker (CAPD)
    Docker,
    /// AWS Snow (CAPAS)
    Snow,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Infrastructure provider the stream is written for
    #[arg(long, value_enum)]
    pub provider: ProviderKind,

    /// Multi-document YAML file with the cluster's objects
    #[arg(long, short = 'f')]
    pub file: PathBuf,

    /// Fail on kinds the provider does not know instead of skipping them
    #[arg(long)]
    pub strict: bool,
}

pub async fn run(args: GenerateArgs, global: &GlobalArgs) -> Result<()> {
    let input = read_input(&args.file).await?;
    let config = ParserConfig {
        strict: args.strict,
        default_namespace: global
            .namespace
            .clone()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
    };

    let reader = connect(global.kubeconfig.as_deref()).await?;
    let cancel = cancel_on_interrupt();

    let manifests = match args.provider {
        ProviderKind::Docker => generate::<Docker>(&input, &config, &reader, &cancel).await?,
        ProviderKind::Snow => generate::<Snow>(&input, &config, &reader, &cancel).await?,
    };

    write_manifests(&mut std::io::stdout().lock(), &manifests)
}

/// Parse, assemble and rename the objects of a provider `P` cluster
pub async fn generate<P: InfrastructureProvider>(
    input: &str,
    config: &ParserConfig,
    reader: &dyn ObjectReader,
    cancel: &CancellationToken,
) -> Result<Vec<CapiManifest>> {
    let mut objects = parse_cluster_objects::<P>(input, config)?;
    update_cluster_names::<P>(&mut objects, reader, cancel).await?;

    let manifests = objects.objects()?;
    info!(
        provider = P::NAME,
        objects = manifests.len(),
        worker_groups = objects.workers.groups.len(),
        "generated cluster objects"
    );
    Ok(manifests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::EmptyCluster;
    use corral_capi::{ClusterConfig, DockerProvider};
    use corral_capi::render_documents;

    fn docker_stream() -> String {
        let config = ClusterConfig::from_yaml(
            r#"
name: dev
kubernetesVersion: "1.30.2"
controlPlane: {count: 1}
workerNodeGroups:
  - name: md-0
    count: 1
"#,
        )
        .unwrap();
        render_documents(&DockerProvider::new().objects(&config)).unwrap()
    }

    #[tokio::test]
    async fn new_cluster_keeps_every_object_and_name() {
        let manifests = generate::<Docker>(
            &docker_stream(),
            &ParserConfig::default(),
            &EmptyCluster,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(manifests.len(), 7);
        assert!(manifests
            .iter()
            .any(|m| m.display_name() == "DockerMachineTemplate default/dev-control-plane-1"));
    }

    #[tokio::test]
    async fn strict_parse_rejects_other_provider_kinds() {
        let err = generate::<Snow>(
            &docker_stream(),
            &ParserConfig::strict(),
            &EmptyCluster,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("DockerCluster"));
    }

    #[tokio::test]
    async fn lenient_parse_skips_them_and_fails_assembly() {
        let err = generate::<Snow>(
            &docker_stream(),
            &ParserConfig::default(),
            &EmptyCluster,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("missing its AWSSnowCluster"));
    }

    #[tokio::test]
    async fn cancelled_run_reports_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = generate::<Docker>(&docker_stream(), &ParserConfig::default(), &EmptyCluster, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
