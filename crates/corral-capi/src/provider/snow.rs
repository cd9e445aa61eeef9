//! AWS Snow (CAPAS) infrastructure provider

use crate::api::providers::{AWSSnowCluster, AWSSnowMachineTemplate};
use crate::compare::spec_derivative_eq;
use crate::controlplane::ControlPlane;
use crate::lookup::KindMapping;
use crate::rename::ApiRetriever;
use crate::workers::Workers;

use super::InfrastructureProvider;

/// Retriever for live AWSSnowMachineTemplates
pub type AWSSnowMachineTemplateRetriever = ApiRetriever<AWSSnowMachineTemplate>;

/// Control plane of a snow cluster
pub type SnowControlPlane = ControlPlane<AWSSnowCluster, AWSSnowMachineTemplate>;

/// Workers of a snow cluster
pub type SnowWorkers = Workers<AWSSnowMachineTemplate>;

/// Snow provider kinds
#[derive(Clone, Copy, Debug, Default)]
pub struct Snow;

impl InfrastructureProvider for Snow {
    const NAME: &'static str = "snow";
    type Cluster = AWSSnowCluster;
    type MachineTemplate = AWSSnowMachineTemplate;

    fn machine_templates_equal(new: &AWSSnowMachineTemplate, old: &AWSSnowMachineTemplate) -> bool {
        machine_template_equal(new, old)
    }
}

/// Whether an AWSSnowMachineTemplate can be kept
///
/// The device list must have the same length: derivative comparison alone
/// would accept a shorter list, but machines placed on a removed device have
/// to roll.
pub fn machine_template_equal(new: &AWSSnowMachineTemplate, old: &AWSSnowMachineTemplate) -> bool {
    let device_count = |mt: &AWSSnowMachineTemplate| {
        mt.spec.template.spec.devices.as_ref().map_or(0, Vec::len)
    };
    if device_count(new) != device_count(old) {
        return false;
    }
    spec_derivative_eq(&new.spec, &old.spec)
}

/// Registry mapping for AWSSnowCluster
pub fn cluster_mapping() -> KindMapping {
    KindMapping::of::<AWSSnowCluster>()
}

/// Registry mapping for AWSSnowMachineTemplate
pub fn machine_template_mapping() -> KindMapping {
    KindMapping::of::<AWSSnowMachineTemplate>()
}
