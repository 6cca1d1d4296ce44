use anyhow::Context;
use simtools::manifest::reader::{ManifestParams, ManifestParamsBuilder};
use simtools::manifest::Manifest;

use crate::cli::ManifestArgs;

pub(crate) mod create;
pub(crate) mod fcr;
pub(crate) mod normalize_manifest;
pub(crate) mod qc;
pub(crate) mod view;

impl ManifestArgs {
    #[must_use]
    pub fn params_builder(&self) -> ManifestParamsBuilder {
        let mut builder = ManifestParams::builder();
        builder.wide_format(self.wide_manifest);
        builder
    }

    pub fn load(&self, params: &ManifestParams) -> anyhow::Result<Manifest> {
        Manifest::open(self.manifest.path(), params)
            .with_context(|| format!("Could not read the manifest {}", self.manifest))
    }
}
