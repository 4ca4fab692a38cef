//! Image values based on [OCI image specification](https://github.com/opencontainers/image-spec)

pub mod docker_archive;

mod layer;

pub use layer::Layer;

use chrono::Utc;
use oci_spec::image::{
    Arch, DescriptorBuilder, HistoryBuilder, ImageConfiguration, ImageConfigurationBuilder,
    ImageManifest, ImageManifestBuilder, MediaType, Os, RootFsBuilder,
};

use crate::{digest::Digest, error::Result};

/// An immutable image: manifest, config, and the blobs of its ordered layers
///
/// Operations return new values. Manifest and config digests are recomputed
/// whenever the layer list changes.
#[derive(Clone)]
pub struct Image {
    manifest: ImageManifest,
    config: ImageConfiguration,
    layers: Vec<Layer>,
}

impl Image {
    /// The empty image: no layers, minimal `linux/amd64` config
    pub fn scratch() -> Self {
        let rootfs = RootFsBuilder::default()
            .typ("layers")
            .diff_ids(Vec::<String>::new())
            .build()
            .expect("rootfs with fixed fields always builds");
        let config = ImageConfigurationBuilder::default()
            .architecture(Arch::Amd64)
            .os(Os::Linux)
            .rootfs(rootfs)
            .build()
            .expect("static configuration always builds");
        Self::assemble(config, Vec::new()).expect("empty image always assembles")
    }

    /// Rebuild the manifest from a config and a layer list
    pub fn assemble(config: ImageConfiguration, layers: Vec<Layer>) -> Result<Self> {
        let config_json = config.to_string()?;
        let config_digest = Digest::from_buf_sha256(config_json.as_bytes());
        let config_descriptor = DescriptorBuilder::default()
            .media_type(MediaType::ImageConfig)
            .digest(oci_spec::image::Digest::try_from(&config_digest)?)
            .size(config_json.len() as u64)
            .build()?;

        let mut layer_descriptors = Vec::with_capacity(layers.len());
        for layer in &layers {
            layer_descriptors.push(layer.descriptor()?);
        }

        let manifest = ImageManifestBuilder::default()
            .schema_version(2_u32)
            .media_type(MediaType::ImageManifest)
            .config(config_descriptor)
            .layers(layer_descriptors)
            .build()?;

        Ok(Image {
            manifest,
            config,
            layers,
        })
    }

    /// New image equal to `self` with `layer` appended on top
    ///
    /// The layer's diff-id is recorded in the config rootfs and a history
    /// entry marks the append.
    pub fn append(&self, layer: Layer) -> Result<Image> {
        let mut config = self.config.clone();
        let mut rootfs = config.rootfs().clone();
        rootfs.diff_ids_mut().push(layer.diff_id().to_string());
        config.set_rootfs(rootfs);

        let now = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        config.history_mut().push(
            HistoryBuilder::default()
                .created(now.clone())
                .created_by("oci-append".to_string())
                .build()?,
        );
        config.set_created(Some(now));

        let mut layers = self.layers.clone();
        layers.push(layer);
        Self::assemble(config, layers)
    }

    pub fn manifest(&self) -> &ImageManifest {
        &self.manifest
    }

    pub fn config(&self) -> &ImageConfiguration {
        &self.config
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_layer() -> Layer {
        let mut ar = tar::Builder::new(Vec::new());
        let data = b"hello\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        ar.append_data(&mut header, "hello", &data[..]).unwrap();
        Layer::from_bytes(ar.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn scratch_has_no_layers() {
        let image = Image::scratch();
        assert!(image.layers().is_empty());
        assert!(image.manifest().layers().is_empty());
        assert!(image.config().rootfs().diff_ids().is_empty());
    }

    #[test]
    fn append_adds_one_layer() -> Result<()> {
        let base = Image::scratch();
        let layer = sample_layer();
        let diff_id = layer.diff_id().to_string();

        let image = base.append(layer)?;
        assert_eq!(image.layers().len(), base.layers().len() + 1);
        assert_eq!(image.manifest().layers().len(), 1);
        assert_eq!(image.config().rootfs().diff_ids(), &vec![diff_id]);

        // The base image is left untouched
        assert!(base.layers().is_empty());
        assert!(base.config().rootfs().diff_ids().is_empty());
        Ok(())
    }

    #[test]
    fn append_recomputes_config_descriptor() -> Result<()> {
        let base = Image::scratch();
        let image = base.append(sample_layer())?;
        assert_ne!(
            base.manifest().config().digest(),
            image.manifest().config().digest()
        );
        assert_eq!(
            Digest::from_descriptor(image.manifest().config())?,
            Digest::from_buf_sha256(image.config().to_string()?.as_bytes())
        );
        Ok(())
    }

    #[test]
    fn append_records_history() -> Result<()> {
        let image = Image::scratch().append(sample_layer())?;
        let history = image.config().history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].created_by(), &Some("oci-append".to_string()));
        Ok(())
    }
}
