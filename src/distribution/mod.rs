//! Pull and push images to an OCI registry based on [OCI distribution specification](https://github.com/opencontainers/distribution-spec)

mod auth;
mod client;

pub use auth::{AuthChallenge, StoredAuth};
pub use client::Client;

use oci_spec::image::ImageConfiguration;

use crate::{
    error::Result,
    image::{Image, Layer},
    Digest, ImageName,
};

/// Pull `name` from its registry into an in-memory [Image]
///
/// Runs anonymously: auth challenges are answered without stored
/// credentials.
pub fn image(name: &ImageName) -> Result<Image> {
    let mut client = Client::anonymous(name.registry_url()?, name.name.clone());
    let manifest = client.get_manifest(&name.manifest_reference())?;

    let config_blob = client.get_blob(&Digest::from_descriptor(manifest.config())?)?;
    let config = ImageConfiguration::from_reader(config_blob.as_slice())?;

    let mut layers = Vec::with_capacity(manifest.layers().len());
    for descriptor in manifest.layers() {
        let blob = client.get_blob(&Digest::from_descriptor(descriptor)?)?;
        layers.push(Layer::from_bytes(blob)?);
    }
    Image::assemble(config, layers)
}

/// Push `image` to the registry under `name`
///
/// Credentials come from the ambient keychain. Blobs are uploaded first,
/// the manifest last.
pub fn push(name: &ImageName, image: &Image) -> Result<()> {
    let mut client = Client::from_image_name(name)?;
    for layer in image.layers() {
        client.push_blob(layer.bytes())?;
    }
    client.push_blob(image.config().to_string()?.as_bytes())?;
    client.push_manifest(&name.manifest_reference(), image.manifest())?;
    Ok(())
}
