//! docker-archive tar format, the interchange format of `docker save` and `docker load`
//!
//! The archive carries the uncompressed layer tars, the image config JSON,
//! and a `manifest.json` tying them to a repository tag.

use oci_spec::image::ImageConfiguration;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    io::{self, Read},
    path::{Path, PathBuf},
};

use crate::{
    digest::Digest,
    error::{Error, Result},
    image::{Image, Layer},
};

/// One entry of `manifest.json` at the root of a docker-archive
#[derive(Debug, Serialize, Deserialize)]
struct ManifestEntry {
    #[serde(rename = "Config")]
    config: String,
    #[serde(rename = "RepoTags")]
    repo_tags: Vec<String>,
    #[serde(rename = "Layers")]
    layers: Vec<String>,
}

/// Write `image` as a docker-archive tagged `repo_tag`
///
/// Layers are stored uncompressed and named by their diff-id, so the paths
/// in `manifest.json` and the diff-ids in the config agree without
/// recompression on load.
pub fn write<W: io::Write>(image: &Image, repo_tag: &str, out: W) -> Result<()> {
    let mut ar = tar::Builder::new(out);

    let mut layer_paths = Vec::with_capacity(image.layers().len());
    for layer in image.layers() {
        let tar_bytes = layer.uncompressed()?;
        let path = format!("{}/layer.tar", layer.diff_id().encoded);
        save_file(&mut ar, &path, &tar_bytes)?;
        layer_paths.push(path);
    }

    let config_json = image.config().to_string()?;
    let config_path = format!(
        "{}.json",
        Digest::from_buf_sha256(config_json.as_bytes()).encoded
    );
    save_file(&mut ar, &config_path, config_json.as_bytes())?;

    let manifest = vec![ManifestEntry {
        config: config_path,
        repo_tags: vec![repo_tag.to_string()],
        layers: layer_paths,
    }];
    save_file(&mut ar, "manifest.json", &serde_json::to_vec(&manifest)?)?;

    ar.finish()?;
    Ok(())
}

/// Read the first image of a docker-archive
///
/// Accepts both the legacy member naming (`<hex>/layer.tar`, `<hex>.json`)
/// and the OCI-layout naming (`blobs/sha256/<hex>`) newer daemons emit,
/// since `manifest.json` is present either way.
pub fn read<R: Read>(input: R) -> Result<Image> {
    let mut members: HashMap<PathBuf, Vec<u8>> = HashMap::new();
    let mut ar = tar::Archive::new(input);
    for entry in ar.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.to_path_buf();
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut buf)?;
        members.insert(path, buf);
    }

    let manifest_json = members
        .get(Path::new("manifest.json"))
        .ok_or(Error::MissingManifest)?;
    let manifest: Vec<ManifestEntry> = serde_json::from_slice(manifest_json)?;
    let entry = manifest.into_iter().next().ok_or(Error::MissingManifest)?;

    let config_bytes = members
        .get(Path::new(&entry.config))
        .ok_or_else(|| Error::MissingBlob(entry.config.clone()))?;
    let config = ImageConfiguration::from_reader(config_bytes.as_slice())?;

    let mut layers = Vec::with_capacity(entry.layers.len());
    for path in &entry.layers {
        let blob = members
            .get(Path::new(path))
            .ok_or_else(|| Error::MissingBlob(path.clone()))?;
        layers.push(Layer::from_bytes(blob.clone())?);
    }

    Image::assemble(config, layers)
}

fn save_file<W: io::Write>(ar: &mut tar::Builder<W>, path: &str, data: &[u8]) -> Result<()> {
    let mut header = create_header(data.len());
    ar.append_data(&mut header, path, data)?;
    Ok(())
}

fn create_header(size: usize) -> tar::Header {
    let mut header = tar::Header::new_gnu();
    header.set_size(size as u64);
    header.set_cksum();
    header.set_mode(0b110100100); // rw-r--r--
    header.set_mtime(chrono::Utc::now().timestamp() as u64);
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_image() -> Image {
        let mut ar = tar::Builder::new(Vec::new());
        let data = b"hello\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        ar.append_data(&mut header, "hello", &data[..]).unwrap();
        let layer = Layer::from_bytes(ar.into_inner().unwrap()).unwrap();
        Image::scratch().append(layer).unwrap()
    }

    #[test]
    fn roundtrip() -> Result<()> {
        let image = sample_image();
        let mut buf = Vec::new();
        write(&image, "test_repo:latest", &mut buf)?;

        let loaded = read(buf.as_slice())?;
        assert_eq!(loaded.layers().len(), 1);
        assert_eq!(
            loaded.config().rootfs().diff_ids(),
            image.config().rootfs().diff_ids()
        );
        assert_eq!(loaded.layers()[0].diff_id(), image.layers()[0].diff_id());
        Ok(())
    }

    #[test]
    fn missing_manifest() {
        let mut ar = tar::Builder::new(Vec::new());
        let mut header = create_header(2);
        ar.append_data(&mut header, "unrelated", &b"{}"[..]).unwrap();
        let buf = ar.into_inner().unwrap();
        assert!(matches!(read(buf.as_slice()), Err(Error::MissingManifest)));
    }
}
