use flate2::read::GzDecoder;
use oci_spec::image::{Descriptor, DescriptorBuilder, MediaType};
use std::io;

use crate::{
    digest::{Digest, DigestBuf},
    error::Result,
};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A single filesystem delta, transported as a (possibly gzipped) tar
///
/// The blob bytes are kept in memory so the layer can be read more than
/// once: for digest computation first and for each upload afterwards.
#[derive(Clone)]
pub struct Layer {
    blob: Vec<u8>,
    digest: Digest,
    diff_id: Digest,
    media_type: MediaType,
}

impl Layer {
    /// Wrap raw tar bytes as a layer
    ///
    /// Gzipped input stays compressed for distribution; the diff-id is
    /// always the digest of the uncompressed tar.
    pub fn from_bytes(blob: Vec<u8>) -> Result<Self> {
        let digest = Digest::from_buf_sha256(&blob);
        let (media_type, diff_id) = if blob.starts_with(&GZIP_MAGIC) {
            let mut sink = DigestBuf::new(io::sink());
            io::copy(&mut GzDecoder::new(blob.as_slice()), &mut sink)?;
            let (_, diff_id) = sink.finish();
            (MediaType::ImageLayerGzip, diff_id)
        } else {
            (MediaType::ImageLayer, digest.clone())
        };
        Ok(Layer {
            blob,
            digest,
            diff_id,
            media_type,
        })
    }

    pub fn from_reader(mut reader: impl io::Read) -> Result<Self> {
        let mut blob = Vec::new();
        reader.read_to_end(&mut blob)?;
        Self::from_bytes(blob)
    }

    /// Digest of the blob as transported
    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    /// Digest of the uncompressed tar, as recorded in the image config
    pub fn diff_id(&self) -> &Digest {
        &self.diff_id
    }

    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.blob
    }

    pub fn size(&self) -> u64 {
        self.blob.len() as u64
    }

    /// Uncompressed tar bytes, decoding gzipped input on the fly
    pub fn uncompressed(&self) -> Result<Vec<u8>> {
        if self.media_type == MediaType::ImageLayerGzip {
            let mut buf = Vec::new();
            io::copy(&mut GzDecoder::new(self.blob.as_slice()), &mut buf)?;
            Ok(buf)
        } else {
            Ok(self.blob.clone())
        }
    }

    /// Descriptor of the blob for manifest assembly
    pub fn descriptor(&self) -> Result<Descriptor> {
        Ok(DescriptorBuilder::default()
            .media_type(self.media_type.clone())
            .digest(oci_spec::image::Digest::try_from(&self.digest)?)
            .size(self.size())
            .build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{write::GzEncoder, Compression};
    use std::io::Write;

    fn sample_tar() -> Vec<u8> {
        let mut ar = tar::Builder::new(Vec::new());
        let data = b"hello\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        ar.append_data(&mut header, "hello", &data[..]).unwrap();
        ar.into_inner().unwrap()
    }

    fn gzip(buf: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(buf).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn plain_tar_layer() -> Result<()> {
        let tar = sample_tar();
        let layer = Layer::from_bytes(tar.clone())?;
        assert_eq!(layer.media_type(), &MediaType::ImageLayer);
        assert_eq!(layer.digest(), &Digest::from_buf_sha256(&tar));
        assert_eq!(layer.diff_id(), layer.digest());
        assert_eq!(layer.uncompressed()?, tar);
        Ok(())
    }

    #[test]
    fn gzipped_tar_layer() -> Result<()> {
        let tar = sample_tar();
        let gz = gzip(&tar);
        let layer = Layer::from_bytes(gz.clone())?;
        assert_eq!(layer.media_type(), &MediaType::ImageLayerGzip);
        assert_eq!(layer.digest(), &Digest::from_buf_sha256(&gz));
        // The diff-id sees through the compression
        assert_eq!(layer.diff_id(), &Digest::from_buf_sha256(&tar));
        assert_eq!(layer.uncompressed()?, tar);
        Ok(())
    }

    #[test]
    fn descriptor_matches_blob() -> Result<()> {
        let layer = Layer::from_bytes(sample_tar())?;
        let descriptor = layer.descriptor()?;
        assert_eq!(descriptor.size(), layer.size());
        assert_eq!(Digest::from_descriptor(&descriptor)?, *layer.digest());
        Ok(())
    }
}
