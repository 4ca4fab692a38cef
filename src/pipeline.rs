//! The image composition pipeline: base, layer, append, publish

use crate::{daemon, distribution, error::Result, image::Image, source, ImageName};

/// One run of the tool
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// URI of the tar archive to append, `file://` or `http(s)://`
    pub tar_uri: String,
    /// Reference for the produced image
    pub output: ImageName,
    /// Base image, the empty image when absent
    pub base: Option<ImageName>,
    /// Publish to the local daemon
    pub use_daemon: bool,
    /// Publish to the remote registry
    pub use_remote: bool,
}

/// Compose and publish the image described by `config`
///
/// When both destinations are requested the base is loaded from the daemon
/// and then again from the registry, the second load replacing the first;
/// the daemon write also precedes the registry write.
pub fn run(config: &RunConfig) -> Result<()> {
    let mut image = Image::scratch();
    if let Some(base) = &config.base {
        if config.use_daemon {
            log::info!("Loading base image {} from daemon", base);
            image = daemon::image(base)?;
        }
        if config.use_remote {
            log::info!("Loading base image {} from registry", base);
            image = distribution::image(base)?;
        }
    }

    let layer = source::layer(&config.tar_uri)?;
    let image = image.append(layer)?;

    if config.use_daemon {
        daemon::write(&config.output, &image)?;
    }
    if config.use_remote {
        distribution::push(&config.output, &image)?;
    }
    Ok(())
}
