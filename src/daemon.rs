//! Load images from and publish images to the local container daemon
//!
//! The daemon is driven through the `docker` CLI: `docker save` streams a
//! docker-archive out, `docker load` accepts one on stdin. Both operations
//! address images by tag.

use std::io::Write;
use std::process::{Command, Stdio};

use crate::{
    error::{Error, Result},
    image::{docker_archive, Image},
    ImageName,
};

/// Load an image stored in the local daemon
pub fn image(name: &ImageName) -> Result<Image> {
    let tagged = name.tagged()?;
    log::info!("docker save {}", tagged);
    let output = Command::new("docker")
        .args(["save", tagged.as_str()])
        .stdin(Stdio::null())
        .output()?;
    if !output.status.success() {
        return Err(Error::DaemonCommand(
            "save",
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    docker_archive::read(output.stdout.as_slice())
}

/// Write an image into the local daemon under `name`, which must carry a tag
pub fn write(name: &ImageName, image: &Image) -> Result<()> {
    let tagged = name.tagged()?;
    let mut archive = Vec::new();
    docker_archive::write(image, &tagged, &mut archive)?;

    log::info!("docker load {} ({} bytes)", tagged, archive.len());
    let mut child = Command::new("docker")
        .args(["load", "--quiet"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    let mut stdin = child.stdin.take().expect("stdin is piped");
    stdin.write_all(&archive)?;
    drop(stdin);

    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(Error::DaemonCommand(
            "load",
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(())
}
