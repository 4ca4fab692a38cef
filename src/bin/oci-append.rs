use clap::{CommandFactory, Parser};
use oci_append::{
    error::Result,
    pipeline::{run, RunConfig},
    ImageName,
};

/// Append a tar layer to a base image and publish the result
#[derive(Debug, Parser)]
#[command(version, about)]
struct Opt {
    /// URI of the tar archive to append, e.g. "file:///a.tar" or "https://example.com/a.tar"
    #[arg(long = "tar-uri", default_value = "")]
    tar_uri: String,

    /// Reference for the produced image
    #[arg(long = "output-tag", default_value = "")]
    output_tag: String,

    /// Reference of the base image (optional)
    #[arg(long = "base-tag", default_value = "")]
    base_tag: String,

    /// Publish the image to the local daemon
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    daemon: bool,

    /// Publish the image to the remote registry
    #[arg(long, default_value_t = false, action = clap::ArgAction::Set)]
    remote: bool,
}

fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();
    if opt.tar_uri.is_empty() || opt.output_tag.is_empty() {
        let mut cmd = Opt::command();
        eprintln!("{}", cmd.render_help());
        std::process::exit(1);
    }

    if let Err(e) = compose(&opt) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn compose(opt: &Opt) -> Result<()> {
    let output = ImageName::parse(&opt.output_tag)?;
    let base = if opt.base_tag.is_empty() {
        None
    } else {
        Some(ImageName::parse(&opt.base_tag)?)
    };
    run(&RunConfig {
        tar_uri: opt.tar_uri.clone(),
        output,
        base,
        use_daemon: opt.daemon,
        use_remote: opt.remote,
    })
}
