pub(crate) mod common;
mod modules;
mod options;

use std::io::{stderr, stdout};

use erased_serde::Serializer;
use structopt::StructOpt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::common::Run;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(stderr)
        .init();

    let opt = options::Command::from_args();

    opt.run(&mut <dyn Serializer>::erase(
        &mut serde_json::Serializer::pretty(stdout()),
    ))
    .await?;

    println!();
    Ok(())
}
