use crate::{
    common::Run,
    modules::{shell::Shell, stars::Stars, summary::Summary},
    run_impl,
};
use structopt::StructOpt;

/// Rate restaurants and keep their averages up to date.
#[derive(StructOpt)]
#[structopt(name = "ratebook")]
pub enum Command {
    /// Show a rating as five stars
    Stars(Stars),
    /// Count and average a list of scores
    Summary(Summary),
    /// Open an interactive notebook
    Shell(Shell),
}

run_impl!(Command, self, ser, {
    match self {
        Self::Stars(s) => s.run(ser).await?,
        Self::Summary(s) => s.run(ser).await?,
        Self::Shell(s) => s.run(ser).await?,
    }
});
