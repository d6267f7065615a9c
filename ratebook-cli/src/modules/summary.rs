use ratebook::{decompose, recompute, RatingSummary, Score};
use serde::Serialize;
use structopt::StructOpt;

use crate::{common::emit, run_impl};

#[derive(StructOpt)]
pub struct Summary {
    /// Scores from 1 to 5 in steps of 0.5
    scores: Vec<Score>,
}

#[derive(Serialize)]
struct Rendered {
    #[serde(flatten)]
    summary: RatingSummary,
    display: String,
}

run_impl!(Summary, self, ser, {
    let summary = recompute(self.scores.iter().copied());
    emit(
        &Rendered {
            summary,
            display: decompose(summary.average).render(),
        },
        ser,
    )?;
});
