use ratebook::{decompose, StarBreakdown};
use serde::Serialize;
use structopt::StructOpt;

use crate::{common::emit, run_impl};

#[derive(StructOpt)]
pub struct Stars {
    /// Rating between 0 and 5; anything outside is clamped
    #[structopt(allow_hyphen_values = true)]
    rating: f64,
}

#[derive(Serialize)]
struct Rendered {
    rating: f64,
    #[serde(flatten)]
    stars: StarBreakdown,
    display: String,
}

run_impl!(Stars, self, ser, {
    let stars = decompose(self.rating);
    emit(
        &Rendered {
            rating: self.rating,
            stars,
            display: stars.render(),
        },
        ser,
    )?;
});
