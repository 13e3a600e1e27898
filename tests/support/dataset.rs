use std::path::Path;

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Write a CSV shaped like the event datasets the tools train on.
///
/// `TTATA` grows with `Load` and is noisy; `Target` is `high` when `Load`
/// exceeds 50. The event bookkeeping columns are the ones the profiles ignore.
pub fn write_event_csv(path: &Path, rows: usize, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut text =
        String::from("Group,EventTime,EventIndex,Load,Site,DTA,TTATA,Target,Fraction\n");
    for idx in 0..rows {
        let load: f64 = rng.random_range(0.0..100.0);
        let site = ["north", "south", "east"][idx % 3];
        let noise: f64 = rng.random_range(-1.0..1.0);
        let ttata = 2.0 * load + if site == "south" { 15.0 } else { 0.0 } + noise;
        let target = if load > 50.0 { "high" } else { "low" };
        // A few missing loads exercise the missing-value path.
        let load_cell = if idx % 17 == 5 {
            "NA".to_string()
        } else {
            format!("{load:.3}")
        };
        text.push_str(&format!(
            "g{},{},{},{},{},{:.2},{:.3},{},{:.2}\n",
            idx % 5,
            1_700_000_000 + idx,
            idx,
            load_cell,
            site,
            rng.random_range(0.0..1.0),
            ttata,
            target,
            rng.random_range(0.0..1.0),
        ));
    }
    std::fs::write(path, text).expect("write csv");
}
