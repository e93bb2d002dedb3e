//! Integration checks of `HunterOptions`'s documented defaults and
//! override behavior (`spec.md` §6.1, §4.4.4).

use depscan::options::{HunterOptions, DEFAULT_MAX_CONVERGENCE_ITERATIONS};

#[test]
fn default_options_use_documented_fallbacks() {
    let options = HunterOptions::default();
    assert_eq!(options.cc, "cc");
    assert_eq!(options.max_convergence_iterations(), DEFAULT_MAX_CONVERGENCE_ITERATIONS);
}

#[test]
fn explicit_iteration_bound_overrides_default() {
    let mut options = HunterOptions::default();
    options.max_convergence_iterations = Some(2);
    assert_eq!(options.max_convergence_iterations(), 2);
}
