//! Gateway reachability checks

mod probe;

pub use probe::ConnectivityProber;
