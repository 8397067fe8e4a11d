pub const DEFAULT_SEED: u64 = 123345;
pub const DEFAULT_OVERLAP_FACTOR: f64 = 1.0;

pub const DEFAULT_MIN_WINDOW_SIZE: usize = 1;
pub const DEFAULT_WINDOW_STEP_SIZE: usize = 1;

// automatic pseudo-experiment count
pub const MIN_AUTO_PSEUDO_EXPERIMENTS: u64 = 1_000;
pub const CAPPED_AUTO_PSEUDO_EXPERIMENTS: u64 = 1_000_000;
pub const AUTO_PSEUDO_CAP_P_VALUE: f64 = 1e-7;

// p-value -> sigma conversion
pub const Z_OVERFLOW_P_VALUE: f64 = 1e-9;
pub const Z_OVERFLOW_VALUE: f64 = 6.0;
pub const Z_UNDERFLOW_P_VALUE: f64 = 1.0 - 1e-9;

// numeric regimes of the bin models
pub const POISSON_GAMMA_STAT_DOMINANCE: f64 = 100.0;
pub const POISSON_GAMMA_LOG_SPACE_SHAPE: f64 = 100.0;
pub const POISSON_GAMMA_TAIL_SWITCH: f64 = 0.9;
pub const POISSON_GAMMA_TAIL_MAX_TERMS: usize = 1_000_000;
pub const GAMMA_QUANTILE_NORMAL_SHAPE: f64 = 1_000.0;

// calibration bookkeeping
pub const TRACE_POINTS: u64 = 1_000;
pub const TRACE_CONFIDENCE_LEVEL: f64 = 0.683;
pub const NULL_DISTRIBUTION_BINS: usize = 100;
pub const NULL_DISTRIBUTION_RANGE: f64 = 1.5;
