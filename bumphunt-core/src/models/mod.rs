pub mod config;
pub mod spectrum;
pub mod window;

// re-export for cleaner imports
pub use self::config::{HuntConfig, HuntConfigFileType};
pub use self::spectrum::BinnedSpectrum;
pub use self::window::{BinRange, SearchRegion, Window, WindowSizePolicy, WindowSizeSettings};
