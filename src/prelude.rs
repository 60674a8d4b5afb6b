// 1. Traits
pub use crate::data::frame::TableExt;
pub use crate::io::{Table, ToFile};
pub use crate::stdev::rolling::RollingStatistic;

// 2. Configuration
pub use crate::config::{
    ConversionSettings, FileConfig, RateColumns, RateConfig, ReadArgs, StdevColumns, StdevConfig,
    StdevKind, StdevSettings,
};
pub use crate::io::FileFormat;

// 3. Pipelines
pub use crate::conversion::{ConversionStatus, ConversionSummary, ConvertedPrices, PriceConverter};
pub use crate::stdev::{RollingStdevs, StdevPipeline, StdevSummary};

// 4. Data Types
pub use crate::data::{key::EntityKey, timestamp::TimestampFormat};

// 5. Errors
pub use crate::error::{ConfigError, DataError, FxPipeError, FxPipeResult, IoError};

// 6. Functions
pub use crate::io::{read_table, write_table};
pub use crate::logging::init_tracing;
