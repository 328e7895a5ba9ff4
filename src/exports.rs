/// ***********************************************************************
/// *****
/// * Copyright (c) 2025
/// The MIT License
///
/// Contributors: afps-covar contributors
/// ***********************************************************************
/// ****

pub use {adjustp,
         anyhow,
         csv,
         itertools,
         log,
         polars,
         pretty_env_logger,
         rayon,
         serde,
         serde_json,
         statrs};
