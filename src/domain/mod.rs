// Domain layer: records, datasets, source definitions and the ports the pipeline depends on.

pub mod model;
pub mod ports;
pub mod report;
pub mod source;
