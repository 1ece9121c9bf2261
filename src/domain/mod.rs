// Domain layer: directory records, table descriptors and the ports the host talks through.

pub mod model;
pub mod ports;
pub mod schema;
