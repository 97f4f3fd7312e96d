pub mod aggregator;
pub mod board;
pub mod catalog;
pub mod config;
pub mod error;
pub mod extensions;
pub mod fetch;
pub mod model;
pub mod normalize;
pub mod output;
pub mod parser;
pub mod reference;
pub mod resolve;
pub mod stats;
pub mod views;

pub mod gtfs_rt {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}

/// Overlay schema for NYCT subway extension fields.
pub mod nyct_rt {
    include!(concat!(env!("OUT_DIR"), "/nyct_subway.rs"));
}

/// Overlay schema for MTA railroad extension fields.
pub mod mta_rr_rt {
    include!(concat!(env!("OUT_DIR"), "/mta_railroad.rs"));
}
