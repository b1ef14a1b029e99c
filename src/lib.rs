pub mod models {
    pub mod wellness;
}

pub mod archive;
pub mod client;
pub mod config;
pub mod db {
    pub mod connection;
    pub mod models;
}
pub mod schema;
pub mod utils;
pub mod services {
    pub mod coverage;
    pub mod ingest;
    pub mod normalize;
    pub mod retention;
    pub mod staging;
    pub mod sync;
    pub mod timestamp;
    pub mod transform;
}

#[cfg(test)]
pub mod testing;
