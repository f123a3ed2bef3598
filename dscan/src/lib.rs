// configuration module
pub mod config;

// pipeline module
pub mod pipeline;

// simulation module
pub mod sim {
    pub mod pulse;
}
