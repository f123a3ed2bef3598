// data module
pub mod data {
    pub mod trace;
    pub mod hit;
    pub mod event;
}

// algorithm module
pub mod algorithm {
    pub mod filter;
    pub mod assembly;
}

// correlation module
pub mod correlation {
    pub mod grid;
    pub mod correlator;
}

// error types
pub mod error;
