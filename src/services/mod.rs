// Reporting queries
pub mod reports;

// Synthetic data generation
pub mod seed;
