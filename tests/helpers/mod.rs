// tests/helpers/mod.rs - Common test utilities

pub mod assertions;
pub mod backends;
pub mod mock_table_server;

/// Skip test if environment variable is not set
pub fn skip_if_no_env(var: &str) -> bool {
    if std::env::var(var).is_err() {
        println!("⚠️  Skipping test - {} not set", var);
        return true;
    }
    false
}
