//! Placeholder driver for ids without a compiled-in backend.

use super::Driver;

/// Does nothing: probes find no devices, every lookup misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDriver;

impl Driver for NullDriver {
    fn prefix(&self) -> &'static str {
        "none:"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_driver_misses_everything() {
        let mut driver = NullDriver;
        assert!(driver.probe().is_empty());
        assert_eq!(driver.key_code("Up"), None);
        assert_eq!(driver.key_name(1), None);
        assert_eq!(driver.key_layout().key_count, 0);

        let mut defaults = [0u32; 4];
        driver.default_binds(&mut defaults);
        assert_eq!(defaults, [0; 4]);
    }
}
