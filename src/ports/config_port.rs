//! Configuration access port trait.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int_or(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double_or(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool_or(&self, section: &str, key: &str, default: bool) -> bool;

    /// Default implementation: reads the key as an integer and falls back to
    /// `default` when the value is negative.
    fn get_usize_or(&self, section: &str, key: &str, default: usize) -> usize {
        let value = self.get_int_or(section, key, default as i64);
        usize::try_from(value).unwrap_or(default)
    }
}
