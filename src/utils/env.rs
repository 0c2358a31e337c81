// Environment variable utils

use std::env;

/// Gets boolean env var
///
/// # Arguments
///
/// * `var_name` - The name of the environment variable
/// * `default_val` - The default value
///
/// # Return value
///
/// Returns true for 'YES', 'TRUE' or '1' and false for 'NO', 'FALSE' or '0' (case insensitive).
/// Otherwise, returns the value of default_val
pub fn get_env_bool(var_name: &str, default_val: bool) -> bool {
    match env::var(var_name) {
        Ok(var_str) => match var_str.trim().to_uppercase().as_str() {
            "YES" | "TRUE" | "1" => true,
            "NO" | "FALSE" | "0" => false,
            _ => default_val,
        },
        Err(_) => default_val,
    }
}

/// Gets string env var
///
/// # Arguments
///
/// * `var_name` - The name of the environment variable
/// * `default_val` - The default value
///
/// # Return value
///
/// Returns the value of the variable or, if not present, the value of default_val
pub fn get_env_string(var_name: &str, default_val: &str) -> String {
    env::var(var_name).unwrap_or_else(|_| default_val.to_string())
}

/// Gets u32 env var
///
/// # Arguments
///
/// * `var_name` - The name of the environment variable
/// * `default_val` - The default value
///
/// # Return value
///
/// Returns the value of the variable as u32 or,
/// if not present or invalid, the value of default_val
pub fn get_env_u32(var_name: &str, default_val: u32) -> u32 {
    match env::var(var_name) {
        Ok(var_str) => var_str.trim().parse().unwrap_or(default_val),
        Err(_) => default_val,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_parsing() {
        env::set_var("SIMPLE_RTMP_TEST_BOOL", "yes");
        env::set_var("SIMPLE_RTMP_TEST_U32", " 4096 ");
        env::set_var("SIMPLE_RTMP_TEST_BAD_U32", "abc");

        assert!(get_env_bool("SIMPLE_RTMP_TEST_BOOL", false));
        assert!(!get_env_bool("SIMPLE_RTMP_TEST_MISSING", false));
        assert_eq!(get_env_u32("SIMPLE_RTMP_TEST_U32", 1), 4096);
        assert_eq!(get_env_u32("SIMPLE_RTMP_TEST_BAD_U32", 7), 7);
        assert_eq!(get_env_string("SIMPLE_RTMP_TEST_MISSING", "x"), "x");
    }
}
