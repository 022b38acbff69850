use clap::Parser;

/// Read an environment variable and parse it, `None` when unset or unparsable.
pub fn get_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// Parse command line arguments.
///
/// Android activities have no argv, so there the defaults are parsed from
/// the program name alone.
pub fn parse_args<T: Parser>() -> Result<T, clap::Error> {
    #[cfg(not(target_os = "android"))]
    {
        T::try_parse()
    }
    #[cfg(target_os = "android")]
    {
        T::try_parse_from([env!("CARGO_PKG_NAME")])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_missing_is_none() {
        assert_eq!(get_env::<u32>("EFRAME_ENTRYPOINTS_SURELY_UNSET_VAR"), None);
    }

    #[test]
    fn test_get_env_parses_path_variable() {
        // PATH is set in every test environment and is not a number
        assert!(get_env::<String>("PATH").is_some());
        assert_eq!(get_env::<u64>("PATH"), None);
    }
}
