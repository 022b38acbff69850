use shadow_rs::shadow;

shadow!(build);

/// Log the version line and build date at startup
pub fn log_version_info(app_name: &str) {
    tracing::info!("{}", short_version_info(app_name));
    tracing::info!(
        "Build date: {} ({})",
        build::BUILD_TIME_2822,
        build::BUILD_RUST_CHANNEL
    );
}

/// `<app> <version> (<branch>@<commit>[+dirty])`
pub fn short_version_info(app_name: &str) -> String {
    format!(
        "{} {} ({}@{}{})",
        app_name,
        build::PKG_VERSION,
        build::BRANCH,
        build::SHORT_COMMIT,
        if build::GIT_CLEAN { "" } else { "+dirty" }
    )
}
