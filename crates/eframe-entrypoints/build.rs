fn main() {
    // Build metadata (version, branch, commit) for the startup log line
    shadow_rs::ShadowBuilder::builder()
        .build()
        .expect("failed to generate build metadata");
}
