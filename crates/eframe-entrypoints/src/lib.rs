//! Entry points for egui/eframe applications on desktop and Android
//!
//! An application crate declares its entry points once with [`eframe_app!`]
//! and gets a `run_native()` function for `main.rs` plus an `android_main`
//! symbol for the Android activity. Both paths install logging, print the
//! build metadata and run the app inside a tokio runtime, so app code can
//! spawn background tasks with [`async_runtime::spawn`].
//!
//! ```ignore
//! eframe_entrypoints::eframe_app!("My App", |cc| Box::new(MyApp::new(cc)));
//!
//! // main.rs
//! fn main() -> eframe::Result<()> {
//!     my_app::run_native()
//! }
//! ```

pub mod async_runtime;
pub mod cli;
pub mod logging;
mod metadata;

pub use cli::{get_env, parse_args};
pub use logging::{LoggingGuard, setup_logging};
pub use metadata::{log_version_info, short_version_info};

pub use eframe;
pub use eframe::CreationContext;

/// Default window size on desktop
pub const DEFAULT_WINDOW_SIZE: [f32; 2] = [1280.0, 720.0];

/// Define the platform entry points for an eframe application.
///
/// `$app_name` is used for the window title, the storage key and the
/// version log line. `$app_creator` receives the [`CreationContext`] and
/// returns the boxed app.
#[macro_export]
macro_rules! eframe_app {
    ($app_name:expr, $app_creator:expr) => {
        #[cfg(target_os = "android")]
        #[unsafe(no_mangle)] // SAFETY: there is no other global function of this name
        pub fn android_main(app: ::winit::platform::android::activity::AndroidApp) {
            if let Err(err) = $crate::android_main_impl($app_name, app, $app_creator) {
                ::tracing::error!("{} exited with error: {err}", $app_name);
            }
        }

        /// Run the application on desktop. Call this from `main.rs`.
        pub fn run_native() -> $crate::eframe::Result<()> {
            $crate::native_main_impl($app_name, $app_creator)
        }
    };
}

fn build_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}

#[cfg(target_os = "android")]
#[doc(hidden)]
pub fn android_main_impl(
    app_name: &str,
    app: winit::platform::android::activity::AndroidApp,
    app_creator: impl FnOnce(&eframe::CreationContext<'_>) -> Box<dyn eframe::App> + 'static,
) -> eframe::Result<()> {
    use winit::platform::android::EventLoopBuilderExtAndroid;

    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Info)
            .with_tag(app_name),
    );

    let runtime = build_runtime().map_err(|err| eframe::Error::AppCreation(Box::new(err)))?;
    let _enter = runtime.enter();

    log_version_info(app_name);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_title(app_name),
        event_loop_builder: Some(Box::new(move |builder| {
            builder.with_android_app(app);
        })),
        ..Default::default()
    };

    eframe::run_native(
        app_name,
        native_options,
        Box::new(move |cc| Ok(app_creator(cc))),
    )
}

#[doc(hidden)]
pub fn native_main_impl(
    app_name: &str,
    app_creator: impl FnOnce(&eframe::CreationContext<'_>) -> Box<dyn eframe::App> + 'static,
) -> eframe::Result<()> {
    // Must run before anything logs so every layer sees the first events
    let _logging = setup_logging();

    let runtime = build_runtime().map_err(|err| eframe::Error::AppCreation(Box::new(err)))?;
    let _enter = runtime.enter();

    log_version_info(app_name);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(DEFAULT_WINDOW_SIZE)
            .with_title(app_name)
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        app_name,
        native_options,
        Box::new(move |cc| Ok(app_creator(cc))),
    )
}
