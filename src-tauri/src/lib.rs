pub mod api;
mod commands;
pub mod config;
pub mod editor;
pub mod error;
pub mod gateway;
pub mod list;
pub mod reports;
pub mod session;
pub mod state;

pub use api::types::{MetricsSnapshot, RecipeRow, ReportKind, UserRow};
pub use error::AppError;

use anyhow::Context;

fn restore_backend(app: &tauri::AppHandle) -> anyhow::Result<()> {
    let configured =
        commands::config::reconfigure(app).context("failed to build backend from settings")?;
    if !configured {
        tracing::info!("Waiting for connection settings before starting the backend");
    }
    Ok(())
}

pub fn run() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tauri::Builder::default()
        .plugin(tauri_plugin_store::Builder::new().build())
        .manage(state::AppState::default())
        .invoke_handler(tauri::generate_handler![
            commands::auth::sign_in,
            commands::auth::sign_out,
            commands::auth::get_session,
            commands::config::get_preference,
            commands::config::set_preference,
            commands::config::get_config_status,
            commands::health::run_health_check,
            commands::dashboard::fetch_metrics,
            commands::users::users_view,
            commands::users::users_set_query,
            commands::users::users_search,
            commands::users::users_go_to_page,
            commands::users::users_reload,
            commands::users::users_toggle_enabled,
            commands::recipes::recipes_view,
            commands::recipes::recipes_set_query,
            commands::recipes::recipes_search,
            commands::recipes::recipes_go_to_page,
            commands::recipes::recipes_reload,
            commands::recipes::recipe_edit_open,
            commands::recipes::recipe_edit_set_field,
            commands::recipes::recipe_edit_save,
            commands::recipes::recipe_edit_cancel,
            commands::recipes::recipe_edit_view,
            commands::reports::download_report,
        ])
        .setup(|app| {
            // A broken settings file should not keep the window from opening.
            if let Err(e) = restore_backend(app.handle()) {
                tracing::warn!("{:#}", e);
            }
            Ok(())
        })
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
