pub mod artifact;
pub mod catalog;
pub mod config;
pub mod headless;
pub mod session;
pub mod transfer;

#[cfg(test)]
mod test_helpers;

/// Install the fmt subscriber; `RUST_LOG` overrides the default filter.
/// Logs go to stderr so they never mix with terminal output.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "haske_lib=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

#[cfg(feature = "tauri-app")]
mod tauri_app {
    use crate::artifact::Artifact;
    use crate::catalog::{ModelCatalog, ModelProfile};
    use crate::config::AppConfig;
    use crate::session::{Session, SessionController, SessionState};
    use crate::transfer::HttpTransferClient;
    use std::sync::Arc;
    use tauri::{AppHandle, Emitter, Manager, State};
    use tauri_plugin_notification::NotificationExt;

    struct AppState {
        controller: Arc<SessionController>,
    }

    #[tauri::command]
    async fn list_models(state: State<'_, AppState>) -> Result<Vec<ModelProfile>, String> {
        Ok(state.controller.catalog().models().to_vec())
    }

    #[tauri::command]
    async fn get_session(state: State<'_, AppState>) -> Result<Session, String> {
        Ok(state.controller.snapshot())
    }

    #[tauri::command]
    async fn select_model(model_id: String, state: State<'_, AppState>) -> Result<Session, String> {
        state.controller.select_model(&model_id).map_err(|e| e.to_string())?;
        Ok(state.controller.snapshot())
    }

    #[tauri::command]
    async fn select_artifact(path: String, state: State<'_, AppState>) -> Result<Session, String> {
        let artifact = Artifact::open(&path).await.map_err(|e| e.to_string())?;
        state.controller.select_artifact(artifact).map_err(|e| e.to_string())?;
        Ok(state.controller.snapshot())
    }

    #[tauri::command]
    async fn start_processing(state: State<'_, AppState>) -> Result<u64, String> {
        state.controller.start().map_err(|e| e.to_string())
    }

    #[tauri::command]
    async fn cancel_processing(state: State<'_, AppState>) -> Result<bool, String> {
        Ok(state.controller.cancel())
    }

    /// Mirror every session change to the webview as `session-updated`
    fn forward_snapshots(handle: AppHandle, controller: &SessionController) {
        let mut updates = controller.subscribe();

        tauri::async_runtime::spawn(async move {
            let mut previous = updates.borrow().state;
            while updates.changed().await.is_ok() {
                let session = updates.borrow_and_update().clone();

                if let Err(e) = handle.emit("session-updated", &session) {
                    tracing::warn!(error = %e, "Failed to emit session update");
                }

                if session.state.is_terminal() && !previous.is_terminal() {
                    notify_outcome(&handle, &session);
                }
                previous = session.state;
            }
        });
    }

    fn notify_outcome(handle: &AppHandle, session: &Session) {
        let (title, body) = match (&session.state, &session.error) {
            (SessionState::Succeeded, _) => {
                ("Processing complete".to_string(), session.selected_model.clone())
            }
            (_, Some(failure)) if failure.is_cancelled() => {
                ("Processing cancelled".to_string(), String::new())
            }
            (_, Some(failure)) => ("Processing failed".to_string(), failure.message.clone()),
            _ => return,
        };

        if let Err(e) = handle.notification().builder().title(title).body(body).show() {
            tracing::debug!(error = %e, "Notification not shown");
        }
    }

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        crate::init_tracing();

        let config = AppConfig::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default configuration");
            AppConfig::default()
        });
        tracing::info!(endpoint = %config.endpoint, "Using processing endpoint");

        let client = Arc::new(HttpTransferClient::from_config(&config));
        let controller = match SessionController::new(ModelCatalog::builtin(), client, &config) {
            Ok(controller) => Arc::new(controller),
            Err(e) => {
                tracing::error!(error = %e, "Cannot start session controller");
                return;
            }
        };

        let app_state = AppState {
            controller: controller.clone(),
        };

        tauri::Builder::default()
            .plugin(tauri_plugin_dialog::init())
            .plugin(tauri_plugin_notification::init())
            .invoke_handler(tauri::generate_handler![
                list_models,
                get_session,
                select_model,
                select_artifact,
                start_processing,
                cancel_processing,
            ])
            .setup(move |app| {
                app.manage(app_state);
                forward_snapshots(app.handle().clone(), &controller);

                if let Some(window) = app.get_webview_window("main") {
                    let state: State<AppState> = app.state();
                    let controller = state.controller.clone();
                    window.on_window_event(move |event| {
                        if let tauri::WindowEvent::CloseRequested { .. } = event {
                            if controller.cancel() {
                                tracing::info!("Window closing, cancelled submission in flight");
                            }
                        }
                    });
                }

                Ok(())
            })
            .run(tauri::generate_context!())
            .expect("error while running tauri application");
    }
}

#[cfg(feature = "tauri-app")]
pub use tauri_app::run;
