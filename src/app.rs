use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::{create_router, AppState};
use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::feeds::{AlertFeedClient, ForecastClient, ObservationClient};
use crate::models::StationId;
use crate::scheduler::RefreshTask;

/// Application with the refresh task and HTTP server running
///
/// Holds the handles needed to shut both down in order.
pub struct Application {
    pub server_handle: JoinHandle<Result<(), std::io::Error>>,
    pub refresh_task: RefreshTask,
}

impl Application {
    /// Build and start the application
    ///
    /// This creates the feed clients and the coordinator, then spawns:
    /// - Refresh task (configurable interval, default 10 min)
    /// - HTTP API server (Axum)
    pub async fn build(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Initializing application components");

        let forecast_client = ForecastClient::new(config.forecast_url.clone());
        let observation_client = ObservationClient::new(config.observation_url.clone());
        let alert_client = AlertFeedClient::new(config.alerts_url.clone());

        let coordinator = Coordinator::new(
            StationId::new(config.station_id.clone()),
            config.coordinator_settings(),
            forecast_client,
            observation_client,
            alert_client,
        );
        let reader = coordinator.subscribe();

        info!(
            "Starting refresh task for station {} every {} minutes",
            config.station_id, config.refresh_interval_minutes
        );
        let refresh_task = RefreshTask::start(coordinator);

        let app_state = AppState {
            station_name: config.station_name.clone(),
            reader,
        };
        let app = create_router(app_state).layer(TraceLayer::new_for_http());

        let addr = config.server_addr();
        info!("Starting HTTP server on {}", addr);

        let server_handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            axum::serve(listener, app).await
        });

        info!("Application initialized successfully");

        Ok(Self {
            server_handle,
            refresh_task,
        })
    }

    /// Run until the server stops or Ctrl-C arrives, then stop refreshing
    pub async fn run_until_stopped(self) -> Result<(), Box<dyn std::error::Error>> {
        let Application {
            server_handle,
            refresh_task,
        } = self;

        let result: Result<(), Box<dyn std::error::Error>> = tokio::select! {
            joined = server_handle => match joined {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(Box::new(e)),
                Err(e) => Err(Box::new(e)),
            },
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => info!("Shutdown signal received"),
                    Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
                }
                Ok(())
            }
        };

        refresh_task.stop().await;
        result
    }
}
