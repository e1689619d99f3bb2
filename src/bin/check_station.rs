use clap::Parser;

use weather_aggregator::config::{normalize_language, DEFAULT_ALERT_LANGUAGE, DEFAULT_ALERT_REGION};
use weather_aggregator::coordinator::{Coordinator, CoordinatorSettings};
use weather_aggregator::feeds::alerts::DEFAULT_ALERTS_URL;
use weather_aggregator::feeds::forecast::DEFAULT_FORECAST_URL;
use weather_aggregator::feeds::observation::DEFAULT_OBSERVATION_URL;
use weather_aggregator::feeds::{AlertFeedClient, ForecastClient, ObservationClient};
use weather_aggregator::models::{Field, StationId, WeatherSnapshot};

#[derive(Parser)]
#[command(name = "check-station")]
#[command(about = "Run one refresh cycle for a station and print the merged result", long_about = None)]
struct Cli {
    /// Station ID to check
    station_id: String,

    /// Alert language (is or en)
    #[arg(long, default_value = DEFAULT_ALERT_LANGUAGE)]
    language: String,

    /// Alert feed region key
    #[arg(long, env = "ALERT_REGION", default_value = DEFAULT_ALERT_REGION)]
    region: String,

    /// Print the whole snapshot as JSON
    #[arg(long)]
    json: bool,

    #[arg(long, env = "FORECAST_URL", default_value = DEFAULT_FORECAST_URL)]
    forecast_url: String,

    #[arg(long, env = "OBSERVATION_URL", default_value = DEFAULT_OBSERVATION_URL)]
    observation_url: String,

    #[arg(long, env = "ALERTS_URL", default_value = DEFAULT_ALERTS_URL)]
    alerts_url: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = CoordinatorSettings {
        alert_language: normalize_language(&cli.language),
        alert_region: cli.region.clone(),
        ..CoordinatorSettings::default()
    };

    let mut coordinator = Coordinator::new(
        StationId::new(cli.station_id.clone()),
        settings,
        ForecastClient::new(cli.forecast_url.clone()),
        ObservationClient::new(cli.observation_url.clone()),
        AlertFeedClient::new(cli.alerts_url.clone()),
    );

    println!("Checking station {}...\n", cli.station_id);

    let outcome = coordinator.refresh().await;
    let statuses = coordinator.feed_statuses();
    for (name, status) in [
        ("forecast", &statuses.forecast),
        ("observation", &statuses.observation),
        ("alerts", &statuses.alerts),
    ] {
        match &status.last_error {
            Some(e) => println!("  {:<12} FAILED: {}", name, e),
            None => println!("  {:<12} ok", name),
        }
    }
    let outcome = outcome?;
    println!("\nCycle outcome: {:?}\n", outcome);

    let Some(snapshot) = coordinator.snapshot() else {
        println!("No snapshot published");
        return Ok(());
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
    } else {
        print_summary(&snapshot);
    }

    Ok(())
}

fn print_summary(snapshot: &WeatherSnapshot) {
    let current = snapshot.current();
    println!("Current conditions (degraded: {}):", snapshot.is_degraded());
    print_field("temperature", &current.temperature, "°C");
    print_field("feels like", &current.feels_like, "°C");
    print_field("wind speed", &current.wind_speed, "m/s");
    print_field("wind direction", &current.wind_direction, "°");
    print_field("humidity", &current.humidity, "%");
    print_field("pressure", &current.pressure, "hPa");
    match current.condition.value() {
        Some(condition) => println!("  {:<16} {:?} ({:?})", "condition", condition, current.condition.source()),
        None => println!("  {:<16} n/a", "condition"),
    }

    println!("\nDaily forecast:");
    for day in snapshot.daily() {
        println!(
            "  {}  {:>5.1} / {:>5.1} °C  {:>4.1} m/s  {:?}",
            day.date, day.temperature_high, day.temperature_low, day.wind_speed_mean, day.condition
        );
    }

    println!("\nHourly forecast: {} entries", snapshot.hourly().len());

    let alerts = snapshot.active_alerts();
    println!("\nActive alerts: {}", alerts.len());
    for alert in alerts {
        println!(
            "  [{}] {} ({} - {})",
            alert.severity, alert.headline, alert.effective_from, alert.effective_until
        );
    }
}

fn print_field(name: &str, field: &Field<f64>, unit: &str) {
    match field.get() {
        Some(value) => println!("  {:<16} {:.1} {} ({:?})", name, value, unit, field.source()),
        None => println!("  {:<16} n/a", name),
    }
}
