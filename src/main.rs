use chrono::Local;
use std::env;

use tripfare::api::QuoteAPI;
use tripfare::config::EngineConfig;
use tripfare::engine::Engine;
use tripfare::entities::{QuoteRequest, VehicleClass};
use tripfare::error::{invalid_input_error, Error};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().skip(1).collect();

    let (origin, destination, stops) = match args.as_slice() {
        [origin, destination, stops @ ..] => (origin, destination, stops),
        _ => {
            eprintln!("usage: tripfare <origin> <destination> [stop ...]");
            return Err(invalid_input_error());
        }
    };

    let config = EngineConfig::from_env()?;
    let engine = Engine::connect(&config).await?;

    let mut request = QuoteRequest::new(origin, destination, Local::now().naive_local());
    request.stops = stops.to_vec();
    request.promotion_code = env::var("PROMOTION_CODE").ok();

    if let Ok(class) = env::var("VEHICLE_CLASS") {
        request.vehicle_class = class.parse::<VehicleClass>()?;
    }

    let quote = engine.create_quote(request).await?;

    println!("{}", serde_json::to_string_pretty(&quote)?);

    Ok(())
}
