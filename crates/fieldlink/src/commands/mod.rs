//! Command handlers and the station wiring they share.

pub mod config_cmd;
pub mod replay;
pub mod serve;

use std::sync::Arc;

use tracing::{debug, info};

use fieldlink_config::Config;
use fieldlink_core::{
    BroadcastPublisher, Collaborators, ImageStore, MemoryImageStore, Station,
};

use crate::adapters::{Envelope, FsImageStore, Outcome, dispatch};
use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Load and validate config from `--config` or the platform path.
pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(fieldlink_config::load_config_from(global.config.as_deref())?)
}

/// Build a station from `cfg`. Every published event goes through the
/// returned publisher.
pub fn build_station(cfg: &Config) -> Result<(Station, BroadcastPublisher), CliError> {
    let station_config = cfg.to_station_config()?;
    let publisher = BroadcastPublisher::new(cfg.broadcast.channel_capacity);

    let images: Arc<dyn ImageStore> = match &cfg.storage.image_dir {
        Some(dir) => {
            let store = FsImageStore::new(dir, &cfg.storage.url_prefix);
            info!(dir = %store.root().display(), "archiving images to disk");
            Arc::new(store)
        }
        None => Arc::new(MemoryImageStore::new(cfg.storage.url_prefix.clone())),
    };

    let collaborators = Collaborators::in_memory()
        .with_images(images)
        .with_broadcast(publisher.clone());

    Ok((Station::new(station_config, collaborators), publisher))
}

/// Parse and dispatch one envelope line. `line_no` is 1-based.
pub async fn process_line(
    station: &Station,
    line_no: usize,
    line: &str,
) -> Result<Outcome, CliError> {
    let envelope = Envelope::parse(line).map_err(|e| CliError::Envelope {
        line: line_no,
        reason: e.to_string(),
    })?;
    let route = envelope.route();

    let byte_count = u64::try_from(line.len()).unwrap_or(u64::MAX);
    let outcome = dispatch(station, envelope, byte_count)
        .await
        .map_err(|e| CliError::at_line(line_no, e))?;

    debug!(line = line_no, ?route, "envelope processed");
    Ok(outcome)
}
