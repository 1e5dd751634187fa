//! Registers every cloud of a PLY directory against its predecessor.

mod params;

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use clap::Parser;
use sph_registration::datasource::{Datasource, PlyDirectorySource};
use sph_registration::io::PlyWriter;
use sph_registration::{PointCloud, SphRegistration};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use params::Params;

/// Registration state shared with the datasource callback.
struct Pipeline {
    registration: SphRegistration,
    writer: Option<PlyWriter>,
    prev: Option<PointCloud>,
    registered: usize,
}

impl Pipeline {
    fn on_cloud(&mut self, mut cloud: PointCloud) -> Result<()> {
        cloud.build_index();
        let Some(prev) = self.prev.take() else {
            info!("Received first cloud with {} points", cloud.len());
            self.prev = Some(cloud);
            return Ok(());
        };

        let result = self.registration.register_point_cloud(&prev, &cloud)?;
        self.registered += 1;

        let zyz = result.rotation_zyz();
        let t = result.translation();
        info!(
            "Registered pair {}: zyz = [{:.4}, {:.4}, {:.4}], t = [{:.3}, {:.3}, {:.3}]",
            self.registered, zyz[0], zyz[1], zyz[2], t.x, t.y, t.z
        );
        match (result.rotation_uncertainty(), result.translation_uncertainty()) {
            (Some(rotation), Some(translation)) => info!(
                "Uncertainty traces: rotation {:.4e}, translation {:.4e}",
                rotation.trace(),
                translation.trace()
            ),
            _ => warn!(
                "Low confidence: rotation found {}, translation found {}",
                result.found_solution_for_rotation(),
                result.found_solution_for_translation()
            ),
        }

        if let Some(writer) = &self.writer {
            let path = writer.write_next(result.registered_cloud())?;
            info!("Wrote {}", path.display());
        }

        self.prev = Some(cloud);
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("sph_registration=info".parse()?)
                .add_directive("sph_registration_app=info".parse()?),
        )
        .init();

    let params = Params::parse();
    let registration = params.build_registration()?;
    info!(
        "Registration config: {}",
        serde_json::to_string(registration.config())?
    );

    let pipeline = Arc::new(Mutex::new(Pipeline {
        registration,
        writer: params
            .output
            .as_ref()
            .map(|dir| PlyWriter::new(dir, params.output_prefix.clone())),
        prev: None,
        registered: 0,
    }));

    let mut source = PlyDirectorySource::new(&params.input);
    let shared = Arc::clone(&pipeline);
    source.subscribe(Box::new(move |cloud: PointCloud| -> Result<()> {
        shared
            .lock()
            .map_err(|_| anyhow!("registration state poisoned"))?
            .on_cloud(cloud)
    }));

    let delivered = source.start_streaming(params.offset)?;

    let pipeline = pipeline
        .lock()
        .map_err(|_| anyhow!("registration state poisoned"))?;
    info!(
        "Processed {} clouds, registered {} pairs",
        delivered, pipeline.registered
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&pipeline.registration.statistics().report())?
    );

    Ok(())
}
