extern crate nalgebra as na;
extern crate shardlight_model as model;

use std::{
    env::args,
    path::{Path, PathBuf},
    time::Duration,
};

use model::procedural::make_grid;
use shardlight::{GlassError, GlassPreferences, HostSurface, Sandbox};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

const FRAME_SIZE: u32 = 512;
const FRAME_TIMES: [f32; 4] = [0., 0.05, 0.1, 0.2];

fn run(prefs: GlassPreferences, out: &Path) -> Result<(), GlassError> {
    std::fs::create_dir_all(out)?;
    let mut sandbox = Sandbox::new(prefs)?;

    let (diffuse, outline) = sandbox.atlas_images()?;
    diffuse.save(out.join("diffuse.png"))?;
    outline.save(out.join("outline.png"))?;
    info!("Wrote the atlases to {:?}.", out);

    sandbox.load_host("host-panel", |progress| {
        let mut mesh = make_grid(32, 32, 2., 2.);
        mesh.name = "host-panel".to_owned();
        progress.set(0.5);
        Ok(HostSurface {
            mesh,
            transform: na::Matrix4::identity(),
            uv_per_unit: 0.5,
        })
    })?;
    let placement = loop {
        match sandbox.place_on_host() {
            Ok(placement) => break placement,
            Err(GlassError::InvalidState(reason)) => {
                debug!("{} ({:.0}%)", reason, sandbox.host_progress() * 100.);
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(e) => return Err(e),
        }
    };
    info!("Placed variant {} at vertex {}.", placement.variant, placement.vertex);

    for (i, t) in FRAME_TIMES.iter().enumerate() {
        let frame = sandbox.render_frame(*t, FRAME_SIZE)?;
        frame.save(out.join(format!("scatter-{}.png", i)))?;
    }
    info!("Wrote {} scatter frames.", FRAME_TIMES.len());
    Ok(())
}

// Demo!
fn main() {
    let prefs = match GlassPreferences::from_env() {
        Ok(prefs) => prefs,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };
    if let Err(e) = simple_logger::init_with_level(prefs.log_level) {
        eprintln!("Couldn't set up logging: {}", e);
    }
    let out = args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("shardlight-out"));
    if let Err(e) = run(prefs, &out) {
        error!("{}", e);
        std::process::exit(1);
    }
}
