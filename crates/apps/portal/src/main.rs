use std::env;
use std::fs;

use lifecycle::{install_base_region, LifecycleController};
use registry::{Geometry, ImageRef, OverlayBounds, OverlayId, OverlayStats, RegionId, RegionKind};
use serde::Deserialize;
use surface::RecordingSurface;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = real_main() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<(), String> {
    let mut args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err(usage());
    }

    let cmd = args[1].clone();
    args.drain(0..2);

    match cmd.as_str() {
        "replay" => cmd_replay(args),
        "sample" => cmd_sample(),
        _ => Err(usage()),
    }
}

fn usage() -> String {
    [
        "portal — replay region/overlay event scripts against the registry core",
        "",
        "usage:",
        "  portal replay <script.json> [--json]   run a script, print the surface command log",
        "  portal sample                          print a sample script",
        "",
        "a script is a JSON array of ops:",
        "  {\"op\":\"install_base\",\"geometry\":...}",
        "  {\"op\":\"upsert_region\",\"id\":...,\"geometry\":...,\"kind\":\"drawn\"|\"uploaded\"|\"base\"}",
        "  {\"op\":\"overlay_ready\",\"id\":...,\"region\":...,\"image\":...,\"bounds\":{...}}",
        "  {\"op\":\"set_active\",\"region\":...,\"overlay\":...}",
        "  {\"op\":\"hide\",\"overlay\":...}",
        "  {\"op\":\"remove_overlay\",\"id\":...}",
        "  {\"op\":\"remove_region\",\"id\":...}",
        "  {\"op\":\"retry_pending\"} {\"op\":\"clear_all\"} {\"op\":\"verify\"}",
    ]
    .join("\n")
}

/// One scripted operation against the lifecycle controller.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ScriptOp {
    InstallBase {
        geometry: String,
    },
    UpsertRegion {
        id: String,
        geometry: String,
        kind: RegionKind,
    },
    OverlayReady {
        id: String,
        region: String,
        image: String,
        bounds: OverlayBounds,
        #[serde(default)]
        stats: Option<OverlayStats>,
    },
    SetActive {
        region: String,
        overlay: String,
    },
    Hide {
        overlay: String,
    },
    RemoveOverlay {
        id: String,
    },
    RemoveRegion {
        id: String,
    },
    RetryPending,
    ClearAll,
    Verify,
}

fn cmd_replay(args: Vec<String>) -> Result<(), String> {
    if args.is_empty() {
        return Err(usage());
    }

    let mut script_path: Option<String> = None;
    let mut as_json = false;
    for arg in args {
        match arg.as_str() {
            "--json" => as_json = true,
            s if s.starts_with('-') => return Err(format!("unknown arg: {s}\n\n{}", usage())),
            s => {
                if script_path.is_some() {
                    return Err("replay takes exactly one script path".to_string());
                }
                script_path = Some(s.to_string());
            }
        }
    }
    let script_path = script_path.ok_or_else(usage)?;

    let raw = fs::read_to_string(&script_path).map_err(|e| format!("read {script_path}: {e}"))?;
    let ops: Vec<ScriptOp> =
        serde_json::from_str(&raw).map_err(|e| format!("parse {script_path}: {e}"))?;

    let mut controller = LifecycleController::new(RecordingSurface::new());
    let mut rejections = 0usize;

    for (index, op) in ops.into_iter().enumerate() {
        if let Err(e) = run_op(&mut controller, op) {
            // Typed rejections are part of what a script may exercise; keep
            // replaying and report them inline.
            println!("op[{index}] rejected: {e}");
            rejections += 1;
        }
    }
    info!("replay finished with {rejections} rejections");

    if as_json {
        let payload = serde_json::to_string_pretty(controller.surface().commands())
            .map_err(|e| format!("json: {e}"))?;
        println!("{payload}");
    } else {
        println!("surface command log:");
        for line in controller.surface().log_lines() {
            println!("  {line}");
        }
        if !controller.diagnostics().is_empty() {
            println!("diagnostics:");
            for d in controller.diagnostics().entries() {
                println!("  [tick {}] {}: {}", d.tick, d.kind.as_str(), d.message);
            }
        }
        if !controller.pending().is_empty() {
            println!("still pending:");
            for entry in controller.pending().entries() {
                println!("  overlay {} waiting for region {}", entry.overlay, entry.region);
            }
        }
    }

    let divergences = controller.verify();
    if !divergences.is_empty() {
        for d in &divergences {
            eprintln!("divergence: {d}");
        }
        return Err(format!(
            "consistency check failed with {} divergences",
            divergences.len()
        ));
    }
    Ok(())
}

fn run_op(
    controller: &mut LifecycleController<RecordingSurface>,
    op: ScriptOp,
) -> Result<(), registry::RegistryError> {
    match op {
        ScriptOp::InstallBase { geometry } => {
            install_base_region(controller, Geometry::new(geometry)).map(|_| ())
        }
        ScriptOp::UpsertRegion { id, geometry, kind } => controller
            .upsert_region(RegionId::new(id), Geometry::new(geometry), kind)
            .map(|_| ()),
        ScriptOp::OverlayReady {
            id,
            region,
            image,
            bounds,
            stats,
        } => {
            controller.attach_overlay(
                OverlayId::new(id),
                RegionId::new(region),
                ImageRef::new(image),
                bounds,
                stats,
            );
            Ok(())
        }
        ScriptOp::SetActive { region, overlay } => controller
            .set_active_overlay(RegionId::new(region), OverlayId::new(overlay))
            .map(|_| ()),
        ScriptOp::Hide { overlay } => {
            controller.hide_overlay(&OverlayId::new(overlay));
            Ok(())
        }
        ScriptOp::RemoveOverlay { id } => {
            controller.remove_overlay(&OverlayId::new(id));
            Ok(())
        }
        ScriptOp::RemoveRegion { id } => controller
            .remove_region_cascade(&RegionId::new(id))
            .map(|_| ()),
        ScriptOp::RetryPending => {
            controller.retry_pending();
            Ok(())
        }
        ScriptOp::ClearAll => {
            controller.clear_all();
            Ok(())
        }
        ScriptOp::Verify => {
            for d in controller.verify_and_repair() {
                println!("repaired: {d}");
            }
            Ok(())
        }
    }
}

fn cmd_sample() -> Result<(), String> {
    let sample = r#"[
  {"op": "install_base", "geometry": "{\"type\":\"Polygon\",\"coordinates\":[]}"},
  {"op": "upsert_region", "id": "r1", "geometry": "{\"type\":\"Polygon\",\"coordinates\":[[0,0],[1,1]]}", "kind": "drawn"},
  {"op": "overlay_ready", "id": "o1", "region": "r1", "image": "https://tiles.example/o1.png",
   "bounds": {"south": 44.0, "west": -124.5, "north": 47.3, "east": -121.0}},
  {"op": "overlay_ready", "id": "o2", "region": "r1", "image": "https://tiles.example/o2.png",
   "bounds": {"south": 44.0, "west": -124.5, "north": 47.3, "east": -121.0}},
  {"op": "set_active", "region": "r1", "overlay": "o2"},
  {"op": "remove_region", "id": "r1"},
  {"op": "verify"}
]"#;
    println!("{sample}");
    Ok(())
}
