use std::path::Path;
use std::process::ExitCode;
use std::rc::Rc;
use std::thread;
use std::time::Instant;

use mapview::{
    CanvasStats, Color, LightView, MapView, MapViewEvent, MonotonicClock, PixelSurface, Point,
    RebuildStatsSnapshot, Rect, ShadeLightView, SoftwareCanvas, ViewServices,
};
use serde::Serialize;
use tracing::{debug, error, info};

use super::bootstrap::AppWiring;
use super::demo::DemoWorld;
use super::ViewerError;

#[derive(Debug, Serialize)]
struct FrameReport {
    frames: u32,
    floor_changes: u32,
    fades_finished: u32,
    rebuilds: RebuildStatsSnapshot,
    canvas: CanvasStats,
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let report = match render(app) {
        Ok(report) => report,
        Err(err) => {
            error!(error = %err, "viewer_failed");
            return ExitCode::FAILURE;
        }
    };
    match serde_json::to_string(&report) {
        Ok(encoded) => info!(report = %encoded, "viewer_finished"),
        Err(err) => {
            error!(error = %ViewerError::from(err), "viewer_failed");
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}

fn render(app: AppWiring) -> Result<FrameReport, ViewerError> {
    let mut world = DemoWorld::build()?;

    let mut canvas = SoftwareCanvas::new(0, 0);
    if let Some(texture) = &app.config.crosshair_texture {
        canvas.register_texture(texture.clone(), Color::WHITE);
    }

    let services = ViewServices {
        map: world.map.clone(),
        backend: canvas,
        clock: Rc::new(MonotonicClock::new()),
        light_factory: Box::new(|| -> Box<dyn LightView> { Box::new(ShadeLightView::new()) }),
    };
    let mut view = MapView::new(app.config, services)?;
    // The accepted geometry bounds the output below the texture limit.
    let output = view.geometry().visible_dimension() * view.config().sprite_size;
    let rect = Rect::from_origin(Point::default(), output);
    view.backend_mut().resize_surface(output.width as u32, output.height as u32);
    view.follow(world.walker.clone());

    // One tile right of the walker; camera moves keep the same tile hovered.
    let pointer = Point::new(
        rect.width / 2 + view.config().sprite_size,
        rect.height / 2,
    );
    view.set_pointer(Some(pointer));
    if let Some(hovered) = view.position_at(pointer, rect.size()) {
        view.on_mouse_move(hovered);
    }

    let mut floor_changes = 0;
    let mut fades_finished = 0;
    for frame in 0..app.frames {
        let started = Instant::now();
        world.advance(&mut view);
        view.backend_mut().clear_surface(Color::BLACK);
        view.draw(rect);

        for event in view.drain_events() {
            match event {
                MapViewEvent::FloorChanged { floor, previous } => {
                    floor_changes += 1;
                    info!(frame, floor, previous, "demo_floor_changed");
                }
                MapViewEvent::FadeInFinished { floor } => {
                    fades_finished += 1;
                    debug!(frame, floor, "demo_fade_finished");
                }
            }
        }

        if let Some(rest) = app.frame_interval.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }

    write_png(view.backend().surface(), &app.output_path)?;
    Ok(FrameReport {
        frames: app.frames,
        floor_changes,
        fades_finished,
        rebuilds: view.stats(),
        canvas: view.backend().stats(),
    })
}

fn write_png(surface: &PixelSurface, path: &Path) -> Result<(), ViewerError> {
    let (width, height) = (surface.width(), surface.height());
    let image = image::RgbaImage::from_raw(width, height, surface.rgba().to_vec())
        .ok_or(ViewerError::Surface { width, height })?;
    image.save(path).map_err(|source| ViewerError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), width, height, "frame_written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapview::{ConfigError, GeometryError, ViewConfig};
    use std::time::Duration;

    #[test]
    fn renders_demo_frames_to_png() {
        let dir = tempfile::tempdir().expect("temp dir");
        let output_path = dir.path().join("frame.png");
        let report = render(AppWiring {
            config: ViewConfig::default(),
            output_path: output_path.clone(),
            frames: 12,
            frame_interval: Duration::ZERO,
        })
        .expect("rendered");

        assert_eq!(report.frames, 12);
        assert_eq!(report.canvas.presented_frames, 12);
        assert!(report.rebuilds.rebuilds >= 2);
        let written = image::open(&output_path).expect("png").to_rgba8();
        assert_eq!(written.dimensions(), (15 * 32, 11 * 32));
    }

    #[test]
    fn oversized_view_is_rejected_before_rendering() {
        let dir = tempfile::tempdir().expect("temp dir");
        let output_path = dir.path().join("frame.png");
        let config = ViewConfig {
            visible_dimension: mapview::Size::new(100_000_001, 11),
            ..ViewConfig::default()
        };
        let result = render(AppWiring {
            config,
            output_path: output_path.clone(),
            frames: 1,
            frame_interval: Duration::ZERO,
        });

        assert!(matches!(
            result,
            Err(ViewerError::Config(ConfigError::Geometry(
                GeometryError::ExceedsMaxTextureSize { .. }
            )))
        ));
        assert!(!output_path.exists());
    }
}
