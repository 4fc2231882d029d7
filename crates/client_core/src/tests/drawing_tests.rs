use super::*;

fn small_canvas() -> CanvasSettings {
    CanvasSettings {
        width: 28,
        height: 28,
        brush_radius: 1.5,
        background: [0, 0, 0],
        foreground: [255, 255, 255],
    }
}

#[test]
fn new_surface_is_blank_background() {
    let surface = DrawingSurface::new(small_canvas());
    assert!(surface.is_blank());
    assert_eq!(surface.dimensions(), (28, 28));
    assert!(!surface.is_drawing());
}

#[test]
fn extend_without_begin_is_noop() {
    let mut surface = DrawingSurface::new(small_canvas());
    surface.extend_stroke(Point::new(10.0, 10.0));
    surface.extend_stroke(Point::new(20.0, 20.0));
    assert!(surface.is_blank());
}

#[test]
fn stroke_paints_foreground_until_cleared() {
    let mut surface = DrawingSurface::new(small_canvas());
    surface.begin_stroke(Point::new(4.0, 14.0));
    surface.extend_stroke(Point::new(24.0, 14.0));
    surface.end_stroke();
    assert!(!surface.is_blank());
    assert_eq!(*surface.raster.get_pixel(14, 14), Rgb([255, 255, 255]));

    surface.extend_stroke(Point::new(14.0, 2.0));
    assert_eq!(*surface.raster.get_pixel(14, 2), Rgb([0, 0, 0]));

    surface.clear();
    assert!(surface.is_blank());
}

#[test]
fn points_outside_canvas_are_clipped() {
    let mut surface = DrawingSurface::new(small_canvas());
    surface.begin_stroke(Point::new(-50.0, -50.0));
    surface.extend_stroke(Point::new(-40.0, 400.0));
    surface.end_stroke();
    assert!(surface.is_blank());

    surface.begin_stroke(Point::new(27.5, 27.5));
    surface.end_stroke();
    assert!(!surface.is_blank());
}

#[test]
fn far_pointer_is_walked_only_across_the_canvas() {
    let mut surface = DrawingSurface::new(CanvasSettings::default());
    surface.begin_stroke(Point::new(10.0, 10.0));
    surface.extend_stroke(Point::new(1e12, 10.0));
    assert_eq!(*surface.raster.get_pixel(140, 10), Rgb([255, 255, 255]));
    assert_eq!(*surface.raster.get_pixel(279, 10), Rgb([255, 255, 255]));
    assert_eq!(*surface.raster.get_pixel(140, 100), Rgb([0, 0, 0]));

    // Coming back in from far away paints only the visible part.
    surface.extend_stroke(Point::new(1e12, 200.0));
    surface.extend_stroke(Point::new(140.0, 200.0));
    assert_eq!(*surface.raster.get_pixel(200, 200), Rgb([255, 255, 255]));
    assert_eq!(*surface.raster.get_pixel(100, 200), Rgb([0, 0, 0]));
}

#[test]
fn non_finite_points_are_ignored() {
    let mut surface = DrawingSurface::new(small_canvas());
    surface.begin_stroke(Point::new(f32::NAN, 4.0));
    assert!(!surface.is_drawing());
    assert!(surface.is_blank());

    surface.begin_stroke(Point::new(4.0, 14.0));
    surface.extend_stroke(Point::new(f32::INFINITY, 14.0));
    surface.extend_stroke(Point::new(14.0, f32::NEG_INFINITY));
    surface.extend_stroke(Point::new(f32::NAN, f32::NAN));
    assert_eq!(*surface.raster.get_pixel(20, 14), Rgb([0, 0, 0]));

    // The stroke continues from the last finite point.
    surface.extend_stroke(Point::new(24.0, 14.0));
    assert_eq!(*surface.raster.get_pixel(14, 14), Rgb([255, 255, 255]));
}

#[test]
fn export_is_idempotent_and_decodes_to_png_of_configured_polarity() {
    let mut settings = small_canvas();
    settings.background = [255, 255, 255];
    settings.foreground = [0, 0, 0];
    let mut surface = DrawingSurface::new(settings);
    surface.begin_stroke(Point::new(14.0, 14.0));
    surface.end_stroke();

    let first = surface.export().expect("export");
    let second = surface.export().expect("export");
    assert_eq!(first, second);

    let bytes = first.decode().expect("base64");
    let decoded = image::load_from_memory(&bytes).expect("png").to_rgb8();
    assert_eq!(decoded.dimensions(), (28, 28));
    assert_eq!(*decoded.get_pixel(0, 0), Rgb([255, 255, 255]));
    assert_eq!(*decoded.get_pixel(14, 14), Rgb([0, 0, 0]));
}

#[test]
fn artifact_accepts_data_url() {
    let artifact = DrawingArtifact::from_data_url("data:image/png;base64,AAAA");
    assert_eq!(artifact.as_base64(), "AAAA");
    assert_eq!(artifact.to_data_url(), "data:image/png;base64,AAAA");
    assert_eq!(DrawingArtifact::from_data_url("BBBB").as_base64(), "BBBB");
}
