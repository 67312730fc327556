use courtside_markup::markup::model::{
    AnnotationKind, Color, MediaAsset, PixelSize, Point, Rect, Shape,
};
use courtside_markup::markup::persist::WireAnnotation;
use courtside_markup::markup::raster::RasterSurface;
use courtside_markup::markup::render::{DrawCommand, RecordingSurface, Renderer, Surface};
use courtside_markup::markup::tools::Tool;
use courtside_markup::markup::{MarkupCanvas, MarkupSettings};
use std::time::Instant;

fn open_canvas<S: Surface>(surface: S) -> (MarkupCanvas<S>, Instant) {
    let mut canvas = MarkupCanvas::new(&MarkupSettings::default(), surface);
    let t0 = Instant::now();
    let asset = MediaAsset::image("practice-1", "https://cdn/practice-1.png")
        .with_display_size(200.0, 120.0);
    canvas.open(asset, t0).expect("open session");
    canvas.asset_loaded(200, 120, t0);
    (canvas, t0)
}

fn select(canvas: &mut MarkupCanvas<impl Surface>, tool: Tool) {
    let tools = canvas.tools_mut().expect("tools");
    tools.set_tool(tool);
    tools.set_color(Color::RED);
    tools.set_stroke_width(3);
}

#[test]
fn rectangle_scenario_commits_and_strokes_normalized_box() {
    let (mut canvas, t0) = open_canvas(RecordingSurface::default());
    select(&mut canvas, Tool::Rectangle);

    canvas.pointer_down(10.0, 10.0, t0);
    canvas.pointer_move(70.0, 40.0, t0);
    canvas.pointer_up(110.0, 60.0, t0);

    let session = canvas.session().expect("session");
    let wire = WireAnnotation::from(&session.store().annotations()[0]);
    assert_eq!(wire.kind, AnnotationKind::Rectangle);
    assert_eq!(wire.points, vec![Point::new(10.0, 10.0), Point::new(110.0, 60.0)]);
    assert_eq!(wire.color.to_hex(), "#ff0000");
    assert_eq!(wire.stroke_width, 3);
    assert_eq!(wire.text, None);

    assert_eq!(
        canvas.surface().commands().last(),
        Some(&DrawCommand::Rect {
            rect: Rect {
                x: 10.0,
                y: 10.0,
                width: 100.0,
                height: 50.0
            },
            color: Color::RED,
            stroke_width: 3,
        })
    );
}

#[test]
fn rectangle_is_normalized_for_reverse_drags() {
    let (mut canvas, t0) = open_canvas(RecordingSurface::default());
    select(&mut canvas, Tool::Rectangle);

    canvas.pointer_down(110.0, 60.0, t0);
    canvas.pointer_up(10.0, 10.0, t0);

    let Some(DrawCommand::Rect { rect, .. }) = canvas.surface().commands().last().cloned() else {
        panic!("expected a rectangle");
    };
    assert_eq!((rect.x, rect.y), (10.0, 10.0));
    assert!(rect.width >= 0.0 && rect.height >= 0.0);
}

#[test]
fn freehand_scenario_keeps_points_in_order() {
    let (mut canvas, t0) = open_canvas(RecordingSurface::default());
    select(&mut canvas, Tool::Freehand);

    canvas.pointer_down(0.0, 0.0, t0);
    canvas.pointer_move(5.0, 5.0, t0);
    canvas.pointer_up(10.0, 3.0, t0);

    let session = canvas.session().expect("session");
    let annotation = &session.store().annotations()[0];
    assert_eq!(annotation.kind(), AnnotationKind::Freehand);
    assert_eq!(
        annotation.markup.shape.points(),
        vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 5.0),
            Point::new(10.0, 3.0)
        ]
    );
}

#[test]
fn circle_radius_is_center_to_edge_distance() {
    let (mut canvas, t0) = open_canvas(RecordingSurface::default());
    select(&mut canvas, Tool::Circle);

    canvas.pointer_down(40.0, 40.0, t0);
    canvas.pointer_up(43.0, 44.0, t0);

    let session = canvas.session().expect("session");
    let Shape::Circle { center, edge } = session.store().annotations()[0].markup.shape else {
        panic!("expected a circle");
    };
    assert!(matches!(
        canvas.surface().commands().last(),
        Some(DrawCommand::Circle { radius, .. }) if *radius == center.distance_to(edge)
    ));
    assert_eq!(center.distance_to(edge), 5.0);
}

#[test]
fn raster_redraw_is_pixel_identical_across_calls() {
    let size = PixelSize {
        width: 200,
        height: 120,
    };
    let surface = RasterSurface::new(size, Color::BLACK).expect("surface");
    let (mut canvas, t0) = open_canvas(surface);
    for (tool, from, to) in [
        (Tool::Arrow, (20.0, 100.0), (150.0, 30.0)),
        (Tool::Circle, (100.0, 60.0), (120.0, 60.0)),
        (Tool::Line, (5.0, 5.0), (190.0, 110.0)),
    ] {
        select(&mut canvas, tool);
        canvas.pointer_down(from.0, from.1, t0);
        canvas.pointer_up(to.0, to.1, t0);
    }

    canvas.redraw();
    let first = canvas.surface().pixels().to_vec();
    canvas.redraw();
    assert_eq!(canvas.surface().pixels(), first.as_slice());
    assert_eq!(canvas.surface().pixel(150, 30), Some(Color::RED));
}

#[test]
fn text_scenario_commits_only_non_empty_text() {
    let (mut canvas, t0) = open_canvas(RecordingSurface::default());
    select(&mut canvas, Tool::Text);

    canvas.pointer_down(60.0, 20.0, t0);
    canvas.commit_text("", t0);
    canvas.pointer_down(60.0, 20.0, t0);
    canvas.cancel_text();
    canvas.pointer_down(60.0, 20.0, t0);
    canvas.commit_text("Eyes up", t0);

    let session = canvas.session().expect("session");
    assert_eq!(session.store().len(), 1);
    assert!(matches!(
        canvas.surface().commands().last(),
        Some(DrawCommand::Text { text, font_px, .. }) if text == "Eyes up" && *font_px == 18.0
    ));
}

#[test]
fn renderer_is_a_function_of_annotations_only() {
    let (mut canvas, t0) = open_canvas(RecordingSurface::default());
    select(&mut canvas, Tool::Arrow);
    canvas.pointer_down(0.0, 0.0, t0);
    canvas.pointer_up(30.0, 40.0, t0);

    let annotations = canvas.session().expect("session").store().annotations().to_vec();
    let renderer = Renderer::default();
    let mut a = RecordingSurface::default();
    let mut b = RecordingSurface::default();
    renderer.redraw(&mut a, &annotations);
    renderer.redraw(&mut b, &annotations);
    assert_eq!(a, b);
    assert_eq!(a.commands().len(), 2 + 3);
}
