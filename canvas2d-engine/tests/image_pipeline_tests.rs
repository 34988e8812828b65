//! Image decoding, caching and asynchronous load tracking.

mod common;

use canvas2d_engine::backend::Shader;
use canvas2d_engine::image::{FileImageProvider, ImagePipeline};
use canvas2d_engine::{
    Canvas2dEngine, CompositeOperation, ContentFrame, DecodedImage, FixedContentHost,
    ImageDrawMode, ImageSource, RectParams,
};
use common::{raster_image, recording_engine, svg_image, Call, DeferredProvider, SQUARE_SVG};
use std::cell::RefCell;
use std::rc::Rc;

fn log_loads(engine: &Canvas2dEngine<common::RecordingBackend>) -> Rc<RefCell<Vec<String>>> {
    let loads = Rc::new(RefCell::new(Vec::new()));
    let success = Rc::clone(&loads);
    engine
        .images()
        .set_on_load_success(move |source| success.borrow_mut().push(format!("ok {source}")));
    let failure = Rc::clone(&loads);
    engine
        .images()
        .set_on_load_failure(move |source, _| failure.borrow_mut().push(format!("err {source}")));
    loads
}

fn svg_calls(engine: &Canvas2dEngine<common::RecordingBackend>) -> usize {
    engine
        .backend()
        .calls
        .iter()
        .filter(|c| matches!(c, Call::DrawSvg { .. }))
        .count()
}

#[test]
fn test_svg_request_is_deduplicated_then_drawn() {
    let provider = Rc::new(DeferredProvider::default().with_image("square.svg", svg_image()));
    let mut engine = recording_engine(100, 100, Rc::clone(&provider));
    let loads = log_loads(&engine);
    let source = ImageSource::from("square.svg");
    let mode = ImageDrawMode::Scaled(RectParams::new(5.0, 5.0, 40.0, 20.0));

    engine.draw_svg_image(&source, &mode);
    engine.draw_svg_image(&source, &mode);
    assert_eq!(provider.requests.get(), 1);
    assert_eq!(svg_calls(&engine), 0);
    assert!(engine.images().is_outstanding(&source));
    assert_eq!(engine.images().loading_source(), Some(source.clone()));

    provider.release("square.svg");
    assert_eq!(*loads.borrow(), vec!["ok square.svg"]);
    assert!(engine.images().is_cached(&source));
    assert!(!engine.images().is_outstanding(&source));
    assert_eq!(engine.images().loading_source(), None);

    engine.draw_svg_image(&source, &mode);
    assert_eq!(provider.requests.get(), 1);
    let Some(Call::DrawSvg { clip, matrix }) = engine.backend().calls.last() else {
        panic!("expected an svg draw");
    };
    assert_eq!(*clip, kurbo::Rect::new(5.0, 5.0, 45.0, 25.0));
    assert_eq!((matrix.scale_x, matrix.scale_y), (2.0, 2.0));
    assert_eq!((matrix.translate_x, matrix.translate_y), (5.0, 5.0));
    assert_eq!(engine.images().current_source(), Some(source));
}

#[test]
fn test_stale_completion_is_discarded() {
    let provider = Rc::new(
        DeferredProvider::default()
            .with_image("a.svg", svg_image())
            .with_image("b.svg", svg_image()),
    );
    let mut engine = recording_engine(100, 100, Rc::clone(&provider));
    let loads = log_loads(&engine);
    let mode = ImageDrawMode::At { dx: 0.0, dy: 0.0 };

    engine.draw_svg_image(&ImageSource::from("a.svg"), &mode);
    engine.draw_svg_image(&ImageSource::from("b.svg"), &mode);
    assert_eq!(provider.requests.get(), 2);

    provider.release("a.svg");
    assert!(loads.borrow().is_empty());
    assert!(!engine.images().is_cached(&ImageSource::from("a.svg")));
    assert_eq!(engine.images().loading_source(), Some(ImageSource::from("b.svg")));

    provider.release("b.svg");
    assert_eq!(*loads.borrow(), vec!["ok b.svg"]);
    assert_eq!(engine.images().current_source(), Some(ImageSource::from("b.svg")));
}

#[test]
fn test_failed_load_fires_failure_callback() {
    let provider: Rc<DeferredProvider> = Rc::default();
    let mut engine = recording_engine(100, 100, Rc::clone(&provider));
    let loads = log_loads(&engine);
    let source = ImageSource::from("missing.svg");

    engine.draw_svg_image(&source, &ImageDrawMode::At { dx: 0.0, dy: 0.0 });
    provider.release("missing.svg");
    assert_eq!(*loads.borrow(), vec!["err missing.svg"]);
    assert!(!engine.images().is_cached(&source));
    assert_eq!(svg_calls(&engine), 0);
}

#[test]
fn test_completion_after_engine_dropped_is_ignored() {
    let provider = Rc::new(DeferredProvider::default().with_image("square.svg", svg_image()));
    let mut engine = recording_engine(100, 100, Rc::clone(&provider));
    let loads = log_loads(&engine);
    engine.draw_svg_image(
        &ImageSource::from("square.svg"),
        &ImageDrawMode::At { dx: 0.0, dy: 0.0 },
    );
    drop(engine);
    provider.release("square.svg");
    assert!(loads.borrow().is_empty());
}

#[test]
fn test_draw_image_decodes_once_and_honors_offset() {
    let provider =
        Rc::new(DeferredProvider::default().with_image("dot.png", raster_image(4, 2, [0, 0, 255, 255])));
    let mut engine = recording_engine(100, 100, Rc::clone(&provider));
    engine.set_host(Box::new(FixedContentHost(ContentFrame {
        offset_x: 10.0,
        offset_y: 20.0,
        width: 50.0,
        height: 50.0,
    })));
    engine.set_global_alpha(0.25);
    engine.set_global_composite_operation("multiply");
    let source = ImageSource::from("dot.png");

    engine.draw_image(&source, &ImageDrawMode::At { dx: 1.0, dy: 2.0 });
    engine.draw_image(&source, &ImageDrawMode::At { dx: 1.0, dy: 2.0 });
    assert_eq!(provider.decodes.get(), 1);
    assert_eq!(engine.images().cache_stats().hits, 1);

    let Some(Call::DrawImage { src, dst, paint }) = engine.backend().calls.last() else {
        panic!("expected an image draw");
    };
    assert_eq!(*src, kurbo::Rect::new(0.0, 0.0, 4.0, 2.0));
    assert_eq!(*dst, kurbo::Rect::new(11.0, 22.0, 15.0, 24.0));
    assert_eq!(paint.alpha, 0.25);
    assert_eq!(paint.composite, CompositeOperation::Multiply);
}

#[test]
fn test_close_image_bitmap_evicts() {
    let provider =
        Rc::new(DeferredProvider::default().with_image("dot.png", raster_image(1, 1, [255; 4])));
    let mut engine = recording_engine(10, 10, Rc::clone(&provider));
    let source = ImageSource::from("dot.png");
    let mode = ImageDrawMode::At { dx: 0.0, dy: 0.0 };

    engine.draw_image(&source, &mode);
    assert!(engine.close_image_bitmap(&source));
    assert!(!engine.close_image_bitmap(&source));
    engine.draw_image(&source, &mode);
    assert_eq!(provider.decodes.get(), 2);
}

#[test]
fn test_undecodable_image_skips_draw() {
    let mut engine = recording_engine(10, 10, Rc::default());
    let loads = log_loads(&engine);
    engine.draw_image(
        &ImageSource::from("nope.png"),
        &ImageDrawMode::At { dx: 0.0, dy: 0.0 },
    );
    assert!(engine.backend().draw_calls().is_empty());
    assert_eq!(*loads.borrow(), vec!["err nope.png"]);
}

#[test]
fn test_pattern_resolves_through_cache() {
    let provider =
        Rc::new(DeferredProvider::default().with_image("tile.png", raster_image(2, 2, [0, 255, 0, 255])));
    let mut engine = recording_engine(20, 20, Rc::clone(&provider));
    let pattern = engine.create_pattern("tile.png", "repeat-x").unwrap();
    engine.set_fill_style_pattern(pattern);
    engine.fill_rect(&RectParams::new(0.0, 0.0, 10.0, 10.0));
    engine.fill_rect(&RectParams::new(0.0, 0.0, 10.0, 10.0));
    assert_eq!(provider.decodes.get(), 1);

    let drawn = engine.backend().paths_drawn();
    assert_eq!(drawn.len(), 2);
    let Some(Shader::Pattern { image, .. }) = &drawn[0].1.shader else {
        panic!("expected a pattern shader");
    };
    assert_eq!((image.width(), image.height()), (2, 2));

    let missing = engine.create_pattern("gone.png", "repeat").unwrap();
    engine.set_fill_style_pattern(missing);
    engine.backend_mut().clear();
    engine.fill_rect(&RectParams::new(0.0, 0.0, 10.0, 10.0));
    assert!(engine.backend().paths_drawn().is_empty());
}

#[test]
fn test_file_provider_reads_png_and_svg() {
    let dir = tempfile::tempdir().unwrap();
    let mut source = Canvas2dEngine::new(3, 2).unwrap();
    source.fill_rect(&RectParams::new(0.0, 0.0, 3.0, 2.0));
    std::fs::write(dir.path().join("black.png"), source.to_png(None).unwrap()).unwrap();
    std::fs::write(dir.path().join("square.svg"), SQUARE_SVG).unwrap();

    let pipeline = ImagePipeline::new(Rc::new(FileImageProvider::with_base_dir(dir.path())), 4);
    let Some(DecodedImage::Raster(png)) = pipeline.get_image(&ImageSource::from("black.png"))
    else {
        panic!("expected a raster image");
    };
    assert_eq!((png.width(), png.height()), (3, 2));
    assert_eq!(&png.to_rgba()[..4], &[0, 0, 0, 255]);

    let Some(DecodedImage::Svg(svg)) = pipeline.get_image(&ImageSource::from("square.svg")) else {
        panic!("expected an svg image");
    };
    assert_eq!((svg.width(), svg.height()), (20.0, 10.0));

    assert!(pipeline.get_image(&ImageSource::from("absent.png")).is_none());
    assert_eq!(pipeline.cache_stats().count, 2);
}

#[test]
fn test_file_provider_reads_data_urls() {
    let png = Canvas2dEngine::new(1, 1).unwrap().to_data_url("image/png", None).unwrap();
    let pipeline = ImagePipeline::new(Rc::new(FileImageProvider::new()), 4);
    let image = pipeline.get_image(&ImageSource::from(png.as_str())).unwrap();
    assert_eq!((image.width(), image.height()), (1.0, 1.0));
}
