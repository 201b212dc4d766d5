use std::io::Cursor;

use folio::{
    Align, CompileConfig, EmptyFontCatalog, FetchFailurePolicy, PaintOp, RecordingSurface, Scene,
    SceneCompiler, StaticFetcher, compile_to_ops, fingerprint_ops,
};

const FONT_URL: &str = "https://fonts.example/arial.ttf";

fn scene_json(children: &str) -> String {
    format!(
        r##"{{
            "width": 800, "height": 600,
            "fonts": [{{"fontFamily": "Arial", "url": "{FONT_URL}"}}],
            "pages": [{{
                "background": "#ffffff",
                "children": [{children}]
            }}]
        }}"##
    )
}

fn fetcher_with_font() -> StaticFetcher {
    let mut fetcher = StaticFetcher::new();
    fetcher.insert(FONT_URL, b"stub-font-bytes".to_vec());
    fetcher
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([9, 9, 9, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

#[test]
fn single_text_scene_emits_expected_ops() {
    let json = scene_json(
        r##"{
            "type": "text",
            "x": 10, "y": 10, "width": 200, "height": 50,
            "text": "hello",
            "fontFamily": "Arial", "fontSize": 24, "fill": "#000000",
            "align": "left", "lineHeight": 1, "textDecoration": ""
        }"##,
    );
    let scene: Scene = serde_json::from_str(&json).unwrap();
    let ops = compile_to_ops(
        &scene,
        &fetcher_with_font(),
        &EmptyFontCatalog,
        CompileConfig::default(),
    )
    .unwrap();

    let pages = ops.iter().filter(|op| matches!(op, PaintOp::BeginPage)).count();
    assert_eq!(pages, 1);

    let registrations: Vec<_> = ops
        .iter()
        .filter_map(|op| match op {
            PaintOp::RegisterFont { family, .. } => Some(family.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(registrations, vec!["Arial"]);

    let texts: Vec<_> = ops
        .iter()
        .filter_map(|op| match op {
            PaintOp::DrawText { text, options, .. } => Some((text.as_str(), options)),
            _ => None,
        })
        .collect();
    assert_eq!(texts.len(), 1);
    let (text, options) = texts[0];
    assert_eq!(text, "hello");
    assert!(!options.underline);
    assert_eq!(options.align, Align::Left);
    assert_eq!(options.line_gap, 0.0);
    // Element width plus the glyph-edge padding.
    assert_eq!(options.width, 202.0);

    // Background precedes children.
    let bg_index = ops
        .iter()
        .position(|op| matches!(op, PaintOp::FillRect { .. }))
        .unwrap();
    let text_index = ops
        .iter()
        .position(|op| matches!(op, PaintOp::DrawText { .. }))
        .unwrap();
    assert!(bg_index < text_index);
    assert!(matches!(ops.last(), Some(PaintOp::End)));
}

#[test]
fn underline_flag_follows_text_decoration() {
    let json = scene_json(
        r#"{
            "type": "text",
            "x": 0, "y": 0, "width": 100, "height": 20,
            "text": "u",
            "fontFamily": "Arial", "fontSize": 12, "fill": "black",
            "textDecoration": "underline line-through"
        }"#,
    );
    let scene: Scene = serde_json::from_str(&json).unwrap();
    let ops = compile_to_ops(
        &scene,
        &fetcher_with_font(),
        &EmptyFontCatalog,
        CompileConfig::default(),
    )
    .unwrap();
    let underline = ops.iter().any(|op| {
        matches!(op, PaintOp::DrawText { options, .. } if options.underline)
    });
    assert!(underline);
}

#[test]
fn siblings_paint_in_array_order_with_transform_brackets() {
    let json = scene_json(
        r#"{
            "type": "line",
            "x": 1, "y": 2, "width": 50, "height": 3, "rotation": 45
        },
        {
            "type": "line",
            "x": 4, "y": 5, "width": 60, "height": 1
        }"#,
    );
    let scene: Scene = serde_json::from_str(&json).unwrap();
    let ops = compile_to_ops(
        &scene,
        &fetcher_with_font(),
        &EmptyFontCatalog,
        CompileConfig::default(),
    )
    .unwrap();

    let expected_tail = [
        PaintOp::Save,
        PaintOp::Translate { x: 1.0, y: 2.0 },
        PaintOp::Rotate { degrees: 45.0 },
        PaintOp::StrokeLine {
            x1: 0.0,
            y1: 0.0,
            x2: 50.0,
            y2: 0.0,
            width: 3.0,
        },
        PaintOp::Restore,
        PaintOp::Save,
        PaintOp::Translate { x: 4.0, y: 5.0 },
        PaintOp::Rotate { degrees: 0.0 },
        PaintOp::StrokeLine {
            x1: 0.0,
            y1: 0.0,
            x2: 60.0,
            y2: 0.0,
            width: 1.0,
        },
        PaintOp::Restore,
        PaintOp::EndPage,
        PaintOp::End,
    ];
    let start = ops.len() - expected_tail.len();
    assert_eq!(&ops[start..], &expected_tail);
}

#[test]
fn image_element_is_cropped_and_drawn_at_local_origin() {
    let mut fetcher = fetcher_with_font();
    fetcher.insert("https://assets.example/photo.png", png_bytes(64, 64));

    let json = scene_json(
        r#"{
            "type": "image",
            "x": 20, "y": 30, "width": 100, "height": 50,
            "src": "https://assets.example/photo.png",
            "cropX": 0, "cropY": 0, "cropWidth": 1, "cropHeight": 1
        }"#,
    );
    let scene: Scene = serde_json::from_str(&json).unwrap();
    let ops = compile_to_ops(&scene, &fetcher, &EmptyFontCatalog, CompileConfig::default())
        .unwrap();

    let image_ops: Vec<_> = ops
        .iter()
        .filter_map(|op| match op {
            PaintOp::DrawImage { x, y, size, .. } => Some((*x, *y, *size)),
            _ => None,
        })
        .collect();
    assert_eq!(image_ops.len(), 1);
    let (x, y, size) = image_ops[0];
    assert_eq!((x, y), (0.0, 0.0));
    assert_eq!(size.width, 100.0);
    assert_eq!(size.height, 50.0);
}

#[test]
fn failed_element_restores_transform_before_error_propagates() {
    let json = scene_json(
        r#"{
            "type": "image",
            "x": 7, "y": 8, "width": 10, "height": 10,
            "src": "https://assets.example/missing.png"
        }"#,
    );
    let scene: Scene = serde_json::from_str(&json).unwrap();

    let fetcher = fetcher_with_font();
    let mut surface = RecordingSurface::new();
    let err = SceneCompiler::new(&fetcher, &EmptyFontCatalog)
        .compile(&scene, &mut surface)
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("page 0, element 0 (image)"), "got: {msg}");
    assert!(msg.contains("missing.png"));

    // The transform stack was unwound before the error surfaced.
    let ops = surface.ops();
    assert_eq!(
        &ops[ops.len() - 4..],
        &[
            PaintOp::Save,
            PaintOp::Translate { x: 7.0, y: 8.0 },
            PaintOp::Rotate { degrees: 0.0 },
            PaintOp::Restore,
        ]
    );
}

#[test]
fn placeholder_policy_degrades_missing_assets() {
    let json = scene_json(
        r#"{
            "type": "image",
            "x": 0, "y": 0, "width": 40, "height": 30,
            "src": "https://assets.example/missing.png"
        },
        {
            "type": "line",
            "x": 0, "y": 50, "width": 10, "height": 1
        }"#,
    );
    let scene: Scene = serde_json::from_str(&json).unwrap();

    let config = CompileConfig {
        fetch_failure: FetchFailurePolicy::Placeholder,
        ..Default::default()
    };
    let ops = compile_to_ops(&scene, &fetcher_with_font(), &EmptyFontCatalog, config).unwrap();

    // The placeholder box replaces the image inside the same transform
    // bracket, and the next sibling still paints.
    let placeholder = ops.iter().any(|op| {
        matches!(
            op,
            PaintOp::FillRect { width, height, .. } if *width == 40.0 && *height == 30.0
        )
    });
    assert!(placeholder);
    assert!(ops.iter().any(|op| matches!(op, PaintOp::StrokeLine { .. })));
    assert!(matches!(ops.last(), Some(PaintOp::End)));
}

#[test]
fn background_locator_paints_full_page_image() {
    let mut fetcher = fetcher_with_font();
    fetcher.insert("https://assets.example/bg.jpg", png_bytes(4, 4));

    let json = r#"{
        "width": 320, "height": 240,
        "fonts": [],
        "pages": [{"background": "https://assets.example/bg.jpg", "children": []}]
    }"#;
    let scene: Scene = serde_json::from_str(json).unwrap();
    let ops = compile_to_ops(&scene, &fetcher, &EmptyFontCatalog, CompileConfig::default())
        .unwrap();

    let bg: Vec<_> = ops
        .iter()
        .filter_map(|op| match op {
            PaintOp::DrawImage { x, y, size, .. } => Some((*x, *y, *size)),
            _ => None,
        })
        .collect();
    assert_eq!(bg.len(), 1);
    assert_eq!(bg[0].0, 0.0);
    assert_eq!(bg[0].1, 0.0);
    assert_eq!(bg[0].2.width, 320.0);
    assert_eq!(bg[0].2.height, 240.0);
}

#[test]
fn pages_emit_in_scene_order() {
    let json = r##"{
        "width": 100, "height": 100,
        "fonts": [],
        "pages": [
            {"background": "#ff0000", "children": []},
            {"background": "#00ff00", "children": []}
        ]
    }"##;
    let scene: Scene = serde_json::from_str(&json).unwrap();
    let ops = compile_to_ops(
        &scene,
        &StaticFetcher::new(),
        &EmptyFontCatalog,
        CompileConfig::default(),
    )
    .unwrap();

    let fills: Vec<_> = ops
        .iter()
        .filter_map(|op| match op {
            PaintOp::FillRect { color, .. } => Some((color.r, color.g)),
            _ => None,
        })
        .collect();
    assert_eq!(fills, vec![(255, 0), (0, 255)]);
    let page_starts = ops.iter().filter(|op| matches!(op, PaintOp::BeginPage)).count();
    let page_ends = ops.iter().filter(|op| matches!(op, PaintOp::EndPage)).count();
    assert_eq!(page_starts, 2);
    assert_eq!(page_ends, 2);
}

#[test]
fn compiling_twice_is_deterministic() {
    let mut fetcher = fetcher_with_font();
    fetcher.insert("https://assets.example/photo.png", png_bytes(32, 16));

    let json = scene_json(
        r##"{
            "type": "text",
            "x": 10, "y": 10, "width": 200, "height": 50,
            "text": "same",
            "fontFamily": "Arial", "fontSize": 24, "fill": "#123456"
        },
        {
            "type": "image",
            "x": 0, "y": 100, "width": 60, "height": 60,
            "src": "https://assets.example/photo.png"
        }"##,
    );
    let scene: Scene = serde_json::from_str(&json).unwrap();

    let first = compile_to_ops(&scene, &fetcher, &EmptyFontCatalog, CompileConfig::default())
        .unwrap();
    let second = compile_to_ops(&scene, &fetcher, &EmptyFontCatalog, CompileConfig::default())
        .unwrap();
    assert_eq!(fingerprint_ops(&first), fingerprint_ops(&second));
    assert_eq!(first, second);
}

#[test]
fn unparseable_text_fill_is_fatal_with_context() {
    let json = scene_json(
        r#"{
            "type": "text",
            "x": 0, "y": 0, "width": 10, "height": 10,
            "text": "x",
            "fontFamily": "Arial", "fontSize": 10, "fill": "definitely-not-a-color"
        }"#,
    );
    let scene: Scene = serde_json::from_str(&json).unwrap();
    let err = compile_to_ops(
        &scene,
        &fetcher_with_font(),
        &EmptyFontCatalog,
        CompileConfig::default(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("invalid color"));
    assert!(err.to_string().contains("(text)"));
}
